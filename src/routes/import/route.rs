use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
};

use super::dto::{CommitRequest, ParseResponse, ValidateRequest};
use crate::import::{CommitReport, ImportField, ValidationReport, parse_spreadsheet, suggest_mapping, validate};
use crate::routes::read_file_field;
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/api/v1/students/import/parse", post(parse_import_file))
        .route("/api/v1/students/import/validate", post(validate_import))
        .route("/api/v1/students/import/commit", post(commit_import))
}

/// Reads an uploaded spreadsheet and proposes a column mapping.
#[utoipa::path(
    post,
    path = "/api/v1/students/import/parse",
    request_body(content = String, content_type = "multipart/form-data", description = "Multipart form with a `file` field (.xlsx, .xls or .csv)"),
    responses(
        (status = 200, description = "Spreadsheet parsed", body = ParseResponse),
        (status = 400, description = "Missing, empty or unsupported file"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Student Import"
)]
pub async fn parse_import_file(
    multipart: Multipart,
) -> Result<(StatusCode, Json<ParseResponse>), (StatusCode, String)> {
    let upload = read_file_field(multipart).await?;
    let file_name = upload.file_name.clone();

    let sheet = tokio::task::spawn_blocking(move || parse_spreadsheet(&upload.file_name, &upload.bytes))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Parser task failed: {}", e),
            )
        })?
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{:#}", e)))?;

    tracing::info!(
        file_name = %file_name,
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Parsed import spreadsheet"
    );

    Ok((
        StatusCode::OK,
        Json(ParseResponse {
            file_name,
            suggested_mapping: suggest_mapping(&sheet.headers),
            required_fields: ImportField::REQUIRED.to_vec(),
            headers: sheet.headers,
            rows: sheet.rows,
        }),
    ))
}

/// Validates rows against the cached faculties, sections and parents.
#[utoipa::path(
    post,
    path = "/api/v1/students/import/validate",
    request_body = ValidateRequest,
    responses(
        (status = 200, description = "Validation report", body = ValidationReport),
        (status = 422, description = "The column mapping is unusable")
    ),
    tag = "Student Import"
)]
pub async fn validate_import(
    State(state): State<AppState>,
    Json(payload): Json<ValidateRequest>,
) -> Result<(StatusCode, Json<ValidationReport>), (StatusCode, String)> {
    let report = validate(&payload.rows, &payload.headers, &payload.mapping, &state.cache)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    Ok((StatusCode::OK, Json(report)))
}

/// Creates identities, parents and students for validated rows. The commit
/// keeps running if the client disconnects.
#[utoipa::path(
    post,
    path = "/api/v1/students/import/commit",
    request_body = CommitRequest,
    responses(
        (status = 200, description = "Commit report, including per-row failures", body = CommitReport),
        (status = 500, description = "Internal server error")
    ),
    tag = "Student Import"
)]
pub async fn commit_import(
    State(state): State<AppState>,
    Json(payload): Json<CommitRequest>,
) -> Result<(StatusCode, Json<CommitReport>), (StatusCode, String)> {
    let orchestrator = state.commit_orchestrator();
    let report = tokio::spawn(async move {
        orchestrator
            .commit_with_progress(&payload.rows, |progress| {
                tracing::debug!(
                    processed = progress.processed,
                    total = progress.total,
                    "Import commit progress"
                );
            })
            .await
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Commit task failed: {}", e),
        )
    })?;

    Ok((StatusCode::OK, Json(report)))
}
