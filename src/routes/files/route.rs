use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;

use super::dto::{FileUploadResponse, FileUrlResponse};
use crate::routes::read_file_field;
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/api/v1/files/{bucket_id}", post(upload_file))
        .route("/api/v1/files/{bucket_id}/{file_id}", delete(delete_file))
        .route("/api/v1/files/{bucket_id}/{file_id}/url", get(get_file_url))
}

fn ensure_bucket(state: &AppState, bucket_id: &str) -> Result<(), (StatusCode, String)> {
    if bucket_id == state.attachment_bucket {
        Ok(())
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("Unknown bucket: {}", bucket_id),
        ))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/files/{bucket_id}",
    params(("bucket_id" = String, Path, description = "Bucket id")),
    request_body(content = String, content_type = "multipart/form-data", description = "Multipart form with a `file` field"),
    responses(
        (status = 201, description = "File stored", body = FileUploadResponse),
        (status = 400, description = "No file provided"),
        (status = 404, description = "Unknown bucket"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Path(bucket_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileUploadResponse>), (StatusCode, String)> {
    ensure_bucket(&state, &bucket_id)?;
    let upload = read_file_field(multipart).await?;
    let file_id = format!("{}-{}", Uuid::new_v4(), upload.file_name);

    let file = state
        .blobs
        .create_file(&bucket_id, &file_id, &upload.bytes)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store file: {:#}", e),
            )
        })?;
    let url = state
        .blobs
        .get_download_url(&bucket_id, &file.id)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))?;

    Ok((StatusCode::CREATED, Json(FileUploadResponse { file, url })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{bucket_id}/{file_id}",
    params(
        ("bucket_id" = String, Path, description = "Bucket id"),
        ("file_id" = String, Path, description = "File id")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "Unknown bucket or file")
    ),
    tag = "Files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path((bucket_id, file_id)): Path<(String, String)>,
) -> Result<StatusCode, (StatusCode, String)> {
    ensure_bucket(&state, &bucket_id)?;
    state
        .blobs
        .delete_file(&bucket_id, &file_id)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, format!("{:#}", e)))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{bucket_id}/{file_id}/url",
    params(
        ("bucket_id" = String, Path, description = "Bucket id"),
        ("file_id" = String, Path, description = "File id")
    ),
    responses(
        (status = 200, description = "Download URL", body = FileUrlResponse),
        (status = 400, description = "Invalid file id"),
        (status = 404, description = "Unknown bucket")
    ),
    tag = "Files"
)]
pub async fn get_file_url(
    State(state): State<AppState>,
    Path((bucket_id, file_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<FileUrlResponse>), (StatusCode, String)> {
    ensure_bucket(&state, &bucket_id)?;
    let url = state
        .blobs
        .get_download_url(&bucket_id, &file_id)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{:#}", e)))?;

    Ok((StatusCode::OK, Json(FileUrlResponse { url })))
}
