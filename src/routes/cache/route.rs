use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};

use super::dto::{RefreshResponse, RefreshResult};
use crate::cache::CollectionKind;
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cache/refresh", post(refresh_all))
        .route("/api/v1/cache/refresh/{kind}", post(refresh_kind))
}

/// Reloads every lookup collection. Failed kinds keep their previous data.
#[utoipa::path(
    post,
    path = "/api/v1/cache/refresh",
    responses((status = 200, description = "Per-collection refresh results", body = RefreshResponse)),
    tag = "Cache"
)]
pub async fn refresh_all(State(state): State<AppState>) -> (StatusCode, Json<RefreshResponse>) {
    let results = state
        .cache
        .refresh_all()
        .await
        .into_iter()
        .map(|(kind, result)| match result {
            Ok(count) => RefreshResult {
                kind: kind.to_string(),
                count: Some(count),
                error: None,
            },
            Err(e) => RefreshResult {
                kind: kind.to_string(),
                count: None,
                error: Some(format!("{:#}", e)),
            },
        })
        .collect();

    (StatusCode::OK, Json(RefreshResponse { results }))
}

#[utoipa::path(
    post,
    path = "/api/v1/cache/refresh/{kind}",
    params(("kind" = String, Path, description = "faculty, section, student or parent")),
    responses(
        (status = 200, description = "Collection refreshed", body = RefreshResult),
        (status = 400, description = "Unknown collection kind"),
        (status = 502, description = "Backend unavailable; previous data kept")
    ),
    tag = "Cache"
)]
pub async fn refresh_kind(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<(StatusCode, Json<RefreshResult>), (StatusCode, String)> {
    let kind: CollectionKind = kind.parse().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let count = state
        .cache
        .refresh(kind)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Failed to refresh {}: {:#}", kind, e)))?;

    Ok((
        StatusCode::OK,
        Json(RefreshResult {
            kind: kind.to_string(),
            count: Some(count),
            error: None,
        }),
    ))
}
