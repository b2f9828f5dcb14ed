use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::cache::CollectionKind;
use crate::maintenance::{ReconcileReport, reconcile_parent_links};
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route(
        "/api/v1/maintenance/reconcile-parent-links",
        post(reconcile_links),
    )
}

/// Adds missing student ids to parent records. Safe to run repeatedly.
#[utoipa::path(
    post,
    path = "/api/v1/maintenance/reconcile-parent-links",
    responses(
        (status = 200, description = "Reconciliation finished", body = ReconcileReport),
        (status = 500, description = "Internal server error")
    ),
    tag = "Maintenance"
)]
pub async fn reconcile_links(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ReconcileReport>), (StatusCode, String)> {
    let report = reconcile_parent_links(state.store.as_ref(), &state.collections)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to reconcile parent links: {:#}", e),
            )
        })?;

    if report.repaired_parents > 0 {
        // A failed refresh is logged and keeps the old snapshot.
        let _ = state.cache.refresh(CollectionKind::Parent).await;
    }

    Ok((StatusCode::OK, Json(report)))
}
