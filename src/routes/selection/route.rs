use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use tokio::task::JoinHandle;

use super::dto::{SelectionQuery, SelectionResponse};
use crate::cascade::{CLASS_LEVEL, FACULTY_LEVEL, SECTION_LEVEL, school_selector};
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/api/v1/selection/options", get(get_selection_options))
}

/// Walks the faculty → class → section → subject chain with the given
/// choices and returns every level's value and options. The walk stops at the
/// first level left unset.
#[utoipa::path(
    get,
    path = "/api/v1/selection/options",
    params(SelectionQuery),
    responses(
        (status = 200, description = "Options per level", body = SelectionResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Selection"
)]
pub async fn get_selection_options(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> Result<(StatusCode, Json<SelectionResponse>), (StatusCode, String)> {
    let selector = school_selector(state.store.clone(), &state.collections);
    settle(selector.load_root()).await?;

    let choices = [
        (FACULTY_LEVEL, query.faculty_id),
        (CLASS_LEVEL, query.class_name),
        (SECTION_LEVEL, query.section_id),
    ];
    for (level, value) in choices {
        let Some(value) = value else {
            break;
        };
        let handle = selector
            .set_level(level, Some(value))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        settle(handle).await?;
    }

    Ok((
        StatusCode::OK,
        Json(SelectionResponse {
            levels: selector.snapshot(),
        }),
    ))
}

async fn settle(handle: Option<JoinHandle<()>>) -> Result<(), (StatusCode, String)> {
    if let Some(handle) = handle {
        handle.await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load options: {}", e),
            )
        })?;
    }
    Ok(())
}
