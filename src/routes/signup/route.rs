use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::identity::{IdentityService, SignupRejection, SignupRequest, SignupResponse};
use crate::state::AppState;

pub fn create_route() -> Router<AppState> {
    Router::new().route("/api/users/signup", post(signup))
}

/// Creates the student login and, for a new parent, the parent login.
#[utoipa::path(
    post,
    path = "/api/users/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Identities created", body = SignupResponse),
        (status = 400, description = "Missing student or parent details"),
        (status = 409, description = "Parent email already registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), (StatusCode, String)> {
    let response = state.local_identity.signup(payload).await.map_err(|e| {
        let status = match e.downcast_ref::<SignupRejection>() {
            Some(SignupRejection::MissingField(_)) => StatusCode::BAD_REQUEST,
            Some(SignupRejection::EmailTaken(_)) => StatusCode::CONFLICT,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, format!("{:#}", e))
    })?;

    Ok((StatusCode::CREATED, Json(response)))
}
