//! Login identity creation for imported students and their parents.

pub mod http;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use http::HttpIdentityClient;
pub use local::{LocalIdentityService, SignupRejection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    /// When true only the student identity is created.
    pub is_existing_parent: bool,
    #[schema(example = "Alice Sharma")]
    pub student_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "parent@example.com")]
    pub parent_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub student_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_user_id: Option<String>,
    pub student_email: String,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn signup(&self, request: SignupRequest) -> Result<SignupResponse>;
}
