use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    #[schema(example = "faculty")]
    pub kind: String,
    /// Documents now cached; absent when the refresh failed.
    pub count: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub results: Vec<RefreshResult>,
}
