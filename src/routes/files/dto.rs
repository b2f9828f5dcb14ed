use serde::Serialize;
use utoipa::ToSchema;

use crate::store::StoredFile;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResponse {
    pub file: StoredFile,
    #[schema(example = "http://localhost:8080/files/attachments/5f0c...-report.pdf")]
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileUrlResponse {
    pub url: String,
}
