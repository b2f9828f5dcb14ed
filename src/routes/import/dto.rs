use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::import::{ColumnMapping, ImportField, ValidatedRow};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    #[schema(example = "students.xlsx")]
    pub file_name: String,
    pub headers: Vec<String>,
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<Value>>,
    #[schema(value_type = Object)]
    pub suggested_mapping: ColumnMapping,
    /// Fields every mapping must cover.
    pub required_fields: Vec<ImportField>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub headers: Vec<String>,
    #[schema(value_type = Vec<Vec<Object>>)]
    pub rows: Vec<Vec<Value>>,
    #[schema(value_type = Object)]
    pub mapping: ColumnMapping,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub rows: Vec<ValidatedRow>,
}
