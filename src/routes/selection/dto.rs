use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::cascade::LevelSnapshot;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SelectionQuery {
    pub faculty_id: Option<String>,
    pub class_name: Option<String>,
    pub section_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub levels: Vec<LevelSnapshot>,
}
