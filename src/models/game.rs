use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub date: String,
    pub course_id: String,
    #[serde(default)]
    pub final_note: String,
    #[serde(default)]
    pub final_score: i32,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub sync_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameRequest {
    pub course_id: String,
    /// Defaults to now when omitted.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteGameRequest {
    pub final_score: i32,
    #[serde(default)]
    pub final_note: String,
}
