use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub rounds: i32,
    pub profile_id: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub sync_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourseRequest {
    pub name: String,
    pub rounds: i32,
    pub profile_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub rounds: Option<i32>,
}

/// A course is played over either nine or eighteen holes.
pub fn is_valid_rounds(rounds: i32) -> bool {
    matches!(rounds, 9 | 18)
}
