use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One hole of one game. `hole` is zero based and unique within a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub game_id: String,
    pub hole: i32,
    pub par: i32,
    pub score: i32,
    #[serde(default)]
    pub putts: i32,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(skip)]
    pub sync_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScoreRequest {
    pub game_id: String,
    pub hole: i32,
    pub par: i32,
    pub score: i32,
    #[serde(default)]
    pub putts: i32,
}
