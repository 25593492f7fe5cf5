use serde::{Deserialize, Serialize};

use crate::models::{CollectionCounts, EntityBatch, SyncCursors};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    pub cursors: SyncCursors,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub in_sync: bool,
    #[serde(default)]
    pub server_cursors: Option<SyncCursors>,
    #[serde(default)]
    pub counts: Option<CollectionCounts>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMetadata {
    pub device_id: String,
    pub last_sync: String,
    pub version: String,
}

/// The four collections at the top level, next to `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    #[serde(flatten)]
    pub records: EntityBatch,
    pub metadata: PushMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub saved: CollectionCounts,
    #[serde(default)]
    pub server_cursors: SyncCursors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub cursors: SyncCursors,
    pub limit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    #[serde(default)]
    pub changes: EntityBatch,
    #[serde(default)]
    pub server_cursors: SyncCursors,
}
