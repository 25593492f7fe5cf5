use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::SyncCursors;

const DEVICE_ID: &str = "device_id";
const SYNC_ENABLED: &str = "sync_enabled";
const LAST_SYNC: &str = "last_sync";
const LAST_ERROR: &str = "last_error";
const NEXT_SYNC: &str = "next_sync";
const CURSORS: &str = "cursors";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub syncing: bool,
    pub last_error: Option<String>,
    pub next_sync_time: Option<DateTime<Utc>>,
}

/// A partial status write. `None` leaves a field untouched; `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<Option<String>>,
    pub next_sync_time: Option<Option<DateTime<Utc>>>,
}

impl StatusUpdate {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            last_error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn succeeded(at: DateTime<Utc>, next_sync_time: DateTime<Utc>) -> Self {
        Self {
            last_sync: Some(at),
            last_error: Some(None),
            next_sync_time: Some(Some(next_sync_time)),
        }
    }
}

/// Persisted sync metadata: cursors, flags and timestamps, stored as
/// key/value rows beside the entity tables.
///
/// Every operation is best effort. When the backing store fails, reads fall
/// back to never-synced defaults and writes are logged and dropped.
pub struct CursorStore {
    db: SqlitePool,
    syncing: AtomicBool,
    device_id: OnceCell<String>,
}

/// Marks a round trip as in flight until dropped.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl CursorStore {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            syncing: AtomicBool::new(false),
            device_id: OnceCell::new(),
        }
    }

    pub async fn get_cursors(&self) -> SyncCursors {
        match self.read(CURSORS).await {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "stored cursors are unreadable, starting from scratch");
                SyncCursors::default()
            }),
            None => SyncCursors::default(),
        }
    }

    pub async fn set_cursors(&self, cursors: &SyncCursors) {
        match serde_json::to_string(cursors) {
            Ok(raw) => self.write(CURSORS, Some(&raw)).await,
            Err(e) => warn!(error = %e, "failed to encode cursors"),
        }
    }

    pub async fn get_status(&self) -> SyncStatus {
        SyncStatus {
            last_sync: self.read_time(LAST_SYNC).await,
            enabled: self.is_enabled().await,
            syncing: self.is_syncing(),
            last_error: self.read(LAST_ERROR).await,
            next_sync_time: self.read_time(NEXT_SYNC).await,
        }
    }

    pub async fn set_status(&self, update: StatusUpdate) {
        if let Some(at) = update.last_sync {
            self.write(LAST_SYNC, Some(&at.to_rfc3339())).await;
        }
        if let Some(error) = update.last_error {
            self.write(LAST_ERROR, error.as_deref()).await;
        }
        if let Some(next) = update.next_sync_time {
            let raw = next.map(|t| t.to_rfc3339());
            self.write(NEXT_SYNC, raw.as_deref()).await;
        }
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.read_time(LAST_SYNC).await
    }

    /// Stable per-install identifier, created on first use.
    pub async fn device_id(&self) -> String {
        self.device_id
            .get_or_init(|| async {
                if let Some(id) = self.read(DEVICE_ID).await {
                    return id;
                }
                let id = Uuid::new_v4().to_string();
                debug!(device_id = %id, "generated device id");
                self.write(DEVICE_ID, Some(&id)).await;
                id
            })
            .await
            .clone()
    }

    pub async fn is_enabled(&self) -> bool {
        self.read(SYNC_ENABLED).await.as_deref() == Some("true")
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.write(SYNC_ENABLED, Some(if enabled { "true" } else { "false" }))
            .await;
    }

    /// Claims the in-flight flag. Returns `None` when a round trip is
    /// already running in this process.
    pub fn try_begin_sync(&self) -> Option<SyncGuard<'_>> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard {
                flag: &self.syncing,
            })
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    async fn read(&self, key: &str) -> Option<String> {
        let result = sqlx::query_scalar::<_, String>("SELECT value FROM sync_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read sync setting");
                None
            }
        }
    }

    async fn read_time(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.read(key).await?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    async fn write(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => {
                sqlx::query(
                    "INSERT INTO sync_settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key)
                .bind(value)
                .execute(&self.db)
                .await
            }
            None => {
                sqlx::query("DELETE FROM sync_settings WHERE key = ?")
                    .bind(key)
                    .execute(&self.db)
                    .await
            }
        };

        if let Err(e) = result {
            warn!(key, error = %e, "failed to write sync setting");
        }
    }
}
