use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::repository;
use crate::db::{CursorStore, StatusUpdate};
use crate::error::AppError;
use crate::models::{CollectionCounts, EntityBatch};
use crate::remote::SyncRemote;
use crate::remote::dto::{PullRequest, PushMetadata, PushRequest};

pub const PROTOCOL_VERSION: &str = "1.0.0";

/// What a push sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    /// Every local record, tombstones included.
    #[default]
    Snapshot,
    /// Only records changed since the server last acknowledged them.
    Pending,
}

impl FromStr for PushMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(PushMode::Snapshot),
            "pending" => Ok(PushMode::Pending),
            other => Err(AppError::Config(format!(
                "SYNC_PUSH_MODE must be snapshot or pending, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pull_limit: u32,
    pub push_mode: PushMode,
    /// How long a successful sync counts as fresh; drives `next_sync_time`.
    pub staleness: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pull_limit: 100,
            push_mode: PushMode::default(),
            staleness: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    InProgress,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => f.write_str("sync is disabled"),
            SkipReason::InProgress => f.write_str("a sync is already in progress"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStats {
    /// Records sent on push.
    pub pushed: CollectionCounts,
    /// Records the server reported as saved.
    pub saved: CollectionCounts,
    /// Records applied from the pull.
    pub pulled: CollectionCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Skipped { reason: SkipReason },
    /// The state check found nothing to exchange.
    InSync,
    Synced(SyncStats),
}

/// Runs the state check, push and pull phases of one round trip against a
/// [`SyncRemote`].
pub struct SyncEngine {
    db: SqlitePool,
    store: Arc<CursorStore>,
    remote: Arc<dyn SyncRemote>,
    config: EngineConfig,
}

impl SyncEngine {
    pub fn new(
        db: SqlitePool,
        store: Arc<CursorStore>,
        remote: Arc<dyn SyncRemote>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            store,
            remote,
            config,
        }
    }

    pub fn store(&self) -> &Arc<CursorStore> {
        &self.store
    }

    /// Performs one round trip.
    ///
    /// Returns `Skipped` without touching the network or the stored status
    /// when sync is disabled or another round trip holds the in-flight flag.
    /// On failure the error is recorded as `last_error` and cursors stay at
    /// whatever the last completed phase committed.
    pub async fn sync_now(&self) -> Result<SyncOutcome, AppError> {
        if !self.store.is_enabled().await {
            debug!("Sync skipped: disabled");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::Disabled,
            });
        }

        let Some(_guard) = self.store.try_begin_sync() else {
            debug!("Sync skipped: already in progress");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::InProgress,
            });
        };

        info!("Starting sync...");
        match self.round_trip().await {
            Ok(outcome) => {
                let now = Utc::now();
                self.store
                    .set_status(StatusUpdate::succeeded(now, now + self.config.staleness))
                    .await;
                info!("Sync completed successfully: {:?}", outcome);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Sync failed: {}", e);
                self.store.set_status(StatusUpdate::failed(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Turns sync on and runs the initial round trip.
    pub async fn enable(&self) -> Result<SyncOutcome, AppError> {
        self.store.set_enabled(true).await;
        let base = self.store.last_sync().await.unwrap_or_else(Utc::now);
        self.store
            .set_status(StatusUpdate {
                next_sync_time: Some(Some(base + self.config.staleness)),
                ..StatusUpdate::default()
            })
            .await;
        info!("Sync enabled");
        self.sync_now().await
    }

    pub async fn disable(&self) {
        self.store.set_enabled(false).await;
        self.store
            .set_status(StatusUpdate {
                next_sync_time: Some(None),
                ..StatusUpdate::default()
            })
            .await;
        info!("Sync disabled");
    }

    async fn round_trip(&self) -> Result<SyncOutcome, AppError> {
        let mut cursors = self.store.get_cursors().await;

        info!("Step 1: Checking sync state");
        let state = self.remote.check_state(&cursors).await?;
        if state.in_sync {
            info!("Data is already in sync");
            return Ok(SyncOutcome::InSync);
        }

        info!("Step 2: Pushing local changes ({:?})", self.config.push_mode);
        let pending_only = self.config.push_mode == PushMode::Pending;
        let (records, readable) = match repository::collect_for_push(&self.db, pending_only).await {
            Ok(records) => (records, true),
            Err(e) => {
                warn!("Failed to read local records, pushing none: {}", e);
                (EntityBatch::default(), false)
            }
        };
        let last_sync = self.store.last_sync().await.unwrap_or_else(Utc::now);
        let request = PushRequest {
            records,
            metadata: PushMetadata {
                device_id: self.store.device_id().await,
                last_sync: last_sync.to_rfc3339(),
                version: PROTOCOL_VERSION.to_string(),
            },
        };

        let ack = self.remote.push(&request).await?;
        cursors.advance(&ack.server_cursors);
        self.store.set_cursors(&cursors).await;
        if let Err(e) = repository::mark_synced(&self.db, &request.records).await {
            // The records go out again next time; the server upserts by id.
            warn!("Failed to mark pushed records as synced: {}", e);
        }
        let pushed = request.records.counts();
        info!(
            "Pushed {} records, server saved {} ({})",
            pushed.total(),
            ack.saved.total(),
            ack.status
        );

        if !readable {
            // Unread pending rows must not be overwritten by the pull.
            warn!("Skipping pull until local records can be read");
            return Ok(SyncOutcome::Synced(SyncStats {
                pushed,
                saved: ack.saved,
                pulled: CollectionCounts::default(),
            }));
        }

        info!("Step 3: Pulling server changes");
        let page = self
            .remote
            .pull(&PullRequest {
                cursors: cursors.clone(),
                limit: self.config.pull_limit,
            })
            .await?;
        repository::bulk_put(&self.db, &page.changes).await?;
        cursors.advance(&page.server_cursors);
        self.store.set_cursors(&cursors).await;
        let pulled = page.changes.counts();
        info!(
            "Pulled {} profiles, {} courses, {} games, {} scores",
            pulled.profiles, pulled.courses, pulled.games, pulled.scores
        );

        Ok(SyncOutcome::Synced(SyncStats {
            pushed,
            saved: ack.saved,
            pulled,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_mode_parses_case_insensitively() {
        assert_eq!("Snapshot".parse::<PushMode>().unwrap(), PushMode::Snapshot);
        assert_eq!(" pending ".parse::<PushMode>().unwrap(), PushMode::Pending);
        assert!("delta".parse::<PushMode>().is_err());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let skipped = serde_json::to_value(SyncOutcome::Skipped {
            reason: SkipReason::InProgress,
        })
        .unwrap();
        assert_eq!(skipped["outcome"], "skipped");
        assert_eq!(skipped["reason"], "in_progress");

        let synced = serde_json::to_value(SyncOutcome::Synced(SyncStats::default())).unwrap();
        assert_eq!(synced["outcome"], "synced");
        assert_eq!(synced["pulled"]["scores"], 0);
    }
}
