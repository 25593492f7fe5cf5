use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::db::SyncStatus;
use crate::services::scheduler::{SyncScheduler, SyncTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncIndicator {
    Disabled,
    Syncing,
    Error,
    Offline,
    Synced,
}

impl SyncIndicator {
    /// The first matching state wins: disabled, syncing, error, offline.
    pub fn from_status(status: &SyncStatus, online: bool) -> Self {
        if !status.enabled {
            SyncIndicator::Disabled
        } else if status.syncing {
            SyncIndicator::Syncing
        } else if status.last_error.is_some() {
            SyncIndicator::Error
        } else if !online {
            SyncIndicator::Offline
        } else {
            SyncIndicator::Synced
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncIndicator::Disabled => "Sync disabled",
            SyncIndicator::Syncing => "Syncing...",
            SyncIndicator::Error => "Sync error",
            SyncIndicator::Offline => "Offline",
            SyncIndicator::Synced => "Synced",
        }
    }
}

/// Read-only projection of the sync state for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub indicator: SyncIndicator,
    pub label: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_human: String,
    pub enabled: bool,
    pub online: bool,
    pub last_error: Option<String>,
    pub next_sync_time: Option<DateTime<Utc>>,
    pub last_trigger: Option<SyncTrigger>,
}

impl StatusView {
    pub fn project(
        status: SyncStatus,
        online: bool,
        last_trigger: Option<SyncTrigger>,
        now: DateTime<Utc>,
    ) -> Self {
        let indicator = SyncIndicator::from_status(&status, online);
        Self {
            indicator,
            label: indicator.label().to_string(),
            last_sync: status.last_sync,
            last_sync_human: humanize_last_sync(status.last_sync, now),
            enabled: status.enabled,
            online,
            last_error: status.last_error,
            next_sync_time: status.next_sync_time,
            last_trigger,
        }
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::project(SyncStatus::default(), true, None, Utc::now())
    }
}

/// `Never`, `Just now`, then whole minutes, hours or days ago.
pub fn humanize_last_sync(last_sync: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last_sync) = last_sync else {
        return "Never".to_string();
    };

    let minutes = (now - last_sync).num_minutes();
    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}

/// Builds a fresh view from the cursor store and the scheduler.
pub async fn snapshot(scheduler: &SyncScheduler) -> StatusView {
    let status = scheduler.engine().store().get_status().await;
    StatusView::project(
        status,
        scheduler.is_online(),
        scheduler.last_trigger(),
        Utc::now(),
    )
}

/// Refreshes the status view on a fixed interval and publishes it on a
/// watch channel. The task ends when every receiver is gone.
pub fn spawn_status_poller(
    scheduler: Arc<SyncScheduler>,
    every: Duration,
) -> (watch::Receiver<StatusView>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(StatusView::default());

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let view = snapshot(&scheduler).await;
            tx.send_if_modified(|current| {
                if *current == view {
                    false
                } else {
                    *current = view;
                    true
                }
            });
            if tx.is_closed() {
                debug!("Status poller stopped: no subscribers");
                break;
            }
        }
    });

    (rx, handle)
}
