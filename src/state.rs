use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::watch;

use crate::services::{StatusView, SyncScheduler};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub scheduler: Arc<SyncScheduler>,
    /// Latest view published by the status poller.
    pub status: watch::Receiver<StatusView>,
}
