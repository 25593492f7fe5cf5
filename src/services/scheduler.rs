use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::services::engine::{SyncEngine, SyncOutcome};

const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    AppStartup,
    NetworkOnline,
    GameCompletion,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncTrigger {
    pub kind: TriggerKind,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub enable_startup_sync: bool,
    pub enable_online_sync: bool,
    pub enable_game_completion_sync: bool,
    pub startup_delay: Duration,
    pub online_delay: Duration,
    pub game_completion_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_startup_sync: true,
            enable_online_sync: true,
            enable_game_completion_sync: true,
            startup_delay: Duration::from_secs(2),
            online_delay: Duration::from_secs(3),
            game_completion_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Timers {
    startup: Option<JoinHandle<()>>,
    online: Option<JoinHandle<()>>,
    completions: Vec<JoinHandle<()>>,
}

impl Timers {
    fn abort_all(&mut self) {
        for handle in self
            .startup
            .take()
            .into_iter()
            .chain(self.online.take())
            .chain(self.completions.drain(..))
        {
            handle.abort();
        }
    }
}

/// Decides when the [`SyncEngine`] runs.
///
/// Syncs fire once shortly after startup, after the device comes back
/// online, shortly after a game is completed, and on demand. There is no
/// periodic timer and no retry: a trigger that lands while sync is disabled
/// or already running is dropped.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    config: Mutex<SchedulerConfig>,
    history: Mutex<VecDeque<SyncTrigger>>,
    timers: Mutex<Timers>,
    online: AtomicBool,
    started: AtomicBool,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            config: Mutex::new(config),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            timers: Mutex::new(Timers::default()),
            online: AtomicBool::new(true),
            started: AtomicBool::new(false),
        })
    }

    /// Schedules the startup sync. Only the first call per scheduler has
    /// any effect.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let config = self.config();
        if !config.enable_startup_sync {
            info!("Startup sync disabled");
            return;
        }

        info!("Scheduling startup sync in {:?}", config.startup_delay);
        let handle = self.spawn_trigger(
            config.startup_delay,
            TriggerKind::AppStartup,
            "App startup sync check",
        );
        lock(&self.timers).startup = Some(handle);
    }

    /// Reports connectivity. An offline to online transition schedules a
    /// sync after the settle delay; going offline cancels it.
    pub fn set_online(self: &Arc<Self>, online: bool) {
        let was_online = self.online.swap(online, Ordering::AcqRel);

        if !online {
            if was_online {
                info!("Device went offline");
            }
            if let Some(pending) = lock(&self.timers).online.take() {
                debug!("Cancelling pending reconnect sync");
                pending.abort();
            }
            return;
        }

        if was_online {
            return;
        }

        info!("Device came online");
        let config = self.config();
        if !config.enable_online_sync {
            return;
        }

        let handle = self.spawn_trigger(
            config.online_delay,
            TriggerKind::NetworkOnline,
            "Device came back online",
        );
        if let Some(previous) = lock(&self.timers).online.replace(handle) {
            previous.abort();
        }
    }

    /// Schedules a sync shortly after a game was completed. Returns at once.
    pub fn game_completed(self: &Arc<Self>, game_id: &str) {
        let config = self.config();
        if !config.enable_game_completion_sync {
            debug!("Game completion sync disabled");
            return;
        }

        let handle = self.spawn_trigger(
            config.game_completion_delay,
            TriggerKind::GameCompletion,
            format!("Game {} completed", game_id),
        );
        let mut timers = lock(&self.timers);
        timers.completions.retain(|h| !h.is_finished());
        timers.completions.push(handle);
    }

    /// Runs a sync right away and waits for its outcome.
    pub async fn trigger_manual(&self, reason: impl Into<String>) -> Result<SyncOutcome, AppError> {
        self.fire(TriggerKind::Manual, reason.into()).await
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn config(&self) -> SchedulerConfig {
        lock(&self.config).clone()
    }

    /// Applies to triggers scheduled from now on.
    pub fn update_config(&self, config: SchedulerConfig) {
        info!("Scheduler configuration updated: {:?}", config);
        *lock(&self.config) = config;
    }

    /// Recorded triggers, oldest first.
    pub fn history(&self) -> Vec<SyncTrigger> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn last_trigger(&self) -> Option<SyncTrigger> {
        lock(&self.history).back().cloned()
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Cancels every pending timer. A sync already running is not
    /// interrupted.
    pub fn shutdown(&self) {
        info!("Shutting down sync scheduler");
        lock(&self.timers).abort_all();
    }

    fn spawn_trigger(
        self: &Arc<Self>,
        delay: Duration,
        kind: TriggerKind,
        reason: impl Into<String>,
    ) -> JoinHandle<()> {
        let scheduler: Weak<Self> = Arc::downgrade(self);
        let reason = reason.into();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(scheduler) = scheduler.upgrade() {
                // Outcome and errors are already logged by `fire`.
                let _ = scheduler.fire(kind, reason).await;
            }
        })
    }

    async fn fire(&self, kind: TriggerKind, reason: String) -> Result<SyncOutcome, AppError> {
        info!("Performing {:?} sync - {}", kind, reason);
        self.record(SyncTrigger {
            kind,
            timestamp: Utc::now(),
            reason,
        });

        match self.engine.sync_now().await {
            Ok(SyncOutcome::Skipped { reason }) => {
                info!("{:?} sync skipped: {}", kind, reason);
                Ok(SyncOutcome::Skipped { reason })
            }
            Ok(outcome) => {
                info!("{:?} sync completed successfully", kind);
                Ok(outcome)
            }
            Err(e) => {
                warn!("{:?} sync failed: {:?}", kind, e);
                Err(e)
            }
        }
    }

    fn record(&self, trigger: SyncTrigger) {
        let mut history = lock(&self.history);
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(trigger);
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        lock(&self.timers).abort_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
