use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::AppError;
use crate::services::scheduler::SyncScheduler;

/// Connectivity detection by probing the sync endpoint. Any HTTP response
/// counts as online, whatever its status; only a transport failure counts
/// as offline.
pub struct NetworkMonitor {
    client: Client,
    url: String,
    interval: Duration,
}

impl NetworkMonitor {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    pub async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "network probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "network probe failed");
                false
            }
        }
    }

    /// Probes forever, reporting transitions to the scheduler.
    pub fn spawn(self, scheduler: Arc<SyncScheduler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let online = self.probe().await;
                if online != scheduler.is_online() {
                    scheduler.set_online(online);
                }
            }
        })
    }
}
