use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use golf_sync::api::router;
use golf_sync::config::AppConfig;
use golf_sync::db::{self, CursorStore};
use golf_sync::remote::HttpSyncRemote;
use golf_sync::services::status::spawn_status_poller;
use golf_sync::services::{NetworkMonitor, SyncEngine, SyncScheduler};
use golf_sync::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "golf_sync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = db::connect(&config.database_url).await?;

    let store = Arc::new(CursorStore::new(pool.clone()));
    info!("device id {}", store.device_id().await);

    let remote = Arc::new(HttpSyncRemote::new(
        config.sync_endpoint.clone(),
        config.request_timeout,
    )?);
    let engine = Arc::new(SyncEngine::new(
        pool.clone(),
        store,
        remote,
        config.engine.clone(),
    ));
    let scheduler = SyncScheduler::new(engine, config.scheduler.clone());
    scheduler.start();

    let monitor = NetworkMonitor::new(
        config.sync_endpoint.clone(),
        config.network_probe_interval,
        config.request_timeout,
    )?;
    let monitor_handle = monitor.spawn(scheduler.clone());

    let (status, poller_handle) =
        spawn_status_poller(scheduler.clone(), config.status_poll_interval);

    let state = AppState {
        db: pool.clone(),
        scheduler: scheduler.clone(),
        status,
    };

    let app = router(state);

    info!("sync endpoint {}", config.sync_endpoint);
    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    scheduler.shutdown();
    monitor_handle.abort();
    poller_handle.abort();
    pool.close().await;

    Ok(())
}
