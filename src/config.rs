use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::services::engine::{EngineConfig, PushMode};
use crate::services::scheduler::SchedulerConfig;

pub const DEFAULT_SYNC_ENDPOINT: &str = "http://localhost:8000/api";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://golf_buddy.db?mode=rwc";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub sync_endpoint: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub status_poll_interval: Duration,
    pub network_probe_interval: Duration,
    pub engine: EngineConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so parsing can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let sync_endpoint = normalize_endpoint(
            lookup("SYNC_ENDPOINT").unwrap_or_else(|| DEFAULT_SYNC_ENDPOINT.to_string()),
        )?;

        let bind_addr = parse_or("BIND_ADDR", &lookup, SocketAddr::from(([127, 0, 0, 1], 3000)))?;

        let push_mode = match lookup("SYNC_PUSH_MODE") {
            Some(raw) => raw.parse::<PushMode>()?,
            None => PushMode::default(),
        };

        let engine = EngineConfig {
            pull_limit: parse_or("SYNC_PULL_LIMIT", &lookup, 100u32)?,
            push_mode,
            ..EngineConfig::default()
        };
        if engine.pull_limit == 0 {
            return Err(AppError::Config("SYNC_PULL_LIMIT must be positive".to_string()));
        }

        let scheduler = SchedulerConfig {
            startup_delay: millis("SYNC_STARTUP_DELAY_MS", &lookup, 2000)?,
            online_delay: millis("SYNC_ONLINE_DELAY_MS", &lookup, 3000)?,
            game_completion_delay: millis("SYNC_COMPLETION_DELAY_MS", &lookup, 1000)?,
            ..SchedulerConfig::default()
        };

        Ok(Self {
            database_url,
            sync_endpoint,
            bind_addr,
            request_timeout: Duration::from_secs(parse_or("SYNC_REQUEST_TIMEOUT_SECS", &lookup, 30u64)?),
            status_poll_interval: millis("SYNC_STATUS_POLL_MS", &lookup, 2000)?,
            network_probe_interval: Duration::from_secs(parse_or(
                "NETWORK_PROBE_INTERVAL_SECS",
                &lookup,
                15u64,
            )?),
            engine,
            scheduler,
        })
    }
}

/// Trims the endpoint and its trailing slash; only http(s) URLs are accepted.
pub fn normalize_endpoint(raw: String) -> Result<String, AppError> {
    let endpoint = raw.trim();
    if endpoint.is_empty() {
        return Err(AppError::Config("SYNC_ENDPOINT must not be empty".to_string()));
    }
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(AppError::Config(
            "SYNC_ENDPOINT must include http:// or https://".to_string(),
        ))
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

fn millis<F>(key: &str, lookup: &F, default: u64) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(key, lookup, default).map(Duration::from_millis)
}
