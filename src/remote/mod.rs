pub mod dto;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;
use crate::models::SyncCursors;

use dto::{PullRequest, PullResponse, PushRequest, PushResponse, StateRequest, StateResponse};

/// The remote half of the sync protocol.
#[async_trait]
pub trait SyncRemote: Send + Sync {
    async fn check_state(&self, cursors: &SyncCursors) -> Result<StateResponse, AppError>;
    async fn push(&self, request: &PushRequest) -> Result<PushResponse, AppError>;
    async fn pull(&self, request: &PullRequest) -> Result<PullResponse, AppError>;
}

pub struct HttpSyncRemote {
    client: Client,
    base_url: String,
}

impl HttpSyncRemote {
    /// `base_url` is expected without a trailing slash; see
    /// [`crate::config::normalize_endpoint`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "sync request");

        let response = self.client.post(&url).json(body).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json::<R>().await?)
    }
}

async fn error_for_status(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        body
    };

    Err(AppError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SyncRemote for HttpSyncRemote {
    async fn check_state(&self, cursors: &SyncCursors) -> Result<StateResponse, AppError> {
        self.post(
            "/sync/state",
            &StateRequest {
                cursors: cursors.clone(),
            },
        )
        .await
    }

    async fn push(&self, request: &PushRequest) -> Result<PushResponse, AppError> {
        self.post("/sync/push", request).await
    }

    async fn pull(&self, request: &PullRequest) -> Result<PullResponse, AppError> {
        self.post("/sync/pull", request).await
    }
}
