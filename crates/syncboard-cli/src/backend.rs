//! REST backend for the dashboard server
//!
//! Implements the core `SyncBackend` contract over the dashboard's JSON
//! API. Authentication is a static API key sent as a header on every
//! request.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use syncboard_core::{BackendError, Config, SyncBackend, SyncStarted, SyncStatus};

const API_KEY_HEADER: &str = "X-API-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: SyncStatus,
}

#[derive(Deserialize)]
struct BatchStatusResponse {
    statuses: HashMap<String, SyncStatus>,
}

#[derive(Deserialize)]
struct StartSyncResponse {
    accepted: bool,
    /// Terminal status if the server finished the sync inline
    #[serde(default)]
    status: Option<SyncStatus>,
}

impl HttpBackend {
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.server_url.clone().context(
            "Server URL not configured. Set it with:\n  \
             syncboard config set server_url http://your-server:8080",
        )?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        request
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

fn unexpected(status: StatusCode) -> BackendError {
    BackendError::Transport(format!("unexpected response status: {}", status))
}

#[async_trait]
impl SyncBackend for HttpBackend {
    async fn fetch_status(&self, resource_id: &str) -> Result<SyncStatus, BackendError> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/data-sources/{}/sync-status", resource_id),
            )
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(resource_id.to_string())),
            status if !status.is_success() => Err(unexpected(status)),
            _ => {
                let body: StatusResponse = response.json().await.map_err(transport)?;
                Ok(body.status)
            }
        }
    }

    async fn fetch_statuses(
        &self,
        resource_ids: &[String],
    ) -> Result<HashMap<String, SyncStatus>, BackendError> {
        let response = self
            .request(Method::GET, "/api/data-sources/sync-status")
            .query(&[("ids", resource_ids.join(","))])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(unexpected(response.status()));
        }
        let body: BatchStatusResponse = response.json().await.map_err(transport)?;
        Ok(body.statuses)
    }

    async fn start_sync(&self, resource_id: &str) -> Result<SyncStarted, BackendError> {
        let response = self
            .request(Method::POST, &format!("/api/data-sources/{}/sync", resource_id))
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(resource_id.to_string())),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let reason = response.text().await.unwrap_or_default();
                Err(BackendError::Rejected {
                    resource: resource_id.to_string(),
                    reason,
                })
            }
            status if !status.is_success() => Err(unexpected(status)),
            _ => {
                let body: StartSyncResponse = response.json().await.map_err(transport)?;
                Ok(SyncStarted {
                    accepted: body.accepted,
                    immediate_status: body.status,
                })
            }
        }
    }
}
