use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use warden_core::error::TransportError;
use warden_core::model::{ServerSnapshot, SupervisorInfo};
use warden_core::provider::ServerClient;

use crate::config::DaemonConfig;

/// HTTP client for the supervisor and the host control plane.
///
/// The status poll is bounded by a short timeout; an unanswered poll means
/// the server (or its whole host) is gone, not that something failed.
#[derive(Clone)]
pub struct HttpServerClient {
    http: Client,
    server_url: String,
    host_url: String,
}

impl HttpServerClient {
    pub fn new(config: &DaemonConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            host_url: config.host_url.trim_end_matches('/').to_string(),
        })
    }
}

fn transport(e: reqwest::Error) -> TransportError {
    if let Some(status) = e.status() {
        TransportError::Status(status.as_u16())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl ServerClient for HttpServerClient {
    async fn fetch(&self) -> Result<ServerSnapshot, TransportError> {
        let resp = match self.http.get(format!("{}/", self.server_url)).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Ok(ServerSnapshot::NotRunning),
            Err(e) => return Err(transport(e)),
        };

        let info: SupervisorInfo = resp
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        Ok(info.into())
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.http
            .post(format!("{}/start", self.host_url))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        self.http
            .delete(format!("{}/", self.server_url))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.http
            .post(format!("{}/shutdown", self.host_url))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;
        Ok(())
    }
}
