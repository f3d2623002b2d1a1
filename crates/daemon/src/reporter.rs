use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, warn};

use warden_core::model::{ServerSnapshot, StatusRecord};
use warden_core::now_ms;
use warden_core::provider::AlertSink;

/// Anomaly reporter: always logs, optionally forwards to a webhook.
///
/// Delivery is best-effort; a webhook failure is itself only logged.
#[derive(Clone)]
pub struct AlertReporter {
    http: Client,
    webhook: Option<String>,
}

impl AlertReporter {
    pub fn new(webhook: Option<String>) -> Self {
        Self {
            http: Client::new(),
            webhook,
        }
    }
}

#[async_trait]
impl AlertSink for AlertReporter {
    async fn report(&self, snapshot: &ServerSnapshot, record: &StatusRecord, message: &str) {
        error!(?snapshot, ?record, "anomaly: {message}");

        let Some(url) = &self.webhook else {
            return;
        };

        let payload = serde_json::json!({
            "message": message,
            "snapshot": snapshot,
            "record": record,
            "at_ms": now_ms(),
        });

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("alert webhook returned {}", resp.status());
                }
            }
            Err(e) => warn!("alert webhook error: {e:?}"),
        }
    }
}
