use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use warden_core::EpochMs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub message: String,
    pub level: AlertLevel,
    pub at_ms: EpochMs,
}

/// In-memory alert buffer; reading drains it.
#[derive(Default)]
pub struct AlertQueue {
    alerts: Mutex<Vec<Alert>>,
}

impl AlertQueue {
    pub fn push(&self, alert: Alert) {
        self.lock().push(alert);
    }

    pub fn drain(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Alert>> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner())
    }
}
