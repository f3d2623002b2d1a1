use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;

use warden_core::model::SupervisorInfo;
use warden_core::{now_ms, EpochMs};

use crate::alert::{Alert, AlertLevel, AlertQueue};
use crate::process::GameProcess;

#[derive(Clone)]
pub struct AppState {
    pub process: GameProcess,
    pub alerts: Arc<AlertQueue>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info).delete(request_stop))
        .route("/alerts", get(drain_alerts).post(submit_alert))
        .with_state(state)
}

/// `GET /` — the status payload the daemon polls.
async fn info(State(state): State<AppState>) -> Json<SupervisorInfo> {
    Json(state.process.info())
}

/// `DELETE /` — graceful stop trigger.
async fn request_stop(State(state): State<AppState>) -> StatusCode {
    state.process.stop().await;
    StatusCode::NO_CONTENT
}

async fn drain_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.alerts.drain())
}

#[derive(Debug, Deserialize)]
pub struct AlertSubmission {
    message: String,
    #[serde(default)]
    level: Option<AlertLevel>,
    #[serde(default)]
    at_ms: Option<EpochMs>,
}

async fn submit_alert(
    State(state): State<AppState>,
    Json(req): Json<AlertSubmission>,
) -> StatusCode {
    state.alerts.push(Alert {
        message: req.message,
        level: req.level.unwrap_or(AlertLevel::Info),
        at_ms: req.at_ms.unwrap_or_else(now_ms),
    });
    StatusCode::NO_CONTENT
}
