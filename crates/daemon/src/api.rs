use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use warden_core::model::{ServerSnapshot, ServerStatus, StatusRecord};
use warden_core::provider::{ServerClient, StatusStore};

use crate::client::HttpServerClient;
use crate::config::DaemonConfig;
use crate::db::StatusDb;
use crate::reporter::AlertReporter;

#[derive(Clone)]
pub struct AppState {
    pub db: StatusDb,
    pub client: HttpServerClient,
    pub reporter: AlertReporter,
    pub config: DaemonConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/status", get(get_status))
        .route("/v1/server/start", post(start_server))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub record: StatusRecord,
    pub snapshot: ServerSnapshot,
}

/// Current persisted record next to a live observation of the server.
async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let (snapshot, record) = tokio::join!(state.client.fetch(), state.db.load());
    Ok(Json(StatusResponse {
        record: record?,
        snapshot: snapshot?,
    }))
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub ok: bool,
    pub status: ServerStatus,
}

/// External start trigger: brings the server up from `Stopped`.
///
/// The reconcile pass never starts the server on its own; this is the one
/// place the Stopped -> Starting transition happens.
async fn start_server(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StartResponse>), AppError> {
    let record = state.db.load().await?;

    if record.status != ServerStatus::Stopped {
        return Ok((
            StatusCode::CONFLICT,
            Json(StartResponse {
                ok: false,
                status: record.status,
            }),
        ));
    }

    state.client.start().await?;
    state.db.set_status(ServerStatus::Starting).await?;
    info!("server start requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            ok: true,
            status: ServerStatus::Starting,
        }),
    ))
}

#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        let body = Json(serde_json::json!({
            "error": self.0.to_string()
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
