use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use warden_core::reconcile::ReconcilePolicy;

mod api;
mod client;
mod config;
mod db;
mod reconciler;
mod reporter;

use config::DaemonConfig;

#[derive(Debug, Parser)]
#[command(name = "warden-daemon", version, about = "Game-server lifecycle warden")]
struct Cli {
    /// Where the HTTP API will listen, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Base URL of the supervisor's status endpoint.
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server_url: String,

    /// Base URL of the host control plane (start/shutdown).
    #[arg(long, default_value = "http://127.0.0.1:3001")]
    host_url: String,

    /// SurrealKV directory for the embedded status store.
    #[arg(long, default_value = ".warden/db")]
    db_dir: PathBuf,

    /// Reconcile tick interval in seconds.
    #[arg(long, default_value_t = 60)]
    reconcile_interval_seconds: u64,

    /// Timeout for the status poll in milliseconds. An unanswered poll
    /// counts as "not running".
    #[arg(long, default_value_t = 1000)]
    fetch_timeout_ms: u64,

    /// Optional webhook URL receiving anomaly reports.
    #[arg(long)]
    alert_webhook: Option<String>,

    /// Minutes the record may sit in Starting before an anomaly fires.
    #[arg(long, default_value_t = 5)]
    start_timeout_minutes: i64,

    /// Minutes the record may sit in Stopping before an anomaly fires.
    #[arg(long, default_value_t = 5)]
    stop_timeout_minutes: i64,

    /// Minutes of zero occupancy before the server is stopped.
    #[arg(long, default_value_t = 10)]
    idle_timeout_minutes: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_target(false)
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = DaemonConfig {
        server_url: cli.server_url,
        host_url: cli.host_url,
        db_dir: cli.db_dir,
        reconcile_interval_seconds: cli.reconcile_interval_seconds,
        fetch_timeout_ms: cli.fetch_timeout_ms,
        alert_webhook: cli.alert_webhook,
        policy: ReconcilePolicy {
            start_timeout_minutes: cli.start_timeout_minutes,
            stop_timeout_minutes: cli.stop_timeout_minutes,
            idle_timeout_minutes: cli.idle_timeout_minutes,
        },
    };

    info!("starting daemon with config: {:?}", config);

    let db = db::StatusDb::connect(&config.db_dir).await?;
    db.bootstrap().await?;

    let state = api::AppState {
        db,
        client: client::HttpServerClient::new(&config)?,
        reporter: reporter::AlertReporter::new(config.alert_webhook.clone()),
        config,
    };

    reconciler::spawn_reconciler(state.clone());

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = cli.listen.parse()?;
    info!("listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
