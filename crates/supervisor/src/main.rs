use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod alert;
mod api;
mod process;

use process::{GameProcess, ServerCommand};

#[derive(Debug, Parser)]
#[command(
    name = "warden-supervisor",
    version,
    about = "Wraps the game-server process and exposes its status over HTTP"
)]
struct Cli {
    /// Where the status endpoint will listen, e.g. 127.0.0.1:3000
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// Program that launches the game server.
    #[arg(long, default_value = "java")]
    program: String,

    /// Arguments for the server program, e.g. --server-arg=-jar --server-arg=server.jar
    #[arg(long = "server-arg")]
    server_args: Vec<String>,

    /// Working directory the server runs in.
    #[arg(long, default_value = "./mc")]
    workdir: PathBuf,

    /// Occupancy sample interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    sample_interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_target(false)
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let args = if cli.server_args.is_empty() {
        vec!["-jar".to_string(), "server.jar".to_string()]
    } else {
        cli.server_args.clone()
    };

    let command = ServerCommand {
        program: cli.program.clone(),
        args,
        workdir: cli.workdir.clone(),
    };

    info!("launching server: {:?}", command);
    let process = GameProcess::spawn(&command, Duration::from_millis(cli.sample_interval_ms))?;
    let stopped = process.stopped();

    let state = api::AppState {
        process,
        alerts: Arc::new(alert::AlertQueue::default()),
    };

    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = cli.listen.parse()?;
    info!("listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal(stopped))
        .await?;

    Ok(())
}

/// Exits on ctrl-c, or once a requested stop has run to completion so the
/// daemon's next poll times out into "not running".
async fn shutdown_signal(mut stopped: watch::Receiver<bool>) {
    tokio::select! {
        _ = signal::ctrl_c() => info!("shutdown requested"),
        _ = stopped.wait_for(|done| *done) => info!("server stopped; supervisor exiting"),
    }
}
