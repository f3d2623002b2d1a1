use std::path::PathBuf;

use warden_core::reconcile::ReconcilePolicy;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Base URL of the supervisor's status/control endpoint.
    pub server_url: String,
    /// Base URL of the host control plane (start/shutdown).
    pub host_url: String,

    pub db_dir: PathBuf,

    pub reconcile_interval_seconds: u64,
    pub fetch_timeout_ms: u64,

    /// Optional webhook that receives anomaly reports.
    pub alert_webhook: Option<String>,

    pub policy: ReconcilePolicy,
}
