use crate::time::EpochMs;
use serde::{Deserialize, Serialize};

/// Lifecycle status persisted in the status record.
///
/// Transitions only through the controller:
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl ServerStatus {
    /// Textual form used by the status store column.
    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Starting => "starting",
            ServerStatus::Running => "running",
            ServerStatus::Stopping => "stopping",
        }
    }

    /// Parses the store's textual form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stopped" => Some(ServerStatus::Stopped),
            "starting" => Some(ServerStatus::Starting),
            "running" => Some(ServerStatus::Running),
            "stopping" => Some(ServerStatus::Stopping),
            _ => None,
        }
    }
}

/// Sub-state the server process reports about itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
}

/// One poll's observation of the managed server.
///
/// A snapshot is a value: produced fresh on every poll, never mutated.
/// `count` and `state` exist only on the `Running` variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerSnapshot {
    /// The poll timed out; the server (or its host) is gone.
    NotRunning,
    /// The supervisor answered with occupancy and its own state.
    Running {
        /// Current occupancy (players online).
        count: u32,
        /// The supervisor's reported sub-state.
        state: ProcessState,
    },
}

/// Status payload served by the supervisor on `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorInfo {
    pub count: u32,
    pub state: ProcessState,
}

impl From<SupervisorInfo> for ServerSnapshot {
    fn from(info: SupervisorInfo) -> Self {
        ServerSnapshot::Running {
            count: info.count,
            state: info.state,
        }
    }
}

/// The persisted view of the server: lifecycle status and occupancy,
/// each field with its own write timestamp.
///
/// `count` is only written while `status = Running`; writing one field
/// never touches the other field's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: ServerStatus,
    pub count: u32,
    pub status_updated_at_ms: EpochMs,
    pub count_updated_at_ms: EpochMs,
}

impl StatusRecord {
    /// Whole minutes since the status field was last written.
    ///
    /// Absolute value, so a record timestamped in the future (clock skew)
    /// reads as fresh rather than ancient.
    pub fn status_age_minutes(&self, now: EpochMs) -> i64 {
        (now - self.status_updated_at_ms).abs() / 60_000
    }

    /// Whole minutes since the count field was last written.
    pub fn count_age_minutes(&self, now: EpochMs) -> i64 {
        (now - self.count_updated_at_ms).abs() / 60_000
    }
}
