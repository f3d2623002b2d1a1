//! The reconciliation controller: a pure function from (record, snapshot,
//! clock) to a batch of commands.
//!
//! The daemon applies the commands as independent effects; nothing here
//! performs I/O, which keeps every branch unit-testable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ProcessState, ServerSnapshot, ServerStatus, StatusRecord};
use crate::time::EpochMs;

/// Timeout thresholds, in minutes. Injected rather than hardcoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// How long the record may sit in `Starting` before an anomaly fires.
    pub start_timeout_minutes: i64,
    /// How long the record may sit in `Stopping` before an anomaly fires.
    pub stop_timeout_minutes: i64,
    /// How long occupancy may stay at zero before the server is stopped.
    pub idle_timeout_minutes: i64,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            start_timeout_minutes: 5,
            stop_timeout_minutes: 5,
            idle_timeout_minutes: 10,
        }
    }
}

/// One side effect the controller wants executed.
///
/// Commands in a batch are independent: they may be dispatched in any
/// order or concurrently, and none rolls back if a sibling fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Persist a new lifecycle status (refreshes its timestamp).
    SetStatus(ServerStatus),
    /// Persist a new occupancy count (refreshes its timestamp).
    SetCount(u32),
    /// Ask the server to wind down gracefully.
    Stop,
    /// Tear down the host the server ran on.
    Shutdown,
    /// Report a state divergence or SLA breach.
    Report(Anomaly),
}

/// A recognized divergence between record and snapshot, or an SLA breach.
///
/// Anomalies are observational: reporting one never aborts the pass and
/// the controller takes no corrective action beyond what the state handler
/// already decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// The record says stopped but the server answered the poll.
    AliveWhileStopped,
    /// The server began stopping before its startup ever completed.
    StoppingWhileStarting,
    /// The record has been `Starting` past the start timeout.
    StartTimeout,
    /// The record says running but the server is not fully running.
    NotFullyRunning,
    /// The record has been `Stopping` past the stop timeout.
    StopTimeout,
    /// The server resumed (or never left) an active state while stopping.
    UnexpectedStateWhileStopping,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Anomaly::AliveWhileStopped => {
                "server is alive although the status record says stopped"
            }
            Anomaly::StoppingWhileStarting => {
                "server began stopping before startup completed"
            }
            Anomaly::StartTimeout => "server start is taking too long",
            Anomaly::NotFullyRunning => {
                "server is not in the running state although the record says running"
            }
            Anomaly::StopTimeout => "server stop is taking too long",
            Anomaly::UnexpectedStateWhileStopping => {
                "server is in an unexpected state while stopping"
            }
        };
        f.write_str(msg)
    }
}

/// Runs one reconciliation pass and returns the commands to execute.
///
/// Pure given its inputs and `now`; calling it again with the same inputs
/// yields the same batch.
pub fn decide(
    policy: &ReconcilePolicy,
    record: &StatusRecord,
    snapshot: &ServerSnapshot,
    now: EpochMs,
) -> Vec<Command> {
    match record.status {
        ServerStatus::Stopped => decide_stopped(snapshot),
        ServerStatus::Starting => decide_starting(policy, record, snapshot, now),
        ServerStatus::Running => decide_running(policy, record, snapshot, now),
        ServerStatus::Stopping => decide_stopping(policy, record, snapshot, now),
    }
}

/// Stopped: the server should not be there at all. Starting it again is an
/// external trigger, not this handler's job.
fn decide_stopped(snapshot: &ServerSnapshot) -> Vec<Command> {
    match snapshot {
        ServerSnapshot::NotRunning => vec![],
        ServerSnapshot::Running { .. } => vec![Command::Report(Anomaly::AliveWhileStopped)],
    }
}

/// Starting: wait for the supervisor to report `running`.
///
/// The start-timeout check is unconditional and runs after the
/// snapshot-based transitions: a start that completes on this very pass
/// but took too long still raises the anomaly.
fn decide_starting(
    policy: &ReconcilePolicy,
    record: &StatusRecord,
    snapshot: &ServerSnapshot,
    now: EpochMs,
) -> Vec<Command> {
    let mut commands = Vec::new();

    match snapshot {
        ServerSnapshot::Running {
            state: ProcessState::Running,
            ..
        } => {
            // The only way out of Starting into Running.
            commands.push(Command::SetStatus(ServerStatus::Running));
        }
        ServerSnapshot::Running {
            state: ProcessState::Stopping,
            ..
        } => {
            commands.push(Command::SetStatus(ServerStatus::Stopping));
            commands.push(Command::Report(Anomaly::StoppingWhileStarting));
        }
        ServerSnapshot::Running {
            state: ProcessState::Starting,
            ..
        }
        | ServerSnapshot::NotRunning => {}
    }

    if record.status_age_minutes(now) >= policy.start_timeout_minutes {
        commands.push(Command::Report(Anomaly::StartTimeout));
    }

    commands
}

/// Running: track occupancy and stop the server once it has sat idle past
/// the idle timeout.
fn decide_running(
    policy: &ReconcilePolicy,
    record: &StatusRecord,
    snapshot: &ServerSnapshot,
    now: EpochMs,
) -> Vec<Command> {
    let count = match snapshot {
        ServerSnapshot::Running {
            count,
            state: ProcessState::Running,
        } => *count,
        ServerSnapshot::NotRunning | ServerSnapshot::Running { .. } => {
            return vec![Command::Report(Anomaly::NotFullyRunning)];
        }
    };

    let mut commands = Vec::new();

    if count != record.count {
        commands.push(Command::SetCount(count));
    }

    if count > 0 {
        // Occupied; the idle timeout does not apply.
        return commands;
    }

    // The idle check runs against the record's count age, not the count
    // just observed: the age accrues only while occupancy stays unchanged
    // at zero, because any count change above refreshed the timestamp on
    // the pass that first saw it.
    if record.count_age_minutes(now) >= policy.idle_timeout_minutes {
        commands.push(Command::Stop);
        commands.push(Command::SetStatus(ServerStatus::Stopping));
    }

    commands
}

/// Stopping: wait for the server to disappear, then release the host.
fn decide_stopping(
    policy: &ReconcilePolicy,
    record: &StatusRecord,
    snapshot: &ServerSnapshot,
    now: EpochMs,
) -> Vec<Command> {
    match snapshot {
        ServerSnapshot::NotRunning => {
            // The only path back to Stopped.
            vec![Command::Shutdown, Command::SetStatus(ServerStatus::Stopped)]
        }
        ServerSnapshot::Running {
            state: ProcessState::Stopping,
            ..
        } => {
            if record.status_age_minutes(now) >= policy.stop_timeout_minutes {
                vec![Command::Report(Anomaly::StopTimeout)]
            } else {
                vec![]
            }
        }
        ServerSnapshot::Running { .. } => {
            vec![Command::Report(Anomaly::UnexpectedStateWhileStopping)]
        }
    }
}
