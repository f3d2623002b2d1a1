use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, warn};

use warden_core::model::{ServerSnapshot, StatusRecord};
use warden_core::now_ms;
use warden_core::provider::{AlertSink, ServerClient, StatusStore};
use warden_core::reconcile::{decide, Command};

use crate::api::AppState;

pub fn spawn_reconciler(state: AppState) {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(state.config.reconcile_interval_seconds));
        loop {
            tick.tick().await;
            if let Err(e) = reconcile_tick(&state).await {
                warn!("reconcile tick error: {e:?}");
            }
        }
    });
}

/// One reconciliation pass: observe the server, then decide and apply.
///
/// A transport failure on the snapshot fetch (anything but the bounded
/// timeout) aborts only this pass; the next tick starts from fresh state.
pub async fn reconcile_tick(state: &AppState) -> Result<()> {
    let (snapshot, record) = tokio::join!(state.client.fetch(), state.db.load());
    let snapshot = snapshot.context("fetching server snapshot")?;
    let record = record.context("loading status record")?;

    let commands = decide(&state.config.policy, &record, &snapshot, now_ms());
    if commands.is_empty() {
        return Ok(());
    }

    debug!(?record, ?snapshot, ?commands, "applying reconcile commands");
    apply(
        &state.client,
        &state.db,
        &state.reporter,
        &record,
        &snapshot,
        &commands,
    )
    .await
}

/// Applies a command batch as independent effects.
///
/// No rollback: a failed effect never undoes its siblings, and every
/// command is attempted even after an earlier one failed. Control-command
/// transport failures are non-fatal (the next pass re-evaluates); the
/// first store failure is returned once the batch has been attempted.
pub async fn apply<C, S, R>(
    client: &C,
    store: &S,
    reporter: &R,
    record: &StatusRecord,
    snapshot: &ServerSnapshot,
    commands: &[Command],
) -> Result<()>
where
    C: ServerClient,
    S: StatusStore,
    R: AlertSink,
{
    let mut first_store_err = None;

    for command in commands {
        match command {
            Command::SetStatus(status) => {
                if let Err(e) = store.set_status(*status).await {
                    warn!("set_status({}) failed: {e}", status.as_str());
                    first_store_err.get_or_insert(e);
                }
            }
            Command::SetCount(count) => {
                if let Err(e) = store.set_count(*count).await {
                    warn!("set_count({count}) failed: {e}");
                    first_store_err.get_or_insert(e);
                }
            }
            Command::Stop => {
                if let Err(e) = client.stop().await {
                    warn!("stop command failed: {e}");
                }
            }
            Command::Shutdown => {
                if let Err(e) = client.shutdown().await {
                    warn!("shutdown command failed: {e}");
                }
            }
            Command::Report(anomaly) => {
                reporter.report(snapshot, record, &anomaly.to_string()).await;
            }
        }
    }

    match first_store_err {
        Some(e) => Err(e).context("persisting status record"),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    use warden_core::error::{StoreError, TransportError};
    use warden_core::model::{ProcessState, ServerStatus};
    use warden_core::reconcile::Anomaly;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn push(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn take(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct MockClient {
        rec: Recorder,
        fail_control: bool,
    }

    #[async_trait]
    impl ServerClient for MockClient {
        async fn fetch(&self) -> Result<ServerSnapshot, TransportError> {
            self.rec.push("fetch");
            Ok(ServerSnapshot::NotRunning)
        }

        async fn start(&self) -> Result<(), TransportError> {
            self.rec.push("start");
            Ok(())
        }

        async fn stop(&self) -> Result<(), TransportError> {
            self.rec.push("stop");
            if self.fail_control {
                Err(TransportError::Request("connection reset".into()))
            } else {
                Ok(())
            }
        }

        async fn shutdown(&self) -> Result<(), TransportError> {
            self.rec.push("shutdown");
            if self.fail_control {
                Err(TransportError::Request("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    struct MockStore {
        rec: Recorder,
        fail_writes: bool,
    }

    #[async_trait]
    impl StatusStore for MockStore {
        async fn load(&self) -> Result<StatusRecord, StoreError> {
            self.rec.push("load");
            Ok(record())
        }

        async fn set_status(&self, status: ServerStatus) -> Result<(), StoreError> {
            self.rec.push(format!("set_status:{}", status.as_str()));
            if self.fail_writes {
                Err(StoreError::Query("write rejected".into()))
            } else {
                Ok(())
            }
        }

        async fn set_count(&self, count: u32) -> Result<(), StoreError> {
            self.rec.push(format!("set_count:{count}"));
            if self.fail_writes {
                Err(StoreError::Query("write rejected".into()))
            } else {
                Ok(())
            }
        }
    }

    struct MockSink {
        rec: Recorder,
    }

    #[async_trait]
    impl AlertSink for MockSink {
        async fn report(&self, _snapshot: &ServerSnapshot, _record: &StatusRecord, message: &str) {
            self.rec.push(format!("report:{message}"));
        }
    }

    fn record() -> StatusRecord {
        StatusRecord {
            status: ServerStatus::Running,
            count: 0,
            status_updated_at_ms: 0,
            count_updated_at_ms: 0,
        }
    }

    fn harness(fail_control: bool, fail_writes: bool) -> (MockClient, MockStore, MockSink, Recorder) {
        let rec = Recorder::default();
        (
            MockClient {
                rec: rec.clone(),
                fail_control,
            },
            MockStore {
                rec: rec.clone(),
                fail_writes,
            },
            MockSink { rec: rec.clone() },
            rec,
        )
    }

    #[tokio::test]
    async fn applies_every_command_of_a_batch() {
        let (client, store, sink, rec) = harness(false, false);
        let commands = [Command::Stop, Command::SetStatus(ServerStatus::Stopping)];

        apply(
            &client,
            &store,
            &sink,
            &record(),
            &ServerSnapshot::Running {
                count: 0,
                state: ProcessState::Running,
            },
            &commands,
        )
        .await
        .unwrap();

        assert_eq!(rec.take(), vec!["stop", "set_status:stopping"]);
    }

    #[tokio::test]
    async fn control_command_failure_is_not_fatal_and_siblings_still_run() {
        let (client, store, sink, rec) = harness(true, false);
        let commands = [Command::Shutdown, Command::SetStatus(ServerStatus::Stopped)];

        let result = apply(
            &client,
            &store,
            &sink,
            &record(),
            &ServerSnapshot::NotRunning,
            &commands,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(rec.take(), vec!["shutdown", "set_status:stopped"]);
    }

    #[tokio::test]
    async fn store_failure_propagates_after_the_whole_batch_ran() {
        let (client, store, sink, rec) = harness(false, true);
        let commands = [
            Command::SetCount(0),
            Command::Stop,
            Command::SetStatus(ServerStatus::Stopping),
        ];

        let result = apply(
            &client,
            &store,
            &sink,
            &record(),
            &ServerSnapshot::Running {
                count: 0,
                state: ProcessState::Running,
            },
            &commands,
        )
        .await;

        assert!(result.is_err());
        // No rollback, no early return: the control command and the second
        // write were still attempted.
        assert_eq!(
            rec.take(),
            vec!["set_count:0", "stop", "set_status:stopping"]
        );
    }

    #[tokio::test]
    async fn reports_carry_the_anomaly_message() {
        let (client, store, sink, rec) = harness(false, false);
        let commands = [Command::Report(Anomaly::AliveWhileStopped)];

        apply(
            &client,
            &store,
            &sink,
            &record(),
            &ServerSnapshot::Running {
                count: 1,
                state: ProcessState::Running,
            },
            &commands,
        )
        .await
        .unwrap();

        assert_eq!(
            rec.take(),
            vec![format!("report:{}", Anomaly::AliveWhileStopped)]
        );
    }
}
