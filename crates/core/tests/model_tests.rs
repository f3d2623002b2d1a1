//! Wire-shape and derivation tests for the shared model.

use warden_core::model::{
    ProcessState, ServerSnapshot, ServerStatus, StatusRecord, SupervisorInfo,
};

#[test]
fn test_server_status_serde() {
    let running = ServerStatus::Running;
    let serialized = serde_json::to_string(&running).unwrap();
    assert_eq!(serialized, r#""running""#);
    let deserialized: ServerStatus = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, running);
}

#[test]
fn test_server_status_store_text_round_trip() {
    for status in [
        ServerStatus::Stopped,
        ServerStatus::Starting,
        ServerStatus::Running,
        ServerStatus::Stopping,
    ] {
        assert_eq!(ServerStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ServerStatus::parse("rebooting"), None);
}

#[test]
fn test_supervisor_info_decodes_the_wire_payload() {
    let info: SupervisorInfo = serde_json::from_str(r#"{"count":3,"state":"running"}"#).unwrap();
    assert_eq!(info.count, 3);
    assert_eq!(info.state, ProcessState::Running);

    let snapshot: ServerSnapshot = info.into();
    assert_eq!(
        snapshot,
        ServerSnapshot::Running {
            count: 3,
            state: ProcessState::Running
        }
    );
}

#[test]
fn test_snapshot_serde_is_tagged() {
    let snapshot = ServerSnapshot::Running {
        count: 1,
        state: ProcessState::Stopping,
    };
    let serialized = serde_json::to_string(&snapshot).unwrap();
    assert_eq!(
        serialized,
        r#"{"kind":"running","count":1,"state":"stopping"}"#
    );

    let gone = serde_json::to_string(&ServerSnapshot::NotRunning).unwrap();
    assert_eq!(gone, r#"{"kind":"not_running"}"#);
}

#[test]
fn test_record_ages_are_absolute_and_independent() {
    let now = 1_700_000_000_000;
    let record = StatusRecord {
        status: ServerStatus::Running,
        count: 2,
        status_updated_at_ms: now - 7 * 60_000,
        count_updated_at_ms: now + 2 * 60_000,
    };
    assert_eq!(record.status_age_minutes(now), 7);
    // Future-dated timestamp: absolute value, not negative.
    assert_eq!(record.count_age_minutes(now), 2);
}

#[test]
fn test_record_age_truncates_to_whole_minutes() {
    let now = 1_700_000_000_000;
    let record = StatusRecord {
        status: ServerStatus::Stopped,
        count: 0,
        status_updated_at_ms: now - (9 * 60_000 + 59_000),
        count_updated_at_ms: now,
    };
    assert_eq!(record.status_age_minutes(now), 9);
    assert_eq!(record.count_age_minutes(now), 0);
}
