//! Traits for the collaborators the controller consumes.
//!
//! The daemon provides the real implementations (reqwest client, embedded
//! SurrealDB store, tracing/webhook reporter); tests provide mocks.

use async_trait::async_trait;

use crate::error::{StoreError, TransportError};
use crate::model::{ServerSnapshot, ServerStatus, StatusRecord};

/// Polls and controls the managed server.
///
/// `fetch` is bounded by a short timeout; a timeout is not an error and
/// yields [`ServerSnapshot::NotRunning`]. The control commands are
/// fire-and-forget: the controller does not await server-side completion.
#[async_trait]
pub trait ServerClient: Send + Sync {
    /// Observes the server once.
    async fn fetch(&self) -> Result<ServerSnapshot, TransportError>;

    /// Asks the host to bring the server up.
    async fn start(&self) -> Result<(), TransportError>;

    /// Asks the running server to wind down gracefully.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Tears down the host the server runs on. Only valid once the server
    /// itself is confirmed not running.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Reads and writes the persisted status record.
///
/// Each setter updates only its own field and refreshes only that field's
/// timestamp; the timestamp value is always "now" at write time.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Loads the whole record.
    async fn load(&self) -> Result<StatusRecord, StoreError>;

    /// Persists the lifecycle status.
    async fn set_status(&self, status: ServerStatus) -> Result<(), StoreError>;

    /// Persists the occupancy count.
    async fn set_count(&self, count: u32) -> Result<(), StoreError>;
}

/// Receives anomaly reports.
///
/// Best-effort: delivery failures are the sink's own problem, the
/// controller never reacts to them.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Reports one anomaly together with the inputs that triggered it.
    async fn report(&self, snapshot: &ServerSnapshot, record: &StatusRecord, message: &str);
}
