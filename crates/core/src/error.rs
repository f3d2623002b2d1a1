//! Error taxonomy for the warden collaborators.
//!
//! A fetch timeout is deliberately absent here: the client maps it to
//! [`ServerSnapshot::NotRunning`](crate::model::ServerSnapshot) instead of
//! failing.

use thiserror::Error;

/// Network/protocol failure talking to the supervisor or the host control
/// plane (anything other than the bounded fetch timeout).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or the connection broke.
    #[error("request failed: {0}")]
    Request(String),
    /// The peer answered with a non-success HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),
    /// The response body did not decode into the expected payload.
    #[error("invalid payload: {0}")]
    Decode(String),
}

/// Failure reading or writing the persisted status record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The underlying store rejected the operation.
    #[error("status store query failed: {0}")]
    Query(String),
    /// A required record is missing (store not bootstrapped).
    #[error("status record field missing: {0}")]
    Missing(&'static str),
    /// A stored value does not parse into its typed form.
    #[error("status record field corrupt: {0}")]
    Corrupt(String),
}
