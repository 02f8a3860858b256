//! Error types for the downwatch state store.

use thiserror::Error;

use crate::types::EndpointId;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
///
/// Absence of a requested record is not an error: lookups return
/// `Ok(None)`. `NotFound` is reserved for commands that must act on an
/// existing record.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("endpoint {0} already has an open down log")]
    DownLogAlreadyOpen(EndpointId),
}
