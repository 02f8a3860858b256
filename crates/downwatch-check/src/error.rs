//! Check engine error types.

use thiserror::Error;

use downwatch_state::{EndpointId, StateError};

/// Errors that can occur while checking endpoints.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("an owner and an endpoint cannot both be selected")]
    ConflictingScope,

    /// Stored state contradicts itself, e.g. an endpoint recorded as down
    /// with no open down log.
    #[error("consistency fault on endpoint {endpoint_id}: {detail}")]
    ConsistencyFault {
        endpoint_id: EndpointId,
        detail: String,
    },

    #[error("state store error: {0}")]
    State(#[from] StateError),

    #[error("failed to build probe client: {0}")]
    ProbeClient(#[from] reqwest::Error),

    #[error("check task failed: {0}")]
    Task(String),
}

impl CheckError {
    pub(crate) fn fault(endpoint_id: EndpointId, detail: impl Into<String>) -> Self {
        Self::ConsistencyFault {
            endpoint_id,
            detail: detail.into(),
        }
    }
}

pub type CheckResult<T> = Result<T, CheckError>;
