//! The persistence seam the check engine depends on.

use crate::error::StateResult;
use crate::types::*;

/// Lookups and commands the check engine needs from persistence.
///
/// Lookups return `Ok(None)` when the record does not exist. Mutations are
/// explicit commands; records handed out are plain data and saving them back
/// is never implicit.
pub trait Repository: Send + Sync {
    fn find_endpoint(&self, id: EndpointId) -> StateResult<Option<Endpoint>>;

    fn find_owner(&self, id: OwnerId) -> StateResult<Option<Owner>>;

    /// All owners, ordered by id.
    fn list_all_owners(&self) -> StateResult<Vec<Owner>>;

    /// Endpoints belonging to `owner_id`, ordered by id.
    fn endpoints_of(&self, owner_id: OwnerId) -> StateResult<Vec<Endpoint>>;

    fn find_down_log(&self, endpoint_id: EndpointId) -> StateResult<Option<DownLogEntry>>;

    /// Mark an endpoint down and open its downtime interval, as one write.
    ///
    /// Fails with `DownLogAlreadyOpen` if an interval is already open, and
    /// with `NotFound` if the endpoint is gone. Nothing is written on failure.
    fn record_went_down(&self, id: EndpointId, at: u64) -> StateResult<DownLogEntry>;

    /// Mark an endpoint up and close its downtime interval, as one write.
    ///
    /// Returns when the closed interval was opened, or `None` (and writes
    /// nothing) if there was no open interval.
    fn record_recovery(&self, id: EndpointId, at: u64) -> StateResult<Option<u64>>;

    /// Persist the latest probe verdict for an endpoint whose status did not
    /// change.
    fn save_endpoint_status(&self, id: EndpointId, is_active: bool, at: u64) -> StateResult<()>;
}
