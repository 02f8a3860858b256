//! Domain types for the downwatch state store.
//!
//! All timestamps are Unix epoch seconds.

use serde::{Deserialize, Serialize};

/// Unique identifier for an owner.
pub type OwnerId = u64;

/// Unique identifier for a monitored endpoint.
pub type EndpointId = u64;

// ── Owner ─────────────────────────────────────────────────────────

/// The user an endpoint belongs to, and the recipient of its reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Owner {
    pub id: OwnerId,
    pub username: String,
    /// Address reports are delivered to.
    pub email: String,
    pub created_at: u64,
}

// ── Endpoint ──────────────────────────────────────────────────────

/// A monitored URL/app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub id: EndpointId,
    /// URL probed on every check.
    pub address: String,
    pub owner_id: OwnerId,
    /// Last known reachability, rewritten after every probe.
    pub is_active: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── Down log ──────────────────────────────────────────────────────

/// An open downtime interval for one endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownLogEntry {
    pub endpoint_id: EndpointId,
    /// When the endpoint was first seen down.
    pub opened_at: u64,
}
