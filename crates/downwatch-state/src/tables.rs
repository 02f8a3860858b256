//! redb table definitions for the downwatch state store.
//!
//! Each table uses `u64` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Shape shared by every record table.
pub type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

/// Owners keyed by owner id.
pub const OWNERS: RecordTable = TableDefinition::new("owners");

/// Endpoints keyed by endpoint id.
pub const ENDPOINTS: RecordTable = TableDefinition::new("endpoints");

/// Open down-log entries keyed by the endpoint id they belong to.
pub const DOWN_LOGS: RecordTable = TableDefinition::new("down_logs");
