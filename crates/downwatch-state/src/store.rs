//! StateStore — redb-backed persistence for downwatch.
//!
//! Implements [`Repository`] for the check engine and exposes the small set of
//! admin operations (register, re-point and delete endpoints) the CLI needs. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::repository::Repository;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Next free id: one past the highest key in the table.
fn next_id<T: ReadableTable<u64, &'static [u8]>>(table: &T) -> StateResult<u64> {
    Ok(table
        .last()
        .map_err(map_err!(Read))?
        .map(|(key, _)| key.value() + 1)
        .unwrap_or(1))
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(OWNERS).map_err(map_err!(Table))?;
        txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
        txn.open_table(DOWN_LOGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ─────────────────────────────────────

    fn get_record<T: DeserializeOwned>(&self, def: RecordTable, key: u64) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_records<T: DeserializeOwned>(
        &self,
        def: RecordTable,
        keep: impl Fn(&T) -> bool,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T = decode(value.value())?;
            if keep(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }

    // ── Owners ─────────────────────────────────────────────────────

    /// Register a new owner under the next free id.
    ///
    /// Usernames and emails are unique across owners.
    pub fn create_owner(&self, username: &str, email: &str, now: u64) -> StateResult<Owner> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let owner = {
            let mut table = txn.open_table(OWNERS).map_err(map_err!(Table))?;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let existing: Owner = decode(value.value())?;
                if existing.username == username {
                    return Err(StateError::AlreadyExists(format!("username {username}")));
                }
                if existing.email.eq_ignore_ascii_case(email) {
                    return Err(StateError::AlreadyExists(format!("email {email}")));
                }
            }
            let owner = Owner {
                id: next_id(&table)?,
                username: username.to_string(),
                email: email.to_string(),
                created_at: now,
            };
            let value = encode(&owner)?;
            table
                .insert(owner.id, value.as_slice())
                .map_err(map_err!(Write))?;
            owner
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(owner_id = owner.id, "owner created");
        Ok(owner)
    }

    // ── Endpoints ──────────────────────────────────────────────────

    /// Register a new endpoint for an existing owner.
    ///
    /// An endpoint registered in the down state gets its down log opened in
    /// the same transaction, so the interval starts at registration time.
    pub fn create_endpoint(
        &self,
        owner_id: OwnerId,
        address: &str,
        is_active: bool,
        now: u64,
    ) -> StateResult<Endpoint> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let endpoint = {
            let owners = txn.open_table(OWNERS).map_err(map_err!(Table))?;
            if owners.get(owner_id).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::NotFound(format!("owner {owner_id}")));
            }
            ensure_unique_address(&txn, owner_id, address)?;

            let mut endpoints = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
            let endpoint = Endpoint {
                id: next_id(&endpoints)?,
                address: address.to_string(),
                owner_id,
                is_active,
                created_at: now,
                updated_at: now,
            };
            let value = encode(&endpoint)?;
            endpoints
                .insert(endpoint.id, value.as_slice())
                .map_err(map_err!(Write))?;
            endpoint
        };
        if !is_active {
            insert_down_log(&txn, endpoint.id, now)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = endpoint.id, owner_id, is_active, "endpoint created");
        Ok(endpoint)
    }

    /// Point an endpoint at a new address and restart its bookkeeping.
    ///
    /// Any open down log is discarded. `is_active` is the verdict for the new
    /// address; if it is down a fresh down log is opened at `now`. The new
    /// address must not already be registered for the same owner.
    pub fn update_endpoint_address(
        &self,
        id: EndpointId,
        address: &str,
        is_active: bool,
        now: u64,
    ) -> StateResult<Endpoint> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let endpoint = {
            let current: Option<Endpoint> = {
                let endpoints = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
                match endpoints.get(id).map_err(map_err!(Read))? {
                    Some(guard) => Some(decode(guard.value())?),
                    None => None,
                }
            };
            let Some(mut endpoint) = current else {
                return Err(StateError::NotFound(format!("endpoint {id}")));
            };
            ensure_unique_address(&txn, endpoint.owner_id, address)?;

            endpoint.address = address.to_string();
            endpoint.is_active = is_active;
            endpoint.updated_at = now;
            let value = encode(&endpoint)?;
            let mut endpoints = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
            endpoints
                .insert(id, value.as_slice())
                .map_err(map_err!(Write))?;
            endpoint
        };
        remove_down_log(&txn, id)?;
        if !is_active {
            insert_down_log(&txn, id, now)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = id, is_active, "endpoint address updated");
        Ok(endpoint)
    }

    /// List every endpoint in the system, ordered by id.
    pub fn list_endpoints(&self) -> StateResult<Vec<Endpoint>> {
        self.list_records(ENDPOINTS, |_: &Endpoint| true)
    }

    /// Delete an endpoint together with its open down log. Returns true if
    /// the endpoint existed.
    pub fn delete_endpoint(&self, id: EndpointId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut endpoints = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
            endpoints.remove(id).map_err(map_err!(Write))?.is_some()
        };
        remove_down_log(&txn, id)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = id, existed, "endpoint deleted");
        Ok(existed)
    }

    // ── Down logs ──────────────────────────────────────────────────

    /// Open a downtime interval without touching the endpoint record.
    /// Fails with `DownLogAlreadyOpen` if one is already open.
    pub fn open_down_log(&self, endpoint_id: EndpointId, opened_at: u64) -> StateResult<DownLogEntry> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let entry = insert_down_log(&txn, endpoint_id, opened_at)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id, opened_at, "down log opened");
        Ok(entry)
    }

    /// Discard the open interval without touching the endpoint record.
    pub fn close_down_log(&self, endpoint_id: EndpointId) -> StateResult<Option<u64>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let opened_at = remove_down_log(&txn, endpoint_id)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id, ?opened_at, "down log closed");
        Ok(opened_at)
    }
}

// ── Transaction helpers ────────────────────────────────────────────
//
// These run inside a caller's write transaction. An error returned before
// the caller commits drops the transaction, which discards every write.

fn ensure_unique_address(txn: &WriteTransaction, owner_id: OwnerId, address: &str) -> StateResult<()> {
    let endpoints = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
    for entry in endpoints.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let existing: Endpoint = decode(value.value())?;
        if existing.owner_id == owner_id && existing.address == address {
            return Err(StateError::AlreadyExists(format!(
                "endpoint {address} for owner {owner_id}"
            )));
        }
    }
    Ok(())
}

fn write_status(txn: &WriteTransaction, id: EndpointId, is_active: bool, at: u64) -> StateResult<()> {
    let mut table = txn.open_table(ENDPOINTS).map_err(map_err!(Table))?;
    let current: Option<Endpoint> = match table.get(id).map_err(map_err!(Read))? {
        Some(guard) => Some(decode(guard.value())?),
        None => None,
    };
    let Some(mut endpoint) = current else {
        return Err(StateError::NotFound(format!("endpoint {id}")));
    };
    endpoint.is_active = is_active;
    endpoint.updated_at = at;
    let value = encode(&endpoint)?;
    table
        .insert(id, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

fn insert_down_log(txn: &WriteTransaction, endpoint_id: EndpointId, opened_at: u64) -> StateResult<DownLogEntry> {
    let entry = DownLogEntry {
        endpoint_id,
        opened_at,
    };
    let value = encode(&entry)?;
    let mut table = txn.open_table(DOWN_LOGS).map_err(map_err!(Table))?;
    if table.get(endpoint_id).map_err(map_err!(Read))?.is_some() {
        return Err(StateError::DownLogAlreadyOpen(endpoint_id));
    }
    table
        .insert(endpoint_id, value.as_slice())
        .map_err(map_err!(Write))?;
    Ok(entry)
}

fn remove_down_log(txn: &WriteTransaction, endpoint_id: EndpointId) -> StateResult<Option<u64>> {
    let mut table = txn.open_table(DOWN_LOGS).map_err(map_err!(Table))?;
    let removed = table.remove(endpoint_id).map_err(map_err!(Write))?;
    match removed {
        Some(guard) => Ok(Some(decode::<DownLogEntry>(guard.value())?.opened_at)),
        None => Ok(None),
    }
}

impl Repository for StateStore {
    fn find_endpoint(&self, id: EndpointId) -> StateResult<Option<Endpoint>> {
        self.get_record(ENDPOINTS, id)
    }

    fn find_owner(&self, id: OwnerId) -> StateResult<Option<Owner>> {
        self.get_record(OWNERS, id)
    }

    fn list_all_owners(&self) -> StateResult<Vec<Owner>> {
        self.list_records(OWNERS, |_: &Owner| true)
    }

    fn endpoints_of(&self, owner_id: OwnerId) -> StateResult<Vec<Endpoint>> {
        self.list_records(ENDPOINTS, |e: &Endpoint| e.owner_id == owner_id)
    }

    fn find_down_log(&self, endpoint_id: EndpointId) -> StateResult<Option<DownLogEntry>> {
        self.get_record(DOWN_LOGS, endpoint_id)
    }

    fn record_went_down(&self, id: EndpointId, at: u64) -> StateResult<DownLogEntry> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let entry = insert_down_log(&txn, id, at)?;
        write_status(&txn, id, false, at)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = id, opened_at = at, "endpoint marked down");
        Ok(entry)
    }

    fn record_recovery(&self, id: EndpointId, at: u64) -> StateResult<Option<u64>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let Some(opened_at) = remove_down_log(&txn, id)? else {
            return Ok(None);
        };
        write_status(&txn, id, true, at)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(endpoint_id = id, opened_at, "endpoint marked up");
        Ok(Some(opened_at))
    }

    fn save_endpoint_status(&self, id: EndpointId, is_active: bool, at: u64) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_status(&txn, id, is_active, at)?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}
