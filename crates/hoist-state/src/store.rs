//! StateStore: redb-backed collection store for Hoist.
//!
//! Provides byte-level CRUD and range scans over named collections, plus
//! JSON helpers used by the typed accessors in sibling modules. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{self, table};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
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
        store.ensure_collections()?;
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
        store.ensure_collections()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_collections(&self) -> StateResult<()> {
        self.create_collection(tables::DEPLOYMENTS)?;
        self.create_collection(tables::ACTIVITY)
    }

    // ── Collections ────────────────────────────────────────────────

    /// Create a collection if it does not exist yet.
    pub fn create_collection(&self, name: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(table(name)).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Drop a collection and everything in it. Returns true if it existed.
    pub fn delete_collection(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = txn.delete_table(table(name)).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(collection = %name, existed, "collection deleted");
        Ok(existed)
    }

    // ── Records ────────────────────────────────────────────────────

    /// Insert or overwrite a value. Creates the collection on demand.
    pub fn put(&self, collection: &str, key: &str, value: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table(collection)).map_err(map_err!(Table))?;
            t.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Read a value. A missing collection reads as a missing key.
    pub fn get(&self, collection: &str, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = match txn.open_table(table(collection)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let value = t.get(key).map_err(map_err!(Read))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    /// All values in key order.
    pub fn get_all(&self, collection: &str) -> StateResult<Vec<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = match txn.open_table(table(collection)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(value.value().to_vec());
        }
        Ok(results)
    }

    /// Values whose keys fall in `min..=max`, compared lexicographically.
    pub fn get_in_range(
        &self,
        collection: &str,
        min: &str,
        max: &str,
    ) -> StateResult<Vec<Vec<u8>>> {
        if min > max {
            return Ok(Vec::new());
        }
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = match txn.open_table(table(collection)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let mut results = Vec::new();
        for entry in t.range(min..=max).map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(value.value().to_vec());
        }
        Ok(results)
    }

    /// Delete a key. Returns true if it existed.
    pub fn remove(&self, collection: &str, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table(collection)).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── JSON helpers ───────────────────────────────────────────────

    pub(crate) fn put_json<T: Serialize>(
        &self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        self.put(collection, key, &bytes)
    }

    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> StateResult<Option<T>> {
        match self.get(collection, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn get_all_json<T: DeserializeOwned>(&self, collection: &str) -> StateResult<Vec<T>> {
        self.get_all(collection)?.iter().map(|b| decode(b)).collect()
    }
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}
