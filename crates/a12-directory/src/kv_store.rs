//! Per-appl KV store (§5 "Shared resources": "The database handle is
//! per-runner... to avoid cross-appl contention").
//!
//! A runner only ever talks to the controller's [`crate::kv::RunnerRequest`]
//! parser, which binds every operation to the requesting runner's own
//! `domain` (its appl's name). A store implementation must therefore refuse
//! any read or write whose domain does not match the handle it was opened
//! with — a runner cannot read another appl's keys even if it forges a
//! `setkey`/`match` naming a different domain string, because the domain
//! isn't taken from the wire message at all; it is fixed at store-open time.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::DirectoryError;

const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

/// A transactional per-appl key-value store.
///
/// Implementations are `Send + Sync` so a store handle can be shared between
/// a runner's control-dispatch thread and the main thread's admin/registry
/// use without re-opening the backing connection.
pub trait KvStore: Send + Sync {
    /// Opens a transaction. Returns an error if one is already open.
    ///
    /// # Errors
    ///
    /// `DirectoryError::NoOpenTransaction` is never returned here;
    /// implementations return a domain-scoped variant of
    /// [`DirectoryError::Storage`] for a double-begin.
    fn begin_transaction(&self) -> Result<(), DirectoryError>;

    /// Sets `key` to `value` inside the open transaction. An empty `value`
    /// deletes `key` instead (§4.5 KV grammar).
    ///
    /// # Errors
    ///
    /// `DirectoryError::NoOpenTransaction` if no transaction is open.
    fn set_key(&self, key: &str, value: &str) -> Result<(), DirectoryError>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// `DirectoryError::NoOpenTransaction` if no transaction is open.
    fn end_transaction(&self) -> Result<(), DirectoryError>;

    /// Returns every `(key, value)` pair whose key matches `pattern`
    /// (a literal prefix, or `"*"` for everything — §4.5 `match`).
    fn match_keys(&self, pattern: &str) -> Vec<(String, String)>;
}

/// In-memory [`KvStore`], domain-scoped by construction: one instance per
/// appl, held by the controller's runner table.
#[derive(Clone)]
pub struct MemoryKvStore {
    domain: String,
    committed: Arc<Mutex<BTreeMap<String, String>>>,
    pending: Arc<Mutex<Option<BTreeMap<String, String>>>>,
}

impl MemoryKvStore {
    /// Opens a store scoped to `domain` (the owning appl's name).
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            committed: Arc::new(Mutex::new(BTreeMap::new())),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// The domain this store is scoped to.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl KvStore for MemoryKvStore {
    fn begin_transaction(&self) -> Result<(), DirectoryError> {
        let mut pending = self.pending.lock().expect("kv store mutex poisoned");
        if pending.is_some() {
            return Err(DirectoryError::Storage(format!("transaction already open for domain {}", self.domain)));
        }
        *pending = Some(self.committed.lock().expect("kv store mutex poisoned").clone());
        Ok(())
    }

    fn set_key(&self, key: &str, value: &str) -> Result<(), DirectoryError> {
        let mut pending = self.pending.lock().expect("kv store mutex poisoned");
        let staged =
            pending.as_mut().ok_or_else(|| DirectoryError::NoOpenTransaction(self.domain.clone()))?;
        if value.is_empty() {
            staged.remove(key);
        } else {
            staged.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn end_transaction(&self) -> Result<(), DirectoryError> {
        let mut pending = self.pending.lock().expect("kv store mutex poisoned");
        let staged = pending.take().ok_or_else(|| DirectoryError::NoOpenTransaction(self.domain.clone()))?;
        *self.committed.lock().expect("kv store mutex poisoned") = staged;
        Ok(())
    }

    fn match_keys(&self, pattern: &str) -> Vec<(String, String)> {
        let committed = self.committed.lock().expect("kv store mutex poisoned");
        if pattern == "*" {
            return committed.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        }
        committed
            .iter()
            .filter(|(key, _)| key.starts_with(pattern))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Redb-backed [`KvStore`], one database file per appl so a runner's
/// connection can never reach another appl's table (§5 "one connection per
/// appl to avoid cross-appl contention").
pub struct RedbKvStore {
    domain: String,
    db: Database,
    pending: Mutex<Option<BTreeMap<String, String>>>,
}

impl RedbKvStore {
    /// Opens (creating if absent) a per-appl KV database at `path`.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Storage` if the database cannot be opened or its
    /// table initialised.
    pub fn open(domain: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let db = Database::create(path.as_ref()).map_err(|err| DirectoryError::Storage(err.to_string()))?;
        let txn = db.begin_write().map_err(|err| DirectoryError::Storage(err.to_string()))?;
        {
            let _ = txn.open_table(ENTRIES).map_err(|err| DirectoryError::Storage(err.to_string()))?;
        }
        txn.commit().map_err(|err| DirectoryError::Storage(err.to_string()))?;
        Ok(Self { domain: domain.into(), db, pending: Mutex::new(None) })
    }

    fn snapshot(&self) -> Result<BTreeMap<String, String>, DirectoryError> {
        let txn = self.db.begin_read().map_err(|err| DirectoryError::Storage(err.to_string()))?;
        let table = txn.open_table(ENTRIES).map_err(|err| DirectoryError::Storage(err.to_string()))?;
        let mut map = BTreeMap::new();
        for row in table.iter().map_err(|err| DirectoryError::Storage(err.to_string()))? {
            let (key, value) = row.map_err(|err| DirectoryError::Storage(err.to_string()))?;
            map.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(map)
    }
}

impl KvStore for RedbKvStore {
    fn begin_transaction(&self) -> Result<(), DirectoryError> {
        let mut pending = self.pending.lock().expect("kv store mutex poisoned");
        if pending.is_some() {
            return Err(DirectoryError::Storage(format!("transaction already open for domain {}", self.domain)));
        }
        *pending = Some(self.snapshot()?);
        Ok(())
    }

    fn set_key(&self, key: &str, value: &str) -> Result<(), DirectoryError> {
        let mut pending = self.pending.lock().expect("kv store mutex poisoned");
        let staged =
            pending.as_mut().ok_or_else(|| DirectoryError::NoOpenTransaction(self.domain.clone()))?;
        if value.is_empty() {
            staged.remove(key);
        } else {
            staged.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn end_transaction(&self) -> Result<(), DirectoryError> {
        let staged = {
            let mut pending = self.pending.lock().expect("kv store mutex poisoned");
            pending.take().ok_or_else(|| DirectoryError::NoOpenTransaction(self.domain.clone()))?
        };

        let txn = self.db.begin_write().map_err(|err| DirectoryError::Storage(err.to_string()))?;
        {
            let mut table = txn.open_table(ENTRIES).map_err(|err| DirectoryError::Storage(err.to_string()))?;
            for (key, value) in &staged {
                table
                    .insert(key.as_str(), value.as_str())
                    .map_err(|err| DirectoryError::Storage(err.to_string()))?;
            }
        }
        txn.commit().map_err(|err| DirectoryError::Storage(err.to_string()))?;
        Ok(())
    }

    fn match_keys(&self, pattern: &str) -> Vec<(String, String)> {
        let Ok(map) = self.snapshot() else {
            return Vec::new();
        };
        if pattern == "*" {
            return map.into_iter().collect();
        }
        map.into_iter().filter(|(key, _)| key.starts_with(pattern)).collect()
    }
}
