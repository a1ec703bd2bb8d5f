//! Model directory-registry-and-runner state.
//!
//! Simplified stand-in for the appl/runner/KV side of
//! `a12_directory::server::DirectoryServer`: a fixed set of pre-registered
//! appls, each with a bootstrap flag, a pending-joins queue, and a KV
//! domain. No sockets, no process spawning — just the state transitions
//! the real server's `process_event` also makes.

use std::collections::BTreeMap;

use super::operation::{ClientId, ModelApplId, OperationError};

/// Per-appl runtime state tracked by the model server.
#[derive(Debug, Clone, Default)]
struct ModelApplRuntime {
    /// Whether a runner exists for this appl at all (§3 "exactly one
    /// `RunnerState` exists per appl at any time").
    runner_exists: bool,
    /// Whether that runner finished bootstrap.
    bootstrapped: bool,
    /// Sessions that joined before bootstrap completed.
    pending_joins: Vec<ClientId>,
    /// Committed KV domain for this appl (§4.5 "KV store mediation").
    committed: BTreeMap<String, String>,
    /// Staged writes inside an open transaction, if any.
    pending_txn: Option<BTreeMap<String, String>>,
}

/// Model directory server: a fixed roster of appls (indices
/// `0..num_appls`), each independently tracked.
#[derive(Debug, Clone)]
pub struct ModelServer {
    appls: Vec<ModelApplRuntime>,
}

impl ModelServer {
    /// Create a model server with `num_appls` pre-registered, runner-less
    /// appls.
    pub fn new(num_appls: usize) -> Self {
        Self { appls: vec![ModelApplRuntime::default(); num_appls] }
    }

    fn runtime(&self, appl_id: ModelApplId) -> Result<&ModelApplRuntime, OperationError> {
        self.appls.get(appl_id as usize).ok_or(OperationError::UnknownAppl)
    }

    fn runtime_mut(&mut self, appl_id: ModelApplId) -> Result<&mut ModelApplRuntime, OperationError> {
        self.appls.get_mut(appl_id as usize).ok_or(OperationError::UnknownAppl)
    }

    /// Whether `appl_id` names a registered appl.
    pub fn appl_exists(&self, appl_id: ModelApplId) -> bool {
        (appl_id as usize) < self.appls.len()
    }

    /// Whether the appl's runner has finished bootstrap.
    pub fn is_bootstrapped(&self, appl_id: ModelApplId) -> bool {
        self.runtime(appl_id).is_ok_and(|r| r.bootstrapped)
    }

    /// Sessions still queued on this appl's bootstrap.
    pub fn pending_joins(&self, appl_id: ModelApplId) -> &[ClientId] {
        self.runtime(appl_id).map(|r| r.pending_joins.as_slice()).unwrap_or_default()
    }

    /// Committed KV entries for an appl.
    pub fn kv_entries(&self, appl_id: ModelApplId) -> BTreeMap<String, String> {
        self.runtime(appl_id).map(|r| r.committed.clone()).unwrap_or_default()
    }

    /// Records that a client tried to join `appl_id`; queues it if the
    /// runner isn't bootstrapped yet and spawns a runner on first join
    /// (§4.5 "Runner lifecycle" — spawn on first client join).
    ///
    /// Returns whether the join was admitted immediately.
    pub fn request_join(
        &mut self,
        appl_id: ModelApplId,
        client_id: ClientId,
    ) -> Result<bool, OperationError> {
        let runtime = self.runtime_mut(appl_id)?;
        runtime.runner_exists = true;
        if runtime.bootstrapped {
            Ok(true)
        } else {
            runtime.pending_joins.push(client_id);
            Ok(false)
        }
    }

    /// Marks an appl's runner bootstrapped, flushing queued joins. Returns
    /// the client ids that were admitted as a result.
    pub fn bootstrap_complete(&mut self, appl_id: ModelApplId) -> Result<Vec<ClientId>, OperationError> {
        let runtime = self.runtime_mut(appl_id)?;
        runtime.bootstrapped = true;
        Ok(std::mem::take(&mut runtime.pending_joins))
    }

    /// Opens a KV transaction for `appl_id`'s runner.
    pub fn kv_begin(&mut self, appl_id: ModelApplId) -> Result<(), OperationError> {
        let runtime = self.runtime_mut(appl_id)?;
        if !runtime.bootstrapped {
            return Err(OperationError::RunnerNotActive);
        }
        if runtime.pending_txn.is_some() {
            return Err(OperationError::TransactionAlreadyOpen);
        }
        runtime.pending_txn = Some(runtime.committed.clone());
        Ok(())
    }

    /// Writes (or, for an empty value, deletes) one key inside the open
    /// transaction.
    pub fn kv_set(&mut self, appl_id: ModelApplId, key: &str, value: &str) -> Result<(), OperationError> {
        let runtime = self.runtime_mut(appl_id)?;
        let pending = runtime.pending_txn.as_mut().ok_or(OperationError::NoOpenTransaction)?;
        if value.is_empty() {
            pending.remove(key);
        } else {
            pending.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Commits the open transaction, making its writes visible to
    /// subsequent `match` requests.
    pub fn kv_end(&mut self, appl_id: ModelApplId) -> Result<(), OperationError> {
        let runtime = self.runtime_mut(appl_id)?;
        let pending = runtime.pending_txn.take().ok_or(OperationError::NoOpenTransaction)?;
        runtime.committed = pending;
        Ok(())
    }
}
