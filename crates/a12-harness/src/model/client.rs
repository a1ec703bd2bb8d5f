//! Model dircl state machine.
//!
//! Simplified stand-in for `a12_directory::dircl::DirectoryClient`: tracks
//! connection and joined-appl state without any wire I/O.

use super::operation::{ClientId, ModelApplId, OperationError, OperationResult};

/// Model client state (mirrors one `DirectoryClient` record, §3 `dircl`).
#[derive(Debug, Clone)]
pub struct ModelClient {
    /// Client identifier.
    id: ClientId,
    /// Currently joined appl, if any.
    joined: Option<ModelApplId>,
    /// Whether this client has a connected record.
    connected: bool,
}

impl ModelClient {
    /// Create a new, not-yet-connected model client.
    pub fn new(id: ClientId) -> Self {
        Self { id, joined: None, connected: false }
    }

    /// Client identifier.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Whether this client currently has a connected record.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The appl this client is currently joined to, if any.
    pub fn joined_appl(&self) -> Option<ModelApplId> {
        self.joined
    }

    /// Record a fresh connection (§3 "Session created on accept/connect").
    pub fn connect(&mut self) -> OperationResult {
        if self.connected {
            return OperationResult::Error(OperationError::AlreadyConnected);
        }
        self.connected = true;
        OperationResult::Ok
    }

    /// Join an appl. A dircl joined to an appl must have `in_appl ==
    /// appl.identifier` (§3 invariant); enforced here by `joined` only ever
    /// holding at most one id.
    pub fn join(&mut self, appl_id: ModelApplId) -> OperationResult {
        if !self.connected {
            return OperationResult::Error(OperationError::UnknownClient);
        }
        if self.joined.is_some() {
            return OperationResult::Error(OperationError::AlreadyJoined);
        }
        self.joined = Some(appl_id);
        OperationResult::Ok
    }

    /// Leave the joined appl. "Unjoining clears it" (§3 invariant).
    pub fn leave(&mut self) -> OperationResult {
        if self.joined.take().is_none() {
            return OperationResult::Error(OperationError::NotJoined);
        }
        OperationResult::Ok
    }

    /// Disconnect, clearing connection and membership state.
    pub fn disconnect(&mut self) {
        self.connected = false;
        self.joined = None;
    }
}
