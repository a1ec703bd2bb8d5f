//! Operations for model-based testing.
//!
//! Operations represent all possible actions against the directory
//! controller (§4.5). They are generated randomly by proptest and applied
//! to both [`super::world::ModelWorld`] and a real
//! `a12_directory::server::DirectoryServer`, and the two are compared.

use arbitrary::Arbitrary;

/// Client identifier (0-indexed), matching `session_id` in
/// `a12_directory::server::DirectoryEvent`.
pub type ClientId = u8;

/// Appl identifier, kept small (u8) so proptest can generate a dense space
/// of collisions between clients competing for the same appl.
pub type ModelApplId = u8;

/// Operations that can be applied to the system.
///
/// Each operation targets a specific client (or appl) and is small and
/// composable so proptest can explore interesting interleavings of
/// connect/join/leave and KV transaction traffic.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A peer connects and is recorded with a role.
    Connect {
        /// Connecting client.
        client_id: ClientId,
    },

    /// A connected peer asks to join a pre-registered appl.
    Join {
        /// Joining client.
        client_id: ClientId,
        /// Target appl.
        appl_id: ModelApplId,
    },

    /// A joined peer leaves its appl.
    Leave {
        /// Leaving client.
        client_id: ClientId,
    },

    /// The spawner reports a runner finished bootstrapping, admitting any
    /// sessions that joined while the worker was still starting (§4.5
    /// "Runner lifecycle").
    RunnerBootstrapped {
        /// Appl whose runner finished bootstrap.
        appl_id: ModelApplId,
    },

    /// A runner opens a KV transaction on its own appl's domain.
    KvBegin {
        /// Appl whose runner is transacting.
        appl_id: ModelApplId,
    },

    /// A runner writes one key inside an open transaction.
    KvSet {
        /// Appl whose runner is writing.
        appl_id: ModelApplId,
        /// Key name, drawn from a small alphabet so collisions are common.
        key: SmallKey,
        /// Value bytes; empty means delete (§3 `KeyContext`... §4.5 "Empty
        /// value means delete").
        value: SmallValue,
    },

    /// A runner commits its open transaction.
    KvEnd {
        /// Appl whose runner is committing.
        appl_id: ModelApplId,
    },

    /// Advance simulation time. The model doesn't track time; kept for
    /// parity with real-clock-driven scenarios run alongside these.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Disconnect a client completely, clearing its joined appl.
    Disconnect {
        /// Disconnecting client.
        client_id: ClientId,
    },
}

/// A short deterministic key name, expanded from a seed byte so that
/// different generated operations still collide often enough to exercise
/// overwrite/delete paths.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallKey(pub u8);

impl SmallKey {
    /// Expand to the wire key string (`k0`..`k7`).
    pub fn to_key_string(&self) -> String {
        format!("k{}", self.0 % 8)
    }
}

/// A short deterministic value, empty meaning delete per §4.5's KV grammar.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallValue {
    /// Value seed; `0` maps to an empty (delete) value.
    pub seed: u8,
}

impl SmallValue {
    /// Expand to the wire value string. Empty means delete.
    pub fn to_value_string(&self) -> String {
        if self.seed == 0 { String::new() } else { format!("v{}", self.seed % 16) }
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations. Every variant here
/// corresponds to a §7 tier-3 "local policy rejection" — the session
/// survives, only the single request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// `client_id` has no connected record.
    UnknownClient,
    /// `client_id` already has a connected record.
    AlreadyConnected,
    /// The targeted appl id has no registered appl behind it.
    UnknownAppl,
    /// The client already has a joined appl.
    AlreadyJoined,
    /// The client has no joined appl to act against.
    NotJoined,
    /// A KV operation targeted an appl with no bootstrapped runner.
    RunnerNotActive,
    /// `KvSet`/`KvEnd` arrived with no open transaction.
    NoOpenTransaction,
    /// `KvBegin` arrived while a transaction was already open.
    TransactionAlreadyOpen,
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::UnknownClient => "unknown client",
            Self::AlreadyConnected => "already connected",
            Self::UnknownAppl => "unknown appl",
            Self::AlreadyJoined => "already joined",
            Self::NotJoined => "not joined",
            Self::RunnerNotActive => "runner not active",
            Self::NoOpenTransaction => "no open transaction",
            Self::TransactionAlreadyOpen => "transaction already open",
        };
        f.write_str(text)
    }
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
