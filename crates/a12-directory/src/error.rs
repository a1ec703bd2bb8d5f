//! Local policy rejections (§7 tier 3).
//!
//! These never tear down a session or a channel: the controller returns an
//! error locally and/or sends a `fail` event to the offending peer, and
//! everything else continues.

use thiserror::Error;

/// Errors raised by the directory controller (C5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A client's identity did not match any allow-pattern for the
    /// requested capability (§4.5 permissions).
    #[error("permission denied: {client} lacks capability {capability}")]
    PermissionDenied {
        /// Identity (hex-encoded long-term public key) of the requesting
        /// client.
        client: String,
        /// Capability name that was denied.
        capability: String,
    },

    /// No appl with the given identifier exists in the registry.
    #[error("unknown appl {0}")]
    UnknownAppl(u64),

    /// A runner's `setkey`/`match` referenced a key outside its own
    /// domain, or the key syntax was otherwise malformed.
    #[error("malformed or out-of-domain key: {0}")]
    MalformedKey(String),

    /// A resource request used a name outside the alphanumeric-plus-one-dot
    /// syntax, or attempted to escape the appl's resource directory.
    #[error("invalid resource name: {0}")]
    InvalidResourceName(String),

    /// `dst` in a `launch` request named a client not currently joined to
    /// the requesting runner's appl.
    #[error("launch destination {0} is not a member of this appl")]
    UnknownLaunchDestination(String),

    /// Attempted an operation that requires a runner to already be running
    /// (e.g. `reload`) but none is.
    #[error("no runner is active for appl {0}")]
    RunnerNotActive(u64),

    /// A `begin_kv_transaction` was sent while one was already open, or a
    /// `setkey`/`end_kv_transaction` arrived with none open.
    #[error("no KV transaction is open for domain {0}")]
    NoOpenTransaction(String),

    /// The admin channel received a command string that did not parse into
    /// the `key=value:...` grammar (§4.5 admin channel).
    #[error("malformed admin command: {0}")]
    MalformedAdminCommand(String),

    /// An appl bundle failed to validate (missing manifest, bad signature,
    /// manifest names a nonexistent entry point).
    #[error("invalid appl bundle: {0}")]
    InvalidBundle(String),

    /// Underlying storage (registry or per-appl KV) failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Underlying filesystem failure (applbase scan, bundle staging,
    /// resource open).
    #[error("filesystem error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DirectoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
