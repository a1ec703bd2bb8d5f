//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Snapshot of the entire system state.
///
/// Contains observable state from one or more dircls and appls for
/// invariant checking.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-dircl state snapshots.
    pub clients: Vec<ClientSnapshot>,
    /// Per-appl state snapshots, keyed by appl id.
    pub appls: BTreeMap<u8, ApplSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients, no appls).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client and no appls.
    #[must_use]
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client], appls: BTreeMap::new() }
    }

    /// Create a snapshot from multiple clients and no appls.
    #[must_use]
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients, appls: BTreeMap::new() }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }

    /// Add an appl snapshot.
    pub fn add_appl(&mut self, appl_id: u8, appl: ApplSnapshot) {
        self.appls.insert(appl_id, appl);
    }
}

/// Snapshot of a single dircl's observable state (§3 `DirectoryClient`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientSnapshot {
    /// Dircl identifier.
    pub id: u64,
    /// Appl this dircl is currently joined to, `None` if unjoined (§3
    /// invariant: "a dircl joined to an appl must have `in_appl ==
    /// appl.identifier`; unjoining clears it").
    pub joined_appl: Option<u8>,
    /// Whether this dircl currently has a live connection record.
    pub connected: bool,
}

impl ClientSnapshot {
    /// Create a new client snapshot with no appl joined.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, joined_appl: None, connected: true }
    }

    /// Set the joined appl.
    #[must_use]
    pub fn with_joined_appl(mut self, appl_id: Option<u8>) -> Self {
        self.joined_appl = appl_id;
        self
    }

    /// Set connection state.
    #[must_use]
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }
}

/// Snapshot of an appl's runner and KV observable state (§3 `AppletMeta` /
/// `RunnerState`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplSnapshot {
    /// Whether a runner process is currently running for this appl (§3
    /// invariant: "exactly one `RunnerState` exists per appl at any time").
    pub runner_active: bool,
    /// Whether that runner's bootstrap has completed.
    pub bootstrapped: bool,
    /// Dircls queued waiting on this appl's bootstrap to complete.
    pub pending_joins: BTreeSet<u64>,
    /// Dircls currently joined to this appl, per the dircl side of the
    /// join/unjoin invariant.
    pub joined_clients: BTreeSet<u64>,
    /// Committed KV keys for this appl's domain (§4.5 "KV store
    /// mediation").
    pub kv_keys: BTreeSet<String>,
}

impl ApplSnapshot {
    /// Create an appl snapshot with no runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the runner active and/or bootstrapped.
    #[must_use]
    pub fn with_runner(mut self, active: bool, bootstrapped: bool) -> Self {
        self.runner_active = active;
        self.bootstrapped = bootstrapped;
        self
    }

    /// Record pending joins.
    #[must_use]
    pub fn with_pending_joins(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.pending_joins.extend(ids);
        self
    }

    /// Record joined clients.
    #[must_use]
    pub fn with_joined_clients(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.joined_clients.extend(ids);
        self
    }

    /// Record committed KV keys.
    #[must_use]
    pub fn with_kv_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.kv_keys.extend(keys);
        self
    }
}
