//! Model world - orchestrates clients and server.
//!
//! The world is the top-level container that manages the model state
//! and applies operations. It's the oracle against which the real
//! `a12_directory::server::DirectoryServer` is verified.

use std::collections::BTreeMap;

use super::{
    client::ModelClient,
    operation::{ClientId, ModelApplId, Operation, OperationError, OperationResult},
    server::ModelServer,
};

/// Observable state for oracle comparison.
///
/// This is the subset of world state that can be compared against the real
/// implementation's externally-visible behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-client joined-appl state (sorted by client id).
    pub client_joined: Vec<(ClientId, Option<ModelApplId>)>,
    /// Per-appl bootstrap flag (sorted by appl id).
    pub appl_bootstrapped: Vec<(ModelApplId, bool)>,
    /// Per-appl pending-joins queue (sorted by appl id).
    pub appl_pending_joins: Vec<(ModelApplId, Vec<ClientId>)>,
    /// Per-appl committed KV domain (sorted by appl id).
    pub appl_kv: Vec<(ModelApplId, BTreeMap<String, String>)>,
}

/// Model world - the reference implementation.
///
/// Manages multiple dircls and a fixed roster of appls, applying
/// operations and tracking state for oracle comparison against
/// `DirectoryServer::process_event`.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    /// Model clients (indexed by `ClientId`).
    clients: Vec<ModelClient>,
    /// Model appl registry and runner state.
    server: ModelServer,
}

impl ModelWorld {
    /// Create a new model world with `num_clients` dircls and `num_appls`
    /// pre-registered appls.
    pub fn new(num_clients: usize, num_appls: usize) -> Self {
        let clients = (0..num_clients).map(|i| ModelClient::new(i as ClientId)).collect();
        Self { clients, server: ModelServer::new(num_appls) }
    }

    /// Number of clients in the world.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Get a client by ID.
    pub fn client(&self, id: ClientId) -> Option<&ModelClient> {
        self.clients.get(id as usize)
    }

    /// Get the server.
    pub fn server(&self) -> &ModelServer {
        &self.server
    }

    /// Apply an operation and return the result.
    ///
    /// This is the main entry point for model-based testing. The result
    /// should match `DirectoryServer::process_event`'s result for the
    /// equivalent `DirectoryEvent`.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Connect { client_id } => self.apply_connect(*client_id),
            Operation::Join { client_id, appl_id } => self.apply_join(*client_id, *appl_id),
            Operation::Leave { client_id } => self.apply_leave(*client_id),
            Operation::RunnerBootstrapped { appl_id } => self.apply_bootstrapped(*appl_id),
            Operation::KvBegin { appl_id } => self.apply_kv_begin(*appl_id),
            Operation::KvSet { appl_id, key, value } => {
                self.apply_kv_set(*appl_id, &key.to_key_string(), &value.to_value_string())
            },
            Operation::KvEnd { appl_id } => self.apply_kv_end(*appl_id),
            Operation::AdvanceTime { .. } => OperationResult::Ok,
            Operation::Disconnect { client_id } => self.apply_disconnect(*client_id),
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let client_joined =
            self.clients.iter().map(|c| (c.id(), c.joined_appl())).collect();

        let num_appls = (0..u8::MAX).take_while(|&id| self.server.appl_exists(id)).count();
        let mut appl_bootstrapped = Vec::with_capacity(num_appls);
        let mut appl_pending_joins = Vec::with_capacity(num_appls);
        let mut appl_kv = Vec::with_capacity(num_appls);
        #[allow(clippy::cast_possible_truncation)]
        for appl_id in 0..num_appls as ModelApplId {
            appl_bootstrapped.push((appl_id, self.server.is_bootstrapped(appl_id)));
            appl_pending_joins.push((appl_id, self.server.pending_joins(appl_id).to_vec()));
            appl_kv.push((appl_id, self.server.kv_entries(appl_id)));
        }

        ObservableState { client_joined, appl_bootstrapped, appl_pending_joins, appl_kv }
    }

    fn apply_connect(&mut self, client_id: ClientId) -> OperationResult {
        let Some(client) = self.clients.get_mut(client_id as usize) else {
            return OperationResult::Error(OperationError::UnknownClient);
        };
        client.connect()
    }

    /// Apply join. Mirrors `DirectoryServer`'s `JoinRequested` handling: a
    /// join against a runner-less appl spawns one and queues the join; a
    /// join against a bootstrapped appl admits immediately (§4.5 "Runner
    /// lifecycle").
    fn apply_join(&mut self, client_id: ClientId, appl_id: ModelApplId) -> OperationResult {
        let Some(client) = self.clients.get_mut(client_id as usize) else {
            return OperationResult::Error(OperationError::UnknownClient);
        };
        let result = client.join(appl_id);
        if result.is_err() {
            return result;
        }
        match self.server.request_join(appl_id, client_id) {
            Ok(_admitted) => OperationResult::Ok,
            Err(err) => {
                // Roll back the client-side join if the appl doesn't exist.
                self.clients[client_id as usize].leave();
                OperationResult::Error(err)
            },
        }
    }

    fn apply_leave(&mut self, client_id: ClientId) -> OperationResult {
        let Some(client) = self.clients.get_mut(client_id as usize) else {
            return OperationResult::Error(OperationError::UnknownClient);
        };
        client.leave()
    }

    fn apply_bootstrapped(&mut self, appl_id: ModelApplId) -> OperationResult {
        match self.server.bootstrap_complete(appl_id) {
            Ok(_admitted) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn apply_kv_begin(&mut self, appl_id: ModelApplId) -> OperationResult {
        match self.server.kv_begin(appl_id) {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn apply_kv_set(&mut self, appl_id: ModelApplId, key: &str, value: &str) -> OperationResult {
        match self.server.kv_set(appl_id, key, value) {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn apply_kv_end(&mut self, appl_id: ModelApplId) -> OperationResult {
        match self.server.kv_end(appl_id) {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err),
        }
    }

    fn apply_disconnect(&mut self, client_id: ClientId) -> OperationResult {
        let Some(client) = self.clients.get_mut(client_id as usize) else {
            return OperationResult::Error(OperationError::UnknownClient);
        };
        if !client.is_connected() {
            return OperationResult::Error(OperationError::UnknownClient);
        }
        client.disconnect();
        OperationResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_join_bootstrap_admits_pending() {
        let mut world = ModelWorld::new(2, 1);
        assert!(world.apply(&Operation::Connect { client_id: 0 }).is_ok());
        assert!(world.apply(&Operation::Join { client_id: 0, appl_id: 0 }).is_ok());
        assert_eq!(world.server().pending_joins(0), &[0]);
        assert!(world.apply(&Operation::RunnerBootstrapped { appl_id: 0 }).is_ok());
        assert!(world.server().pending_joins(0).is_empty());
        assert!(world.server().is_bootstrapped(0));
    }

    #[test]
    fn kv_transaction_round_trip() {
        let mut world = ModelWorld::new(1, 1);
        world.apply(&Operation::Connect { client_id: 0 });
        world.apply(&Operation::Join { client_id: 0, appl_id: 0 });
        world.apply(&Operation::RunnerBootstrapped { appl_id: 0 });

        assert!(world.apply(&Operation::KvBegin { appl_id: 0 }).is_ok());
        let key = super::super::operation::SmallKey(2);
        let value = super::super::operation::SmallValue { seed: 5 };
        assert!(world.apply(&Operation::KvSet { appl_id: 0, key, value }).is_ok());
        assert!(world.apply(&Operation::KvEnd { appl_id: 0 }).is_ok());

        let entries = world.server().kv_entries(0);
        assert_eq!(entries.get("k2"), Some(&"v5".to_string()));
    }

    #[test]
    fn join_unknown_appl_rolls_back_client_state() {
        let mut world = ModelWorld::new(1, 1);
        world.apply(&Operation::Connect { client_id: 0 });
        let result = world.apply(&Operation::Join { client_id: 0, appl_id: 9 });
        assert_eq!(result, OperationResult::Error(OperationError::UnknownAppl));
        assert_eq!(world.client(0).unwrap().joined_appl(), None);
    }

    #[test]
    fn kv_without_bootstrap_is_rejected() {
        let mut world = ModelWorld::new(0, 1);
        let result = world.apply(&Operation::KvBegin { appl_id: 0 });
        assert_eq!(result, OperationResult::Error(OperationError::RunnerNotActive));
    }
}
