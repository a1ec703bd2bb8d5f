//! Deterministic simulation harness for A12 protocol testing.
//!
//! Turmoil-based implementations of the [`Environment`](a12_core::env::Environment)
//! trait and byte-pipe transports, used to test the handshake (§3.2 C2),
//! channel multiplexer (§4.3 C3), and directory controller (§4.5 C5)
//! without a real network or real runner processes.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of directory
//! controller semantics for model-based testing. Operations are applied to
//! both the model and a real `DirectoryServer`, and their observable
//! states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths,
//! not specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! common directory-controller invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod model;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;
pub mod sim_transport;

pub use cluster::SessionPair;
pub use invariants::{
    ApplSnapshot, BootstrapImpliesRunnerActive, ClientSnapshot, Invariant, InvariantRegistry,
    InvariantResult, JoinedApplExists, MembershipConsistency, NoAdmissionBeforeBootstrap,
    PendingJoinsDrainedOnBootstrap, SystemSnapshot, Violation,
};
pub use model::{
    ClientId, ModelApplId, ModelClient, ModelServer, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult, SmallKey, SmallValue,
};
pub use sim_driver::SessionDriver;
pub use sim_env::SimEnv;
pub use sim_server::SimDirectoryServer;
pub use sim_transport::{DuplexEnd, duplex_pair};
