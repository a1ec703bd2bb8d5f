//! Reference model for model-based testing of the directory controller.
//!
//! Operations are applied to both [`world::ModelWorld`] and a real
//! `a12_directory::server::DirectoryServer`, and their observable states are
//! compared.

mod client;
mod operation;
mod server;
mod world;

pub use client::ModelClient;
pub use operation::{
    ClientId, ModelApplId, Operation, OperationError, OperationResult, SmallKey, SmallValue,
};
pub use server::ModelServer;
pub use world::{ModelWorld, ObservableState};
