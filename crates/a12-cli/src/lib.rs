//! Production glue for the A12 protocol binary (§6 "CLI surface").
//!
//! Everything under `a12-core`/`a12-directory`/`a12-streams` is action-driven
//! and touches no socket; this crate is the thin, fallible layer that owns
//! real TCP streams, child processes, and the filesystem, and drives those
//! pure state machines against them. The binary (`src/main.rs`) is a
//! `clap` dispatcher over the four roles named in §6: `directory-server`,
//! `directory-link`, `directory-reference`, `runner`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod directory_link;
pub mod directory_reference;
pub mod directory_server;
pub mod identity;
pub mod keystore_bridge;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod runner;

pub use config::{CliOverrides, load_directory_config};
pub use logging::init_tracing;
