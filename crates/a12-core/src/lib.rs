//! A12 session core (C1/C2/C3): the packet codec, handshake/key authority,
//! and channel multiplexer wired into one per-connection [`Session`] state
//! machine (§3 `Session`, §4.1, §4.2, §4.3).
//!
//! Every public operation here is action-driven: callers feed in bytes or
//! ticks and get back a list of [`session::SessionAction`]s to carry out.
//! Nothing in this crate opens a socket, spawns a thread, or blocks, so the
//! exact same state machine drives a production TCP loop (`a12-cli`) and a
//! deterministic `turmoil` simulation (`a12-harness`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod codec;
pub mod env;
pub mod error;
pub mod handshake;
pub mod keycontext;
pub mod session;

pub use channel::{Channel, ChannelTable, FrameClass, InputMask};
pub use codec::PacketCodec;
pub use env::Environment;
pub use error::SessionError;
pub use handshake::{ForwardSecrecyMode, Keystore, KeystoreDecision, UnknownPeerHook, PROTOCOL_VERSION};
pub use keycontext::KeyContext;
pub use session::{Session, SessionAction, SessionConfig, SessionState};
