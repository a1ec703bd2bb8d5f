//! A12 Cryptographic Primitives
//!
//! Cryptographic building blocks for the A12 protocol's packet cipher (§4.1)
//! and handshake/rekey key authority (§4.2). Pure functions with
//! deterministic outputs wherever possible; randomness is always
//! caller-supplied so higher layers can drive deterministic simulation.
//!
//! # Key Lifecycle
//!
//! ```text
//! x25519(our_secret, peer_ephemeral) -> shared_secret
//!        │
//!        ▼
//! HKDF-SHA256(salt=transcript_hash) -> (send_key, recv_key)
//!        │
//!        ▼
//! ChaCha20-Poly1305(key, nonce=sequence) -> (ciphertext, tag)
//! ```
//!
//! A rekey repeats the exchange and derivation with a fresh ephemeral pair,
//! producing a new key pair that supersedes the old one at a well-defined
//! sequence boundary (the rekey control frame itself, tagged last-under-old
//! by the caller in `a12-core`).
//!
//! # Security
//!
//! - Authenticity: ChaCha20-Poly1305 provides tamper-proof encryption; a
//!   failed tag is the protocol's `MacMismatch`, terminal for the session.
//! - Key Isolation: send and recv keys are independently derived (distinct
//!   HKDF info labels per direction), so compromising one direction's
//!   traffic does not expose the other.
//! - Forward Secrecy: rekeying derives entirely new keys from a fresh
//!   ephemeral exchange; old keys are zeroized on drop and never reused.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod error;
pub mod exchange;
pub mod kdf;

pub use aead::{SessionKey, nonce_for_sequence, open_in_place, seal_in_place};
pub use error::CryptoError;
pub use exchange::KeyPair;
pub use kdf::derive_session_keys;
