//! Handshake and key authority support types (§4.2, C2).
//!
//! The handshake itself is driven by [`crate::session::Session`]; this
//! module holds the policy traits the driver consults and the pure
//! cryptographic helpers (transcript hashing, initiator tie-break, auth tag
//! compute/verify) that keep `session.rs` free of raw hashing calls.
//!
//! The flow is fully symmetric (§4.2: "both directions symmetric unless
//! noted") — both peers send a hello simultaneously rather than one side
//! leading. The domain-separated KDF still needs a "send"/"recv" label per
//! side, so both sides independently break the symmetry the same way: the
//! side with the lexicographically smaller long-term public key is the
//! initiator for labeling purposes only.

use a12_crypto::{open_in_place, seal_in_place, SessionKey};
use a12_proto::HandshakeHello;
use sha2::{Digest, Sha256};

use crate::error::SessionError;

/// Current protocol version spoken by this implementation (§4.2 step 1).
pub const PROTOCOL_VERSION: u8 = 1;

/// Outcome of a keystore lookup for a peer's long-term public key.
///
/// An Open Question in §4.2 is resolved here: the keystore classifies the
/// peer as known or unknown. It does not hand back alternate local secret
/// material — this implementation uses one long-term identity per session,
/// set when the session is created (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreDecision {
    /// The peer's long-term public key has a matching entry.
    Known,
    /// No entry for this peer.
    Unknown,
}

/// Consulted with the peer's long-term public key once its hello arrives
/// (§4.2 step 2).
pub trait Keystore: Send + Sync {
    /// Classify `peer_long_term_public`.
    fn lookup(&self, peer_long_term_public: &[u8; 32]) -> KeystoreDecision;
}

/// Consulted only when the keystore reports the peer as unknown (§4.2
/// "Unknown-peer policy"). Absent entirely, the default is reject.
pub trait UnknownPeerHook: Send + Sync {
    /// Returns `true` to admit the peer as an unauthenticated ("soft-auth")
    /// client, `false` to reject it.
    fn register_unknown(&self, peer_long_term_public: &[u8; 32]) -> bool;
}

/// Whether a second ephemeral round runs after the first key derivation to
/// provide forward secrecy against long-term key compromise (§4.2 step 3,
/// an Open Question resolved as an explicit mode rather than a fixed
/// behavior — see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardSecrecyMode {
    /// Single x25519 round; the handshake ephemeral IS the session's only
    /// forward-secrecy boundary.
    #[default]
    Disabled,
    /// Run a second ephemeral exchange — implemented as an immediate rekey,
    /// reusing the ordinary §4.1 rekey machinery — before authenticating.
    Enabled,
}

/// Canonical transcript hash over a pair of messages exchanged during the
/// handshake, order-independent so both sides compute the same digest
/// regardless of which hello/ephemeral they call "ours" vs "peer's".
///
/// `left`/`right` are hashed in ascending byte order of the two slices so
/// the result does not depend on which side is calling.
#[must_use]
pub fn order_independent_hash(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    if a <= b {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}

/// Transcript hash over the two handshake hellos (§4.2 step 4).
#[must_use]
pub fn hello_transcript(local: &HandshakeHello, peer: &HandshakeHello) -> [u8; 32] {
    order_independent_hash(&encode_hello(local), &encode_hello(peer))
}

/// Extends a transcript with a pair of second-round ephemeral public keys,
/// for the forward-secrecy round (§4.2 step 3).
#[must_use]
pub fn extend_transcript(previous: &[u8; 32], local_ephemeral: &[u8; 32], peer_ephemeral: &[u8; 32]) -> [u8; 32] {
    let combined = order_independent_hash(local_ephemeral, peer_ephemeral);
    order_independent_hash(previous, &combined)
}

fn encode_hello(hello: &HandshakeHello) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 32 + 32 + 32);
    out.push(hello.version);
    out.extend_from_slice(&hello.long_term_public);
    out.extend_from_slice(&hello.ephemeral_public);
    out.extend_from_slice(&hello.challenge);
    out
}

/// True if `local_public` should act as the KDF-label initiator relative to
/// `peer_public` (§4.2 step 3 direction tie-break).
#[must_use]
pub fn is_initiator(local_public: &[u8; 32], peer_public: &[u8; 32]) -> bool {
    local_public < peer_public
}

/// Computes the authentication tag sent over `transcript` under `send_key`
/// (§4.2 step 4): an AEAD tag with an empty plaintext and the transcript
/// hash bound in as additional authenticated data.
#[must_use]
pub fn compute_auth_tag(send_key: &SessionKey, transcript: &[u8; 32]) -> [u8; 16] {
    seal_in_place(send_key, 0, transcript, &mut [])
}

/// Verifies a peer's authentication tag under `recv_key` against the same
/// transcript.
///
/// # Errors
///
/// `SessionError::AuthTagInvalid` if the tag does not verify.
pub fn verify_auth_tag(
    recv_key: &SessionKey,
    transcript: &[u8; 32],
    tag: &[u8],
) -> Result<(), SessionError> {
    let tag: [u8; 16] = tag.try_into().map_err(|_| SessionError::AuthTagInvalid)?;
    open_in_place(recv_key, 0, transcript, &tag, &mut []).map_err(|_| SessionError::AuthTagInvalid)
}
