//! Per-session key material (§3 `KeyContext`).
//!
//! Holds the local long-term identity, the peer's long-term public key once
//! learned, the current symmetric send/recv keys, and the bookkeeping that
//! decides when a rekey is due. [`crate::codec::PacketCodec`] is the only
//! other module that touches the symmetric keys directly; everything else
//! goes through this type.

use a12_crypto::{KeyPair, SessionKey};

use crate::error::SessionError;

/// Default bytes-before-rekey budget (§4.1), 64 MiB.
pub const DEFAULT_REKEY_BYTES_LIMIT: u64 = 64 * 1024 * 1024;

/// Per-session key material and sequence bookkeeping.
pub struct KeyContext {
    local_identity: KeyPair,
    peer_long_term_public: Option<[u8; 32]>,
    send_key: SessionKey,
    recv_key: SessionKey,
    send_sequence: u64,
    last_accepted_recv_sequence: Option<u64>,
    bytes_since_rekey: u64,
    rekey_bytes_limit: u64,
}

impl KeyContext {
    /// Creates a context for a freshly opened session. The symmetric keys
    /// start out as all-zero placeholders; [`Self::install_keys`] must be
    /// called once the handshake derives real ones.
    #[must_use]
    pub fn new(local_identity: KeyPair, rekey_bytes_limit: u64) -> Self {
        Self {
            local_identity,
            peer_long_term_public: None,
            send_key: SessionKey::new([0u8; 32]),
            recv_key: SessionKey::new([0u8; 32]),
            send_sequence: 0,
            last_accepted_recv_sequence: None,
            bytes_since_rekey: 0,
            rekey_bytes_limit,
        }
    }

    /// This session's long-term identity keypair.
    #[must_use]
    pub fn local_identity(&self) -> &KeyPair {
        &self.local_identity
    }

    /// The peer's long-term public key, once the handshake has delivered it.
    #[must_use]
    pub fn peer_long_term_public(&self) -> Option<&[u8; 32]> {
        self.peer_long_term_public.as_ref()
    }

    /// Records the peer's long-term public key, learned from its handshake
    /// hello.
    pub fn set_peer_long_term_public(&mut self, peer_public: [u8; 32]) {
        self.peer_long_term_public = Some(peer_public);
    }

    /// Installs a fresh symmetric key pair, resetting sequence counters and
    /// the rekey byte budget. Used both for the initial post-handshake key
    /// install and for every subsequent rekey (§4.1).
    pub fn install_keys(&mut self, send_key: SessionKey, recv_key: SessionKey) {
        self.send_key = send_key;
        self.recv_key = recv_key;
        self.send_sequence = 0;
        self.last_accepted_recv_sequence = None;
        self.bytes_since_rekey = 0;
    }

    /// Current send key.
    #[must_use]
    pub fn send_key(&self) -> &SessionKey {
        &self.send_key
    }

    /// Current recv key.
    #[must_use]
    pub fn recv_key(&self) -> &SessionKey {
        &self.recv_key
    }

    /// Returns the next send sequence number and increments the counter.
    ///
    /// # Errors
    ///
    /// `SessionError::RekeyExhausted` if the counter has reached `u64::MAX`;
    /// in practice a rekey is forced long before this, per §4.1.
    pub fn next_send_sequence(&mut self) -> Result<u64, SessionError> {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.checked_add(1).ok_or(SessionError::RekeyExhausted)?;
        Ok(sequence)
    }

    /// Validates and records an inbound sequence number.
    ///
    /// # Errors
    ///
    /// `SessionError::SequenceReplay` if `sequence` is not strictly greater
    /// than the last accepted sequence (§4.1 sequence policy).
    pub fn accept_recv_sequence(&mut self, sequence: u64) -> Result<(), SessionError> {
        if let Some(last_accepted) = self.last_accepted_recv_sequence {
            if sequence <= last_accepted {
                return Err(SessionError::SequenceReplay { received: sequence, last_accepted });
            }
        }
        self.last_accepted_recv_sequence = Some(sequence);
        Ok(())
    }

    /// Records `len` bytes as sent, for rekey-budget tracking.
    pub fn record_sent_bytes(&mut self, len: usize) {
        self.bytes_since_rekey = self.bytes_since_rekey.saturating_add(len as u64);
    }

    /// True once `bytes_since_rekey` has crossed the configured limit and a
    /// rekey must be initiated before any further traffic (§4.1).
    #[must_use]
    pub fn needs_rekey(&self) -> bool {
        self.bytes_since_rekey > self.rekey_bytes_limit
    }

    /// The last sequence number this session accepted on the recv side, for
    /// diagnostics and tests.
    #[must_use]
    pub fn last_accepted_recv_sequence(&self) -> Option<u64> {
        self.last_accepted_recv_sequence
    }
}
