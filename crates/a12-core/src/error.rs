//! Terminal session errors (§7 tier 1).
//!
//! A terminal error tears down the session: every channel, every in-flight
//! binary transfer, every stream engine buffer. Stream-scoped errors (codec
//! mismatch, checksum failure) and local policy rejections (permission
//! denied, malformed KV key) are narrower in scope and live closer to the
//! crates that can produce them (`a12-streams`, `a12-directory`); this crate
//! only needs the tier that can end a session.

use std::{io, time::Duration};

use thiserror::Error;

use crate::session::SessionState;

/// Errors that terminate a [`crate::session::Session`].
///
/// Every variant here corresponds to one of the terminal failure conditions
/// in §4.1 (packet codec), §4.2 (handshake), or §4.3 (channel table).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Packet authentication tag did not verify. A single MAC failure is
    /// terminal for the session.
    #[error("MAC verification failed")]
    MacMismatch,

    /// Receive side observed a sequence number ≤ the last accepted one.
    #[error("sequence {received} is not greater than last accepted {last_accepted}")]
    SequenceReplay {
        /// The offending sequence number.
        received: u64,
        /// The last sequence number this session accepted.
        last_accepted: u64,
    },

    /// A wire packet's declared length was less than the fixed prefix.
    #[error("truncated frame: expected at least {expected} bytes, got {actual}")]
    TruncatedFrame {
        /// Minimum bytes required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A wire packet declared a ciphertext length past the configured
    /// maximum.
    #[error("oversized frame: {size} bytes exceeds limit of {max}")]
    OversizedFrame {
        /// Declared size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Plaintext frame type byte fell in the unknown (non-reserved) range.
    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    /// The send-side sequence counter would wrap. Unreachable in practice
    /// because a rekey is forced well before this point, but the case is
    /// still a terminal condition if it is ever observed.
    #[error("send sequence counter exhausted, rekey was not completed in time")]
    RekeyExhausted,

    /// Peer's handshake hello declared an unsupported protocol version.
    #[error("handshake version mismatch: we speak {ours}, peer sent {theirs}")]
    VersionMismatch {
        /// Version this implementation speaks.
        ours: u8,
        /// Version the peer declared.
        theirs: u8,
    },

    /// The peer's handshake authentication tag did not verify under the
    /// newly derived keys.
    #[error("handshake authentication tag invalid")]
    AuthTagInvalid,

    /// Handshake did not complete within the configured time budget.
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long the session waited.
        elapsed: Duration,
    },

    /// The keystore (or the `register_unknown` hook it deferred to) refused
    /// to admit the peer.
    #[error("keystore rejected peer")]
    KeystoreReject,

    /// Connection idle timeout exceeded.
    #[error("idle timeout after {elapsed:?}")]
    IdleTimeout {
        /// How long the session was idle.
        elapsed: Duration,
    },

    /// Invalid state transition attempted.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: SessionState,
        /// Operation that was attempted.
        operation: String,
    },

    /// Channel allocation requested past the configured channel limit, or
    /// the proposed id was already in use.
    #[error("channel {id} cannot be opened: {reason}")]
    ChannelRejected {
        /// Proposed channel id.
        id: u8,
        /// Why the allocator refused it.
        reason: String,
    },

    /// A frame referenced a channel id with no entry in the channel table.
    #[error("unknown channel {0}")]
    UnknownChannel(u8),

    /// Catch-all for a malformed control message or otherwise malformed
    /// protocol state not covered by a more specific variant.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// True if retrying the *same* session state makes sense, i.e. this was
    /// a timing condition rather than a protocol violation.
    ///
    /// Per §7 the protocol itself never retries internally; this is exposed
    /// for higher layers (directory federation, autoreconnect) deciding
    /// whether reopening a fresh session is worth attempting.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HandshakeTimeout { .. } | Self::IdleTimeout { .. })
    }
}

impl From<SessionError> for io::Error {
    fn from(err: SessionError) -> Self {
        let kind = match &err {
            SessionError::HandshakeTimeout { .. } | SessionError::IdleTimeout { .. } => {
                io::ErrorKind::TimedOut
            },
            SessionError::Transport(_) => io::ErrorKind::Other,
            _ => io::ErrorKind::InvalidData,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<a12_proto::ProtocolError> for SessionError {
    fn from(err: a12_proto::ProtocolError) -> Self {
        match err {
            a12_proto::ProtocolError::FrameTooShort { expected, actual }
            | a12_proto::ProtocolError::FrameTruncated { expected, actual } => {
                Self::TruncatedFrame { expected, actual }
            },
            a12_proto::ProtocolError::OversizedFrame { size, max } => {
                Self::OversizedFrame { size, max }
            },
            a12_proto::ProtocolError::UnknownFrameType(byte) => Self::UnknownFrameType(byte),
            a12_proto::ProtocolError::CborEncode(message)
            | a12_proto::ProtocolError::CborDecode(message) => Self::Protocol(message),
        }
    }
}

impl From<a12_crypto::CryptoError> for SessionError {
    fn from(err: a12_crypto::CryptoError) -> Self {
        match err {
            a12_crypto::CryptoError::AuthenticationFailed => Self::MacMismatch,
            a12_crypto::CryptoError::KdfExpand { requested } => {
                Self::Protocol(format!("KDF expansion failed for {requested} bytes"))
            },
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
