//! Wire-level protocol errors.
//!
//! These correspond to §4.1's terminal error list and §7 tier 1: every
//! variant here is fatal for the session in which it occurs.

use thiserror::Error;

/// A convenience `Result` alias using [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from framing and payload (de)serialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer was too short to contain a full wire-packet prefix.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Declared length exceeds what is currently buffered.
    #[error("frame truncated: expected {expected} more bytes, got {actual}")]
    FrameTruncated {
        /// Bytes the header claims follow.
        expected: usize,
        /// Bytes actually available after the prefix.
        actual: usize,
    },

    /// Declared ciphertext length exceeds the protocol maximum.
    #[error("oversized frame: {size} bytes exceeds maximum of {max}")]
    OversizedFrame {
        /// Size that was rejected.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Frame type byte is outside both the known and reserved ranges.
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    /// CBOR encoding of a payload failed.
    #[error("cbor encode failed: {0}")]
    CborEncode(String),

    /// CBOR decoding of a payload failed.
    #[error("cbor decode failed: {0}")]
    CborDecode(String),
}
