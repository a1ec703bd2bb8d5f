//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors surfaced by the cryptographic primitives.
///
/// All variants here are terminal for the session they occur in (§7 tier 1
/// of the protocol spec): a cryptographic failure is never retried silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD authentication failed (tampered ciphertext, wrong key, or wrong
    /// nonce). Corresponds to the protocol's `MacMismatch`.
    #[error("aead authentication failed")]
    AuthenticationFailed,

    /// KDF was asked to expand to an invalid output length.
    #[error("kdf expand failed: requested {requested} bytes")]
    KdfExpand {
        /// Length that was requested.
        requested: usize,
    },
}
