//! Packet cipher: ChaCha20-Poly1305 keyed by the session's current symmetric
//! key and nonced by the per-direction sequence number.
//!
//! The wire format (§4.1) carries the 16-byte Poly1305 tag as a separate
//! `mac` field rather than appended to the ciphertext, so encryption and
//! decryption use the detached-tag API.

use chacha20poly1305::{
    AeadInPlace, ChaCha20Poly1305, KeyInit, Tag,
    aead::generic_array::GenericArray,
};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// 32-byte symmetric key for one direction of a session (send or recv).
#[derive(Clone)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionKey").field(&"<redacted>").finish()
    }
}

/// Build the 12-byte ChaCha20-Poly1305 nonce from a per-direction sequence
/// number: 4 zero bytes followed by the big-endian sequence. Direction
/// isolation comes from using distinct send/recv keys, not from the nonce
/// itself, so reusing the sequence as a nonce across directions is safe.
#[must_use]
pub fn nonce_for_sequence(sequence: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..12].copy_from_slice(&sequence.to_be_bytes());
    nonce
}

/// Encrypt `plaintext` in place under `key`, nonced by `sequence`, with
/// `aad` (the MAC-covered-but-not-encrypted fields) bound into the tag.
///
/// Returns the detached 16-byte authentication tag. `plaintext` is
/// overwritten with ciphertext of the same length.
pub fn seal_in_place(
    key: &SessionKey,
    sequence: u64,
    aad: &[u8],
    plaintext: &mut [u8],
) -> [u8; 16] {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = nonce_for_sequence(sequence);

    let Ok(tag) = cipher.encrypt_in_place_detached(GenericArray::from_slice(&nonce), aad, plaintext)
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid key/nonce lengths");
    };

    let mut out = [0u8; 16];
    out.copy_from_slice(&tag);
    out
}

/// Decrypt `ciphertext` in place under `key`, verifying the detached `tag`
/// against `aad` and the sequence-derived nonce.
///
/// # Errors
///
/// `CryptoError::AuthenticationFailed` if the tag does not verify. On
/// failure `ciphertext` is left in an undefined (partially-decrypted) state
/// and MUST NOT be used by the caller — the session must be torn down.
pub fn open_in_place(
    key: &SessionKey,
    sequence: u64,
    aad: &[u8],
    tag: &[u8; 16],
    ciphertext: &mut [u8],
) -> Result<(), CryptoError> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = nonce_for_sequence(sequence);
    let tag = Tag::from_slice(tag);

    cipher
        .decrypt_in_place_detached(GenericArray::from_slice(&nonce), aad, ciphertext, tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trip() {
        let key = SessionKey::new([7u8; 32]);
        let mut buf = b"hello a12".to_vec();
        let aad = b"channel=3:type=control";

        let tag = seal_in_place(&key, 42, aad, &mut buf);
        open_in_place(&key, 42, aad, &tag, &mut buf).expect("should authenticate");
        assert_eq!(buf, b"hello a12");
    }

    #[test]
    fn wrong_sequence_fails() {
        let key = SessionKey::new([7u8; 32]);
        let mut buf = b"hello a12".to_vec();
        let aad = b"";

        let tag = seal_in_place(&key, 1, aad, &mut buf);
        let result = open_in_place(&key, 2, aad, &tag, &mut buf);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = SessionKey::new([3u8; 32]);
        let mut buf = b"do not trust this".to_vec();
        let aad = b"";

        let tag = seal_in_place(&key, 5, aad, &mut buf);
        buf[0] ^= 0xFF;
        let result = open_in_place(&key, 5, aad, &tag, &mut buf);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_tag_fails() {
        let key = SessionKey::new([9u8; 32]);
        let mut buf = b"do not trust this".to_vec();
        let aad = b"";

        let mut tag = seal_in_place(&key, 5, aad, &mut buf);
        tag[0] ^= 0xFF;
        let result = open_in_place(&key, 5, aad, &tag, &mut buf);
        assert_eq!(result, Err(CryptoError::AuthenticationFailed));
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary(
            key_bytes in any::<[u8; 32]>(),
            sequence in any::<u64>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let key = SessionKey::new(key_bytes);
            let mut buf = plaintext.clone();
            let tag = seal_in_place(&key, sequence, b"aad", &mut buf);
            open_in_place(&key, sequence, b"aad", &tag, &mut buf).expect("should authenticate");
            prop_assert_eq!(buf, plaintext);
        }

        #[test]
        fn bit_flip_in_tag_is_rejected(
            key_bytes in any::<[u8; 32]>(),
            sequence in any::<u64>(),
            plaintext in prop::collection::vec(any::<u8>(), 1..256),
            flip_byte in 0usize..16,
            flip_bit in 0u8..8,
        ) {
            let key = SessionKey::new(key_bytes);
            let mut buf = plaintext.clone();
            let mut tag = seal_in_place(&key, sequence, b"aad", &mut buf);
            tag[flip_byte] ^= 1 << flip_bit;
            prop_assert_eq!(
                open_in_place(&key, sequence, b"aad", &tag, &mut buf),
                Err(CryptoError::AuthenticationFailed)
            );
        }
    }
}
