//! Domain-separated key derivation for the A12 handshake and rekey.
//!
//! Both sides of a session derive their send/recv keys from the same x25519
//! shared secret, but with swapped info labels: what one side calls "send"
//! the other calls "recv". The HKDF salt is the handshake transcript hash so
//! that distinct handshakes never derive colliding keys even from a reused
//! shared secret.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::aead::SessionKey;

const SEND_LABEL: &[u8] = b"a12-send";
const RECV_LABEL: &[u8] = b"a12-recv";

/// Derive the (send, recv) session keys for one side of a handshake.
///
/// `we_initiated` selects which label is "send" for this side: the
/// initiator's send key must equal the responder's recv key and vice versa,
/// which falls out of swapping the labels.
#[must_use]
pub fn derive_session_keys(
    shared_secret: &[u8; 32],
    transcript_hash: &[u8; 32],
    we_initiated: bool,
) -> (SessionKey, SessionKey) {
    let hkdf = Hkdf::<Sha256>::new(Some(transcript_hash), shared_secret);

    let (send_label, recv_label) =
        if we_initiated { (SEND_LABEL, RECV_LABEL) } else { (RECV_LABEL, SEND_LABEL) };

    (expand_key(&hkdf, send_label), expand_key(&hkdf, recv_label))
}

fn expand_key(hkdf: &Hkdf<Sha256>, label: &[u8]) -> SessionKey {
    let mut out = [0u8; 32];
    let Ok(()) = hkdf.expand(label, &mut out) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    SessionKey::new(out)
}
