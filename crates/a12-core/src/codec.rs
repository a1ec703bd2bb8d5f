//! Packet codec (§4.1, C1): `ingest`/`send` over the wire framing.
//!
//! This is the only place session code touches [`a12_crypto::seal_in_place`]
//! / [`a12_crypto::open_in_place`] directly. The AEAD tag is bound over
//! `(sequence || type || channel || payload)`: `sequence` is passed as
//! additional authenticated data (it also doubles as the nonce), and
//! `type || channel || payload` is the encrypted plaintext itself, so the
//! tag transitively covers all four fields exactly as §4.1 requires.

use a12_crypto::{open_in_place, seal_in_place};
use a12_proto::{PlaintextFrame, ProtocolError, WirePacket};

use crate::{error::SessionError, keycontext::KeyContext};

/// Drives the wire codec for one session.
pub struct PacketCodec {
    keys: KeyContext,
    null_cipher: bool,
}

impl PacketCodec {
    /// Wrap a [`KeyContext`] in a codec. The context's keys are whatever was
    /// installed last — all-zero placeholders before the handshake
    /// completes, or the derived session keys afterward.
    #[must_use]
    pub fn new(keys: KeyContext) -> Self {
        Self { keys, null_cipher: false }
    }

    /// Borrow the underlying key context (sequence counters, rekey budget).
    #[must_use]
    pub fn key_context(&self) -> &KeyContext {
        &self.keys
    }

    /// Mutably borrow the underlying key context, e.g. to install new keys
    /// after a rekey or the initial handshake.
    pub fn key_context_mut(&mut self) -> &mut KeyContext {
        &mut self.keys
    }

    /// Toggles the debug-only cipher bypass (§4.1). Plaintext still flows
    /// through the same framing, with an all-zero MAC, so the wire shape is
    /// unchanged — only the confidentiality/integrity guarantee is dropped.
    ///
    /// # Errors
    ///
    /// Refuses unconditionally once `authenticated` is `true`, and refuses
    /// to actually enable the bypass outside debug builds (the flag is
    /// accepted but has no effect in release builds, matching "must refuse
    /// to take effect once a session is authenticated" rather than making
    /// release builds reject the call outright).
    pub fn set_null_cipher(&mut self, enabled: bool, authenticated: bool) -> Result<(), SessionError> {
        if authenticated {
            return Err(SessionError::Protocol(
                "cannot toggle the null cipher on an authenticated session".to_string(),
            ));
        }
        self.null_cipher = enabled && cfg!(debug_assertions);
        Ok(())
    }

    /// Encrypts and frames one outbound plaintext frame, returning the bytes
    /// ready for the transport.
    ///
    /// # Errors
    ///
    /// `SessionError::RekeyExhausted` if the send sequence counter has been
    /// exhausted (§4.1 sequence policy).
    pub fn send(&mut self, frame: &PlaintextFrame) -> Result<Vec<u8>, SessionError> {
        let sequence = self.keys.next_send_sequence()?;
        let mut plaintext = frame.to_plaintext_bytes();
        let aad = sequence.to_le_bytes();

        let mac = if self.null_cipher {
            [0u8; 16]
        } else {
            seal_in_place(self.keys.send_key(), sequence, &aad, &mut plaintext)
        };

        self.keys.record_sent_bytes(plaintext.len());

        let packet = WirePacket::new(sequence, mac, plaintext);
        let mut out = Vec::new();
        packet.encode(&mut out)?;
        Ok(out)
    }

    /// Decodes and decrypts as many complete wire packets as `bytes`
    /// contains, returning the decrypted frames and the number of bytes
    /// consumed. Callers drain that many bytes from their read buffer; any
    /// remainder is an incomplete packet awaiting more data.
    ///
    /// # Errors
    ///
    /// `SessionError::MacMismatch`, `SequenceReplay`, `OversizedFrame`, or
    /// `UnknownFrameType` — all terminal for the session (§4.1).
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<(Vec<PlaintextFrame>, usize), SessionError> {
        let mut frames = Vec::new();
        let mut offset = 0;

        loop {
            match WirePacket::decode(&bytes[offset..]) {
                Ok((packet, consumed)) => {
                    let mut plaintext = packet.ciphertext.to_vec();
                    let aad = packet.sequence.to_le_bytes();
                    if !self.null_cipher {
                        open_in_place(self.keys.recv_key(), packet.sequence, &aad, &packet.mac, &mut plaintext)?;
                    }

                    // MAC verified above before any payload is acted on, or
                    // before the sequence counter advances (§3): a tampered
                    // sequence field must fail as MacMismatch, not be caught
                    // first as a replay/reorder.
                    self.keys.accept_recv_sequence(packet.sequence)?;

                    if let Some(frame) = PlaintextFrame::from_plaintext_bytes(&plaintext)? {
                        frames.push(frame);
                    }

                    offset += consumed;
                },
                Err(ProtocolError::FrameTooShort { .. } | ProtocolError::FrameTruncated { .. }) => break,
                Err(other) => return Err(other.into()),
            }
        }

        Ok((frames, offset))
    }

    /// True once the send-side rekey byte budget has been crossed and a
    /// rekey control must be emitted before further traffic (§4.1).
    #[must_use]
    pub fn needs_rekey(&self) -> bool {
        self.keys.needs_rekey()
    }
}

#[cfg(test)]
mod tests {
    use a12_crypto::{KeyPair, SessionKey};
    use a12_proto::FrameType;
    use bytes::Bytes;
    use rand::rngs::OsRng;

    use super::*;
    use crate::keycontext::DEFAULT_REKEY_BYTES_LIMIT;

    fn paired_codecs() -> (PacketCodec, PacketCodec) {
        let a_to_b = SessionKey::new([1u8; 32]);
        let b_to_a = SessionKey::new([2u8; 32]);

        let mut a_keys = KeyContext::new(KeyPair::generate(&mut OsRng), DEFAULT_REKEY_BYTES_LIMIT);
        a_keys.install_keys(a_to_b.clone(), b_to_a.clone());

        let mut b_keys = KeyContext::new(KeyPair::generate(&mut OsRng), DEFAULT_REKEY_BYTES_LIMIT);
        b_keys.install_keys(b_to_a, a_to_b);

        (PacketCodec::new(a_keys), PacketCodec::new(b_keys))
    }

    #[test]
    fn send_then_ingest_round_trips() {
        let (mut sender, mut receiver) = paired_codecs();
        let frame = PlaintextFrame::new(FrameType::Event, 3, Bytes::from_static(b"press-a"));

        let wire = sender.send(&frame).unwrap();
        let (decoded, consumed) = receiver.ingest(&wire).unwrap();

        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn ingest_rejects_replayed_sequence() {
        let (mut sender, mut receiver) = paired_codecs();
        let frame = PlaintextFrame::new(FrameType::Event, 0, Bytes::from_static(b"x"));

        let wire = sender.send(&frame).unwrap();
        receiver.ingest(&wire).unwrap();

        let err = receiver.ingest(&wire).unwrap_err();
        assert!(matches!(err, SessionError::SequenceReplay { .. }));
    }

    #[test]
    fn tampered_ciphertext_is_mac_mismatch() {
        let (mut sender, mut receiver) = paired_codecs();
        let frame = PlaintextFrame::new(FrameType::Control, 0, Bytes::from_static(b"hello"));

        let mut wire = sender.send(&frame).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        let err = receiver.ingest(&wire).unwrap_err();
        assert_eq!(err, SessionError::MacMismatch);
    }

    #[test]
    fn incomplete_packet_is_left_for_next_ingest_call() {
        let (mut sender, mut receiver) = paired_codecs();
        let frame = PlaintextFrame::new(FrameType::Event, 1, Bytes::from_static(b"partial"));

        let wire = sender.send(&frame).unwrap();
        let (frames, consumed) = receiver.ingest(&wire[..wire.len() - 3]).unwrap();

        assert!(frames.is_empty());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn null_cipher_refuses_once_authenticated() {
        let (mut sender, _receiver) = paired_codecs();
        let err = sender.set_null_cipher(true, true).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }
}
