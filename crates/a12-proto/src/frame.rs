//! Decrypted frame content: the `[type: u8][channel: u8][payload]` structure
//! that a [`crate::WirePacket`]'s ciphertext decrypts to (§4.1).

use bytes::Bytes;

use crate::errors::ProtocolError;

/// Tagged category of a decrypted frame, carried as the first plaintext
/// byte. Values 0x08..=0x3F are reserved for future protocol revisions and
/// are dropped silently by a conforming receiver rather than treated as an
/// error; 0x40 and above are unknown and fatal (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Control-plane message (channel create/destroy, input mask, rekey,
    /// handshake messages, binary-transfer control).
    Control = 0x00,
    /// Event-stream record (§4.4.1).
    Event = 0x01,
    /// Video frame header (§4.4.2).
    VideoHeader = 0x02,
    /// Video payload bytes, codec-specific (§4.4.2).
    VideoPayload = 0x03,
    /// Audio frame header (§4.4.3).
    AudioHeader = 0x04,
    /// Audio payload bytes (§4.4.3).
    AudioPayload = 0x05,
    /// Binary transfer header (§4.4.4).
    BlobHeader = 0x06,
    /// Binary transfer payload chunk (§4.4.4).
    BlobPayload = 0x07,
}

/// Highest frame type value currently assigned.
const MAX_KNOWN: u8 = FrameType::BlobPayload as u8;

/// Highest frame type value reserved for future protocol revisions.
/// Values in `(MAX_KNOWN, MAX_RESERVED]` are silently dropped, not errors.
const MAX_RESERVED: u8 = 0x3F;

impl FrameType {
    /// Convert from the wire byte.
    ///
    /// Returns `Ok(None)` for reserved-but-unassigned values (silently
    /// drop), and `Err` for values outside the reserved range entirely
    /// (fatal per §6).
    pub fn from_byte(byte: u8) -> Result<Option<Self>, ProtocolError> {
        let known = match byte {
            0x00 => Self::Control,
            0x01 => Self::Event,
            0x02 => Self::VideoHeader,
            0x03 => Self::VideoPayload,
            0x04 => Self::AudioHeader,
            0x05 => Self::AudioPayload,
            0x06 => Self::BlobHeader,
            0x07 => Self::BlobPayload,
            reserved if reserved <= MAX_RESERVED => return Ok(None),
            unknown => return Err(ProtocolError::UnknownFrameType(unknown)),
        };
        debug_assert!(byte <= MAX_KNOWN);
        Ok(Some(known))
    }

    /// Convert to the wire byte.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A decrypted frame: channel-routed bytes with a type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextFrame {
    /// Frame category.
    pub frame_type: FrameType,
    /// Destination/source channel id.
    pub channel: u8,
    /// Payload bytes, meaning depends on `frame_type` (see `payloads`).
    pub payload: Bytes,
}

impl PlaintextFrame {
    /// Build a new plaintext frame.
    #[must_use]
    pub fn new(frame_type: FrameType, channel: u8, payload: impl Into<Bytes>) -> Self {
        Self { frame_type, channel, payload: payload.into() }
    }

    /// Serialize to the `[type][channel][payload]` plaintext layout that
    /// gets encrypted into a [`crate::WirePacket`]'s ciphertext.
    #[must_use]
    pub fn to_plaintext_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.push(self.frame_type.to_byte());
        out.push(self.channel);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse from decrypted plaintext bytes.
    ///
    /// Returns `Ok(None)` if the type byte is in the silently-reserved
    /// range (§6): the caller should drop the frame without error.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 2 bytes are present.
    /// - `ProtocolError::UnknownFrameType` if the type byte is outside both
    ///   the known and reserved ranges.
    pub fn from_plaintext_bytes(bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if bytes.len() < 2 {
            return Err(ProtocolError::FrameTooShort { expected: 2, actual: bytes.len() });
        }

        let Some(frame_type) = FrameType::from_byte(bytes[0])? else {
            return Ok(None);
        };
        let channel = bytes[1];
        let payload = Bytes::copy_from_slice(&bytes[2..]);

        Ok(Some(Self { frame_type, channel, payload }))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn known_frame_type() -> impl Strategy<Value = FrameType> {
        prop_oneof![
            Just(FrameType::Control),
            Just(FrameType::Event),
            Just(FrameType::VideoHeader),
            Just(FrameType::VideoPayload),
            Just(FrameType::AudioHeader),
            Just(FrameType::AudioPayload),
            Just(FrameType::BlobHeader),
            Just(FrameType::BlobPayload),
        ]
    }

    proptest! {
        #[test]
        fn plaintext_frame_round_trip(
            frame_type in known_frame_type(),
            channel in any::<u8>(),
            payload in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let frame = PlaintextFrame::new(frame_type, channel, payload);
            let bytes = frame.to_plaintext_bytes();
            let decoded = PlaintextFrame::from_plaintext_bytes(&bytes)
                .expect("should parse")
                .expect("known type should not be silently dropped");
            prop_assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn reserved_range_is_dropped_not_errored() {
        let bytes = [0x20u8, 5];
        let result = FrameType::from_byte(bytes[0]);
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn unknown_range_is_fatal() {
        let result = FrameType::from_byte(0xFF);
        assert_eq!(result, Err(ProtocolError::UnknownFrameType(0xFF)));
    }

    #[test]
    fn rejects_too_short_plaintext() {
        let result = PlaintextFrame::from_plaintext_bytes(&[0x00]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort { .. })));
    }
}
