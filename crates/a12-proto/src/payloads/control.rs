//! Control-plane messages carried in `FrameType::Control` frames.
//!
//! Every variant here is CBOR-encoded on the wire (§4.1's inner framing only
//! fixes the `[type][channel]` prefix raw; everything after that is
//! implementation-defined, and CBOR was picked for self-describing,
//! forward-compatible payloads).

use serde::{Deserialize, Serialize};

/// A control message. The frame's `channel` byte addresses channel-scoped
/// variants (`ChannelDestroy`, `InputMask`, transfer control); session-scoped
/// variants (handshake, rekey) are always sent on channel 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    /// First message of the handshake (§4.2 step 1).
    HandshakeHello(HandshakeHello),
    /// Authentication tag over the transcript, sent under the new keys
    /// (§4.2 step 4).
    HandshakeAuthTag {
        /// Tag bytes.
        tag: Vec<u8>,
    },
    /// Request a new logical channel (§4.3).
    ChannelOpen {
        /// Proposed channel id.
        proposed_id: u8,
    },
    /// Response to `ChannelOpen`.
    ChannelOpenAck {
        /// Channel id from the request.
        channel_id: u8,
        /// Whether the allocator accepted it.
        accepted: bool,
    },
    /// Destroy an existing channel.
    ChannelDestroy {
        /// Channel id to tear down.
        channel_id: u8,
    },
    /// Set the inbound device-type and data-type masks for a channel
    /// (§4.3 input masking).
    InputMask {
        /// Channel the mask applies to.
        channel_id: u8,
        /// Device-type bitmask; matching inbound device events are dropped.
        device_mask: u32,
        /// Data-type bitmask; matching inbound data frames are dropped.
        data_mask: u32,
    },
    /// Sender announces intent to rekey once `bytes_sent` exceeds the
    /// configured limit (§4.1 rekey).
    RekeyRequest {
        /// Fresh ephemeral x25519 public key.
        ephemeral_public: [u8; 32],
    },
    /// Peer's rekey response, completing the exchange.
    RekeyAck {
        /// Fresh ephemeral x25519 public key.
        ephemeral_public: [u8; 32],
    },
    /// Cancel a binary transfer at any byte boundary (§4.4.4).
    TransferCancel {
        /// Stream id within the channel.
        stream_id: u32,
    },
    /// Explicit end-of-stream for a streaming (unknown-size) binary
    /// transfer (§4.4.4); sized transfers instead complete implicitly once
    /// `remaining_bytes` reaches zero.
    TransferEnd {
        /// Stream id within the channel.
        stream_id: u32,
    },
    /// Sent by the receiver to notify the sender that a transfer header was
    /// rejected and it should cease transmission (§4.4.4).
    TransferReject {
        /// Stream id within the channel.
        stream_id: u32,
    },
    /// Session-level keepalive.
    Ping,
    /// Reply to `Ping`.
    Pong,
    /// Graceful session teardown notice.
    Goodbye {
        /// Human-readable reason, logged but not otherwise interpreted.
        reason: String,
    },
}

/// Handshake hello (§4.2 step 1). Sent by both sides, direction-symmetric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeHello {
    /// Protocol version this side speaks.
    pub version: u8,
    /// Sender's long-term x25519 public key.
    pub long_term_public: [u8; 32],
    /// Sender's ephemeral x25519 public key for this handshake.
    pub ephemeral_public: [u8; 32],
    /// Random challenge, included in the signed transcript.
    pub challenge: [u8; 32],
    /// Optional preshared-secret tag identifying which shared secret to use.
    pub preshared_tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &ControlMessage) {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(msg, &mut buf).expect("should encode");
        let decoded: ControlMessage =
            ciborium::de::from_reader(buf.as_slice()).expect("should decode");
        assert_eq!(&decoded, msg);
    }

    #[test]
    fn handshake_hello_round_trips() {
        round_trip(&ControlMessage::HandshakeHello(HandshakeHello {
            version: 1,
            long_term_public: [1u8; 32],
            ephemeral_public: [2u8; 32],
            challenge: [3u8; 32],
            preshared_tag: Some("tag-a".to_string()),
        }));
    }

    #[test]
    fn channel_messages_round_trip() {
        round_trip(&ControlMessage::ChannelOpen { proposed_id: 3 });
        round_trip(&ControlMessage::ChannelOpenAck { channel_id: 3, accepted: true });
        round_trip(&ControlMessage::ChannelDestroy { channel_id: 3 });
        round_trip(&ControlMessage::InputMask { channel_id: 1, device_mask: 0xFF, data_mask: 0 });
    }

    #[test]
    fn rekey_messages_round_trip() {
        round_trip(&ControlMessage::RekeyRequest { ephemeral_public: [9u8; 32] });
        round_trip(&ControlMessage::RekeyAck { ephemeral_public: [8u8; 32] });
    }

    #[test]
    fn transfer_control_messages_round_trip() {
        round_trip(&ControlMessage::TransferCancel { stream_id: 4 });
        round_trip(&ControlMessage::TransferEnd { stream_id: 4 });
        round_trip(&ControlMessage::TransferReject { stream_id: 4 });
    }

    #[test]
    fn ping_pong_and_goodbye_round_trip() {
        round_trip(&ControlMessage::Ping);
        round_trip(&ControlMessage::Pong);
        round_trip(&ControlMessage::Goodbye { reason: "client closed".to_string() });
    }
}
