//! Fuzz target exercising a full A12 send/ingest round trip under bit
//! corruption (§8 "MAC correctness" / "replay rejection").
//!
//! Builds one real frame from the fuzz input, sends it through a codec
//! keyed identically to a peer codec, flips bytes the fuzzer chose to
//! corrupt, and feeds the (possibly corrupted) wire bytes to the peer.
//! Corruption must surface as a `SessionError`, never a panic; uncorrupted
//! bytes must always decode back to the original frame.

#![no_main]

use a12_core::codec::PacketCodec;
use a12_core::keycontext::KeyContext;
use a12_crypto::{KeyPair, SessionKey};
use a12_proto::{FrameType, PlaintextFrame};
use libfuzzer_sys::{arbitrary, fuzz_target};

#[derive(Debug, arbitrary::Arbitrary)]
struct Input {
    frame_type: u8,
    channel: u8,
    payload: Vec<u8>,
    flip_byte_index: usize,
    flip_mask: u8,
    corrupt: bool,
}

fn paired_codecs() -> (PacketCodec, PacketCodec) {
    let a_identity = KeyPair::from_secret_bytes([3u8; 32]);
    let b_identity = KeyPair::from_secret_bytes([4u8; 32]);
    let mut a_keys = KeyContext::new(a_identity, a12_core::keycontext::DEFAULT_REKEY_BYTES_LIMIT);
    let mut b_keys = KeyContext::new(b_identity, a12_core::keycontext::DEFAULT_REKEY_BYTES_LIMIT);
    a_keys.install_keys(SessionKey::new([9u8; 32]), SessionKey::new([8u8; 32]));
    b_keys.install_keys(SessionKey::new([8u8; 32]), SessionKey::new([9u8; 32]));
    (PacketCodec::new(a_keys), PacketCodec::new(b_keys))
}

fuzz_target!(|input: Input| {
    let frame_type = match input.frame_type % 8 {
        0 => FrameType::Control,
        1 => FrameType::Event,
        2 => FrameType::VideoHeader,
        3 => FrameType::VideoPayload,
        4 => FrameType::AudioHeader,
        5 => FrameType::AudioPayload,
        6 => FrameType::BlobHeader,
        _ => FrameType::BlobPayload,
    };
    let frame = PlaintextFrame::new(frame_type, input.channel, input.payload.clone());

    let (mut sender, mut receiver) = paired_codecs();
    let Ok(mut wire) = sender.send(&frame) else { return };

    if input.corrupt && !wire.is_empty() {
        let idx = input.flip_byte_index % wire.len();
        wire[idx] ^= input.flip_mask.max(1);
    }

    match receiver.ingest(&wire) {
        Ok((frames, _)) => {
            if !input.corrupt {
                assert_eq!(frames, vec![frame]);
            }
        },
        Err(_) => {
            // Corruption surfacing as a terminal error is the expected
            // outcome; an uncorrupted frame should never land here.
            assert!(input.corrupt, "uncorrupted frame failed to decode");
        },
    }
});
