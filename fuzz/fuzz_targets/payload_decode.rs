//! Fuzz target for CBOR payload decoding (§4.1 inner framing, §4.4 headers).
//!
//! Feeds arbitrary bytes through `decode_cbor` for every payload type that
//! rides inside a `Control`, `Event`, `VideoHeader`, `AudioHeader`, or
//! `BlobHeader` frame. None of these should ever panic on malformed CBOR,
//! type confusion between variants, or oversized nested collections.

#![no_main]

use a12_proto::payloads::{decode_cbor, AudioHeader, BlobHeader, ControlMessage, EventRecord, VideoHeader};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_cbor::<ControlMessage>(data);
    let _ = decode_cbor::<EventRecord>(data);
    let _ = decode_cbor::<VideoHeader>(data);
    let _ = decode_cbor::<AudioHeader>(data);
    let _ = decode_cbor::<BlobHeader>(data);
});
