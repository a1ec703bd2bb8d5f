//! A12 wire protocol.
//!
//! Two layers, matching §4.1:
//!
//! - [`WirePacket`]: the bit-exact outer framing (`length`, `sequence`,
//!   `mac`, `ciphertext`). Pure byte slicing, no cryptography.
//! - [`PlaintextFrame`]: what the ciphertext decrypts to (`type`, `channel`,
//!   `payload`). The `payloads` module defines the CBOR/raw structure of
//!   `payload` for each [`FrameType`].
//!
//! Encryption, MAC computation, and sequence-number bookkeeping are session
//! state and live in `a12-core`/`a12-crypto`, not here — this crate only
//! knows how to pack and unpack bytes.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod payloads;
pub mod wire;

pub use errors::ProtocolError;
pub use frame::{FrameType, PlaintextFrame};
pub use payloads::{
    AudioCodec, AudioHeader, BlobChunkMeta, BlobHeader, BlobTypeTag, ControlMessage, EventRecord,
    HandshakeHello, MultipartFragment, SampleFormat, TransferSize, VideoCodec, VideoHeader,
    VideoPriority,
};
pub use wire::{WirePacket, MAX_CIPHERTEXT_LEN, PREFIX_LEN};
