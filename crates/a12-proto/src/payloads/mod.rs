//! CBOR-encoded message bodies, one module per frame type.
//!
//! The outer framing (§4.1) fixes only `[type: u8][channel: u8]`; everything
//! after that is this module's concern. Control and Event frames carry a
//! fully self-describing CBOR value. Video/Audio header frames carry a CBOR
//! struct; their payload frames carry raw bytes plus (for blobs) a small
//! CBOR chunk-metadata prefix, since re-encoding media bytes through CBOR
//! would defeat the point of a zero-copy payload path.

pub mod audio;
pub mod blob;
pub mod control;
pub mod event;
pub mod video;

pub use audio::{AudioCodec, AudioHeader, SampleFormat};
pub use blob::{BlobChunkMeta, BlobHeader, BlobTypeTag, TransferSize};
pub use control::{ControlMessage, HandshakeHello};
pub use event::{EventRecord, MultipartFragment, MAX_EVENT_DATA, MAX_MULTIPART_BUDGET};
pub use video::{VideoCodec, VideoHeader, VideoPriority};

use crate::errors::{ProtocolError, Result};

/// Encode a CBOR-serializable value into a byte vector.
///
/// # Errors
///
/// `ProtocolError::CborEncode` if serialization fails.
pub fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR-serializable value from bytes.
///
/// # Errors
///
/// `ProtocolError::CborDecode` if deserialization fails.
pub fn decode_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
