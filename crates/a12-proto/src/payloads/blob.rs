//! Binary transfer framing (§4.4.4).
//!
//! A transfer is one `BlobHeader` frame followed by zero or more
//! `BlobPayload` frames. Payload frames carry `{stream_id,
//! remaining_bytes}` as a small CBOR prefix so either side can tell when
//! the transfer is complete without tracking state purely out-of-band; the
//! rest of the payload frame's bytes are the raw chunk.

use serde::{Deserialize, Serialize};

/// What kind of artifact a transfer carries. Used by duplicate detection
/// and by the directory controller to route completed transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobTypeTag {
    /// Opaque application state blob.
    StateBlob,
    /// Font resource.
    Font,
    /// Packaged appl bundle (§6).
    ApplArchive,
    /// Unclassified binary blob.
    Generic,
    /// Cache artifact, eligible for duplicate short-circuiting.
    Cache,
}

/// Declared size of a transfer. `Unknown` marks a streaming transfer with
/// no declared total (§4.4.4 "streaming" mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferSize {
    /// Total byte count is known up front (sized transfer).
    Sized(u64),
    /// Unbounded until an explicit end (streaming transfer).
    Unknown,
}

/// Header frame opening a binary transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Stream id, scoped to the channel; identifies this transfer alongside
    /// the channel id for the lifetime of the transfer.
    pub stream_id: u32,
    /// Artifact kind.
    pub type_tag: BlobTypeTag,
    /// Filename extension, if any (e.g. `"png"`).
    pub extension: Option<String>,
    /// Declared size.
    pub size: TransferSize,
    /// Checksum for a sized transfer, used for integrity and duplicate
    /// detection. `None` for streaming transfers.
    pub checksum: Option<[u8; 32]>,
}

/// Per-chunk metadata preceding the raw bytes of a payload frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobChunkMeta {
    /// Stream id this chunk belongs to.
    pub stream_id: u32,
    /// Bytes remaining after this chunk, for sized transfers. Always 0 for
    /// streaming transfers (the receiver instead watches for an explicit
    /// end-of-stream control message).
    pub remaining_bytes: u64,
}
