//! Stream-scoped errors (§7 tier 2).
//!
//! Every variant here is reported as an error event on the channel that
//! produced it; the channel and the session both survive. Terminal (tier 1)
//! errors that end the whole session live in `a12_core::SessionError`.

use thiserror::Error;

/// Errors raised by the C4 stream engines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A multipart event run exceeded the per-channel reassembly budget
    /// (§4.4.1) before a terminator fragment arrived.
    #[error("multipart run {run_id} on channel {channel} exceeded the {budget}-byte budget")]
    MultipartOverrun {
        /// Channel the run belonged to.
        channel: u8,
        /// Multipart run identifier.
        run_id: u32,
        /// Configured budget in bytes.
        budget: usize,
    },

    /// A payload frame arrived for a video/audio/blob assembly that was not
    /// in progress, or whose header declared a different codec/size.
    #[error("channel {channel}: {what}")]
    CodecMismatch {
        /// Channel the mismatch occurred on.
        channel: u8,
        /// Human-readable description of the mismatch.
        what: String,
    },

    /// A sized binary transfer's checksum did not match the declared value
    /// once all bytes were received.
    #[error("transfer {stream_id} on channel {channel}: checksum mismatch")]
    ChecksumMismatch {
        /// Channel the transfer is on.
        channel: u8,
        /// Stream id within the channel.
        stream_id: u32,
    },

    /// A payload or control frame referenced a `(channel, stream_id)` with
    /// no known in-flight transfer.
    #[error("unknown binary transfer stream {stream_id} on channel {channel}")]
    UnknownStreamId {
        /// Channel the frame was on.
        channel: u8,
        /// Stream id that was not recognized.
        stream_id: u32,
    },

    /// More payload bytes arrived than the header's `expected_bytes`/`size`
    /// declared.
    #[error("transfer {stream_id} on channel {channel}: received more bytes than declared")]
    OverLength {
        /// Channel the transfer is on.
        channel: u8,
        /// Stream id within the channel.
        stream_id: u32,
    },

    /// The transfer handler rejected a header, or a payload chunk arrived
    /// for a transfer that was already rejected/cancelled/completed.
    #[error("transfer {stream_id} on channel {channel} is not accepting payload: {reason}")]
    NotAccepting {
        /// Channel the transfer is on.
        channel: u8,
        /// Stream id within the channel.
        stream_id: u32,
        /// Why the transfer cannot accept more bytes.
        reason: String,
    },

    /// Writing a received chunk to its destination failed.
    #[error("transfer {stream_id} on channel {channel}: destination write failed: {message}")]
    DestinationWrite {
        /// Channel the transfer is on.
        channel: u8,
        /// Stream id within the channel.
        stream_id: u32,
        /// Underlying I/O error, stringified (kept `Clone`/`Eq`-friendly).
        message: String,
    },
}
