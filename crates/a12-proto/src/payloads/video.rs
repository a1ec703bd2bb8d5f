//! Video stream header (§4.4.2). Payload frames carry raw codec bytes and
//! have no CBOR structure of their own — the header fully describes how to
//! interpret the bytes that follow.

use serde::{Deserialize, Serialize};

/// Codec tag for a video transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    /// Raw packed pixels, no compression.
    RawPacked,
    /// Lossless delta codec (frame-to-frame difference encoding).
    LosslessDelta,
    /// Pass-through: sender-provided pre-encoded bitstream, opaque to the
    /// transport.
    PassThrough,
}

/// Priority hint a producer may attach to a video payload frame so the
/// channel multiplexer's scheduler (§4.3) can favor keyframes over deltas
/// within the video class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VideoPriority {
    /// Ordinary delta/inter frame.
    Normal,
    /// Keyframe/intra frame; scheduled ahead of `Normal` within the video
    /// class only.
    Keyframe,
}

/// Header frame preceding a run of video payload frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHeader {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Row stride in bytes (may exceed `width * bytes_per_pixel` due to
    /// padding).
    pub stride: u32,
    /// Pixel format tag (implementation-defined small integer; interpreted
    /// by the caller-supplied sink).
    pub pixel_format: u8,
    /// Codec used for the following payload frames.
    pub codec: VideoCodec,
    /// Monotonic per-channel video frame sequence number.
    pub frame_sequence: u64,
    /// True if this frame is independently decodable.
    pub keyframe: bool,
    /// Scheduling priority hint for the payload frames that follow.
    pub priority: VideoPriority,
    /// Total payload bytes to expect across the following payload frames.
    pub expected_bytes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = VideoHeader {
            width: 1920,
            height: 1080,
            stride: 1920 * 4,
            pixel_format: 0,
            codec: VideoCodec::LosslessDelta,
            frame_sequence: 42,
            keyframe: true,
            priority: VideoPriority::Keyframe,
            expected_bytes: 1920 * 1080 * 4,
        };

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&header, &mut buf).unwrap();
        let decoded: VideoHeader = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn keyframe_outranks_normal() {
        assert!(VideoPriority::Keyframe > VideoPriority::Normal);
    }
}
