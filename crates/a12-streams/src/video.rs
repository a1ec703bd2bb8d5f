//! Video stream engine (§4.4.2).
//!
//! A transfer is one [`VideoHeader`] frame followed by N payload frames of
//! codec-specific bytes. State is `(expected_bytes, bytes_received, buffer)`
//! per channel, exactly as specified — interleaved control or
//! higher-priority frames on *other* channels never touch this state, so a
//! transfer survives being interrupted without losing sync.
//!
//! Delivery happens through a caller-supplied [`FrameAllocator`] (so the
//! consumer controls where frame memory comes from) and a caller-supplied
//! [`VideoSink`] (so the consumer decides what happens with a completed
//! frame) rather than this engine owning either concern.

use a12_proto::payloads::{VideoCodec, VideoHeader};

use crate::error::StreamError;

/// Allocates buffers for completed stream payloads. Implementations may
/// pool, pre-size, or allocate from an arena; the default just defers to
/// `Vec::with_capacity`.
pub trait FrameAllocator {
    /// Allocate a zeroed (or otherwise consumer-defined) buffer of `len`
    /// bytes to receive a completed frame's payload.
    fn allocate(&mut self, len: usize) -> Vec<u8>;
}

/// The default allocator: a plain heap `Vec`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl FrameAllocator for HeapAllocator {
    fn allocate(&mut self, len: usize) -> Vec<u8> {
        vec![0u8; len]
    }
}

/// Receives completed video frames.
pub trait VideoSink {
    /// A raw (uncompressed or losslessly delta-coded) pixel buffer is ready.
    fn on_raw_frame(&mut self, channel: u8, header: &VideoHeader, pixels: Vec<u8>);

    /// A pre-encoded (pass-through) bitstream payload is ready for
    /// downstream processing, opaque to this engine.
    fn on_encoded_frame(&mut self, channel: u8, header: &VideoHeader, payload: Vec<u8>);
}

enum ChannelState {
    Idle,
    Assembling { header: VideoHeader, buffer: Vec<u8> },
}

/// Per-channel video frame reassembler (one instance per session, keyed
/// internally by channel id via [`VideoAssembler::channel_mut`]).
pub struct VideoAssembler {
    channel: u8,
    state: ChannelState,
}

impl VideoAssembler {
    /// Creates an assembler for the given channel, initially idle.
    #[must_use]
    pub fn new(channel: u8) -> Self {
        Self { channel, state: ChannelState::Idle }
    }

    /// Begins assembling a new frame. Replaces any in-progress assembly —
    /// the protocol does not promise a prior transfer completed before a
    /// new header arrives (e.g. after a stream-scoped error dropped it).
    pub fn on_header(&mut self, header: VideoHeader) {
        let capacity = header.expected_bytes as usize;
        self.state = ChannelState::Assembling { header, buffer: Vec::with_capacity(capacity) };
    }

    /// Feeds one payload frame's bytes. Returns `Ok(true)` once the frame
    /// is complete and has been delivered to `sink`, `Ok(false)` if more
    /// payload frames are still expected.
    ///
    /// # Errors
    ///
    /// `StreamError::CodecMismatch` if no header is currently being
    /// assembled on this channel. `StreamError::OverLength` if this chunk
    /// would push `bytes_received` past the header's `expected_bytes`.
    pub fn on_payload(
        &mut self,
        chunk: &[u8],
        allocator: &mut impl FrameAllocator,
        sink: &mut impl VideoSink,
    ) -> Result<bool, StreamError> {
        let ChannelState::Assembling { header, buffer } = &mut self.state else {
            return Err(StreamError::CodecMismatch {
                channel: self.channel,
                what: "video payload arrived with no header in progress".to_string(),
            });
        };

        let expected = header.expected_bytes as usize;
        if buffer.len().saturating_add(chunk.len()) > expected {
            return Err(StreamError::OverLength { channel: self.channel, stream_id: 0 });
        }
        buffer.extend_from_slice(chunk);

        if buffer.len() < expected {
            return Ok(false);
        }

        let ChannelState::Assembling { header, buffer } = std::mem::replace(&mut self.state, ChannelState::Idle)
        else {
            unreachable!("matched Assembling above")
        };

        let mut out = allocator.allocate(buffer.len());
        out.copy_from_slice(&buffer);

        match header.codec {
            VideoCodec::RawPacked | VideoCodec::LosslessDelta => sink.on_raw_frame(self.channel, &header, out),
            VideoCodec::PassThrough => sink.on_encoded_frame(self.channel, &header, out),
        }

        Ok(true)
    }

    /// True while a header has been seen but payload assembly has not yet
    /// completed.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        matches!(self.state, ChannelState::Assembling { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(expected_bytes: u32, codec: VideoCodec) -> VideoHeader {
        VideoHeader {
            width: 4,
            height: 4,
            stride: 16,
            pixel_format: 0,
            codec,
            frame_sequence: 1,
            keyframe: true,
            priority: a12_proto::payloads::VideoPriority::Keyframe,
            expected_bytes,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        raw: Vec<(u8, Vec<u8>)>,
        encoded: Vec<(u8, Vec<u8>)>,
    }

    impl VideoSink for RecordingSink {
        fn on_raw_frame(&mut self, channel: u8, _header: &VideoHeader, pixels: Vec<u8>) {
            self.raw.push((channel, pixels));
        }

        fn on_encoded_frame(&mut self, channel: u8, _header: &VideoHeader, payload: Vec<u8>) {
            self.encoded.push((channel, payload));
        }
    }

    #[test]
    fn payload_without_header_is_codec_mismatch() {
        let mut assembler = VideoAssembler::new(2);
        let mut sink = RecordingSink::default();
        let err = assembler.on_payload(b"x", &mut HeapAllocator, &mut sink).unwrap_err();
        assert!(matches!(err, StreamError::CodecMismatch { channel: 2, .. }));
    }

    #[test]
    fn raw_frame_delivers_once_fully_received() {
        let mut assembler = VideoAssembler::new(1);
        let mut sink = RecordingSink::default();
        assembler.on_header(header(6, VideoCodec::RawPacked));

        assert!(!assembler.on_payload(b"abc", &mut HeapAllocator, &mut sink).unwrap());
        assert!(assembler.in_progress());
        assert!(assembler.on_payload(b"def", &mut HeapAllocator, &mut sink).unwrap());
        assert!(!assembler.in_progress());

        assert_eq!(sink.raw, vec![(1, b"abcdef".to_vec())]);
        assert!(sink.encoded.is_empty());
    }

    #[test]
    fn pass_through_codec_delivers_as_encoded() {
        let mut assembler = VideoAssembler::new(1);
        let mut sink = RecordingSink::default();
        assembler.on_header(header(3, VideoCodec::PassThrough));
        assert!(assembler.on_payload(b"xyz", &mut HeapAllocator, &mut sink).unwrap());
        assert_eq!(sink.encoded, vec![(1, b"xyz".to_vec())]);
    }

    #[test]
    fn overlength_payload_is_rejected() {
        let mut assembler = VideoAssembler::new(1);
        let mut sink = RecordingSink::default();
        assembler.on_header(header(2, VideoCodec::RawPacked));
        let err = assembler.on_payload(b"abc", &mut HeapAllocator, &mut sink).unwrap_err();
        assert!(matches!(err, StreamError::OverLength { .. }));
    }

    #[test]
    fn new_header_replaces_in_progress_assembly() {
        let mut assembler = VideoAssembler::new(1);
        let mut sink = RecordingSink::default();
        assembler.on_header(header(10, VideoCodec::RawPacked));
        assembler.on_payload(b"abc", &mut HeapAllocator, &mut sink).unwrap();

        assembler.on_header(header(2, VideoCodec::RawPacked));
        assert!(assembler.on_payload(b"hi", &mut HeapAllocator, &mut sink).unwrap());
        assert_eq!(sink.raw, vec![(1, b"hi".to_vec())]);
    }
}
