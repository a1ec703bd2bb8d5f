//! Audio stream engine (§4.4.3). Symmetric to [`crate::video`] but simpler:
//! no keyframe/priority concept, and only two codec tags.

use a12_proto::payloads::{AudioCodec, AudioHeader};

use crate::{error::StreamError, video::FrameAllocator};

/// Receives completed audio frames. Mirrors [`crate::video::VideoSink`]'s
/// allocator + sink split.
pub trait AudioSink {
    /// A packed-sample buffer is ready for playback/consumption.
    fn on_samples(&mut self, channel: u8, header: &AudioHeader, samples: Vec<u8>);
}

enum ChannelState {
    Idle,
    Assembling { header: AudioHeader, buffer: Vec<u8> },
}

/// Per-channel audio frame reassembler.
pub struct AudioAssembler {
    channel: u8,
    state: ChannelState,
}

impl AudioAssembler {
    /// Creates an assembler for the given channel, initially idle.
    #[must_use]
    pub fn new(channel: u8) -> Self {
        Self { channel, state: ChannelState::Idle }
    }

    /// Begins assembling a new audio frame, replacing any in-progress one.
    pub fn on_header(&mut self, header: AudioHeader) {
        let capacity = header.expected_bytes as usize;
        self.state = ChannelState::Assembling { header, buffer: Vec::with_capacity(capacity) };
    }

    /// Feeds one payload chunk. Returns `Ok(true)` once complete and
    /// delivered to `sink`.
    ///
    /// # Errors
    ///
    /// `StreamError::CodecMismatch` if no header is in progress.
    /// `StreamError::OverLength` if the chunk overruns `expected_bytes`.
    pub fn on_payload(
        &mut self,
        chunk: &[u8],
        allocator: &mut impl FrameAllocator,
        sink: &mut impl AudioSink,
    ) -> Result<bool, StreamError> {
        let ChannelState::Assembling { header, buffer } = &mut self.state else {
            return Err(StreamError::CodecMismatch {
                channel: self.channel,
                what: "audio payload arrived with no header in progress".to_string(),
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
        let _ = header.codec == AudioCodec::SimpleCompressed; // codec selection is the caller's decoding concern
        sink.on_samples(self.channel, &header, out);
        Ok(true)
    }

    /// True while assembly is in progress.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        matches!(self.state, ChannelState::Assembling { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::HeapAllocator;

    fn header(expected_bytes: u32) -> AudioHeader {
        AudioHeader {
            sample_rate: 48_000,
            channel_count: 2,
            sample_format: a12_proto::payloads::SampleFormat::S16Le,
            codec: AudioCodec::RawPacked,
            expected_bytes,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Vec<(u8, Vec<u8>)>,
    }

    impl AudioSink for RecordingSink {
        fn on_samples(&mut self, channel: u8, _header: &AudioHeader, samples: Vec<u8>) {
            self.delivered.push((channel, samples));
        }
    }

    #[test]
    fn assembles_across_multiple_chunks() {
        let mut assembler = AudioAssembler::new(4);
        let mut sink = RecordingSink::default();
        assembler.on_header(header(4));

        assert!(!assembler.on_payload(&[1, 2], &mut HeapAllocator, &mut sink).unwrap());
        assert!(assembler.on_payload(&[3, 4], &mut HeapAllocator, &mut sink).unwrap());
        assert_eq!(sink.delivered, vec![(4, vec![1, 2, 3, 4])]);
    }

    #[test]
    fn payload_before_header_is_rejected() {
        let mut assembler = AudioAssembler::new(1);
        let mut sink = RecordingSink::default();
        let err = assembler.on_payload(&[0], &mut HeapAllocator, &mut sink).unwrap_err();
        assert!(matches!(err, StreamError::CodecMismatch { .. }));
    }
}
