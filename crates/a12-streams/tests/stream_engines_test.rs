//! Cross-engine scenarios: a channel's video/audio/binary/event state is
//! independent of activity on other channels (§4.4.2 "accept partial
//! deliveries interrupted by control or higher-priority frames without
//! losing sync").

use a12_proto::payloads::{
    AudioCodec, AudioHeader, BlobChunkMeta, BlobHeader, BlobTypeTag, EventRecord, SampleFormat, TransferSize,
    VideoCodec, VideoHeader, VideoPriority,
};
use a12_streams::{
    binary::{TransferDecision, TransferDestination, TransferHandler},
    AudioAssembler, AudioSink, BinaryTransferEngine, ChunkOutcome, EventAssembler, HeapAllocator, VideoAssembler,
    VideoSink,
};

#[derive(Default)]
struct Sinks {
    raw_video: Vec<(u8, Vec<u8>)>,
    audio: Vec<(u8, Vec<u8>)>,
}

impl VideoSink for Sinks {
    fn on_raw_frame(&mut self, channel: u8, _header: &VideoHeader, pixels: Vec<u8>) {
        self.raw_video.push((channel, pixels));
    }
    fn on_encoded_frame(&mut self, _channel: u8, _header: &VideoHeader, _payload: Vec<u8>) {}
}

impl AudioSink for Sinks {
    fn on_samples(&mut self, channel: u8, _header: &AudioHeader, samples: Vec<u8>) {
        self.audio.push((channel, samples));
    }
}

struct VecDestination(Vec<u8>);
impl TransferDestination for VecDestination {
    fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.0.extend_from_slice(data);
        Ok(())
    }
}

struct AcceptAll;
impl TransferHandler for AcceptAll {
    fn on_header(&mut self, _channel: u8, _header: &BlobHeader) -> TransferDecision {
        TransferDecision::Accept(Box::new(VecDestination(Vec::new())))
    }
}

#[test]
fn interleaved_video_audio_and_binary_do_not_cross_contaminate() {
    let mut video = VideoAssembler::new(1);
    let mut audio = AudioAssembler::new(2);
    let mut binary = BinaryTransferEngine::new();
    let mut handler = AcceptAll;
    let mut sinks = Sinks::default();

    video.on_header(VideoHeader {
        width: 2,
        height: 2,
        stride: 8,
        pixel_format: 0,
        codec: VideoCodec::RawPacked,
        frame_sequence: 1,
        keyframe: true,
        priority: VideoPriority::Keyframe,
        expected_bytes: 4,
    });
    assert!(!video.on_payload(&[1, 2], &mut HeapAllocator, &mut sinks).unwrap());

    // A control-channel-priority binary transfer starts and makes progress
    // interleaved with the still-incomplete video frame above.
    binary.begin(
        3,
        BlobHeader {
            stream_id: 9,
            type_tag: BlobTypeTag::Cache,
            extension: None,
            size: TransferSize::Sized(2),
            checksum: None,
        },
        &mut handler,
    );
    let outcome = binary
        .payload(3, BlobChunkMeta { stream_id: 9, remaining_bytes: 0 }, &[0xAA, 0xBB], &mut handler)
        .unwrap();
    assert_eq!(outcome, ChunkOutcome::Completed);

    // Audio on a third channel also interleaves cleanly.
    audio.on_header(AudioHeader {
        sample_rate: 44_100,
        channel_count: 1,
        sample_format: SampleFormat::S16Le,
        codec: AudioCodec::RawPacked,
        expected_bytes: 2,
    });
    assert!(audio.on_payload(&[5, 6], &mut HeapAllocator, &mut sinks).unwrap());

    // The original video frame resumes and completes untouched by the
    // intervening binary/audio traffic.
    assert!(video.on_payload(&[3, 4], &mut HeapAllocator, &mut sinks).unwrap());

    assert_eq!(sinks.raw_video, vec![(1, vec![1, 2, 3, 4])]);
    assert_eq!(sinks.audio, vec![(2, vec![5, 6])]);
}

#[test]
fn multipart_event_survives_other_channel_activity() {
    let mut events = EventAssembler::new();
    assert!(events.ingest(4, EventRecord::fragment(1, 1, b"par".to_vec(), 1, false)).unwrap().is_none());

    // Unrelated single-shot event on the same channel does not disturb the
    // pending multipart run.
    events.ingest(4, EventRecord::new(9, 9, vec![0])).unwrap();

    let delivered = events.ingest(4, EventRecord::fragment(1, 1, b"t".to_vec(), 1, true)).unwrap().unwrap();
    assert_eq!(delivered.data, b"part");
}
