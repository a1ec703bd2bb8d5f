//! Audio stream header (§4.4.3), symmetric to video but simpler: no codec
//! selection beyond raw and a simple compression tag.

use serde::{Deserialize, Serialize};

/// Sample packing for an audio transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    /// Raw packed samples, no compression.
    RawPacked,
    /// Simple (implementation-defined) lossless compression.
    SimpleCompressed,
}

/// Sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian PCM.
    S16Le,
    /// 32-bit IEEE float.
    F32,
}

/// Header frame preceding a run of audio payload frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioHeader {
    /// Samples per second.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channel_count: u8,
    /// Per-sample format.
    pub sample_format: SampleFormat,
    /// Codec for the following payload frames.
    pub codec: AudioCodec,
    /// Total payload bytes to expect across the following payload frames.
    pub expected_bytes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = AudioHeader {
            sample_rate: 48_000,
            channel_count: 2,
            sample_format: SampleFormat::S16Le,
            codec: AudioCodec::RawPacked,
            expected_bytes: 48_000 * 2 * 2,
        };

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&header, &mut buf).unwrap();
        let decoded: AudioHeader = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }
}
