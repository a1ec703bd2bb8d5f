//! Fuzz target for `BinaryTransferEngine` (§4.4.4, §8 "binary cancellation").
//!
//! Drives the engine with an arbitrary sequence of header/payload/cancel
//! operations across a handful of channel/stream-id pairs, including sizes
//! and `remaining_bytes` values that disagree with actual chunk lengths.
//! The engine must only ever answer with a typed `StreamError`, never
//! panic, over- or under-count bytes into a completion it didn't earn, or
//! fire completion for a cancelled transfer.

#![no_main]

use a12_proto::payloads::{BlobChunkMeta, BlobHeader, BlobTypeTag, TransferSize};
use a12_streams::binary::{BinaryTransferEngine, TransferDecision, TransferDestination, TransferHandler};
use libfuzzer_sys::{arbitrary, fuzz_target};

struct SinkHole;
impl TransferDestination for SinkHole {
    fn write_chunk(&mut self, _data: &[u8]) -> std::io::Result<()> {
        Ok(())
    }
}

struct CyclingHandler {
    decisions: Vec<u8>,
    next: usize,
}

impl TransferHandler for CyclingHandler {
    fn on_header(&mut self, _channel: u8, _header: &BlobHeader) -> TransferDecision {
        let choice = self.decisions.get(self.next % self.decisions.len().max(1)).copied().unwrap_or(0);
        self.next += 1;
        match choice % 3 {
            0 => TransferDecision::Accept(Box::new(SinkHole)),
            1 => TransferDecision::Defer,
            _ => TransferDecision::Reject,
        }
    }
}

#[derive(Debug, arbitrary::Arbitrary)]
enum Op {
    Begin { channel: u8, stream_id: u32, sized: bool, size: u16, checksum: [u8; 32] },
    Payload { channel: u8, stream_id: u32, remaining: u16, chunk: Vec<u8> },
    Cancel { channel: u8, stream_id: u32 },
}

#[derive(Debug, arbitrary::Arbitrary)]
struct Input {
    ops: Vec<Op>,
    decisions: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut engine = BinaryTransferEngine::new();
    let mut handler = CyclingHandler { decisions: input.decisions, next: 0 };

    for op in input.ops {
        match op {
            Op::Begin { channel, stream_id, sized, size, checksum } => {
                let header = BlobHeader {
                    stream_id,
                    type_tag: BlobTypeTag::Generic,
                    extension: None,
                    size: if sized { TransferSize::Sized(u64::from(size)) } else { TransferSize::Unknown },
                    checksum: sized.then_some(checksum),
                };
                engine.begin(channel, header, &mut handler);
            },
            Op::Payload { channel, stream_id, remaining, chunk } => {
                let meta = BlobChunkMeta { stream_id, remaining_bytes: u64::from(remaining) };
                let _ = engine.payload(channel, meta, &chunk, &mut handler);
            },
            Op::Cancel { channel, stream_id } => {
                let _ = engine.cancel(channel, stream_id);
            },
        }
    }

    assert!(engine.in_flight() <= u16::MAX as usize, "transfer table grew unboundedly");
});
