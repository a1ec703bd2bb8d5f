//! Binary transfer engine (§4.4.4).
//!
//! Supports sized (declared total up front) and streaming (unbounded until
//! an explicit [`a12_proto::ControlMessage::TransferEnd`]) transfers. Each
//! transfer is keyed by `(channel, stream_id)` (§3 `BinaryTransfer`). On
//! header arrival, a caller-supplied [`TransferHandler`] decides to accept
//! with a destination, defer (buffer until re-consulted), or reject. A
//! transfer may be cancelled at any byte boundary; cancellation never fires
//! completion and always releases whatever buffer or destination the
//! transfer held (§8 "binary cancellation").

use std::collections::HashMap;

use a12_proto::payloads::{BlobChunkMeta, BlobHeader, TransferSize};
use sha2::{Digest, Sha256};

use crate::error::StreamError;

/// Where accepted transfer bytes are written. Implementations typically
/// wrap a file descriptor; dropping a destination (e.g. on cancellation)
/// must release whatever resource it holds.
pub trait TransferDestination: Send {
    /// Write one chunk of received bytes.
    ///
    /// # Errors
    ///
    /// Any I/O failure writing to the underlying destination.
    fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()>;
}

/// The receiver's response to a transfer header, consulted on arrival and
/// (for `Defer`) again on every subsequent payload chunk until it returns
/// something other than `Defer`.
pub enum TransferDecision {
    /// Write payload directly to the given destination.
    Accept(Box<dyn TransferDestination>),
    /// Buffer payload until the handler is re-consulted.
    Defer,
    /// Reject the transfer; the engine emits `StreamError::NotAccepting`
    /// for this stream going forward and the caller should notify the peer
    /// with `ControlMessage::TransferReject`.
    Reject,
}

/// Decides how to handle an incoming binary transfer.
pub trait TransferHandler {
    /// Called once when a [`BlobHeader`] arrives, and again for a deferred
    /// transfer on every subsequent payload chunk until a non-`Defer`
    /// decision is returned.
    fn on_header(&mut self, channel: u8, header: &BlobHeader) -> TransferDecision;
}

/// Outcome of feeding one payload chunk to the engine.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More chunks are still expected.
    Pending,
    /// The transfer completed; its entry has been removed.
    Completed,
}

enum TransferState {
    Deferred { header: BlobHeader, buffered: Vec<u8> },
    Accepted { header: BlobHeader, destination: Box<dyn TransferDestination>, bytes_received: u64, hasher: Option<Sha256> },
    Rejected,
}

/// Tracks every in-flight binary transfer for one session, across all
/// channels.
#[derive(Default)]
pub struct BinaryTransferEngine {
    transfers: HashMap<(u8, u32), TransferState>,
}

impl BinaryTransferEngine {
    /// Creates an engine with no in-flight transfers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new transfer, consulting `handler` for the initial
    /// decision.
    pub fn begin(&mut self, channel: u8, header: BlobHeader, handler: &mut impl TransferHandler) {
        let stream_id = header.stream_id;
        let decision = handler.on_header(channel, &header);
        let state = match decision {
            TransferDecision::Accept(destination) => TransferState::Accepted {
                hasher: header.checksum.is_some().then(Sha256::new),
                header,
                destination,
                bytes_received: 0,
            },
            TransferDecision::Defer => TransferState::Deferred { header, buffered: Vec::new() },
            TransferDecision::Reject => TransferState::Rejected,
        };
        self.transfers.insert((channel, stream_id), state);
    }

    /// Feeds one payload chunk.
    ///
    /// # Errors
    ///
    /// `StreamError::UnknownStreamId` if no transfer matches `(channel,
    /// meta.stream_id)`. `StreamError::NotAccepting` if the transfer was
    /// rejected. `StreamError::OverLength` if the chunk overruns a sized
    /// transfer's declared size. `StreamError::ChecksumMismatch` if a sized
    /// transfer completes with a checksum that does not match the header.
    /// `StreamError::DestinationWrite` if writing to the destination fails.
    pub fn payload(
        &mut self,
        channel: u8,
        meta: BlobChunkMeta,
        chunk: &[u8],
        handler: &mut impl TransferHandler,
    ) -> Result<ChunkOutcome, StreamError> {
        let key = (channel, meta.stream_id);
        let Some(state) = self.transfers.get_mut(&key) else {
            return Err(StreamError::UnknownStreamId { channel, stream_id: meta.stream_id });
        };

        match state {
            TransferState::Rejected => Err(StreamError::NotAccepting {
                channel,
                stream_id: meta.stream_id,
                reason: "transfer was rejected".to_string(),
            }),
            TransferState::Deferred { .. } => {
                self.reconsult_deferred(channel, meta, chunk, handler)
            },
            TransferState::Accepted { .. } => self.write_accepted(channel, meta, chunk),
        }
    }

    fn reconsult_deferred(
        &mut self,
        channel: u8,
        meta: BlobChunkMeta,
        chunk: &[u8],
        handler: &mut impl TransferHandler,
    ) -> Result<ChunkOutcome, StreamError> {
        let key = (channel, meta.stream_id);
        // INVARIANT: `payload` just matched `state` as `Deferred` at this same key.
        #[allow(clippy::expect_used)]
        let TransferState::Deferred { header, mut buffered } = self.transfers.remove(&key).expect("checked by caller")
        else {
            unreachable!("reconsult_deferred only called for Deferred state")
        };
        buffered.extend_from_slice(chunk);

        match handler.on_header(channel, &header) {
            TransferDecision::Defer => {
                self.transfers.insert(key, TransferState::Deferred { header, buffered });
                Ok(ChunkOutcome::Pending)
            },
            TransferDecision::Reject => {
                self.transfers.insert(key, TransferState::Rejected);
                Ok(ChunkOutcome::Pending)
            },
            TransferDecision::Accept(mut destination) => {
                destination.write_chunk(&buffered).map_err(|err| StreamError::DestinationWrite {
                    channel,
                    stream_id: meta.stream_id,
                    message: err.to_string(),
                })?;
                let mut hasher = header.checksum.is_some().then(Sha256::new);
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&buffered);
                }
                let bytes_received = buffered.len() as u64;
                self.transfers.insert(
                    key,
                    TransferState::Accepted { header, destination, bytes_received, hasher },
                );
                self.finish_if_complete(channel, meta)
            },
        }
    }

    fn write_accepted(
        &mut self,
        channel: u8,
        meta: BlobChunkMeta,
        chunk: &[u8],
    ) -> Result<ChunkOutcome, StreamError> {
        let key = (channel, meta.stream_id);
        let Some(TransferState::Accepted { header, destination, bytes_received, hasher }) =
            self.transfers.get_mut(&key)
        else {
            unreachable!("write_accepted only called for Accepted state")
        };

        if let TransferSize::Sized(total) = header.size {
            if bytes_received.saturating_add(chunk.len() as u64) > total {
                return Err(StreamError::OverLength { channel, stream_id: meta.stream_id });
            }
        }

        destination.write_chunk(chunk).map_err(|err| StreamError::DestinationWrite {
            channel,
            stream_id: meta.stream_id,
            message: err.to_string(),
        })?;
        if let Some(hasher) = hasher.as_mut() {
            hasher.update(chunk);
        }
        *bytes_received += chunk.len() as u64;

        self.finish_if_complete(channel, meta)
    }

    /// A transfer is complete once its size is known and fully received
    /// (`remaining_bytes == 0` for sized transfers) or an explicit
    /// [`a12_proto::ControlMessage::TransferEnd`] arrives for a streaming
    /// one (see [`Self::end_streaming`]).
    fn finish_if_complete(&mut self, channel: u8, meta: BlobChunkMeta) -> Result<ChunkOutcome, StreamError> {
        let key = (channel, meta.stream_id);
        let is_sized_complete = matches!(
            self.transfers.get(&key),
            Some(TransferState::Accepted { header: BlobHeader { size: TransferSize::Sized(_), .. }, .. })
        ) && meta.remaining_bytes == 0;

        if !is_sized_complete {
            return Ok(ChunkOutcome::Pending);
        }
        self.complete(channel, meta.stream_id)
    }

    /// Explicitly ends a streaming transfer (§4.4.4), completing it.
    ///
    /// # Errors
    ///
    /// `StreamError::UnknownStreamId` if no such transfer is in flight.
    pub fn end_streaming(&mut self, channel: u8, stream_id: u32) -> Result<(), StreamError> {
        self.complete(channel, stream_id).map(|_| ())
    }

    fn complete(&mut self, channel: u8, stream_id: u32) -> Result<ChunkOutcome, StreamError> {
        let key = (channel, stream_id);
        let Some(state) = self.transfers.remove(&key) else {
            return Err(StreamError::UnknownStreamId { channel, stream_id });
        };
        let TransferState::Accepted { header, hasher, .. } = state else {
            return Err(StreamError::UnknownStreamId { channel, stream_id });
        };

        if let (Some(expected), Some(hasher)) = (header.checksum, hasher) {
            let digest: [u8; 32] = hasher.finalize().into();
            if digest != expected {
                return Err(StreamError::ChecksumMismatch { channel, stream_id });
            }
        }

        Ok(ChunkOutcome::Completed)
    }

    /// Cancels a transfer at any byte boundary (§4.4.4, §8 "binary
    /// cancellation"). The destination, if any, is dropped immediately and
    /// the completion outcome is never produced for this transfer.
    ///
    /// # Errors
    ///
    /// `StreamError::UnknownStreamId` if no such transfer is in flight.
    pub fn cancel(&mut self, channel: u8, stream_id: u32) -> Result<(), StreamError> {
        self.transfers.remove(&(channel, stream_id)).map(drop).ok_or(StreamError::UnknownStreamId {
            channel,
            stream_id,
        })
    }

    /// Number of in-flight transfers across all channels, for diagnostics
    /// and tests.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.transfers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    struct RejectAll;
    impl TransferHandler for RejectAll {
        fn on_header(&mut self, _channel: u8, _header: &BlobHeader) -> TransferDecision {
            TransferDecision::Reject
        }
    }

    fn sized_header(stream_id: u32, size: u64, checksum: Option<[u8; 32]>) -> BlobHeader {
        BlobHeader {
            stream_id,
            type_tag: a12_proto::payloads::BlobTypeTag::Generic,
            extension: None,
            size: TransferSize::Sized(size),
            checksum,
        }
    }

    #[test]
    fn sized_transfer_completes_on_remaining_zero() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        engine.begin(1, sized_header(1, 4, None), &mut handler);

        let outcome = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 2 }, &[1, 2], &mut handler)
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Pending);

        let outcome = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[3, 4], &mut handler)
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Completed);
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn checksum_mismatch_is_reported_on_completion() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        engine.begin(1, sized_header(1, 2, Some([0xAAu8; 32])), &mut handler);

        let err = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[1, 2], &mut handler)
            .unwrap_err();
        assert!(matches!(err, StreamError::ChecksumMismatch { channel: 1, stream_id: 1 }));
    }

    #[test]
    fn overlength_payload_is_rejected() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        engine.begin(1, sized_header(1, 2, None), &mut handler);

        let err = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[1, 2, 3], &mut handler)
            .unwrap_err();
        assert!(matches!(err, StreamError::OverLength { .. }));
    }

    #[test]
    fn unknown_stream_id_is_reported() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        let err = engine
            .payload(1, BlobChunkMeta { stream_id: 99, remaining_bytes: 0 }, &[1], &mut handler)
            .unwrap_err();
        assert!(matches!(err, StreamError::UnknownStreamId { channel: 1, stream_id: 99 }));
    }

    #[test]
    fn rejected_transfer_drops_further_payload() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = RejectAll;
        engine.begin(1, sized_header(1, 2, None), &mut handler);

        let err = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[1, 2], &mut handler)
            .unwrap_err();
        assert!(matches!(err, StreamError::NotAccepting { .. }));
    }

    #[test]
    fn cancellation_never_completes_and_frees_state() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        engine.begin(1, sized_header(1, 1024 * 1024, None), &mut handler);
        engine.payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 1000 }, &[0u8; 24], &mut handler).unwrap();

        engine.cancel(1, 1).unwrap();
        assert_eq!(engine.in_flight(), 0);

        let err = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[1], &mut handler)
            .unwrap_err();
        assert!(matches!(err, StreamError::UnknownStreamId { .. }));
    }

    #[test]
    fn streaming_transfer_completes_on_explicit_end() {
        let mut engine = BinaryTransferEngine::new();
        let mut handler = AcceptAll;
        let header = BlobHeader {
            stream_id: 2,
            type_tag: a12_proto::payloads::BlobTypeTag::Generic,
            extension: None,
            size: TransferSize::Unknown,
            checksum: None,
        };
        engine.begin(1, header, &mut handler);

        let outcome = engine
            .payload(1, BlobChunkMeta { stream_id: 2, remaining_bytes: 0 }, &[1, 2, 3], &mut handler)
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Pending);

        engine.end_streaming(1, 2).unwrap();
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn deferred_transfer_accepts_and_flushes_buffer_on_reconsult() {
        struct DeferThenAccept {
            calls: u32,
        }
        impl TransferHandler for DeferThenAccept {
            fn on_header(&mut self, _channel: u8, _header: &BlobHeader) -> TransferDecision {
                self.calls += 1;
                if self.calls == 1 {
                    TransferDecision::Defer
                } else {
                    TransferDecision::Accept(Box::new(VecDestination(Vec::new())))
                }
            }
        }

        let mut engine = BinaryTransferEngine::new();
        let mut handler = DeferThenAccept { calls: 0 };
        engine.begin(1, sized_header(1, 4, None), &mut handler);

        let outcome = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 2 }, &[1, 2], &mut handler)
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Pending);

        let outcome = engine
            .payload(1, BlobChunkMeta { stream_id: 1, remaining_bytes: 0 }, &[3, 4], &mut handler)
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Completed);
    }
}
