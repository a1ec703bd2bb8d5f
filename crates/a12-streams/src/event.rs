//! Event stream engine (§4.4.1).
//!
//! Events are opaque fixed-size-in-spirit records, reliable and ordered per
//! channel (the channel table already guarantees in-order delivery; this
//! module only has to reassemble multipart runs). A large string payload
//! can span multiple [`EventRecord`]s; fragments accumulate until a
//! terminator fragment arrives, at which point they are concatenated and
//! delivered as one logical event. A run that exceeds
//! [`MAX_MULTIPART_BUDGET`] before terminating is aborted and reported as a
//! [`StreamError::MultipartOverrun`] on the channel — the channel itself
//! survives (§7 tier 2).

use std::collections::HashMap;

use a12_proto::payloads::{EventRecord, MAX_MULTIPART_BUDGET};

use crate::error::StreamError;

/// One fully reassembled logical event, ready for delivery to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledEvent {
    /// Event category (device type).
    pub category: u8,
    /// Event subtype (data type).
    pub subtype: u8,
    /// Fully reassembled payload bytes.
    pub data: Vec<u8>,
}

struct PendingRun {
    category: u8,
    subtype: u8,
    buffer: Vec<u8>,
}

/// Per-channel multipart reassembler. One instance per channel — keeping
/// the buffer scoped to a channel, rather than a single process-wide
/// static, is deliberate: a multipart run on one channel can never corrupt
/// or starve reassembly on another (§9 design note).
#[derive(Default)]
pub struct EventAssembler {
    runs: HashMap<u32, PendingRun>,
}

impl EventAssembler {
    /// Creates an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one inbound [`EventRecord`], returning a fully reassembled
    /// event once its run (or the record itself, if non-multipart)
    /// completes.
    ///
    /// # Errors
    ///
    /// `StreamError::MultipartOverrun` if accumulating this fragment would
    /// exceed [`MAX_MULTIPART_BUDGET`]; the run is dropped so a retried or
    /// new run with the same id starts clean.
    pub fn ingest(&mut self, channel: u8, record: EventRecord) -> Result<Option<AssembledEvent>, StreamError> {
        let Some(multipart) = record.multipart else {
            return Ok(Some(AssembledEvent { category: record.category, subtype: record.subtype, data: record.data }));
        };

        let run = self.runs.entry(multipart.run_id).or_insert_with(|| PendingRun {
            category: record.category,
            subtype: record.subtype,
            buffer: Vec::new(),
        });

        if run.buffer.len().saturating_add(record.data.len()) > MAX_MULTIPART_BUDGET {
            self.runs.remove(&multipart.run_id);
            return Err(StreamError::MultipartOverrun {
                channel,
                run_id: multipart.run_id,
                budget: MAX_MULTIPART_BUDGET,
            });
        }

        run.buffer.extend_from_slice(&record.data);

        if !multipart.terminator {
            return Ok(None);
        }

        // INVARIANT: `run` above is `&mut` borrowed from this same entry, so the
        // key is present.
        #[allow(clippy::expect_used)]
        let run = self.runs.remove(&multipart.run_id).expect("just inserted above");
        Ok(Some(AssembledEvent { category: run.category, subtype: run.subtype, data: run.buffer }))
    }

    /// Number of multipart runs currently in flight on this channel, for
    /// diagnostics and tests.
    #[must_use]
    pub fn pending_runs(&self) -> usize {
        self.runs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_multipart_event_delivers_immediately() {
        let mut assembler = EventAssembler::new();
        let delivered = assembler.ingest(1, EventRecord::new(1, 2, vec![9, 9])).unwrap().unwrap();
        assert_eq!(delivered.data, vec![9, 9]);
        assert_eq!(assembler.pending_runs(), 0);
    }

    #[test]
    fn multipart_run_reassembles_on_terminator() {
        let mut assembler = EventAssembler::new();
        assert!(assembler.ingest(1, EventRecord::fragment(5, 0, b"hel".to_vec(), 7, false)).unwrap().is_none());
        assert_eq!(assembler.pending_runs(), 1);
        assert!(assembler.ingest(1, EventRecord::fragment(5, 0, b"lo".to_vec(), 7, false)).unwrap().is_none());

        let delivered =
            assembler.ingest(1, EventRecord::fragment(5, 0, b"!".to_vec(), 7, true)).unwrap().unwrap();
        assert_eq!(delivered.data, b"hello!");
        assert_eq!(delivered.category, 5);
        assert_eq!(assembler.pending_runs(), 0);
    }

    #[test]
    fn distinct_run_ids_do_not_interfere() {
        let mut assembler = EventAssembler::new();
        assembler.ingest(1, EventRecord::fragment(1, 1, b"a".to_vec(), 1, false)).unwrap();
        assembler.ingest(1, EventRecord::fragment(2, 2, b"b".to_vec(), 2, false)).unwrap();
        assert_eq!(assembler.pending_runs(), 2);

        let first = assembler.ingest(1, EventRecord::fragment(1, 1, b"x".to_vec(), 1, true)).unwrap().unwrap();
        assert_eq!(first.data, b"ax");
        assert_eq!(assembler.pending_runs(), 1);
    }

    #[test]
    fn run_exceeding_budget_aborts_with_error() {
        let mut assembler = EventAssembler::new();
        let oversized = vec![0u8; MAX_MULTIPART_BUDGET + 1];
        let err = assembler.ingest(3, EventRecord::fragment(0, 0, oversized, 9, false)).unwrap_err();
        assert_eq!(err, StreamError::MultipartOverrun { channel: 3, run_id: 9, budget: MAX_MULTIPART_BUDGET });
        assert_eq!(assembler.pending_runs(), 0);
    }

    #[test]
    fn aborted_run_can_be_retried_with_same_id() {
        let mut assembler = EventAssembler::new();
        let oversized = vec![0u8; MAX_MULTIPART_BUDGET + 1];
        assembler.ingest(3, EventRecord::fragment(0, 0, oversized, 9, false)).unwrap_err();

        let delivered =
            assembler.ingest(3, EventRecord::fragment(0, 0, b"fresh".to_vec(), 9, true)).unwrap().unwrap();
        assert_eq!(delivered.data, b"fresh");
    }
}
