//! Event-stream records (§4.4.1).
//!
//! Events are opaque fixed-size records categorised by `(category,
//! subtype)`. A large string payload can span multiple records
//! ("multipart"); the final fragment of a multipart run is marked with
//! [`EventRecord::terminator`].

use serde::{Deserialize, Serialize};

/// Fixed-size-in-spirit event record. The `data` array mirrors the
/// original's fixed-size event union; we use a `Vec` bounded by
/// [`MAX_EVENT_DATA`] rather than a literal fixed array so CBOR encoding
/// stays compact for the common small case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event category (input, appl-defined, etc).
    pub category: u8,
    /// Subtype within the category.
    pub subtype: u8,
    /// Opaque payload bytes for this record.
    pub data: Vec<u8>,
    /// Multipart fragment metadata; `None` for a non-multipart event.
    pub multipart: Option<MultipartFragment>,
}

/// Maximum bytes carried by a single (non-multipart-spanning) event record.
pub const MAX_EVENT_DATA: usize = 4096;

/// Per-channel budget for reassembling a multipart string. Exceeding it
/// aborts the multipart with an error event (§4.4.1).
pub const MAX_MULTIPART_BUDGET: usize = 1024 * 1024;

/// Position of this record within a multipart reassembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartFragment {
    /// Identifies which multipart run this fragment belongs to, scoped to
    /// the channel.
    pub run_id: u32,
    /// True if this is the terminating fragment; the assembler concatenates
    /// everything received for `run_id` up to and including this fragment.
    pub terminator: bool,
}

impl EventRecord {
    /// Build a plain, non-multipart event.
    #[must_use]
    pub fn new(category: u8, subtype: u8, data: impl Into<Vec<u8>>) -> Self {
        Self { category, subtype, data: data.into(), multipart: None }
    }

    /// Build one fragment of a multipart run.
    #[must_use]
    pub fn fragment(category: u8, subtype: u8, data: impl Into<Vec<u8>>, run_id: u32, terminator: bool) -> Self {
        Self {
            category,
            subtype,
            data: data.into(),
            multipart: Some(MultipartFragment { run_id, terminator }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_event_round_trips() {
        let event = EventRecord::new(1, 2, vec![1, 2, 3]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&event, &mut buf).unwrap();
        let decoded: EventRecord = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn multipart_fragment_round_trips() {
        let event = EventRecord::fragment(1, 2, b"chunk".to_vec(), 7, false);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&event, &mut buf).unwrap();
        let decoded: EventRecord = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(decoded, event);
        assert!(!decoded.multipart.unwrap().terminator);
    }
}
