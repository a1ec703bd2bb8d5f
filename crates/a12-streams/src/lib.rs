//! Stream engines for the A12 protocol (§4.4, C4).
//!
//! Four independent engines, each keyed by channel (and, for binary
//! transfers, additionally by stream id):
//!
//! - [`event`]: event-record delivery and multipart string reassembly.
//! - [`video`]: video frame header + payload reassembly.
//! - [`audio`]: audio frame header + payload reassembly, symmetric to
//!   `video` but without codec/priority selection.
//! - [`binary`]: sized and streaming binary transfers with accept/defer/
//!   reject handling and cancellation.
//!
//! None of these engines perform I/O themselves: video/audio delivery goes
//! through a caller-supplied [`video::FrameAllocator`] + sink, and binary
//! transfer destinations are a caller-supplied [`binary::TransferDestination`].
//! This mirrors §4.4's "caller-supplied allocator and sink" contract and
//! keeps the engines pure and simulation-friendly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod audio;
pub mod binary;
pub mod error;
pub mod event;
pub mod video;

pub use audio::{AudioAssembler, AudioSink};
pub use binary::{BinaryTransferEngine, ChunkOutcome, TransferDecision, TransferDestination, TransferHandler};
pub use error::StreamError;
pub use event::{AssembledEvent, EventAssembler};
pub use video::{FrameAllocator, HeapAllocator, VideoAssembler, VideoSink};
