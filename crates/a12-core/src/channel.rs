//! Channel table and outbound scheduler (§4.3 channel multiplexer, C3).
//!
//! A [`ChannelTable`] tracks which channel ids are open, enforces each
//! channel's soft outbound byte budget, applies inbound input masking, and
//! schedules outbound frames in priority order: control > event > audio >
//! video > binary, round-robin across channels within a class.
//!
//! This module only knows about [`a12_proto::PlaintextFrame`]s and channel
//! ids; the actual video/audio/binary-transfer assembly state lives in
//! `a12-streams`, keyed by the same channel id.

use std::collections::{BTreeMap, VecDeque};

use a12_proto::{FrameType, PlaintextFrame, VideoPriority};

use crate::error::SessionError;

/// Channel 0 is the control/primary channel, created implicitly with the
/// session (§3).
pub const CONTROL_CHANNEL: u8 = 0;

/// Scheduling class a frame type belongs to (§4.3 scheduling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrameClass {
    /// Highest priority: handshake and channel-management traffic.
    Control,
    /// Input/output event records.
    Event,
    /// Audio payload and header frames.
    Audio,
    /// Video payload and header frames.
    Video,
    /// Binary transfer payload and header frames.
    Binary,
}

/// Number of distinct scheduling classes, used to size per-class queues.
const CLASS_COUNT: usize = 5;

const CLASS_ORDER: [FrameClass; CLASS_COUNT] =
    [FrameClass::Control, FrameClass::Event, FrameClass::Audio, FrameClass::Video, FrameClass::Binary];

impl FrameClass {
    const fn index(self) -> usize {
        match self {
            Self::Control => 0,
            Self::Event => 1,
            Self::Audio => 2,
            Self::Video => 3,
            Self::Binary => 4,
        }
    }
}

/// Maps a frame type to its scheduling class.
#[must_use]
pub fn class_of(frame_type: FrameType) -> FrameClass {
    match frame_type {
        FrameType::Control => FrameClass::Control,
        FrameType::Event => FrameClass::Event,
        FrameType::AudioHeader | FrameType::AudioPayload => FrameClass::Audio,
        FrameType::VideoHeader | FrameType::VideoPayload => FrameClass::Video,
        FrameType::BlobHeader | FrameType::BlobPayload => FrameClass::Binary,
    }
}

/// Inbound device-type and data-type masks for a channel (§4.3 input
/// masking). Bit `i` set means category/subtype `i` (mod 32) is currently
/// paused: matching event frames are dropped silently before reaching the
/// stream engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputMask {
    /// Mask over event category (device type).
    pub device_mask: u32,
    /// Mask over event subtype (data type).
    pub data_mask: u32,
}

impl InputMask {
    /// True if an event with this `(category, subtype)` should be dropped.
    #[must_use]
    pub fn blocks(&self, category: u8, subtype: u8) -> bool {
        let device_bit = 1u32 << (u32::from(category) % 32);
        let data_bit = 1u32 << (u32::from(subtype) % 32);
        (self.device_mask & device_bit) != 0 || (self.data_mask & data_bit) != 0
    }
}

/// One entry in the frame queue for a channel, tagged with the scheduling
/// hint needed to order it relative to siblings in the same class.
struct QueuedFrame {
    frame: PlaintextFrame,
    priority: VideoPriority,
}

/// A single multiplexed channel (§3 `Channel`).
pub struct Channel {
    id: u8,
    input_mask: InputMask,
    queues: [VecDeque<QueuedFrame>; CLASS_COUNT],
    budget_used: usize,
    budget_limit: usize,
}

impl Channel {
    fn new(id: u8, budget_limit: usize) -> Self {
        Self {
            id,
            input_mask: InputMask::default(),
            queues: std::array::from_fn(|_| VecDeque::new()),
            budget_used: 0,
            budget_limit,
        }
    }

    /// This channel's id.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Current inbound input mask.
    #[must_use]
    pub fn input_mask(&self) -> InputMask {
        self.input_mask
    }

    /// Outbound bytes currently queued against this channel's soft budget.
    #[must_use]
    pub fn budget_used(&self) -> usize {
        self.budget_used
    }

    fn has_pending(&self, class: FrameClass) -> bool {
        !self.queues[class.index()].is_empty()
    }
}

/// Channel table and outbound scheduler for one session (C3).
pub struct ChannelTable {
    channels: BTreeMap<u8, Channel>,
    max_channels: u8,
    default_budget: usize,
    /// Last channel id served per class, for round-robin fairness.
    round_robin_cursor: [Option<u8>; CLASS_COUNT],
}

impl ChannelTable {
    /// Creates a table with channel 0 already open, as required by the
    /// session lifecycle (§3).
    #[must_use]
    pub fn new(max_channels: u8, default_budget: usize) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(CONTROL_CHANNEL, Channel::new(CONTROL_CHANNEL, default_budget));
        Self {
            channels,
            max_channels,
            default_budget,
            round_robin_cursor: [None; CLASS_COUNT],
        }
    }

    /// Opens a new channel with the peer-proposed id.
    ///
    /// # Errors
    ///
    /// `SessionError::ChannelRejected` if the id is already in use or the
    /// table is already at `max_channels` (§4.3 channel allocation).
    pub fn open(&mut self, proposed_id: u8) -> Result<u8, SessionError> {
        if self.channels.contains_key(&proposed_id) {
            return Err(SessionError::ChannelRejected {
                id: proposed_id,
                reason: "id already in use".to_string(),
            });
        }
        if self.channels.len() >= usize::from(self.max_channels) {
            return Err(SessionError::ChannelRejected {
                id: proposed_id,
                reason: "channel limit reached".to_string(),
            });
        }
        self.channels.insert(proposed_id, Channel::new(proposed_id, self.default_budget));
        Ok(proposed_id)
    }

    /// Destroys a channel and drops whatever it had queued.
    ///
    /// # Errors
    ///
    /// `SessionError::UnknownChannel` if no such channel exists.
    pub fn destroy(&mut self, id: u8) -> Result<(), SessionError> {
        self.channels.remove(&id).ok_or(SessionError::UnknownChannel(id)).map(|_| ())
    }

    /// Sets the inbound input mask for a channel (§4.3 input masking).
    ///
    /// # Errors
    ///
    /// `SessionError::UnknownChannel` if no such channel exists.
    pub fn set_input_mask(
        &mut self,
        id: u8,
        device_mask: u32,
        data_mask: u32,
    ) -> Result<(), SessionError> {
        let channel = self.channels.get_mut(&id).ok_or(SessionError::UnknownChannel(id))?;
        channel.input_mask = InputMask { device_mask, data_mask };
        Ok(())
    }

    /// Looks up a channel by id.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// True if an inbound frame on `channel` should be delivered to the
    /// stream engine, i.e. it is not silenced by the channel's input mask.
    /// Non-event frame types are never masked.
    #[must_use]
    pub fn passes_input_mask(&self, channel: u8, category: u8, subtype: u8) -> bool {
        match self.channels.get(&channel) {
            Some(channel) => !channel.input_mask.blocks(category, subtype),
            None => false,
        }
    }

    /// Enqueues an outbound frame for scheduling.
    ///
    /// `priority` only affects ordering within [`FrameClass::Video`]; pass
    /// [`VideoPriority::Normal`] for every other class.
    ///
    /// # Errors
    ///
    /// `SessionError::UnknownChannel` if `channel` has not been opened.
    /// `SessionError::ChannelRejected` if the channel's soft byte budget is
    /// exceeded — the scheduler never blocks (§4.3 back-pressure); it is the
    /// producer's choice how to react to a refused enqueue.
    pub fn enqueue(
        &mut self,
        channel: u8,
        frame: PlaintextFrame,
        priority: VideoPriority,
    ) -> Result<(), SessionError> {
        let frame_len = frame.payload.len();
        let frame_type = frame.frame_type;
        let entry = self.channels.get_mut(&channel).ok_or(SessionError::UnknownChannel(channel))?;

        if entry.budget_used.saturating_add(frame_len) > entry.budget_limit {
            return Err(SessionError::ChannelRejected {
                id: channel,
                reason: "outbound byte budget exceeded".to_string(),
            });
        }

        entry.budget_used += frame_len;
        entry.queues[class_of(frame_type).index()].push_back(QueuedFrame { frame, priority });
        Ok(())
    }

    /// Pops the next frame to send, honoring class priority order and
    /// round-robin fairness across channels within a class, and (within the
    /// video class only) preferring any channel with a pending keyframe.
    pub fn pop_next(&mut self) -> Option<PlaintextFrame> {
        for class in CLASS_ORDER {
            if let Some(frame) = self.pop_from_class(class) {
                return Some(frame);
            }
        }
        None
    }

    fn pop_from_class(&mut self, class: FrameClass) -> Option<PlaintextFrame> {
        let candidate_ids: Vec<u8> =
            self.channels.values().filter(|channel| channel.has_pending(class)).map(Channel::id).collect();
        if candidate_ids.is_empty() {
            return None;
        }

        if class == FrameClass::Video {
            if let Some(id) = candidate_ids.iter().copied().find(|&id| self.has_keyframe(id)) {
                return self.dequeue_one(id, class);
            }
        }

        let start_after = self.round_robin_cursor[class.index()];
        let next_id = Self::next_round_robin(&candidate_ids, start_after);
        self.round_robin_cursor[class.index()] = Some(next_id);
        self.dequeue_one(next_id, class)
    }

    fn has_keyframe(&self, id: u8) -> bool {
        self.channels
            .get(&id)
            .is_some_and(|channel| {
                channel.queues[FrameClass::Video.index()]
                    .iter()
                    .any(|queued| queued.priority == VideoPriority::Keyframe)
            })
    }

    fn dequeue_one(&mut self, id: u8, class: FrameClass) -> Option<PlaintextFrame> {
        let channel = self.channels.get_mut(&id)?;
        let queue = &mut channel.queues[class.index()];

        let index = if class == FrameClass::Video {
            queue.iter().position(|queued| queued.priority == VideoPriority::Keyframe).unwrap_or(0)
        } else {
            0
        };

        let queued = queue.remove(index)?;
        channel.budget_used = channel.budget_used.saturating_sub(queued.frame.payload.len());
        Some(queued.frame)
    }

    fn next_round_robin(candidates: &[u8], start_after: Option<u8>) -> u8 {
        let Some(cursor) = start_after else {
            return candidates[0];
        };
        candidates.iter().copied().find(|&id| id > cursor).unwrap_or(candidates[0])
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn control_frame() -> PlaintextFrame {
        PlaintextFrame::new(FrameType::Control, CONTROL_CHANNEL, Bytes::from_static(b"hi"))
    }

    #[test]
    fn channel_zero_exists_on_construction() {
        let table = ChannelTable::new(4, 4096);
        assert!(table.get(CONTROL_CHANNEL).is_some());
    }

    #[test]
    fn open_rejects_duplicate_id() {
        let mut table = ChannelTable::new(4, 4096);
        table.open(1).unwrap();
        let err = table.open(1).unwrap_err();
        assert!(matches!(err, SessionError::ChannelRejected { id: 1, .. }));
    }

    #[test]
    fn open_rejects_past_channel_limit() {
        let mut table = ChannelTable::new(2, 4096);
        // Channel 0 already counts toward the limit.
        table.open(1).unwrap();
        let err = table.open(2).unwrap_err();
        assert!(matches!(err, SessionError::ChannelRejected { id: 2, .. }));
    }

    #[test]
    fn destroy_unknown_channel_errors() {
        let mut table = ChannelTable::new(4, 4096);
        assert_eq!(table.destroy(9), Err(SessionError::UnknownChannel(9)));
    }

    #[test]
    fn enqueue_respects_budget() {
        let mut table = ChannelTable::new(4, 4096);
        table.open(1).unwrap();
        let big = PlaintextFrame::new(FrameType::Event, 1, Bytes::from(vec![0u8; 8192]));
        let err = table.enqueue(1, big, VideoPriority::Normal).unwrap_err();
        assert!(matches!(err, SessionError::ChannelRejected { id: 1, .. }));
    }

    #[test]
    fn input_mask_blocks_matching_category() {
        let mut table = ChannelTable::new(4, 4096);
        table.set_input_mask(CONTROL_CHANNEL, 1, 0).unwrap();
        assert!(!table.passes_input_mask(CONTROL_CHANNEL, 0, 0));
        assert!(table.passes_input_mask(CONTROL_CHANNEL, 1, 0));
    }

    #[test]
    fn scheduler_honors_class_priority() {
        let mut table = ChannelTable::new(4, 65536);
        table.open(1).unwrap();

        let event = PlaintextFrame::new(FrameType::Event, 1, Bytes::from_static(b"e"));
        let control = control_frame();

        table.enqueue(1, event, VideoPriority::Normal).unwrap();
        table.enqueue(CONTROL_CHANNEL, control, VideoPriority::Normal).unwrap();

        let popped = table.pop_next().unwrap();
        assert_eq!(popped.frame_type, FrameType::Control);
    }

    #[test]
    fn scheduler_round_robins_within_a_class() {
        let mut table = ChannelTable::new(4, 65536);
        table.open(1).unwrap();
        table.open(2).unwrap();

        table
            .enqueue(1, PlaintextFrame::new(FrameType::Event, 1, Bytes::from_static(b"a")), VideoPriority::Normal)
            .unwrap();
        table
            .enqueue(2, PlaintextFrame::new(FrameType::Event, 2, Bytes::from_static(b"b")), VideoPriority::Normal)
            .unwrap();

        let first = table.pop_next().unwrap();
        let second = table.pop_next().unwrap();
        assert_ne!(first.channel, second.channel);
    }

    #[test]
    fn video_keyframe_is_scheduled_before_normal_frames_on_other_channels() {
        let mut table = ChannelTable::new(4, 65536);
        table.open(1).unwrap();
        table.open(2).unwrap();

        table
            .enqueue(
                1,
                PlaintextFrame::new(FrameType::VideoPayload, 1, Bytes::from_static(b"delta")),
                VideoPriority::Normal,
            )
            .unwrap();
        table
            .enqueue(
                2,
                PlaintextFrame::new(FrameType::VideoPayload, 2, Bytes::from_static(b"key")),
                VideoPriority::Keyframe,
            )
            .unwrap();

        let popped = table.pop_next().unwrap();
        assert_eq!(popped.channel, 2);
    }
}
