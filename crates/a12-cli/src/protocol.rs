//! Wire encoding for directory control-plane traffic.
//!
//! `a12-proto`'s [`ControlMessage`](a12_proto::ControlMessage) has no
//! directory-specific variants — join/leave/admin/KV traffic is protocol-
//! generic appl data, not session-management. It travels as
//! [`EventRecord`]s on the control channel instead, tagged with the
//! category/subtype pairs this module defines, and is decoded back into
//! the plain strings [`a12_directory::kv::parse_runner_request`] and
//! [`a12_directory::admin::parse_admin_command`] already know how to read.

use a12_proto::payloads::EventRecord;

/// Event category carrying every directory control-plane message.
pub const CATEGORY: u8 = 0x44;

/// A sink/source/monitor asked to join a hosted appl by name.
pub const SUBTYPE_JOIN: u8 = 1;
/// A joined client asked to leave its appl.
pub const SUBTYPE_LEAVE: u8 = 2;
/// A packed request from a runner's control channel (§4.5 KV mediation).
pub const SUBTYPE_RUNNER_REQUEST: u8 = 3;
/// A packed command from an admin-role client.
pub const SUBTYPE_ADMIN_COMMAND: u8 = 4;
/// A runner asking to open a named resource.
pub const SUBTYPE_RESOURCE_REQUEST: u8 = 5;
/// A packed `key=value:...` reply, direction-agnostic (session or runner).
pub const SUBTYPE_REPLY: u8 = 6;
/// Sent by a runner once its startup finished, completing bootstrap.
pub const SUBTYPE_BOOTSTRAP_ACK: u8 = 7;

/// A decoded directory control-plane message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// §[`SUBTYPE_JOIN`].
    Join {
        /// Appl name to join.
        appl_name: String,
    },
    /// §[`SUBTYPE_LEAVE`].
    Leave,
    /// §[`SUBTYPE_RUNNER_REQUEST`].
    RunnerRequest(String),
    /// §[`SUBTYPE_ADMIN_COMMAND`].
    AdminCommand(String),
    /// §[`SUBTYPE_RESOURCE_REQUEST`].
    ResourceRequest(String),
    /// §[`SUBTYPE_REPLY`].
    Reply(String),
    /// §[`SUBTYPE_BOOTSTRAP_ACK`].
    BootstrapAck,
}

impl WireMessage {
    /// Packs this message into an [`EventRecord`] under [`CATEGORY`].
    #[must_use]
    pub fn encode(&self) -> EventRecord {
        match self {
            Self::Join { appl_name } => EventRecord::new(CATEGORY, SUBTYPE_JOIN, appl_name.as_bytes().to_vec()),
            Self::Leave => EventRecord::new(CATEGORY, SUBTYPE_LEAVE, Vec::new()),
            Self::RunnerRequest(text) => EventRecord::new(CATEGORY, SUBTYPE_RUNNER_REQUEST, text.as_bytes().to_vec()),
            Self::AdminCommand(text) => EventRecord::new(CATEGORY, SUBTYPE_ADMIN_COMMAND, text.as_bytes().to_vec()),
            Self::ResourceRequest(name) => {
                EventRecord::new(CATEGORY, SUBTYPE_RESOURCE_REQUEST, name.as_bytes().to_vec())
            },
            Self::Reply(text) => EventRecord::new(CATEGORY, SUBTYPE_REPLY, text.as_bytes().to_vec()),
            Self::BootstrapAck => EventRecord::new(CATEGORY, SUBTYPE_BOOTSTRAP_ACK, Vec::new()),
        }
    }

    /// Unpacks an [`EventRecord`] previously produced by [`Self::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if `record.category` is not [`CATEGORY`], the
    /// subtype is unrecognised, or the payload is not valid UTF-8.
    pub fn decode(record: &EventRecord) -> anyhow::Result<Self> {
        if record.category != CATEGORY {
            anyhow::bail!("event category {} is not a directory message", record.category);
        }
        let text = || std::str::from_utf8(&record.data).map(str::to_string);
        match record.subtype {
            SUBTYPE_JOIN => Ok(Self::Join { appl_name: text()? }),
            SUBTYPE_LEAVE => Ok(Self::Leave),
            SUBTYPE_RUNNER_REQUEST => Ok(Self::RunnerRequest(text()?)),
            SUBTYPE_ADMIN_COMMAND => Ok(Self::AdminCommand(text()?)),
            SUBTYPE_RESOURCE_REQUEST => Ok(Self::ResourceRequest(text()?)),
            SUBTYPE_REPLY => Ok(Self::Reply(text()?)),
            SUBTYPE_BOOTSTRAP_ACK => Ok(Self::BootstrapAck),
            other => anyhow::bail!("unrecognised directory event subtype {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_round_trips() {
        let message = WireMessage::Join { appl_name: "testappl".to_string() };
        assert_eq!(WireMessage::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn runner_request_round_trips() {
        let message = WireMessage::RunnerRequest("setkey=foo:value=bar".to_string());
        assert_eq!(WireMessage::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn wrong_category_is_rejected() {
        let record = EventRecord::new(0x01, SUBTYPE_JOIN, b"x".to_vec());
        assert!(WireMessage::decode(&record).is_err());
    }

    #[test]
    fn unknown_subtype_is_rejected() {
        let record = EventRecord::new(CATEGORY, 0xFF, Vec::new());
        assert!(WireMessage::decode(&record).is_err());
    }
}
