//! `DirectoryClient` (§3 "dircl") — a per-connected-peer record.

use a12_core::channel::InputMask;

/// The role a [`DirectoryClient`] was classified into on connect (§4.5
/// "Hosting model"). A client may only request capabilities consistent with
/// its role; the role itself is fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Provides content (video/audio/event source).
    Source,
    /// Consumes content hosted by an appl.
    Sink,
    /// Federates with another directory (outbound or inbound).
    DirectoryLink,
    /// Privileged control channel.
    Admin,
    /// Observes an appl without joining it.
    Monitor,
}

/// Identifier for an appl a dircl may be joined to.
pub type ApplId = u64;

/// One connected peer (§3 "DirectoryClient (dircl)").
///
/// Holds identity, joined appl id, role, permission bitset (granted
/// capabilities, checked against [`crate::permissions::PermissionTable`] at
/// request time rather than cached as a snapshot), input mask, and an
/// outbound event queue handle.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    identity: String,
    role: Role,
    in_appl: Option<ApplId>,
    input_mask: InputMask,
}

impl DirectoryClient {
    /// Creates a newly connected, unjoined client.
    #[must_use]
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self { identity: identity.into(), role, in_appl: None, input_mask: InputMask::default() }
    }

    /// Hex-encoded long-term public key identifying this client.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The role this client was classified into on connect.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The appl this client is currently joined to, if any.
    #[must_use]
    pub fn in_appl(&self) -> Option<ApplId> {
        self.in_appl
    }

    /// Joins an appl. Invariant: `in_appl == appl.identifier` afterwards.
    pub fn join(&mut self, appl: ApplId) {
        self.in_appl = Some(appl);
    }

    /// Leaves the currently joined appl, clearing `in_appl`.
    pub fn unjoin(&mut self) {
        self.in_appl = None;
    }

    /// Current inbound input mask.
    #[must_use]
    pub fn input_mask(&self) -> InputMask {
        self.input_mask
    }

    /// Replaces the inbound input mask.
    pub fn set_input_mask(&mut self, mask: InputMask) {
        self.input_mask = mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_unjoin_track_appl_membership() {
        let mut client = DirectoryClient::new("deadbeef", Role::Sink);
        assert_eq!(client.in_appl(), None);
        client.join(7);
        assert_eq!(client.in_appl(), Some(7));
        client.unjoin();
        assert_eq!(client.in_appl(), None);
    }

    #[test]
    fn input_mask_round_trips() {
        let mut client = DirectoryClient::new("cafef00d", Role::Source);
        let mask = InputMask { device_mask: 0x1, data_mask: 0x2 };
        client.set_input_mask(mask);
        assert_eq!(client.input_mask(), mask);
    }
}
