//! Session: ties the packet codec (C1), handshake (C2), and channel table
//! (C3) together into one state machine per connection (§3 `Session`).
//!
//! Action-driven: every public method returns the [`SessionAction`]s the
//! caller must carry out (write bytes to the transport, tear the session
//! down) rather than performing I/O itself.
//! The session owns no socket; a thin driver loop feeds it bytes and ticks.

#![allow(
    clippy::expect_used,
    reason = "handshake scratch fields are only read in the one state the prior transition guarantees they were populated"
)]

use std::time::Duration;

use a12_crypto::{derive_session_keys, KeyPair};
use a12_proto::{
    payloads::{decode_cbor, encode_cbor},
    ControlMessage, FrameType, HandshakeHello, PlaintextFrame, VideoPriority,
};

use crate::{
    channel::{ChannelTable, CONTROL_CHANNEL},
    codec::PacketCodec,
    env::Environment,
    error::SessionError,
    handshake::{
        compute_auth_tag, extend_transcript, hello_transcript, is_initiator, order_independent_hash,
        verify_auth_tag, ForwardSecrecyMode, Keystore, KeystoreDecision, UnknownPeerHook, PROTOCOL_VERSION,
    },
    keycontext::KeyContext,
};

/// Lifecycle state of a [`Session`] (§3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing sent yet.
    Init,
    /// Our hello has been sent; waiting for the peer's.
    AwaitingPeerHello,
    /// Forward-secrecy round in flight: our second ephemeral sent, waiting
    /// for the peer's.
    AwaitingSecondEphemeral,
    /// Our authentication tag has been sent; waiting for the peer's.
    AwaitingAuthTag,
    /// Handshake complete; ordinary traffic may flow.
    Authenticated,
    /// Session has been torn down.
    Closed,
}

/// Tuning knobs for a [`Session`] (§4.2, §4.3, §5).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum time allowed for the full handshake to complete.
    pub handshake_timeout: Duration,
    /// Maximum time with no inbound traffic before the session is closed.
    pub idle_timeout: Duration,
    /// Interval at which `tick` emits a `Ping` if no other traffic has gone
    /// out recently.
    pub heartbeat_interval: Duration,
    /// Outbound byte budget before a rekey is initiated (§4.1).
    pub rekey_bytes_limit: u64,
    /// Maximum number of simultaneously open channels, including channel 0.
    pub max_channels: u8,
    /// Soft outbound byte budget per channel (§4.3).
    pub channel_budget_bytes: usize,
    /// Whether a forward-secrecy round runs after the base handshake.
    pub forward_secrecy: ForwardSecrecyMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(15),
            rekey_bytes_limit: crate::keycontext::DEFAULT_REKEY_BYTES_LIMIT,
            max_channels: 32,
            channel_budget_bytes: 4 * 1024 * 1024,
            forward_secrecy: ForwardSecrecyMode::Disabled,
        }
    }
}

/// An effect a [`Session`] driver must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write these bytes to the transport, in order.
    SendBytes(Vec<u8>),
    /// A decrypted, post-handshake frame arrived and passed its input mask
    /// (or had none); hand it to the stream layer.
    DeliverFrame(PlaintextFrame),
    /// The session has ended; no further actions should be expected.
    Close {
        /// Why the session closed.
        reason: String,
    },
}

struct HandshakeScratch {
    local_ephemeral: KeyPair,
    local_hello: HandshakeHello,
    we_initiated: Option<bool>,
    transcript: Option<[u8; 32]>,
    second_local_ephemeral: Option<KeyPair>,
}

/// One A12 session: handshake plus ongoing authenticated traffic.
pub struct Session<E: Environment> {
    state: SessionState,
    config: SessionConfig,
    env: E,
    codec: PacketCodec,
    channels: ChannelTable,
    handshake: Option<HandshakeScratch>,
    handshake_started_at: Option<E::Instant>,
    last_inbound_at: Option<E::Instant>,
    last_outbound_at: Option<E::Instant>,
    /// Our own ephemeral from a `RekeyRequest` we sent, kept until the
    /// peer's `RekeyAck` arrives and the new keys can be derived.
    pending_rekey_ephemeral: Option<KeyPair>,
}

impl<E: Environment> Session<E> {
    /// Creates a session with a fixed long-term identity. The handshake has
    /// not started; call [`Self::open`] to send the first hello.
    #[must_use]
    pub fn new(env: E, config: SessionConfig, local_identity: KeyPair) -> Self {
        let keys = KeyContext::new(local_identity, config.rekey_bytes_limit);
        let channels = ChannelTable::new(config.max_channels, config.channel_budget_bytes);
        Self {
            state: SessionState::Init,
            config,
            env,
            codec: PacketCodec::new(keys),
            channels,
            handshake: None,
            handshake_started_at: None,
            last_inbound_at: None,
            last_outbound_at: None,
            pending_rekey_ephemeral: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the handshake has completed and ordinary traffic may flow.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// The channel table, for callers that need to open channels or set
    /// input masks once authenticated.
    pub fn channels_mut(&mut self) -> &mut ChannelTable {
        &mut self.channels
    }

    /// The peer's long-term public key, once its hello has been received.
    /// `None` before that point; present for the rest of the session even
    /// across a rekey, since the long-term identity never changes.
    #[must_use]
    pub fn peer_identity(&self) -> Option<[u8; 32]> {
        self.codec.key_context().peer_long_term_public().copied()
    }

    /// Builds and sends this side's handshake hello (§4.2 step 1).
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidState` if the handshake has already started.
    pub fn open(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Init {
            return Err(SessionError::InvalidState { state: self.state, operation: "open".to_string() });
        }

        let ephemeral_secret: [u8; 32] = self.env.random_array();
        let local_ephemeral = KeyPair::from_secret_bytes(ephemeral_secret);
        let challenge = self.env.random_array();

        let local_hello = HandshakeHello {
            version: PROTOCOL_VERSION,
            long_term_public: self.codec.key_context().local_identity().public_bytes(),
            ephemeral_public: local_ephemeral.public_bytes(),
            challenge,
            preshared_tag: None,
        };

        let action = self.send_control(&ControlMessage::HandshakeHello(local_hello.clone()))?;

        self.handshake = Some(HandshakeScratch {
            local_ephemeral,
            local_hello,
            we_initiated: None,
            transcript: None,
            second_local_ephemeral: None,
        });
        self.handshake_started_at = Some(self.env.now());
        self.state = SessionState::AwaitingPeerHello;

        Ok(vec![action])
    }

    /// Feeds newly received transport bytes into the session, advancing the
    /// handshake or delivering decrypted frames as appropriate.
    ///
    /// # Errors
    ///
    /// Any [`SessionError`] variant is terminal; the caller should treat the
    /// session as closed after one is returned, and should apply any
    /// actions already produced before the error occurred.
    pub fn handle_incoming_bytes(
        &mut self,
        bytes: &[u8],
        keystore: &dyn Keystore,
        unknown_hook: Option<&dyn UnknownPeerHook>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "handle_incoming_bytes".to_string(),
            });
        }

        self.last_inbound_at = Some(self.env.now());

        let (frames, _consumed) = self.codec.ingest(bytes)?;
        let mut actions = Vec::new();
        for frame in frames {
            actions.extend(self.handle_frame(frame, keystore, unknown_hook)?);
        }
        Ok(actions)
    }

    fn handle_frame(
        &mut self,
        frame: PlaintextFrame,
        keystore: &dyn Keystore,
        unknown_hook: Option<&dyn UnknownPeerHook>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if frame.frame_type != FrameType::Control {
            return self.handle_post_auth_frame(frame);
        }

        let message: ControlMessage = decode_cbor(&frame.payload)?;
        match message {
            ControlMessage::HandshakeHello(hello) => self.handle_peer_hello(hello, keystore, unknown_hook),
            ControlMessage::RekeyRequest { ephemeral_public }
                if self.state == SessionState::AwaitingSecondEphemeral =>
            {
                self.handle_second_ephemeral(ephemeral_public)
            },
            ControlMessage::HandshakeAuthTag { tag } => self.handle_peer_auth_tag(&tag),
            ControlMessage::Ping => self.send_control(&ControlMessage::Pong).map(|a| vec![a]),
            ControlMessage::Pong => Ok(Vec::new()),
            other if self.state == SessionState::Authenticated => self.handle_authenticated_control(other, frame.channel),
            _ => Err(SessionError::Protocol("control message received out of sequence".to_string())),
        }
    }

    /// Dispatches a control message that only makes sense once authenticated
    /// (§4.3 channel management, §4.1 rekey, graceful teardown).
    fn handle_authenticated_control(
        &mut self,
        message: ControlMessage,
        channel: u8,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match message {
            ControlMessage::ChannelOpen { proposed_id } => {
                let accepted = self.channels.open(proposed_id).is_ok();
                self.send_control(&ControlMessage::ChannelOpenAck { channel_id: proposed_id, accepted })
                    .map(|a| vec![a])
            },
            ControlMessage::ChannelDestroy { channel_id } => {
                self.channels.destroy(channel_id)?;
                Ok(Vec::new())
            },
            ControlMessage::InputMask { channel_id, device_mask, data_mask } => {
                self.channels.set_input_mask(channel_id, device_mask, data_mask)?;
                Ok(Vec::new())
            },
            ControlMessage::RekeyRequest { ephemeral_public } => self.handle_rekey_request(ephemeral_public),
            ControlMessage::RekeyAck { ephemeral_public } => self.handle_rekey_ack(ephemeral_public),
            ControlMessage::Goodbye { reason } => {
                self.state = SessionState::Closed;
                Ok(vec![SessionAction::Close { reason }])
            },
            // Channel-management acks and transfer control are the stream
            // layer's concern; pass them through unchanged.
            other => Ok(vec![SessionAction::DeliverFrame(PlaintextFrame::new(
                FrameType::Control,
                channel,
                encode_cbor(&other)?,
            ))]),
        }
    }

    /// Mid-session rekey (§4.1), distinct from the handshake's optional
    /// forward-secrecy round: either side may announce one once its byte
    /// budget is crossed. `RekeyRequest`/`RekeyAck` are a plain
    /// request/response here rather than the symmetric hello-style exchange
    /// the handshake uses, since by this point there is already an
    /// established initiator/responder labeling (from the handshake) to
    /// preserve.
    fn handle_rekey_request(&mut self, peer_ephemeral_public: [u8; 32]) -> Result<Vec<SessionAction>, SessionError> {
        let we_initiated = self.handshake_initiator_label();
        let secret: [u8; 32] = self.env.random_array();
        let local_ephemeral = KeyPair::from_secret_bytes(secret);
        let ephemeral_public = local_ephemeral.public_bytes();

        let shared = local_ephemeral.diffie_hellman(&peer_ephemeral_public);
        let transcript = order_independent_hash(&ephemeral_public, &peer_ephemeral_public);
        let (send_key, recv_key) = derive_session_keys(&shared, &transcript, we_initiated);

        // The ack itself is the last frame under the old keys (§4.1): the
        // initiator is still decrypting with its old recv key and has not
        // advanced past it, so install_keys must not run until after this
        // frame has been sealed under the still-current send key/sequence.
        let action = self.send_control(&ControlMessage::RekeyAck { ephemeral_public })?;
        self.codec.key_context_mut().install_keys(send_key, recv_key);

        Ok(vec![action])
    }

    fn handle_rekey_ack(&mut self, peer_ephemeral_public: [u8; 32]) -> Result<Vec<SessionAction>, SessionError> {
        let we_initiated = self.handshake_initiator_label();
        let Some(local_ephemeral) = self.pending_rekey_ephemeral.take() else {
            return Err(SessionError::Protocol("received RekeyAck with no outstanding RekeyRequest".to_string()));
        };

        let shared = local_ephemeral.diffie_hellman(&peer_ephemeral_public);
        let transcript = order_independent_hash(&local_ephemeral.public_bytes(), &peer_ephemeral_public);
        let (send_key, recv_key) = derive_session_keys(&shared, &transcript, we_initiated);
        self.codec.key_context_mut().install_keys(send_key, recv_key);
        Ok(Vec::new())
    }

    /// The initiator/responder label fixed during the handshake, still
    /// needed post-handshake so every later rekey's KDF picks the same
    /// send/recv labeling as the session's keys originally did.
    fn handshake_initiator_label(&self) -> bool {
        // INVARIANT: set_peer_long_term_public runs in handle_peer_hello before
        // Authenticated is reachable; this is only called post-handshake.
        is_initiator(
            &self.codec.key_context().local_identity().public_bytes(),
            self.codec.key_context().peer_long_term_public().expect("peer known post-handshake"),
        )
    }

    fn handle_peer_hello(
        &mut self,
        peer_hello: HandshakeHello,
        keystore: &dyn Keystore,
        unknown_hook: Option<&dyn UnknownPeerHook>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::AwaitingPeerHello {
            return Err(SessionError::InvalidState { state: self.state, operation: "peer hello".to_string() });
        }
        if peer_hello.version != PROTOCOL_VERSION {
            self.state = SessionState::Closed;
            return Err(SessionError::VersionMismatch { ours: PROTOCOL_VERSION, theirs: peer_hello.version });
        }

        match keystore.lookup(&peer_hello.long_term_public) {
            KeystoreDecision::Known => {},
            KeystoreDecision::Unknown => {
                let admitted = unknown_hook.is_some_and(|hook| hook.register_unknown(&peer_hello.long_term_public));
                if !admitted {
                    self.state = SessionState::Closed;
                    return Err(SessionError::KeystoreReject);
                }
            },
        }

        self.codec.key_context_mut().set_peer_long_term_public(peer_hello.long_term_public);

        // INVARIANT: open() populates self.handshake before the state machine can
        // reach AwaitingPeerHello, checked above.
        let scratch = self.handshake.as_mut().expect("hello already sent before awaiting peer's");
        let we_initiated = is_initiator(
            &scratch.local_hello.long_term_public,
            &peer_hello.long_term_public,
        );
        let shared = scratch.local_ephemeral.diffie_hellman(&peer_hello.ephemeral_public);
        let transcript = hello_transcript(&scratch.local_hello, &peer_hello);
        let (send_key, recv_key) = derive_session_keys(&shared, &transcript, we_initiated);

        self.codec.key_context_mut().install_keys(send_key, recv_key);
        scratch.we_initiated = Some(we_initiated);
        scratch.transcript = Some(transcript);

        if self.config.forward_secrecy == ForwardSecrecyMode::Enabled {
            let second_secret: [u8; 32] = self.env.random_array();
            let second_ephemeral = KeyPair::from_secret_bytes(second_secret);
            let ephemeral_public = second_ephemeral.public_bytes();
            let action = self.send_control(&ControlMessage::RekeyRequest { ephemeral_public })?;
            self.handshake.as_mut().expect("handshake in progress").second_local_ephemeral = Some(second_ephemeral);
            self.state = SessionState::AwaitingSecondEphemeral;
            return Ok(vec![action]);
        }

        self.send_auth_tag()
    }

    fn handle_second_ephemeral(&mut self, peer_ephemeral_public: [u8; 32]) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::AwaitingSecondEphemeral {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "second ephemeral".to_string(),
            });
        }

        // INVARIANT: AwaitingSecondEphemeral is only entered after handle_peer_hello
        // populates handshake, we_initiated, transcript and sends a second ephemeral,
        // checked above.
        let scratch = self.handshake.as_mut().expect("handshake in progress");
        let second_local = scratch
            .second_local_ephemeral
            .take()
            .expect("second ephemeral sent before entering this state");
        let we_initiated = scratch.we_initiated.expect("set when peer hello was handled");
        let previous_transcript = scratch.transcript.expect("set when peer hello was handled");

        let shared = second_local.diffie_hellman(&peer_ephemeral_public);
        let transcript = extend_transcript(&previous_transcript, &second_local.public_bytes(), &peer_ephemeral_public);
        let (send_key, recv_key) = derive_session_keys(&shared, &transcript, we_initiated);

        self.codec.key_context_mut().install_keys(send_key, recv_key);
        scratch.transcript = Some(transcript);

        self.send_auth_tag()
    }

    fn send_auth_tag(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        // INVARIANT: both call sites derive and store scratch.transcript before
        // invoking send_auth_tag.
        let transcript = self.handshake.as_ref().and_then(|s| s.transcript).expect("transcript derived before auth tag");
        let tag = compute_auth_tag(self.codec.key_context().send_key(), &transcript);
        let action = self.send_control(&ControlMessage::HandshakeAuthTag { tag: tag.to_vec() })?;
        self.state = SessionState::AwaitingAuthTag;
        Ok(vec![action])
    }

    fn handle_peer_auth_tag(&mut self, tag: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::AwaitingAuthTag {
            return Err(SessionError::InvalidState { state: self.state, operation: "peer auth tag".to_string() });
        }

        // INVARIANT: AwaitingAuthTag is only reached after send_auth_tag, which
        // requires scratch.transcript to already be set.
        let transcript = self.handshake.as_ref().and_then(|s| s.transcript).expect("transcript derived before auth tag");
        if let Err(err) = verify_auth_tag(self.codec.key_context().recv_key(), &transcript, tag) {
            self.state = SessionState::Closed;
            return Err(err);
        }

        self.state = SessionState::Authenticated;
        self.handshake = None;
        Ok(Vec::new())
    }

    fn handle_post_auth_frame(&mut self, frame: PlaintextFrame) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Authenticated {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "post-handshake frame".to_string(),
            });
        }
        Ok(vec![SessionAction::DeliverFrame(frame)])
    }

    /// Enqueues an outbound application frame for scheduling and drains the
    /// channel table's scheduler into wire bytes.
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidState` if the handshake has not completed yet.
    /// Otherwise whatever the channel table or codec reject.
    pub fn send_frame(
        &mut self,
        frame: PlaintextFrame,
        priority: VideoPriority,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Authenticated {
            return Err(SessionError::InvalidState { state: self.state, operation: "send_frame".to_string() });
        }
        let channel = frame.channel;
        self.channels.enqueue(channel, frame, priority)?;
        self.drain_scheduler()
    }

    fn drain_scheduler(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let mut actions = Vec::new();
        while let Some(frame) = self.channels.pop_next() {
            actions.push(self.frame_to_action(&frame)?);
        }
        Ok(actions)
    }

    fn send_control(&mut self, message: &ControlMessage) -> Result<SessionAction, SessionError> {
        let frame = PlaintextFrame::new(FrameType::Control, CONTROL_CHANNEL, encode_cbor(message)?);
        self.frame_to_action(&frame)
    }

    fn frame_to_action(&mut self, frame: &PlaintextFrame) -> Result<SessionAction, SessionError> {
        let bytes = self.codec.send(frame)?;
        self.last_outbound_at = Some(self.env.now());
        Ok(SessionAction::SendBytes(bytes))
    }

    /// Periodic housekeeping: handshake timeout, idle timeout, and heartbeat
    /// emission (§5).
    ///
    /// # Errors
    ///
    /// `SessionError::HandshakeTimeout` or `SessionError::IdleTimeout` if
    /// either budget has been exceeded; the session is closed in that case.
    pub fn tick(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let now = self.env.now();

        if self.state != SessionState::Authenticated && self.state != SessionState::Closed {
            if let Some(started) = self.handshake_started_at {
                let elapsed = now - started;
                if elapsed > self.config.handshake_timeout {
                    self.state = SessionState::Closed;
                    return Err(SessionError::HandshakeTimeout { elapsed });
                }
            }
        }

        if self.state == SessionState::Authenticated {
            if let Some(last_inbound) = self.last_inbound_at {
                let elapsed = now - last_inbound;
                if elapsed > self.config.idle_timeout {
                    self.state = SessionState::Closed;
                    return Err(SessionError::IdleTimeout { elapsed });
                }
            }

            let due_for_heartbeat = self
                .last_outbound_at
                .is_none_or(|last| now - last > self.config.heartbeat_interval);
            if due_for_heartbeat {
                return self.send_control(&ControlMessage::Ping).map(|a| vec![a]);
            }

            if self.codec.needs_rekey() && self.pending_rekey_ephemeral.is_none() {
                let secret: [u8; 32] = self.env.random_array();
                let ephemeral = KeyPair::from_secret_bytes(secret);
                let ephemeral_public = ephemeral.public_bytes();
                let action = self.send_control(&ControlMessage::RekeyRequest { ephemeral_public })?;
                self.pending_rekey_ephemeral = Some(ephemeral);
                return Ok(vec![action]);
            }
        }

        Ok(Vec::new())
    }

    /// Sends a goodbye and marks the session closed.
    ///
    /// # Errors
    ///
    /// Propagates a codec error if the goodbye frame cannot be sealed.
    pub fn close(&mut self, reason: impl Into<String>) -> Result<Vec<SessionAction>, SessionError> {
        let reason = reason.into();
        let mut actions = if self.state == SessionState::Authenticated {
            vec![self.send_control(&ControlMessage::Goodbye { reason: reason.clone() })?]
        } else {
            Vec::new()
        };
        self.state = SessionState::Closed;
        actions.push(SessionAction::Close { reason });
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;

    use super::*;

    #[derive(Clone)]
    struct WallClockEnv;

    impl Environment for WallClockEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            use rand::RngCore;
            OsRng.fill_bytes(buffer);
        }
    }

    struct AllowAll;
    impl Keystore for AllowAll {
        fn lookup(&self, _peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
            KeystoreDecision::Known
        }
    }

    struct RejectAll;
    impl Keystore for RejectAll {
        fn lookup(&self, _peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
            KeystoreDecision::Unknown
        }
    }

    fn new_session(forward_secrecy: ForwardSecrecyMode) -> Session<WallClockEnv> {
        let identity = KeyPair::generate(&mut OsRng);
        let config = SessionConfig { forward_secrecy, ..SessionConfig::default() };
        Session::new(WallClockEnv, config, identity)
    }

    fn drive_handshake(forward_secrecy: ForwardSecrecyMode) -> (Session<WallClockEnv>, Session<WallClockEnv>) {
        let mut a = new_session(forward_secrecy);
        let mut b = new_session(forward_secrecy);
        let keystore = AllowAll;

        let a_actions = a.open().unwrap();
        let b_actions = b.open().unwrap();

        let mut a_out = extract_bytes(a_actions);
        let mut b_out = extract_bytes(b_actions);

        for _ in 0..4 {
            if a.is_authenticated() && b.is_authenticated() {
                break;
            }
            for bytes in std::mem::take(&mut b_out) {
                let actions = a.handle_incoming_bytes(&bytes, &keystore, None).unwrap();
                a_out.extend(extract_bytes(actions));
            }
            for bytes in std::mem::take(&mut a_out) {
                let actions = b.handle_incoming_bytes(&bytes, &keystore, None).unwrap();
                b_out.extend(extract_bytes(actions));
            }
        }

        (a, b)
    }

    fn extract_bytes(actions: Vec<SessionAction>) -> Vec<Vec<u8>> {
        actions
            .into_iter()
            .filter_map(|action| match action {
                SessionAction::SendBytes(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn handshake_completes_without_forward_secrecy() {
        let (a, b) = drive_handshake(ForwardSecrecyMode::Disabled);
        assert!(a.is_authenticated());
        assert!(b.is_authenticated());
    }

    #[test]
    fn handshake_completes_with_forward_secrecy_round() {
        let (a, b) = drive_handshake(ForwardSecrecyMode::Enabled);
        assert!(a.is_authenticated());
        assert!(b.is_authenticated());
    }

    #[test]
    fn unknown_peer_without_hook_is_rejected() {
        let mut a = new_session(ForwardSecrecyMode::Disabled);
        let mut b = new_session(ForwardSecrecyMode::Disabled);
        let a_hello = a.open().unwrap();
        b.open().unwrap();

        let bytes = extract_bytes(a_hello);
        let err = b.handle_incoming_bytes(&bytes[0], &RejectAll, None).unwrap_err();
        assert_eq!(err, SessionError::KeystoreReject);
        assert_eq!(b.state(), SessionState::Closed);
    }

    #[test]
    fn send_frame_before_authentication_is_rejected() {
        let mut session = new_session(ForwardSecrecyMode::Disabled);
        let frame = PlaintextFrame::new(FrameType::Event, 0, bytes::Bytes::from_static(b"x"));
        let err = session.send_frame(frame, VideoPriority::Normal).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[test]
    fn application_frames_round_trip_after_authentication() {
        let (mut a, mut b) = drive_handshake(ForwardSecrecyMode::Disabled);
        let keystore = AllowAll;

        let frame = PlaintextFrame::new(FrameType::Event, 0, bytes::Bytes::from_static(b"press-a"));
        let actions = a.send_frame(frame.clone(), VideoPriority::Normal).unwrap();
        let bytes = extract_bytes(actions);

        let mut delivered = Vec::new();
        for wire in bytes {
            for action in b.handle_incoming_bytes(&wire, &keystore, None).unwrap() {
                if let SessionAction::DeliverFrame(f) = action {
                    delivered.push(f);
                }
            }
        }

        assert_eq!(delivered, vec![frame]);
    }
}
