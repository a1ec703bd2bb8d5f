//! Single-session event-injection driver.
//!
//! `SessionDriver` wraps one [`Session`] and lets tests inject inbound
//! bytes and outbound frames one step at a time, capturing whatever the
//! session produces, without a real transport or a peer to drive it.
//! Useful for exercising channel scheduling (§4.3 C3) and rekey behavior
//! (§3 `KeyContext`) without also needing a second session or a directory
//! controller in the loop — see [`crate::cluster::SessionPair`] for two
//! sessions handshaking against each other.
//!
//! # Usage
//!
//! ```ignore
//! let env = SimEnv::with_seed(7);
//! let mut driver = SessionDriver::new(env, KeyPair::generate(&mut OsRng));
//! driver.open();
//! driver.inject_bytes(&peer_handshake_bytes);
//! let frames = driver.take_outgoing();
//! ```

use a12_core::{
    env::Environment,
    handshake::{Keystore, KeystoreDecision, UnknownPeerHook},
    session::{Session, SessionAction, SessionConfig},
};
use a12_crypto::KeyPair;
use a12_proto::{PlaintextFrame, VideoPriority};

/// Accepts every peer unconditionally and auto-registers unknown ones.
/// Drivers are for exercising session/channel mechanics, not keystore
/// policy — tests that need rejection wire up their own `Keystore`.
struct AllowAll;

impl Keystore for AllowAll {
    fn lookup(&self, _peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
        KeystoreDecision::Known
    }
}

impl UnknownPeerHook for AllowAll {
    fn register_unknown(&self, _peer_long_term_public: &[u8; 32]) -> bool {
        true
    }
}

/// Drives a single [`Session`] by injecting inbound bytes and outbound
/// frames, accumulating whatever bytes/frames the session produces in
/// response.
pub struct SessionDriver<E: Environment> {
    session: Session<E>,
    outgoing_bytes: Vec<Vec<u8>>,
    delivered_frames: Vec<PlaintextFrame>,
    closed: Option<String>,
}

impl<E: Environment> SessionDriver<E> {
    /// Create a driver wrapping a freshly constructed session. Call
    /// [`Self::open`] to start its handshake.
    pub fn new(env: E, config: SessionConfig, local_identity: KeyPair) -> Self {
        Self {
            session: Session::new(env, config, local_identity),
            outgoing_bytes: Vec::new(),
            delivered_frames: Vec::new(),
            closed: None,
        }
    }

    /// Starts the handshake, capturing whatever bytes the session wants to
    /// send first.
    ///
    /// # Panics
    ///
    /// Panics if the session is not in its initial state — a driver is
    /// only ever opened once.
    pub fn open(&mut self) {
        let actions = self.session.open().expect("open from Init never fails");
        self.record(actions);
    }

    /// Feeds `bytes` to the session as if they arrived from its peer.
    ///
    /// # Panics
    ///
    /// Panics if the session rejects the bytes — callers that want to
    /// assert on rejection should call `session_mut().handle_incoming_bytes`
    /// directly instead.
    pub fn inject_bytes(&mut self, bytes: &[u8]) {
        let actions = self.session.handle_incoming_bytes(bytes, &AllowAll, Some(&AllowAll)).expect("valid bytes");
        self.record(actions);
    }

    /// Sends a frame from this session, capturing the resulting ciphertext.
    ///
    /// # Panics
    ///
    /// Panics if sending fails (channel full, session not authenticated).
    pub fn inject_frame(&mut self, frame: PlaintextFrame, priority: VideoPriority) {
        let actions = self.session.send_frame(frame, priority).expect("send succeeds");
        self.record(actions);
    }

    /// Advances the session's internal clock, triggering idle/heartbeat/
    /// rekey checks.
    ///
    /// # Panics
    ///
    /// Panics if `tick` reports an error (e.g. handshake timeout).
    pub fn tick(&mut self) {
        let actions = self.session.tick().expect("tick succeeds");
        self.record(actions);
    }

    fn record(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::SendBytes(bytes) => self.outgoing_bytes.push(bytes),
                SessionAction::DeliverFrame(frame) => self.delivered_frames.push(frame),
                SessionAction::Close { reason } => self.closed = Some(reason),
            }
        }
    }

    /// Takes all bytes the session has queued to send since the last call.
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outgoing_bytes)
    }

    /// Takes all frames the session has delivered since the last call.
    pub fn take_delivered(&mut self) -> Vec<PlaintextFrame> {
        std::mem::take(&mut self.delivered_frames)
    }

    /// The reason the session closed itself, if it has.
    pub fn close_reason(&self) -> Option<&str> {
        self.closed.as_deref()
    }

    /// Whether the session has completed its handshake.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Direct access to the wrapped session, for assertions the driver
    /// doesn't otherwise expose (channel budgets, peer identity).
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Mutable access to the wrapped session.
    pub fn session_mut(&mut self) -> &mut Session<E> {
        &mut self.session
    }
}
