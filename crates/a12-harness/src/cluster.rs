//! Two-session test cluster for handshake and delivery convergence testing.
//!
//! A12 sessions are strictly point-to-point (§3 `Session` — "a full-duplex
//! connection between two peers"), so unlike a group-messaging protocol
//! there is no room/broadcast fan-out to simulate. [`SessionPair`] drives
//! two [`Session`]s through the handshake and lets tests exchange frames
//! and assert on what the other side observed, without a real transport.

use a12_core::{
    handshake::{ForwardSecrecyMode, Keystore, KeystoreDecision},
    session::{Session, SessionAction, SessionConfig},
};
use a12_crypto::KeyPair;
use a12_proto::{PlaintextFrame, VideoPriority};
use rand::rngs::OsRng;

use crate::SimEnv;

/// Accepts every peer's long-term key unconditionally. Tests that need
/// rejection behavior construct their own `Keystore` impl instead.
struct AllowAll;

impl Keystore for AllowAll {
    fn lookup(&self, _peer_long_term_public: &[u8; 32]) -> KeystoreDecision {
        KeystoreDecision::Known
    }
}

/// Two [`Session`]s, handshaken against each other over in-memory byte
/// buffers (no socket, no turmoil).
pub struct SessionPair {
    /// First session.
    pub a: Session<SimEnv>,
    /// Second session.
    pub b: Session<SimEnv>,
}

impl SessionPair {
    /// Create a pair of sessions with fresh long-term identities and drive
    /// the handshake to completion.
    ///
    /// # Panics
    ///
    /// Panics if the handshake does not complete within a bounded number of
    /// exchange rounds, or if either side reports an error — both indicate
    /// a protocol bug, not an expected test outcome.
    #[must_use]
    pub fn new(seed: u64, forward_secrecy: ForwardSecrecyMode) -> Self {
        Self::new_with_config(seed, forward_secrecy, SessionConfig::default())
    }

    /// Like [`Self::new`], but with a caller-supplied base config (e.g. a
    /// shrunk `rekey_bytes_limit` to exercise mid-session rekey without
    /// sending gigabytes of traffic).
    ///
    /// # Panics
    ///
    /// Same as [`Self::new`].
    #[must_use]
    pub fn new_with_config(seed: u64, forward_secrecy: ForwardSecrecyMode, base: SessionConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let config = SessionConfig { forward_secrecy, ..base };
        let mut a = Session::new(env.clone(), config.clone(), KeyPair::generate(&mut OsRng));
        let mut b = Session::new(env, config, KeyPair::generate(&mut OsRng));
        let keystore = AllowAll;

        let mut a_out = extract_bytes(a.open().expect("first open always succeeds"));
        let mut b_out = extract_bytes(b.open().expect("first open always succeeds"));

        for _ in 0..8 {
            if a.is_authenticated() && b.is_authenticated() {
                break;
            }
            for bytes in std::mem::take(&mut b_out) {
                let actions = a.handle_incoming_bytes(&bytes, &keystore, None).expect("handshake bytes valid");
                a_out.extend(extract_bytes(actions));
            }
            for bytes in std::mem::take(&mut a_out) {
                let actions = b.handle_incoming_bytes(&bytes, &keystore, None).expect("handshake bytes valid");
                b_out.extend(extract_bytes(actions));
            }
        }

        assert!(a.is_authenticated() && b.is_authenticated(), "handshake did not converge");
        Self { a, b }
    }

    /// Send `frame` from `a` to `b` (or vice versa with `reverse = true`)
    /// and assert it is delivered unchanged.
    ///
    /// # Errors
    ///
    /// Returns a description of whatever didn't match if delivery fails.
    pub fn send_and_verify(
        &mut self,
        frame: PlaintextFrame,
        priority: VideoPriority,
        reverse: bool,
    ) -> Result<(), String> {
        let (sender, receiver) = if reverse { (&mut self.b, &mut self.a) } else { (&mut self.a, &mut self.b) };

        let actions =
            sender.send_frame(frame.clone(), priority).map_err(|e| format!("send failed: {e}"))?;

        let mut delivered = None;
        for bytes in extract_bytes(actions) {
            let keystore = AllowAll;
            for action in receiver.handle_incoming_bytes(&bytes, &keystore, None).map_err(|e| format!("receive failed: {e}"))? {
                if let SessionAction::DeliverFrame(f) = action {
                    delivered = Some(f);
                }
            }
        }

        match delivered {
            Some(f) if f.frame_type == frame.frame_type && f.payload == frame.payload => Ok(()),
            Some(f) => Err(format!("delivered frame mismatch: {f:?}")),
            None => Err("frame was not delivered".to_string()),
        }
    }

    /// Ticks both sessions and relays whatever control traffic (rekey
    /// requests/acks, heartbeats) they produce until neither side has
    /// anything left to send.
    ///
    /// # Panics
    ///
    /// Panics if either tick or the resulting byte exchange reports an
    /// error.
    pub fn tick_both(&mut self) {
        let keystore = AllowAll;
        let mut a_out = extract_bytes(self.a.tick().expect("tick succeeds"));
        let mut b_out = extract_bytes(self.b.tick().expect("tick succeeds"));

        for _ in 0..8 {
            if a_out.is_empty() && b_out.is_empty() {
                break;
            }
            let mut next_a_out = Vec::new();
            let mut next_b_out = Vec::new();
            for bytes in b_out.drain(..) {
                next_a_out.extend(extract_bytes(
                    self.a.handle_incoming_bytes(&bytes, &keystore, None).expect("rekey bytes valid"),
                ));
            }
            for bytes in a_out.drain(..) {
                next_b_out.extend(extract_bytes(
                    self.b.handle_incoming_bytes(&bytes, &keystore, None).expect("rekey bytes valid"),
                ));
            }
            a_out = next_a_out;
            b_out = next_b_out;
        }
    }
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
