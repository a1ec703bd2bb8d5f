//! The `runner` subcommand: the child-process side of a controller worker
//! (§3 "RunnerState", §4.6).
//!
//! Spawned by `directory-server` with its stdin/stdout wired to a pipe, a
//! runner speaks the same A12 codec as any network peer, just over that
//! local pipe instead of a socket (§4.6). It authenticates through
//! [`AllowAllKeystore`] rather than a real keystore lookup, since the only
//! peer it can ever see is the parent that spawned it.
//!
//! This binary does not embed an appl scripting engine; it represents the
//! "controller worker" half of the protocol (handshake, bootstrap
//! announcement, KV mediation request/reply) without the domain-specific
//! script runtime a real appl would plug in behind it.

use a12_core::env::SystemEnv;
use a12_core::session::{Session, SessionConfig, SessionState};
use a12_crypto::KeyPair;
use a12_proto::{FrameType, PlaintextFrame, VideoPriority};
use rand::rngs::OsRng;
use tokio::io::{stdin, stdout};

use crate::keystore_bridge::AllowAllKeystore;
use crate::net;
use crate::protocol::WireMessage;

/// Runs a runner worker for `appl_name` until its pipe closes.
///
/// # Errors
///
/// Returns an error if the handshake or any subsequent frame exchange
/// fails.
pub async fn run(appl_name: &str) -> anyhow::Result<()> {
    let identity = KeyPair::generate(&mut OsRng);
    let mut session = Session::new(SystemEnv::new(), SessionConfig::default(), identity);

    let mut input = stdin();
    let mut output = stdout();

    let open_actions = session.open()?;
    let applied = net::apply_actions(&mut output, open_actions).await?;
    if applied.closed.is_some() {
        return Ok(());
    }

    let allow_all = AllowAllKeystore;
    let mut announced = false;

    loop {
        let Some(actions) =
            net::read_and_feed(&mut input, &mut session, &allow_all, Some(&allow_all)).await?
        else {
            break;
        };
        let applied = net::apply_actions(&mut output, actions).await?;
        for frame in &applied.frames {
            if frame.frame_type != FrameType::Event {
                continue;
            }
            let record: a12_proto::payloads::EventRecord = a12_proto::payloads::decode_cbor(&frame.payload)?;
            if let Ok(WireMessage::Reply(text)) = WireMessage::decode(&record) {
                tracing::debug!(appl = appl_name, reply = %text, "received reply from directory");
            }
        }
        if applied.closed.is_some() {
            break;
        }

        if !announced && session.is_authenticated() {
            announced = true;
            let record = WireMessage::BootstrapAck.encode();
            let payload = a12_proto::payloads::encode_cbor(&record)?;
            let frame = PlaintextFrame::new(FrameType::Event, a12_core::channel::CONTROL_CHANNEL, payload);
            let actions = session.send_frame(frame, VideoPriority::Normal)?;
            net::apply_actions(&mut output, actions).await?;
            tracing::info!(appl = appl_name, "bootstrap complete, announced to directory");
        }

        if session.state() == SessionState::Closed {
            break;
        }
    }

    Ok(())
}
