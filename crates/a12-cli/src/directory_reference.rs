//! The `directory-reference` subcommand: a minimal source/sink client
//! against a running directory-server (§4.5 "Hosting model" role
//! classification), useful for manual testing and as a worked example of
//! driving [`Session`] from outside the server process.
//!
//! Unlike `runner` (spawned by the server itself over a pipe) this worker
//! dials out over the network exactly as any third-party A12 client would:
//! it connects, authenticates, joins a named appl, and then pumps frames
//! between the connection and its own stdin/stdout so an operator can pipe
//! bytes through it by hand.

use a12_core::env::SystemEnv;
use a12_core::session::{Session, SessionConfig, SessionState};
use a12_crypto::KeyPair;
use a12_proto::payloads::{decode_cbor, encode_cbor, EventRecord};
use a12_proto::{FrameType, PlaintextFrame, VideoPriority};
use anyhow::Context;
use tokio::io::{stdin, stdout, AsyncReadExt};
use tokio::net::TcpStream;

use crate::keystore_bridge::AllowAllKeystore;
use crate::net;
use crate::protocol::WireMessage;

/// Connects to `host:port` as `tag`'s identity, joins `appl_name`, and
/// relays the appl's event-channel traffic against stdin/stdout until
/// either side closes.
///
/// # Errors
///
/// Returns an error if the keystore cannot be read, the connection fails,
/// or the handshake does not complete.
pub async fn run(
    keystore_path: &std::path::Path,
    tag: &str,
    host: &str,
    port: u16,
    appl_name: &str,
) -> anyhow::Result<()> {
    let keystore = a12_directory::keystore::Keystore::open(keystore_path)?;
    let identity = crate::identity::load_or_generate(&keystore, tag)?;

    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to directory {host}:{port}"))?;
    let _ = stream.set_nodelay(true);
    let (mut read_half, mut write_half) = stream.into_split();

    let mut session = Session::new(SystemEnv::new(), SessionConfig::default(), identity);
    let open_actions = session.open()?;
    let applied = net::apply_actions(&mut write_half, open_actions).await?;
    if applied.closed.is_some() {
        anyhow::bail!("directory closed the connection during handshake open");
    }

    // A reference client trusts whatever directory it was pointed at by
    // host/port/tag; it has no standing keystore relationship to verify
    // the server against, unlike `directory-link`'s federation peers.
    let allow_all = AllowAllKeystore;
    let mut joined = false;
    let mut stdin = stdin();
    let mut stdin_buf = [0u8; 4096];

    loop {
        tokio::select! {
            read = net::read_and_feed(&mut read_half, &mut session, &allow_all, Some(&allow_all)) => {
                let Some(actions) = read? else { break };
                let applied = net::apply_actions(&mut write_half, actions).await?;
                for frame in &applied.frames {
                    print_reply(frame);
                }
                if applied.closed.is_some() {
                    break;
                }

                if !joined && session.is_authenticated() {
                    joined = true;
                    let record = WireMessage::Join { appl_name: appl_name.to_string() }.encode();
                    let frame = encode_event_frame(&record)?;
                    let actions = session.send_frame(frame, VideoPriority::Normal)?;
                    net::apply_actions(&mut write_half, actions).await?;
                    tracing::info!(appl = appl_name, "join requested");
                }
            }
            read = stdin.read(&mut stdin_buf), if joined => {
                let n = read?;
                if n == 0 {
                    continue;
                }
                let text = String::from_utf8_lossy(&stdin_buf[..n]).trim().to_string();
                if text.is_empty() {
                    continue;
                }
                let record = WireMessage::RunnerRequest(text).encode();
                let frame = encode_event_frame(&record)?;
                let actions = session.send_frame(frame, VideoPriority::Normal)?;
                net::apply_actions(&mut write_half, actions).await?;
            }
        }
        if session.state() == SessionState::Closed {
            break;
        }
    }

    Ok(())
}

fn encode_event_frame(record: &EventRecord) -> anyhow::Result<PlaintextFrame> {
    let payload = encode_cbor(record)?;
    Ok(PlaintextFrame::new(FrameType::Event, a12_core::channel::CONTROL_CHANNEL, payload))
}

fn print_reply(frame: &PlaintextFrame) {
    if frame.frame_type != FrameType::Event {
        return;
    }
    let Ok(record) = decode_cbor::<EventRecord>(&frame.payload) else { return };
    if let Ok(WireMessage::Reply(text)) = WireMessage::decode(&record) {
        println!("{text}");
    }
}
