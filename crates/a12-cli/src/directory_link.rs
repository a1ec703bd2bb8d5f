//! The `directory-link` subcommand: dials an outbound connection to
//! another directory and exposes it as a `directory-link` dircl on that
//! remote end (§4.5 "Linked directories").
//!
//! This is the federation half of §4.5's "controller may open an outbound
//! connection to another directory using a stored key-tag" — the same
//! framing/auth/channel machinery as any incoming connection, just dialled
//! instead of accepted. It speaks the A12 codec directly over the socket
//! rather than through a shared [`crate::directory_server::run`] process,
//! matching how [`crate::runner::run`] is a standalone worker rather than
//! code living inside the server loop.

use std::sync::Arc;

use a12_core::env::SystemEnv;
use a12_core::session::{Session, SessionConfig, SessionState};
use a12_crypto::KeyPair;
use a12_directory::keystore::Keystore as FileKeystore;
use a12_directory::linked::LinkedDirectory;
use anyhow::Context;
use tokio::net::TcpStream;

use crate::keystore_bridge::DirectoryKeystoreBridge;
use crate::net;

/// Dials `host:port`, authenticating with the identity stored under
/// `tag`, and keeps the link open until the remote end closes it.
///
/// # Errors
///
/// Returns an error if the keystore cannot be read, the connection cannot
/// be established, or the handshake fails.
pub async fn run(keystore_path: &std::path::Path, tag: &str, host: &str, port: u16) -> anyhow::Result<()> {
    let file_keystore = Arc::new(FileKeystore::open(keystore_path)?);
    let identity = crate::identity::load_or_generate(&file_keystore, tag)?;

    let mut link = LinkedDirectory::new(tag, host, port);
    link.mark_connecting();

    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("dialing linked directory {host}:{port} (tag {tag})"))?;
    let _ = stream.set_nodelay(true);
    let (mut read_half, mut write_half) = stream.into_split();

    let mut session = Session::new(SystemEnv::new(), SessionConfig::default(), KeyPair::from_secret_bytes(identity.secret_bytes()));
    let open_actions = session.open()?;
    let applied = net::apply_actions(&mut write_half, open_actions).await?;
    if applied.closed.is_some() {
        anyhow::bail!("link to {host}:{port} closed during handshake open");
    }

    // The remote directory's long-term key must already be listed under
    // this tag's `known_peers` — a link is a standing federation
    // relationship, not a walk-up client, so it never soft-authenticates.
    let keystore = DirectoryKeystoreBridge::new(Arc::clone(&file_keystore), false);
    let mut linked = false;

    loop {
        let Some(actions) = net::read_and_feed(&mut read_half, &mut session, &keystore, Some(&keystore)).await?
        else {
            break;
        };
        let applied = net::apply_actions(&mut write_half, actions).await?;
        if applied.closed.is_some() {
            break;
        }

        if !linked && session.is_authenticated() {
            linked = true;
            let dircl = link.mark_linked();
            tracing::info!(tag = dircl.identity(), host, port, "directory link established");
        }

        if session.state() == SessionState::Closed {
            break;
        }
    }

    link.mark_disconnected();
    tracing::info!(tag, host, port, "directory link closed");
    Ok(())
}
