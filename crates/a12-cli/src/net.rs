//! Transport primitives shared by every subcommand: turning a
//! [`Session`]'s [`SessionAction`]s into real reads/writes on a socket or
//! pipe, so each subcommand's driver loop only has to decide what to do
//! with delivered frames.

use a12_core::env::Environment;
use a12_core::handshake::{Keystore, UnknownPeerHook};
use a12_core::session::{Session, SessionAction};
use a12_proto::PlaintextFrame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Outcome of applying a batch of [`SessionAction`]s to a live socket.
pub struct Applied {
    /// Post-handshake frames the caller should act on.
    pub frames: Vec<PlaintextFrame>,
    /// Set once a [`SessionAction::Close`] was seen; the caller should stop
    /// driving this connection after handling any frames above.
    pub closed: Option<String>,
}

/// Writes every `SendBytes` action to `socket` in order, and separates out
/// delivered frames / the close reason for the caller.
///
/// # Errors
///
/// Propagates the underlying socket write error.
pub async fn apply_actions<S: AsyncWrite + Unpin>(
    socket: &mut S,
    actions: Vec<SessionAction>,
) -> std::io::Result<Applied> {
    let mut frames = Vec::new();
    let mut closed = None;
    for action in actions {
        match action {
            SessionAction::SendBytes(bytes) => socket.write_all(&bytes).await?,
            SessionAction::DeliverFrame(frame) => frames.push(frame),
            SessionAction::Close { reason } => closed = Some(reason),
        }
    }
    Ok(Applied { frames, closed })
}

/// Reads one chunk from `socket` and feeds it to `session`, returning the
/// resulting actions. A zero-length read means the peer closed the
/// transport; this is reported as `Ok(None)` rather than an error so the
/// caller can distinguish a clean disconnect from a real I/O failure.
///
/// # Errors
///
/// Propagates the underlying socket read error, or any [`SessionError`]
/// the session raises while processing the bytes (terminal: the caller
/// should treat the session as closed after this).
pub async fn read_and_feed<S, E>(
    socket: &mut S,
    session: &mut Session<E>,
    keystore: &dyn Keystore,
    unknown_hook: Option<&dyn UnknownPeerHook>,
) -> anyhow::Result<Option<Vec<SessionAction>>>
where
    S: AsyncRead + Unpin,
    E: Environment,
{
    let mut buffer = [0u8; 64 * 1024];
    let read = socket.read(&mut buffer).await?;
    if read == 0 {
        return Ok(None);
    }
    let actions = session.handle_incoming_bytes(&buffer[..read], keystore, unknown_hook)?;
    Ok(Some(actions))
}
