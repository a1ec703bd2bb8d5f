//! Simulation server wrapper for testing the directory controller with
//! turmoil.
//!
//! `SimDirectoryServer` wraps `a12_directory::server::DirectoryServer` for
//! integration with turmoil's deterministic simulation. It uses `SimEnv`
//! for the action-based session core, turmoil TCP for networking, and
//! tracks connection state in a `HashMap` (§4.5 "Directory controller").
//!
//! Runner processes are never spawned for real inside a simulation; tests
//! call [`SimDirectoryServer::register_stub_runner`] to wire up a runner
//! without a child process.

use std::{collections::HashMap, io, sync::Arc};

use a12_core::{
    handshake::{Keystore, KeystoreDecision, UnknownPeerHook},
    session::{Session, SessionAction},
    SessionConfig,
};
use a12_crypto::KeyPair;
use a12_directory::{
    context::DirectoryContext,
    dircl::{ApplId, Role},
    error::DirectoryError,
    kv_store::MemoryKvStore,
    runner::{BootstrapSignal, RunnerControl},
    server::{DirectoryAction, DirectoryEvent, DirectoryServer},
};
use a12_proto::{FrameType, PlaintextFrame, VideoPriority};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use turmoil::net::{TcpListener, TcpStream};

use crate::SimEnv;

/// Accepts every peer unconditionally; simulation tests classify roles
/// explicitly rather than exercising the on-disk keystore.
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

struct SimConnection {
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
    session: Session<SimEnv>,
}

/// A [`DirectoryServer`] driven over turmoil TCP sessions.
///
/// Designed for test-driven usage: tests explicitly accept connections and
/// pump frames rather than the server running its own accept loop.
pub struct SimDirectoryServer {
    directory: DirectoryServer,
    listener: TcpListener,
    identity: KeyPair,
    connections: HashMap<u64, SimConnection>,
    next_session_id: u64,
}

impl SimDirectoryServer {
    /// Bind a simulation directory server to `address`, wrapping `context`.
    ///
    /// # Errors
    ///
    /// Propagates the turmoil listener bind error.
    pub async fn bind(address: &str, context: Arc<DirectoryContext>, identity: KeyPair) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            directory: DirectoryServer::new(context),
            listener,
            identity,
            connections: HashMap::new(),
            next_session_id: 1,
        })
    }

    /// Accepts one incoming connection, drives its A12 handshake to
    /// completion, and registers it with the directory server under `role`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying socket error, or returns an I/O error if
    /// the peer disconnects before the handshake completes.
    pub async fn accept_connection(&mut self, role: Role) -> io::Result<u64> {
        let (stream, _addr) = self.listener.accept().await?;
        let (mut reader, mut writer) = tokio::io::split(stream);

        let session_id = self.next_session_id;
        let env = SimEnv::with_seed(session_id);
        let mut session =
            Session::new(env, SessionConfig::default(), KeyPair::from_secret_bytes(self.identity.secret_bytes()));
        let open_actions = session.open().map_err(io::Error::other)?;
        write_out(&mut writer, open_actions).await?;

        while !session.is_authenticated() {
            let mut buffer = [0u8; 64 * 1024];
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                return Err(io::Error::other("peer closed before handshake completed"));
            }
            let actions = session
                .handle_incoming_bytes(&buffer[..read], &AllowAll, Some(&AllowAll))
                .map_err(io::Error::other)?;
            write_out(&mut writer, actions).await?;
        }
        self.next_session_id += 1;

        let identity_hex = session
            .peer_identity()
            .map(|bytes| bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
            .unwrap_or_default();

        self.connections.insert(session_id, SimConnection { reader, writer, session });
        let actions =
            self.directory.process_event(DirectoryEvent::PeerConnected { session_id, identity: identity_hex, role });
        self.execute_actions(actions).await?;

        Ok(session_id)
    }

    /// Reads one chunk from `session_id`'s socket, feeds it to its session,
    /// and returns any post-handshake frames that were delivered.
    ///
    /// Returns `Ok(None)` once the peer has disconnected (the connection is
    /// removed and [`DirectoryEvent::PeerDisconnected`] is folded in).
    ///
    /// # Errors
    ///
    /// Propagates the underlying socket or session error.
    pub async fn pump(&mut self, session_id: u64) -> io::Result<Option<Vec<PlaintextFrame>>> {
        let Some(conn) = self.connections.get_mut(&session_id) else { return Ok(None) };

        let mut buffer = [0u8; 64 * 1024];
        let read = conn.reader.read(&mut buffer).await?;
        if read == 0 {
            self.disconnect(session_id).await?;
            return Ok(None);
        }

        let actions = conn
            .session
            .handle_incoming_bytes(&buffer[..read], &AllowAll, Some(&AllowAll))
            .map_err(io::Error::other)?;
        let frames = self.apply_session_actions(session_id, actions).await?;
        Ok(Some(frames))
    }

    async fn apply_session_actions(
        &mut self,
        session_id: u64,
        actions: Vec<SessionAction>,
    ) -> io::Result<Vec<PlaintextFrame>> {
        let mut frames = Vec::new();
        let mut closed = false;
        if let Some(conn) = self.connections.get_mut(&session_id) {
            for action in actions {
                match action {
                    SessionAction::SendBytes(bytes) => conn.writer.write_all(&bytes).await?,
                    SessionAction::DeliverFrame(frame) => frames.push(frame),
                    SessionAction::Close { .. } => closed = true,
                }
            }
        }
        if closed {
            self.disconnect(session_id).await?;
        }
        Ok(frames)
    }

    async fn disconnect(&mut self, session_id: u64) -> io::Result<()> {
        self.connections.remove(&session_id);
        let actions = self.directory.process_event(DirectoryEvent::PeerDisconnected { session_id });
        self.execute_actions(actions).await
    }

    /// Submits a join request on behalf of `session_id`.
    pub fn join(&mut self, session_id: u64, appl_name: &str) -> Vec<DirectoryAction> {
        self.directory.process_event(DirectoryEvent::JoinRequested { session_id, appl_name: appl_name.to_string() })
    }

    /// Wires up a runner for `appl` without spawning a real worker process:
    /// a no-op [`RunnerControl`] and an in-memory KV store. Returns the
    /// [`BootstrapSignal`] the caller completes to simulate the worker
    /// finishing its script initialisation.
    pub fn register_stub_runner(&mut self, appl: ApplId, appl_name: &str) -> BootstrapSignal {
        self.directory.register_runner(appl, Box::new(NullRunnerControl), Arc::new(MemoryKvStore::new(appl_name)))
    }

    /// Forwards a directory event directly, for scenarios that don't need
    /// a live socket (KV transactions, admin commands, resource requests).
    pub fn process_event(&mut self, event: DirectoryEvent) -> Vec<DirectoryAction> {
        self.directory.process_event(event)
    }

    /// Underlying directory server, for assertions.
    pub fn directory(&self) -> &DirectoryServer {
        &self.directory
    }

    /// Number of currently connected sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    async fn execute_actions(&mut self, actions: Vec<DirectoryAction>) -> io::Result<()> {
        for action in actions {
            match action {
                DirectoryAction::SendToSession { session_id, payload } => {
                    self.send_reply(session_id, &payload).await?;
                },
                DirectoryAction::SendToRunner { .. } | DirectoryAction::DeliverMatchViaBinaryTransfer { .. } => {
                    // Stub runners have no real pipe to forward replies
                    // or transfer payloads into during simulation.
                },
                DirectoryAction::CloseSession { session_id, .. } => {
                    self.disconnect(session_id).await?;
                },
                DirectoryAction::SpawnRunner { .. } | DirectoryAction::OpenResource { .. } => {
                    // A real binary spawns a worker process or opens a
                    // file; simulation tests call `register_stub_runner`
                    // explicitly instead.
                },
                DirectoryAction::Log { message, .. } => tracing::debug!("{message}"),
            }
        }
        Ok(())
    }

    async fn send_reply(&mut self, session_id: u64, payload: &str) -> io::Result<()> {
        let Some(conn) = self.connections.get_mut(&session_id) else { return Ok(()) };
        let frame =
            PlaintextFrame::new(FrameType::Event, a12_core::channel::CONTROL_CHANNEL, payload.as_bytes().to_vec());
        let actions = conn.session.send_frame(frame, VideoPriority::Normal).map_err(io::Error::other)?;
        write_out(&mut conn.writer, actions).await
    }
}

async fn write_out(writer: &mut WriteHalf<TcpStream>, actions: Vec<SessionAction>) -> io::Result<()> {
    for action in actions {
        if let SessionAction::SendBytes(bytes) = action {
            writer.write_all(&bytes).await?;
        }
    }
    Ok(())
}

struct NullRunnerControl;

impl RunnerControl for NullRunnerControl {
    fn send(&mut self, _message: &[u8]) -> Result<(), DirectoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use a12_directory::{config::DirectoryConfig, keystore::Keystore as FileKeystore};

    use super::*;

    fn test_context() -> Arc<DirectoryContext> {
        let dir = std::env::temp_dir().join(format!("a12-harness-test-{}", std::process::id()));
        let keystore = FileKeystore::open(dir).unwrap();
        let config = DirectoryConfig::from_toml(
            r#"
            listen_port = 6680

            [permissions]
            appl = "*"
            admin = "adminkey"

            [paths]
            database = "/var/a12/registry.redb"
            appl = "/var/a12/appl"
            appl_server = "/var/a12/appl_server"
            appl_server_data = "/var/a12/appl_server/data"
            appl_server_log = "/var/a12/appl_server/log"
            appl_server_temp = "/var/a12/appl_server/temp"
            keystore = "/var/a12/keystore"
            "#,
        )
        .unwrap();
        DirectoryContext::new(config, keystore).shared()
    }

    #[test]
    fn sim_directory_server_binds() {
        let mut sim = turmoil::Builder::new().build();
        sim.host("directory", || async {
            let context = test_context();
            let identity = KeyPair::from_secret_bytes([7u8; 32]);
            let server = SimDirectoryServer::bind("0.0.0.0:443", context, identity).await?;
            assert_eq!(server.connection_count(), 0);
            Ok(())
        });
        sim.run().unwrap();
    }

    #[test]
    fn registering_stub_runner_returns_completable_signal() {
        let context = test_context();
        context.registry_mut().register("alpha", std::path::PathBuf::from("/appl/alpha"), 1);
        let mut sim = turmoil::Builder::new().build();
        sim.host("directory", move || {
            let context = Arc::clone(&context);
            async move {
                let identity = KeyPair::from_secret_bytes([9u8; 32]);
                let mut server = SimDirectoryServer::bind("0.0.0.0:443", context, identity).await?;
                let signal = server.register_stub_runner(0, "alpha");
                signal.complete();
                let actions = server.process_event(DirectoryEvent::RunnerBootstrapped { appl: 0 });
                assert!(actions.is_empty());
                Ok(())
            }
        });
        sim.run().unwrap();
    }
}
