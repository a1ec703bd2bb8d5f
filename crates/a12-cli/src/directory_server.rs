//! The `directory-server` subcommand: accepts A12 connections, classifies
//! each into a [`Role`], and drives [`DirectoryServer`] against them,
//! spawning and wiring up per-appl runner workers on demand (§4.5).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use a12_core::env::SystemEnv;
use a12_core::session::{Session, SessionConfig, SessionState};
use a12_crypto::KeyPair;
use a12_directory::config::DirectoryConfig;
use a12_directory::context::DirectoryContext;
use a12_directory::dircl::{ApplId, Role};
use a12_directory::error::DirectoryError;
use a12_directory::keystore::Keystore as FileKeystore;
use a12_directory::kv_store::MemoryKvStore;
use a12_directory::permissions::Capability;
use a12_directory::runner::{BootstrapSignal, RunnerControl};
use a12_directory::server::{DirectoryAction, DirectoryEvent, DirectoryServer};
use a12_proto::payloads::{decode_cbor, encode_cbor, EventRecord};
use a12_proto::{FrameType, PlaintextFrame, VideoPriority};
use anyhow::Context;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;

use crate::keystore_bridge::{AllowAllKeystore, DirectoryKeystoreBridge};
use crate::protocol::WireMessage;
use crate::{identity, net};

/// Message pushed to a connected session's writer task from elsewhere in
/// the server (a reply the peer's own request triggered, or a reply routed
/// to it on another runner's behalf).
enum Outbound {
    Reply(String),
    Close(String),
}

/// Shared state every connection and runner task holds a clone of.
struct Shared {
    context: Arc<DirectoryContext>,
    server: Mutex<DirectoryServer>,
    connections: Mutex<HashMap<u64, UnboundedSender<Outbound>>>,
    runners: Mutex<HashMap<ApplId, UnboundedSender<String>>>,
    identity: Arc<KeyPair>,
    keystore: Arc<DirectoryKeystoreBridge>,
}

/// Runs a `directory-server` until the listener fails or the process is
/// killed.
///
/// # Errors
///
/// Returns an error if the listener cannot bind, the identity cannot be
/// loaded, or the applbase cannot be scanned.
pub async fn run(config: DirectoryConfig) -> anyhow::Result<()> {
    let handshake_keystore = Arc::new(FileKeystore::open(config.paths.keystore.clone())?);
    let identity = Arc::new(identity::load_or_generate(&handshake_keystore, "directory")?);
    let bridge = Arc::new(DirectoryKeystoreBridge::new(Arc::clone(&handshake_keystore), config.soft_auth));

    let context =
        DirectoryContext::new(config.clone(), FileKeystore::open(config.paths.keystore.clone())?).shared();

    let shared = Arc::new(Shared {
        context: Arc::clone(&context),
        server: Mutex::new(DirectoryServer::new(Arc::clone(&context))),
        connections: Mutex::new(HashMap::new()),
        runners: Mutex::new(HashMap::new()),
        identity,
        keystore: bridge,
    });

    scan_applbase(&shared).await?;

    for name in &config.autostart {
        match shared.context.registry().find_by_name(name).map(|meta| meta.identifier()) {
            Some(appl) => {
                let actions = shared.server.lock().await.request_autostart(appl);
                apply_actions(&shared, actions).await;
            },
            None => tracing::warn!(appl = %name, "autostart appl not found in applbase scan"),
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("binding directory-server to port {}", config.listen_port))?;
    tracing::info!(port = config.listen_port, "directory-server listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(shared, socket).await {
                tracing::debug!(%peer, "connection ended: {err}");
            }
        });
    }
}

async fn scan_applbase(shared: &Arc<Shared>) -> anyhow::Result<()> {
    let root = shared.context.config().paths.appl.clone();
    if !root.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(&root).with_context(|| format!("scanning applbase {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
        let now_unix =
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| d.as_secs());
        let actions = shared.server.lock().await.process_event(DirectoryEvent::ApplDiscovered {
            name,
            script_root: entry.path(),
            now_unix,
        });
        apply_actions(shared, actions).await;
    }
    Ok(())
}

fn encode_event_frame(record: &EventRecord) -> anyhow::Result<PlaintextFrame> {
    let payload = encode_cbor(record)?;
    Ok(PlaintextFrame::new(FrameType::Event, a12_core::channel::CONTROL_CHANNEL, payload))
}

fn decode_event_frame(frame: &PlaintextFrame) -> Option<WireMessage> {
    if frame.frame_type != FrameType::Event {
        return None;
    }
    let record: EventRecord = decode_cbor(&frame.payload).ok()?;
    WireMessage::decode(&record).ok()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn peer_identity_hex(session: &Session<SystemEnv>) -> String {
    session.peer_identity().map(|bytes| hex_encode(&bytes)).unwrap_or_default()
}

fn classify_role(shared: &Shared, identity: &str) -> Role {
    let permissions = shared.context.permissions();
    if permissions.check(identity, Capability::Admin).is_ok() {
        Role::Admin
    } else if permissions.check(identity, Capability::DirectoryLink).is_ok() {
        Role::DirectoryLink
    } else if permissions.check(identity, Capability::Source).is_ok() {
        Role::Source
    } else if permissions.check(identity, Capability::Monitor).is_ok() {
        Role::Monitor
    } else {
        Role::Sink
    }
}

async fn handle_connection(shared: Arc<Shared>, socket: TcpStream) -> anyhow::Result<()> {
    let _ = socket.set_nodelay(true);
    let (mut read_half, mut write_half) = socket.into_split();

    let mut session =
        Session::new(SystemEnv::new(), SessionConfig::default(), KeyPair::from_secret_bytes(shared.identity.secret_bytes()));
    let open_actions = session.open()?;
    let applied = net::apply_actions(&mut write_half, open_actions).await?;
    if applied.closed.is_some() {
        return Ok(());
    }

    let session_id = rand::random::<u64>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    shared.connections.lock().await.insert(session_id, outbound_tx);

    let mut role: Option<Role> = None;
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));

    loop {
        tokio::select! {
            read = net::read_and_feed(&mut read_half, &mut session, shared.keystore.as_ref(), Some(shared.keystore.as_ref())) => {
                let Some(actions) = read? else { break };
                let applied = net::apply_actions(&mut write_half, actions).await?;
                dispatch_client_frames(&shared, session_id, applied.frames).await;
                if applied.closed.is_some() {
                    break;
                }

                if role.is_none() && session.is_authenticated() {
                    let identity_hex = peer_identity_hex(&session);
                    let resolved = classify_role(&shared, &identity_hex);
                    role = Some(resolved);
                    let actions = shared.server.lock().await.process_event(DirectoryEvent::PeerConnected {
                        session_id,
                        identity: identity_hex,
                        role: resolved,
                    });
                    apply_actions(&shared, actions).await;
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Reply(payload)) => {
                        let record = WireMessage::Reply(payload).encode();
                        let frame = encode_event_frame(&record)?;
                        let actions = session.send_frame(frame, VideoPriority::Normal)?;
                        net::apply_actions(&mut write_half, actions).await?;
                    }
                    Some(Outbound::Close(reason)) => {
                        let actions = session.close(reason)?;
                        net::apply_actions(&mut write_half, actions).await?;
                        break;
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let actions = session.tick()?;
                net::apply_actions(&mut write_half, actions).await?;
            }
        }
        if session.state() == SessionState::Closed {
            break;
        }
    }

    shared.connections.lock().await.remove(&session_id);
    let actions = shared.server.lock().await.process_event(DirectoryEvent::PeerDisconnected { session_id });
    apply_actions(&shared, actions).await;
    Ok(())
}

async fn dispatch_client_frames(shared: &Arc<Shared>, session_id: u64, frames: Vec<PlaintextFrame>) {
    for frame in &frames {
        let Some(message) = decode_event_frame(frame) else { continue };
        let event = match message {
            WireMessage::Join { appl_name } => Some(DirectoryEvent::JoinRequested { session_id, appl_name }),
            WireMessage::Leave => Some(DirectoryEvent::LeaveRequested { session_id }),
            WireMessage::AdminCommand(text) => Some(DirectoryEvent::AdminCommandReceived { session_id, text }),
            WireMessage::RunnerRequest(_) | WireMessage::ResourceRequest(_) | WireMessage::BootstrapAck => {
                tracing::debug!("runner-only message received on a client session, ignoring");
                None
            },
            WireMessage::Reply(_) => None,
        };
        if let Some(event) = event {
            let actions = shared.server.lock().await.process_event(event);
            apply_actions(shared, actions).await;
        }
    }
}

/// Applies [`DirectoryAction`]s produced by the shared server: routes
/// session/runner replies through their owning task's channel, spawns
/// runners, and serves resource requests.
async fn apply_actions(shared: &Arc<Shared>, actions: Vec<DirectoryAction>) {
    for action in actions {
        match action {
            DirectoryAction::SendToSession { session_id, payload } => {
                if let Some(tx) = shared.connections.lock().await.get(&session_id) {
                    let _ = tx.send(Outbound::Reply(payload));
                }
            },
            DirectoryAction::SendToRunner { appl, payload } => {
                if let Some(tx) = shared.runners.lock().await.get(&appl) {
                    let _ = tx.send(payload);
                }
            },
            DirectoryAction::DeliverMatchViaBinaryTransfer { appl, id, body } => {
                // The directory<->runner pipe only speaks the hex-reply
                // convention this binary already uses for resource
                // delivery (`serve_resource`, below) rather than a full
                // multi-frame blob transfer; `match_transfer=` is a
                // distinct reply tag from the inline `match=ok:...`
                // path so the runner can tell the two apart.
                if let Some(tx) = shared.runners.lock().await.get(&appl) {
                    let _ = tx.send(format!("match_transfer=ok:id={id}:bytes={}", hex_encode(body.as_bytes())));
                }
            },
            DirectoryAction::CloseSession { session_id, reason } => {
                if let Some(tx) = shared.connections.lock().await.get(&session_id) {
                    let _ = tx.send(Outbound::Close(reason));
                }
            },
            DirectoryAction::SpawnRunner { appl } => {
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    if let Err(err) = spawn_runner(&shared, appl).await {
                        tracing::error!(appl, "failed to spawn runner: {err}");
                    }
                });
            },
            DirectoryAction::OpenResource { appl, path } => {
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    serve_resource(&shared, appl, path).await;
                });
            },
            DirectoryAction::Log { tag, message } => {
                tracing::debug!(target: tag.target(), "{message}");
            },
        }
    }
}

async fn serve_resource(shared: &Arc<Shared>, appl: ApplId, path: std::path::PathBuf) {
    let reply = match tokio::fs::read(&path).await {
        Ok(bytes) => format!("resource=ok:bytes={}", hex_encode(&bytes)),
        Err(err) => format!("resource=fail:reason={err}"),
    };
    if let Some(tx) = shared.runners.lock().await.get(&appl) {
        let _ = tx.send(reply);
    }
}

/// A [`RunnerControl`] that forwards already-packed text to the task
/// driving this runner's pipe session.
struct PipeRunnerControl(UnboundedSender<String>);

impl RunnerControl for PipeRunnerControl {
    fn send(&mut self, message: &[u8]) -> Result<(), DirectoryError> {
        let text = std::str::from_utf8(message).map_err(|err| DirectoryError::Storage(err.to_string()))?;
        self.0.send(text.to_string()).map_err(|_| DirectoryError::RunnerNotActive(0))
    }
}

async fn spawn_runner(shared: &Arc<Shared>, appl: ApplId) -> anyhow::Result<()> {
    let name = shared.context.registry().get(appl)?.name().to_string();
    let exe = std::env::current_exe()?;
    let mut child = tokio::process::Command::new(exe)
        .args(["runner", "--appl", &name])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("spawning runner for appl {name}"))?;

    let stdin = child.stdin.take().context("runner child had no stdin pipe")?;
    let stdout = child.stdout.take().context("runner child had no stdout pipe")?;

    let (runner_tx, mut runner_rx) = mpsc::unbounded_channel::<String>();
    let kv_store = Arc::new(MemoryKvStore::new(name.clone()));
    let signal =
        shared.server.lock().await.register_runner(appl, Box::new(PipeRunnerControl(runner_tx.clone())), kv_store);
    shared.runners.lock().await.insert(appl, runner_tx);

    let shared_for_pipe = Arc::clone(shared);
    tokio::spawn(async move {
        if let Err(err) = drive_runner_pipe(shared_for_pipe, appl, child, stdin, stdout, signal, runner_rx).await {
            tracing::warn!(appl, "runner pipe ended: {err}");
        }
    });

    Ok(())
}

async fn drive_runner_pipe(
    shared: Arc<Shared>,
    appl: ApplId,
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    signal: BootstrapSignal,
    mut runner_rx: mpsc::UnboundedReceiver<String>,
) -> anyhow::Result<()> {
    let mut stdout = BufReader::new(stdout);
    let identity = KeyPair::from_secret_bytes(shared.identity.secret_bytes());
    let mut session = Session::new(SystemEnv::new(), SessionConfig::default(), identity);
    let open_actions = session.open()?;
    let applied = net::apply_actions(&mut stdin, open_actions).await?;
    let mut signal = Some(signal);
    handle_runner_frames(&shared, appl, &mut signal, applied.frames).await;

    let allow_all = AllowAllKeystore;

    loop {
        tokio::select! {
            read = net::read_and_feed(&mut stdout, &mut session, &allow_all, Some(&allow_all)) => {
                let Some(actions) = read? else { break };
                let applied = net::apply_actions(&mut stdin, actions).await?;
                handle_runner_frames(&shared, appl, &mut signal, applied.frames).await;
                if applied.closed.is_some() {
                    break;
                }
            }
            forwarded = runner_rx.recv() => {
                let Some(payload) = forwarded else { break };
                let record = WireMessage::Reply(payload).encode();
                let frame = encode_event_frame(&record)?;
                let actions = session.send_frame(frame, VideoPriority::Normal)?;
                net::apply_actions(&mut stdin, actions).await?;
            }
        }
        if session.state() == SessionState::Closed {
            break;
        }
    }

    shared.runners.lock().await.remove(&appl);
    let _ = child.kill().await;
    Ok(())
}

async fn handle_runner_frames(
    shared: &Arc<Shared>,
    appl: ApplId,
    signal: &mut Option<BootstrapSignal>,
    frames: Vec<PlaintextFrame>,
) {
    for frame in &frames {
        let Some(message) = decode_event_frame(frame) else { continue };
        match message {
            WireMessage::BootstrapAck => {
                if let Some(signal) = signal.take() {
                    signal.complete();
                }
                let actions = shared.server.lock().await.process_event(DirectoryEvent::RunnerBootstrapped { appl });
                apply_actions(shared, actions).await;
            },
            WireMessage::RunnerRequest(text) => {
                let actions =
                    shared.server.lock().await.process_event(DirectoryEvent::RunnerRequestReceived { appl, text });
                apply_actions(shared, actions).await;
            },
            WireMessage::ResourceRequest(name) => {
                let actions =
                    shared.server.lock().await.process_event(DirectoryEvent::ResourceRequested { appl, name });
                apply_actions(shared, actions).await;
            },
            WireMessage::Join { .. } | WireMessage::Leave | WireMessage::AdminCommand(_) | WireMessage::Reply(_) => {
                tracing::debug!("client-only message received on a runner pipe, ignoring");
            },
        }
    }
}
