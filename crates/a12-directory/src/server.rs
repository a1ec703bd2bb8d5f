//! Directory server orchestration (§4.5 "Directory controller").
//!
//! Every other module in this crate is a disconnected piece of pure logic:
//! [`crate::appl::ApplRegistry`] tracks appls, [`crate::runner::RunnerState`]
//! tracks one worker, [`crate::kv::parse_runner_request`] parses a wire
//! string. Nothing wires an authenticated peer's control-plane traffic to
//! any of them. `DirectoryServer` is that wiring, action-driven the same
//! way `Session` is in `a12-core`: it performs no I/O and holds no socket.
//! `process_event` takes one [`DirectoryEvent`] and returns the
//! [`DirectoryAction`]s the caller must carry out — send these bytes here,
//! close that session, go spawn a worker. A production binary executes
//! actions against real sockets and processes; a simulation harness
//! executes them against fakes, so the exact same dispatch logic runs
//! either way.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::admin::parse_admin_command;
use crate::config::LogTag;
use crate::context::DirectoryContext;
use crate::dircl::{ApplId, DirectoryClient, Role};
use crate::error::DirectoryError;
use crate::kv::{parse_runner_request, RunnerRequest};
use crate::kv_store::KvStore;
use crate::permissions::Capability;
use crate::resources::resolve_under;
use crate::runner::{BootstrapSignal, RunnerControl, RunnerState};

/// Inbound events the directory server reacts to.
#[derive(Debug)]
pub enum DirectoryEvent {
    /// A peer finished the A12 handshake and was classified into `role`.
    PeerConnected {
        /// Runtime-assigned connection id.
        session_id: u64,
        /// Hex-encoded long-term public key.
        identity: String,
        /// Role classified at connect (§4.5 "Hosting model").
        role: Role,
    },
    /// A connected peer's transport dropped.
    PeerDisconnected {
        /// Connection id that disconnected.
        session_id: u64,
    },
    /// A sink/source/monitor client asked to join a hosted appl by name.
    JoinRequested {
        /// Requesting connection id.
        session_id: u64,
        /// On-disk appl name.
        appl_name: String,
    },
    /// A joined client asked to leave its appl.
    LeaveRequested {
        /// Requesting connection id.
        session_id: u64,
    },
    /// A runner's control channel sent a packed request (§4.5 "KV store
    /// mediation").
    RunnerRequestReceived {
        /// Appl the sending runner hosts.
        appl: ApplId,
        /// Unparsed request text.
        text: String,
    },
    /// An admin-role client submitted a packed command.
    AdminCommandReceived {
        /// Requesting connection id.
        session_id: u64,
        /// Unparsed command text.
        text: String,
    },
    /// A runner asked to open a named resource from its appl's resource
    /// directory.
    ResourceRequested {
        /// Appl making the request.
        appl: ApplId,
        /// Requested file name.
        name: String,
    },
    /// The spawner (production supervisor, or a test harness) signalled
    /// that a previously requested runner finished bootstrapping.
    RunnerBootstrapped {
        /// The appl whose runner finished bootstrap.
        appl: ApplId,
    },
    /// A freshly scanned applbase entry, registered or re-touched.
    ApplDiscovered {
        /// On-disk appl name.
        name: String,
        /// Script root directory.
        script_root: PathBuf,
        /// Unix timestamp of the scan.
        now_unix: u64,
    },
}

/// Outbound actions the caller must carry out. None of these touch a
/// socket or spawn a process directly — the caller executes them against
/// whatever transport/process backend it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryAction {
    /// Send a packed reply to a connected session's control channel.
    SendToSession {
        /// Destination connection id.
        session_id: u64,
        /// Packed reply text (same `key=value:...` grammar as requests).
        payload: String,
    },
    /// Forward a packed message to a runner's control channel.
    SendToRunner {
        /// Destination appl.
        appl: ApplId,
        /// Packed message text.
        payload: String,
    },
    /// Tear down a session (transport-layer, not a [`DirectoryError`] —
    /// those never close a session).
    CloseSession {
        /// Connection id to close.
        session_id: u64,
        /// Human-readable reason.
        reason: String,
    },
    /// Asks the caller to spawn (or confirm already running) a controller
    /// worker for `appl`. The caller eventually reports readiness with
    /// [`DirectoryEvent::RunnerBootstrapped`] after calling
    /// [`DirectoryServer::register_runner`].
    SpawnRunner {
        /// Appl to spawn a worker for.
        appl: ApplId,
    },
    /// Asks the caller to open `path` (already validated and resolved
    /// under the appl's resource root) and deliver its contents to the
    /// requesting runner.
    OpenResource {
        /// Appl the resource belongs to.
        appl: ApplId,
        /// Resolved filesystem path.
        path: PathBuf,
    },
    /// Structured log line, filed under a directory log tag (§6 config).
    Log {
        /// Tag this entry should be filtered under.
        tag: LogTag,
        /// Message text.
        message: String,
    },
    /// Delivers a runner's `match` result set that was too large to pack
    /// inline: the caller opens a fresh `BinaryTransfer` to the runner's
    /// control channel and writes `body` into it (§4.5 "replies stream back
    /// either as events \[...\] or via a fresh binary transfer the
    /// controller writes into").
    DeliverMatchViaBinaryTransfer {
        /// Appl whose runner issued the `match` request.
        appl: ApplId,
        /// Correlation id from the runner's request, echoed back so the
        /// runner can match the transfer to its query.
        id: u64,
        /// Packed `key=value` entries, comma-separated — the same grammar
        /// as the inline reply body, just delivered as transfer payload
        /// instead of a control message.
        body: String,
    },
}

/// Above this many bytes, a `match` reply is delivered via a fresh
/// [`DirectoryAction::DeliverMatchViaBinaryTransfer`] instead of packed
/// inline into a control reply (§4.5).
const MATCH_INLINE_THRESHOLD_BYTES: usize = 4096;

/// Per-appl runtime state the server layers on top of the registry:
/// the active worker (if any) and its KV store, plus sessions waiting on
/// that worker's bootstrap to complete before they can be admitted.
#[derive(Default)]
struct ApplRuntime {
    runner: Option<RunnerState<Box<dyn RunnerControl>>>,
    kv_store: Option<std::sync::Arc<dyn KvStore>>,
    pending_joins: Vec<u64>,
}

/// Ties a [`DirectoryContext`]'s shared state to the live connection and
/// runner tables. One instance per directory process.
pub struct DirectoryServer {
    context: std::sync::Arc<DirectoryContext>,
    clients: HashMap<u64, DirectoryClient>,
    runtimes: HashMap<ApplId, ApplRuntime>,
}

impl DirectoryServer {
    /// Builds a server around a shared context, with no connected clients
    /// and no active runners.
    #[must_use]
    pub fn new(context: std::sync::Arc<DirectoryContext>) -> Self {
        Self { context, clients: HashMap::new(), runtimes: HashMap::new() }
    }

    /// Registers the control handle and KV store for a runner the caller
    /// just spawned in response to [`DirectoryAction::SpawnRunner`].
    /// Returns the [`BootstrapSignal`] the spawner must fire once the
    /// worker's script initialisation finishes.
    #[must_use]
    pub fn register_runner(
        &mut self,
        appl: ApplId,
        control: Box<dyn RunnerControl>,
        kv_store: std::sync::Arc<dyn KvStore>,
    ) -> BootstrapSignal {
        let (runner, signal) = RunnerState::new(appl, control);
        let runtime = self.runtimes.entry(appl).or_default();
        runtime.runner = Some(runner);
        runtime.kv_store = Some(kv_store);
        signal
    }

    /// Processes one event, returning the actions the caller must carry
    /// out. Never blocks and never panics on malformed peer input —
    /// [`DirectoryError`]s are folded into a reply/log action rather than
    /// propagated, per §7 tier 3 ("never tears down a session").
    pub fn process_event(&mut self, event: DirectoryEvent) -> Vec<DirectoryAction> {
        match event {
            DirectoryEvent::PeerConnected { session_id, identity, role } => {
                self.clients.insert(session_id, DirectoryClient::new(identity, role));
                vec![DirectoryAction::Log {
                    tag: LogTag::Directory,
                    message: format!("session {session_id} connected, role={role:?}"),
                }]
            }
            DirectoryEvent::PeerDisconnected { session_id } => self.handle_disconnect(session_id),
            DirectoryEvent::JoinRequested { session_id, appl_name } => {
                self.handle_join(session_id, &appl_name)
            }
            DirectoryEvent::LeaveRequested { session_id } => self.handle_leave(session_id),
            DirectoryEvent::RunnerRequestReceived { appl, text } => {
                self.handle_runner_request(appl, &text)
            }
            DirectoryEvent::AdminCommandReceived { session_id, text } => {
                self.handle_admin_command(session_id, &text)
            }
            DirectoryEvent::ResourceRequested { appl, name } => self.handle_resource_request(appl, &name),
            DirectoryEvent::RunnerBootstrapped { appl } => self.handle_runner_bootstrapped(appl),
            DirectoryEvent::ApplDiscovered { name, script_root, now_unix } => {
                self.handle_appl_discovered(&name, script_root, now_unix)
            }
        }
    }

    /// Requests a runner be spawned for `appl` without attaching any
    /// waiting session (§4.5 "on boot if the appl is in the autostart
    /// list", §8 scenario 3). A caller drives this once per configured
    /// autostart appl before starting its accept loop, and blocks on the
    /// returned [`crate::runner::BootstrapSignal`] (via
    /// [`crate::runner::RunnerState::wait_bootstrap`]) so the accept loop
    /// never resumes before bootstrap completes.
    ///
    /// A no-op, per the "exactly one `RunnerState` per appl" invariant
    /// (§3), if a runner already exists for this appl.
    pub fn request_autostart(&mut self, appl: ApplId) -> Vec<DirectoryAction> {
        let runtime = self.runtimes.entry(appl).or_default();
        if runtime.runner.is_some() {
            return vec![log(format!("autostart skipped, appl {appl} already has a runner"))];
        }
        vec![DirectoryAction::SpawnRunner { appl }]
    }

    /// Whether `appl`'s runner has finished bootstrap. `false` for an appl
    /// with no runtime record at all (never joined, never autostarted).
    #[must_use]
    pub fn is_runner_bootstrapped(&self, appl: ApplId) -> bool {
        self.runtimes.get(&appl).is_some_and(|runtime| {
            runtime.runner.as_ref().is_some_and(RunnerState::is_bootstrapped)
        })
    }

    /// Sessions still queued on `appl`'s bootstrap, oldest first.
    #[must_use]
    pub fn pending_joins(&self, appl: ApplId) -> &[u64] {
        self.runtimes.get(&appl).map_or(&[], |runtime| runtime.pending_joins.as_slice())
    }

    /// The appl a connected session is currently joined to, if any.
    #[must_use]
    pub fn client_joined_appl(&self, session_id: u64) -> Option<ApplId> {
        self.clients.get(&session_id).and_then(DirectoryClient::in_appl)
    }

    fn handle_disconnect(&mut self, session_id: u64) -> Vec<DirectoryAction> {
        self.clients.remove(&session_id);
        vec![DirectoryAction::Log {
            tag: LogTag::Directory,
            message: format!("session {session_id} disconnected"),
        }]
    }

    fn handle_join(&mut self, session_id: u64, appl_name: &str) -> Vec<DirectoryAction> {
        let Some(client) = self.clients.get(&session_id) else {
            return vec![log(format!("join from unknown session {session_id}"))];
        };

        if let Err(err) = self.context.permissions().check(client.identity(), Capability::Appl) {
            return vec![
                log(format!("session {session_id} denied join: {err}")),
                DirectoryAction::CloseSession { session_id, reason: err.to_string() },
            ];
        }

        let Some(appl) = self.context.registry().find_by_name(appl_name).map(|meta| meta.identifier()) else {
            return vec![DirectoryAction::SendToSession {
                session_id,
                payload: format!("join=fail:reason=unknown_appl:name={appl_name}"),
            }];
        };

        let runtime = self.runtimes.entry(appl).or_default();
        let has_runner = runtime.runner.is_some();
        let bootstrapped = runtime.runner.as_ref().is_some_and(|runner| runner.is_bootstrapped());
        if !(has_runner && bootstrapped) {
            runtime.pending_joins.push(session_id);
        }

        if has_runner && bootstrapped {
            self.admit_join(session_id, appl)
        } else if has_runner {
            vec![log(format!("session {session_id} queued, runner for appl {appl} still bootstrapping"))]
        } else {
            vec![DirectoryAction::SpawnRunner { appl }]
        }
    }

    fn admit_join(&mut self, session_id: u64, appl: ApplId) -> Vec<DirectoryAction> {
        if let Some(client) = self.clients.get_mut(&session_id) {
            client.join(appl);
        }
        vec![DirectoryAction::SendToSession { session_id, payload: format!("join=ok:appl={appl}") }]
    }

    fn handle_leave(&mut self, session_id: u64) -> Vec<DirectoryAction> {
        if let Some(client) = self.clients.get_mut(&session_id) {
            client.unjoin();
        }
        vec![DirectoryAction::SendToSession { session_id, payload: "leave=ok".to_string() }]
    }

    fn handle_runner_bootstrapped(&mut self, appl: ApplId) -> Vec<DirectoryAction> {
        let Some(runtime) = self.runtimes.get_mut(&appl) else {
            return vec![log(format!("bootstrap signal for unknown runner, appl {appl}"))];
        };
        if let Some(runner) = runtime.runner.as_mut() {
            // The spawner already called `BootstrapSignal::complete` before
            // emitting this event, so this never actually blocks.
            runner.wait_bootstrap();
        }
        let waiting = std::mem::take(&mut runtime.pending_joins);
        waiting.into_iter().flat_map(|session_id| self.admit_join(session_id, appl)).collect()
    }

    fn handle_runner_request(&mut self, appl: ApplId, text: &str) -> Vec<DirectoryAction> {
        let request = match parse_runner_request(text) {
            Ok(request) => request,
            Err(err) => return vec![self.runner_error_reply(appl, &err)],
        };

        let Some(store) = self.runtimes.get(&appl).and_then(|runtime| runtime.kv_store.clone()) else {
            return vec![self.runner_error_reply(appl, &DirectoryError::RunnerNotActive(appl))];
        };

        match request {
            RunnerRequest::BeginKvTransaction => match store.begin_transaction() {
                Ok(()) => vec![reply_to_runner(appl, "begin_kv_transaction=ok")],
                Err(err) => vec![self.runner_error_reply(appl, &err)],
            },
            RunnerRequest::SetKey { key, value } => match store.set_key(&key, &value) {
                Ok(()) => vec![reply_to_runner(appl, &format!("setkey=ok:key={key}"))],
                Err(err) => vec![self.runner_error_reply(appl, &err)],
            },
            RunnerRequest::EndKvTransaction => match store.end_transaction() {
                Ok(()) => vec![reply_to_runner(appl, "end_kv_transaction=ok")],
                Err(err) => vec![self.runner_error_reply(appl, &err)],
            },
            RunnerRequest::Match { pattern, id } => {
                let matches = store.match_keys(&pattern);
                let body = matches
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(",");
                if body.len() > MATCH_INLINE_THRESHOLD_BYTES {
                    vec![DirectoryAction::DeliverMatchViaBinaryTransfer { appl, id, body }]
                } else {
                    vec![reply_to_runner(appl, &format!("match=ok:id={id}:entries={body}"))]
                }
            }
            RunnerRequest::Launch { target, id, dst } => self.handle_launch(appl, &target, id, dst.as_deref()),
            RunnerRequest::Reload => {
                vec![reply_to_runner(appl, "reload=ok")]
            }
        }
    }

    fn handle_launch(&mut self, appl: ApplId, target: &str, id: u64, dst: Option<&str>) -> Vec<DirectoryAction> {
        let Some(dst_identity) = dst else {
            let targets: Vec<u64> = self
                .clients
                .iter()
                .filter(|(_, client)| client.in_appl() == Some(appl))
                .map(|(session_id, _)| *session_id)
                .collect();
            let mut actions: Vec<DirectoryAction> = targets
                .into_iter()
                .map(|session_id| DirectoryAction::SendToSession {
                    session_id,
                    payload: format!("launch={target}:id={id}"),
                })
                .collect();
            actions.push(reply_to_runner(appl, &format!("launch=ok:id={id}")));
            return actions;
        };

        let destination = self
            .clients
            .iter()
            .find(|(_, client)| client.in_appl() == Some(appl) && client.identity() == dst_identity)
            .map(|(session_id, _)| *session_id);

        match destination {
            Some(session_id) => vec![
                DirectoryAction::SendToSession { session_id, payload: format!("launch={target}:id={id}") },
                reply_to_runner(appl, &format!("launch=ok:id={id}")),
            ],
            None => {
                let err = DirectoryError::UnknownLaunchDestination(dst_identity.to_string());
                vec![self.runner_error_reply(appl, &err)]
            }
        }
    }

    fn handle_admin_command(&mut self, session_id: u64, text: &str) -> Vec<DirectoryAction> {
        let Some(client) = self.clients.get(&session_id) else {
            return vec![log(format!("admin command from unknown session {session_id}"))];
        };

        if let Err(err) = self.context.permissions().check(client.identity(), Capability::Admin) {
            return vec![DirectoryAction::SendToSession { session_id, payload: format!("admin=fail:reason={err}") }];
        }

        let command = match parse_admin_command(text) {
            Ok(command) => command,
            Err(err) => {
                return vec![DirectoryAction::SendToSession {
                    session_id,
                    payload: format!("admin=fail:reason={err}"),
                }]
            }
        };

        match command.verb() {
            "list_appls" => {
                let names = self
                    .context
                    .registry()
                    .list()
                    .iter()
                    .map(|appl| appl.name().to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                vec![DirectoryAction::SendToSession { session_id, payload: format!("admin=ok:appls={names}") }]
            }
            "kick" => match command.field("session").and_then(|raw| raw.parse::<u64>().ok()) {
                Some(target) => vec![
                    DirectoryAction::SendToSession { session_id, payload: "admin=ok".to_string() },
                    DirectoryAction::CloseSession { session_id: target, reason: "kicked by admin".to_string() },
                ],
                None => vec![DirectoryAction::SendToSession {
                    session_id,
                    payload: "admin=fail:reason=missing_session".to_string(),
                }],
            },
            other => vec![DirectoryAction::SendToSession {
                session_id,
                payload: format!("admin=fail:reason=unknown_verb:{other}"),
            }],
        }
    }

    fn handle_resource_request(&mut self, appl: ApplId, name: &str) -> Vec<DirectoryAction> {
        let root = match self.context.registry().get(appl) {
            Ok(meta) => meta.script_root().join("resources"),
            Err(err) => return vec![self.runner_error_reply(appl, &err)],
        };

        match resolve_under(&root, name) {
            Ok(path) => vec![DirectoryAction::OpenResource { appl, path }],
            Err(err) => vec![self.runner_error_reply(appl, &err)],
        }
    }

    fn handle_appl_discovered(&mut self, name: &str, script_root: PathBuf, now_unix: u64) -> Vec<DirectoryAction> {
        let existing = self.context.registry().find_by_name(name).map(|meta| meta.identifier());
        match existing {
            Some(id) => {
                let _ = self.context.registry_mut().touch(id, now_unix);
                vec![log(format!("appl {name} rescanned"))]
            }
            None => {
                let id = self.context.registry_mut().register(name, script_root, now_unix);
                vec![log(format!("appl {name} registered as id {id}"))]
            }
        }
    }

    fn runner_error_reply(&self, appl: ApplId, err: &DirectoryError) -> DirectoryAction {
        reply_to_runner(appl, &format!("fail:reason={err}"))
    }
}

fn reply_to_runner(appl: ApplId, payload: &str) -> DirectoryAction {
    DirectoryAction::SendToRunner { appl, payload: payload.to_string() }
}

fn log(message: String) -> DirectoryAction {
    DirectoryAction::Log { tag: LogTag::Directory, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoryConfig;
    use crate::keystore::Keystore;
    use crate::kv_store::MemoryKvStore;

    fn test_context() -> std::sync::Arc<DirectoryContext> {
        let dir = tempfile::tempdir().unwrap();
        let keystore = Keystore::open(dir.path()).unwrap();
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

    struct NullControl;
    impl RunnerControl for NullControl {
        fn send(&mut self, _message: &[u8]) -> Result<(), DirectoryError> {
            Ok(())
        }
    }

    #[test]
    fn join_before_a_runner_exists_triggers_a_spawn_and_queues_the_session() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);

        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 1,
            identity: "deadbeef".to_string(),
            role: Role::Sink,
        });

        let actions =
            server.process_event(DirectoryEvent::JoinRequested { session_id: 1, appl_name: "alpha".to_string() });
        assert_eq!(actions, vec![DirectoryAction::SpawnRunner { appl: 0 }]);

        let signal = server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(MemoryKvStore::new("alpha")));
        signal.complete();

        let actions = server.process_event(DirectoryEvent::RunnerBootstrapped { appl: 0 });
        assert_eq!(
            actions,
            vec![DirectoryAction::SendToSession { session_id: 1, payload: "join=ok:appl=0".to_string() }]
        );
    }

    #[test]
    fn join_after_bootstrap_admits_immediately() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        let signal = server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(MemoryKvStore::new("alpha")));
        signal.complete();
        server.runtimes.get_mut(&0).unwrap().runner.as_mut().unwrap().wait_bootstrap();

        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 9,
            identity: "cafef00d".to_string(),
            role: Role::Sink,
        });
        let actions =
            server.process_event(DirectoryEvent::JoinRequested { session_id: 9, appl_name: "alpha".to_string() });
        assert_eq!(
            actions,
            vec![DirectoryAction::SendToSession { session_id: 9, payload: "join=ok:appl=0".to_string() }]
        );
    }

    #[test]
    fn join_unknown_appl_replies_with_failure_and_does_not_close_the_session() {
        let mut server = DirectoryServer::new(test_context());
        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 1,
            identity: "deadbeef".to_string(),
            role: Role::Sink,
        });
        let actions =
            server.process_event(DirectoryEvent::JoinRequested { session_id: 1, appl_name: "missing".to_string() });
        assert_eq!(
            actions,
            vec![DirectoryAction::SendToSession {
                session_id: 1,
                payload: "join=fail:reason=unknown_appl:name=missing".to_string()
            }]
        );
    }

    #[test]
    fn kv_mediation_round_trips_through_the_runner_request_grammar() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(MemoryKvStore::new("alpha")));

        let actions = server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "begin_kv_transaction".to_string(),
        });
        assert_eq!(actions, vec![reply_to_runner(0, "begin_kv_transaction=ok")]);

        server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "setkey=score:value=10".to_string(),
        });
        server.process_event(DirectoryEvent::RunnerRequestReceived { appl: 0, text: "end_kv_transaction".to_string() });

        let actions = server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "match=score:domain=alpha:id=5".to_string(),
        });
        assert_eq!(actions, vec![reply_to_runner(0, "match=ok:id=5:entries=score=10")]);
    }

    #[test]
    fn large_match_result_is_delivered_via_binary_transfer_instead_of_inline() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        let store = MemoryKvStore::new("alpha");
        server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(store.clone()));

        server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "begin_kv_transaction".to_string(),
        });
        for i in 0..400 {
            server.process_event(DirectoryEvent::RunnerRequestReceived {
                appl: 0,
                text: format!("setkey=key{i}:value=some_moderately_long_value_{i}"),
            });
        }
        server.process_event(DirectoryEvent::RunnerRequestReceived { appl: 0, text: "end_kv_transaction".to_string() });

        let actions = server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "match=key:domain=alpha:id=9".to_string(),
        });
        match &actions[..] {
            [DirectoryAction::DeliverMatchViaBinaryTransfer { appl, id, body }] => {
                assert_eq!(*appl, 0);
                assert_eq!(*id, 9);
                assert!(body.len() > MATCH_INLINE_THRESHOLD_BYTES);
                assert!(body.contains("key0=some_moderately_long_value_0"));
            },
            other => panic!("expected a single DeliverMatchViaBinaryTransfer action, got {other:?}"),
        }
    }

    #[test]
    fn runner_request_against_an_appl_with_no_runner_is_a_local_rejection() {
        let mut server = DirectoryServer::new(test_context());
        let actions = server
            .process_event(DirectoryEvent::RunnerRequestReceived { appl: 0, text: "reload".to_string() });
        assert_eq!(actions, vec![reply_to_runner(0, "reload=ok")]);

        let actions = server
            .process_event(DirectoryEvent::RunnerRequestReceived { appl: 7, text: "begin_kv_transaction".to_string() });
        assert_eq!(
            actions,
            vec![reply_to_runner(7, &format!("fail:reason={}", DirectoryError::RunnerNotActive(7)))]
        );
    }

    #[test]
    fn launch_without_dst_broadcasts_to_every_member_of_the_appl() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(MemoryKvStore::new("alpha")));
        server.clients.insert(1, {
            let mut c = DirectoryClient::new("aaaa", Role::Sink);
            c.join(0);
            c
        });
        server.clients.insert(2, {
            let mut c = DirectoryClient::new("bbbb", Role::Sink);
            c.join(0);
            c
        });

        let mut actions = server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "launch=game:id=3".to_string(),
        });
        actions.sort_by_key(|action| format!("{action:?}"));
        assert!(actions
            .iter()
            .any(|a| *a == DirectoryAction::SendToSession { session_id: 1, payload: "launch=game:id=3".to_string() }));
        assert!(actions
            .iter()
            .any(|a| *a == DirectoryAction::SendToSession { session_id: 2, payload: "launch=game:id=3".to_string() }));
    }

    #[test]
    fn launch_with_unknown_dst_is_a_local_rejection() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        server.register_runner(0, Box::new(NullControl), std::sync::Arc::new(MemoryKvStore::new("alpha")));

        let actions = server.process_event(DirectoryEvent::RunnerRequestReceived {
            appl: 0,
            text: "launch=game:id=3:dst=nobody".to_string(),
        });
        assert_eq!(
            actions,
            vec![reply_to_runner(
                0,
                &format!("fail:reason={}", DirectoryError::UnknownLaunchDestination("nobody".to_string()))
            )]
        );
    }

    #[test]
    fn admin_command_requires_the_admin_capability() {
        let mut server = DirectoryServer::new(test_context());
        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 1,
            identity: "notadmin".to_string(),
            role: Role::Admin,
        });
        let actions = server
            .process_event(DirectoryEvent::AdminCommandReceived { session_id: 1, text: "list_appls".to_string() });
        assert!(matches!(
            &actions[..],
            [DirectoryAction::SendToSession { payload, .. }] if payload.starts_with("admin=fail")
        ));
    }

    #[test]
    fn admin_list_appls_succeeds_for_the_configured_identity() {
        let context = test_context();
        context.registry_mut().register("alpha", PathBuf::from("/appl/alpha"), 1);
        let mut server = DirectoryServer::new(context);
        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 1,
            identity: "adminkey".to_string(),
            role: Role::Admin,
        });
        let actions = server
            .process_event(DirectoryEvent::AdminCommandReceived { session_id: 1, text: "list_appls".to_string() });
        assert_eq!(
            actions,
            vec![DirectoryAction::SendToSession { session_id: 1, payload: "admin=ok:appls=alpha".to_string() }]
        );
    }

    #[test]
    fn disconnect_clears_client_state() {
        let mut server = DirectoryServer::new(test_context());
        server.process_event(DirectoryEvent::PeerConnected {
            session_id: 1,
            identity: "deadbeef".to_string(),
            role: Role::Sink,
        });
        server.process_event(DirectoryEvent::PeerDisconnected { session_id: 1 });
        assert!(server.clients.is_empty());
    }

    #[test]
    fn appl_discovered_registers_then_touches_on_rescan() {
        let mut server = DirectoryServer::new(test_context());
        server.process_event(DirectoryEvent::ApplDiscovered {
            name: "alpha".to_string(),
            script_root: PathBuf::from("/appl/alpha"),
            now_unix: 100,
        });
        assert_eq!(server.context.registry().list().len(), 1);

        server.process_event(DirectoryEvent::ApplDiscovered {
            name: "alpha".to_string(),
            script_root: PathBuf::from("/appl/alpha"),
            now_unix: 200,
        });
        assert_eq!(server.context.registry().list().len(), 1);
        assert_eq!(server.context.registry().list()[0].updated_at_unix(), 200);
    }
}
