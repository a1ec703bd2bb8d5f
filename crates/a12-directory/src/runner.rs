//! `RunnerState` (§3) — one per active controller worker process.
//!
//! Two deliberate departures from the description in spec.md §3/§4.5, both
//! binding per §9:
//!
//! - The "bootstrap-complete" flag is not a polled atomic a spawning thread
//!   spins on; it is the receive half of a one-shot [`std::sync::mpsc`]
//!   channel. A thread that needs to block until the worker's script
//!   initialisation has finished calls [`RunnerState::wait_bootstrap`],
//!   which blocks on `recv()` instead of spinning. The worker side (or, in
//!   tests, whatever drives it) signals readiness by calling
//!   [`BootstrapSignal::complete`] exactly once.
//! - Callers never hold a raw pointer or index to a `RunnerState`; they hold
//!   a [`crate::handle::Handle<RunnerState>`] minted by a
//!   [`crate::handle::Slab`], so a handle captured before a worker exited
//!   can never alias whatever replaces it in the table.

use std::sync::mpsc;

use crate::dircl::ApplId;
use crate::error::DirectoryError;

/// The sending half of a bootstrap-complete signal, given to whatever code
/// drives a worker's startup (the child-process supervisor in production,
/// or a test harness in simulation).
pub struct BootstrapSignal(mpsc::SyncSender<()>);

impl BootstrapSignal {
    /// Signals that the worker has finished script initialisation. Idempotent
    /// in the sense that a second call is simply ignored (the receiver was
    /// already satisfied).
    pub fn complete(self) {
        let _ = self.0.try_send(());
    }
}

/// An opaque handle to a runner's control channel, used to route KV/launch
/// replies and reseed/reload signals to the right worker. Production
/// backends pair this with a socket; tests may pair it with an in-memory
/// queue.
pub trait RunnerControl: Send {
    /// Sends a control-channel message (already framed) to the worker.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the worker is no longer reachable.
    fn send(&mut self, message: &[u8]) -> Result<(), DirectoryError>;
}

/// One active controller worker (§3 "RunnerState").
pub struct RunnerState<C: RunnerControl> {
    appl: ApplId,
    control: C,
    bootstrap_done: mpsc::Receiver<()>,
    bootstrap_observed: bool,
}

impl<C: RunnerControl> RunnerState<C> {
    /// Creates a new `RunnerState` for `appl`, returning it alongside the
    /// [`BootstrapSignal`] the spawner must eventually fire.
    #[must_use]
    pub fn new(appl: ApplId, control: C) -> (Self, BootstrapSignal) {
        let (tx, rx) = mpsc::sync_channel(1);
        let state =
            Self { appl, control, bootstrap_done: rx, bootstrap_observed: false };
        (state, BootstrapSignal(tx))
    }

    /// The appl this runner hosts.
    #[must_use]
    pub fn appl(&self) -> ApplId {
        self.appl
    }

    /// Blocks the calling thread until the worker's bootstrap signal fires.
    /// A client join that races a fresh spawn calls this before forwarding
    /// any KV traffic, so it never observes a half-initialised script VM.
    ///
    /// Safe to call repeatedly: once bootstrap has been observed once, later
    /// calls return immediately.
    pub fn wait_bootstrap(&mut self) {
        if self.bootstrap_observed {
            return;
        }
        let _ = self.bootstrap_done.recv();
        self.bootstrap_observed = true;
    }

    /// True once bootstrap has been signalled. Never polled in a spin loop
    /// internally; exposed for diagnostics/metrics only.
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrap_observed || self.bootstrap_done.try_recv().is_ok()
    }

    /// Forwards a framed control-channel message to the worker.
    ///
    /// # Errors
    ///
    /// Propagates [`RunnerControl::send`]'s error.
    pub fn send_control(&mut self, message: &[u8]) -> Result<(), DirectoryError> {
        self.control.send(message)
    }
}
