//! Deterministic [`Environment`](a12_core::env::Environment) for simulation.
//!
//! `SimEnv` is the simulation counterpart of a production `SystemEnv`: time
//! comes from Tokio's clock (which Turmoil intercepts and drives virtually
//! inside a `turmoil::Sim`), and randomness comes from a seeded
//! `ChaCha8Rng` instead of the OS CSPRNG, so an entire run — handshake
//! ephemerals, rekey timing, challenge bytes — is reproducible byte for
//! byte given the same seed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use a12_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Simulation environment: seeded RNG, Tokio/Turmoil virtual clock.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    seed: u64,
}

impl SimEnv {
    /// Creates a new simulation environment seeded with `seed`. Two
    /// `SimEnv`s built from the same seed produce the same sequence of
    /// random bytes, but independent `SimEnv` instances (e.g. one per
    /// simulated peer) must each get a distinct seed or they will derive
    /// identical keys.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))), seed }
    }

    /// The seed this environment was constructed with, for logging failed
    /// runs so they can be reproduced.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("sim rng mutex poisoned").fill_bytes(buffer);
    }
}
