//! Simulation context implementing PlaybackContext for deterministic drills.

use async_trait::async_trait;
use chatreel_env::{PlaybackContext, SessionId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by a virtual clock and a seeded RNG.
///
/// This implements `PlaybackContext` using:
/// - A virtual clock that only moves when advanced (or slept on)
/// - A seeded ChaCha8 RNG for the random-controls drill
/// - Simulated sleep that advances virtual time and yields once
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time since simulation start
    virtual_time: Arc<Mutex<Duration>>,

    rng: Arc<Mutex<ChaCha8Rng>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Session id derived from the seed, so exports are reproducible.
    pub fn session_id(&self) -> SessionId {
        SessionId::from_seed(self.seed)
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = lock(&self.virtual_time);
        *time = time.saturating_add(duration);
    }

    /// Moves the clock forward to `deadline`; never moves it backwards.
    pub fn advance_to(&self, deadline: Duration) {
        let mut time = lock(&self.virtual_time);
        *time = (*time).max(deadline);
    }

    /// Runs `f` with exclusive access to the seeded RNG.
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> R) -> R {
        f(&mut lock(&self.rng))
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time: Arc::clone(&self.virtual_time),
            rng: Arc::clone(&self.rng),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl PlaybackContext for SimContext {
    fn now(&self) -> Duration {
        *lock(&self.virtual_time)
    }

    fn system_time(&self) -> SystemTime {
        self.epoch.checked_add(self.now()).unwrap_or(self.epoch)
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping is what moves the virtual clock
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }
}
