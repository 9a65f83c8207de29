//! Core environment context trait for chatreel playback.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// The central interface for clock and task interaction.
///
/// This trait abstracts the "real world" so that the playback engine can
/// run against the real clock (interactive demo) or a virtual clock
/// (headless drills and tests).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` (in `chatreel_sim`) - manually advanced virtual clock
///
/// # Determinism
///
/// Every delay in a playback run is derived from `now()` and `sleep()`, so a
/// virtual implementation makes the whole run reproducible.
#[async_trait]
pub trait PlaybackContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Timer due times in the playback engine are expressed on this clock.
    fn now(&self) -> Duration;
    
    /// Returns the wall-clock time.
    ///
    /// Only used to stamp drill results and exports; never drives playback.
    fn system_time(&self) -> SystemTime;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);
    
    /// Sleeps until the context clock reaches `deadline`.
    ///
    /// Returns immediately if the deadline has already passed.
    async fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now).await;
        }
    }
}
