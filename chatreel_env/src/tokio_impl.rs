//! Production implementation of PlaybackContext using Tokio.

use crate::PlaybackContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Production context backed by Tokio and the system clock.
///
/// The monotonic clock is `tokio::time::Instant`, so a runtime with paused
/// time (`start_paused`) moves `now()` and `sleep()` together.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    
    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();
        
        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }
    
    #[tokio::test]
    async fn test_tokio_context_sleep_until_past_deadline() {
        let ctx = TokioContext::new();
        ctx.sleep(Duration::from_millis(5)).await;
        
        // Deadline already behind us: must not block
        let before = ctx.now();
        ctx.sleep_until(Duration::ZERO).await;
        assert!(ctx.now() - before < Duration::from_millis(50));
    }
    
    #[test]
    fn test_tokio_context_system_time_is_wall_clock() {
        let ctx = TokioContext::new();
        let since_epoch = ctx.system_time().duration_since(std::time::UNIX_EPOCH).unwrap();
        // Later than 2024-01-01
        assert!(since_epoch > Duration::from_secs(1_704_067_200));
    }
}
