//! Error types for the chatreel environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The other end of a command or frame channel went away
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
    
    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
    
    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a channel-closed error.
    pub fn closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed(channel.into())
    }
    
    /// Creates a context error.
    pub fn context(msg: impl std::fmt::Display) -> Self {
        Self::ContextError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_error_display() {
        assert_eq!(EnvError::closed("commands").to_string(), "Channel closed: commands");
        assert_eq!(EnvError::Timeout(250).to_string(), "Timeout after 250ms");
        assert_eq!(EnvError::context("clock stopped").to_string(), "Context error: clock stopped");
    }
}
