//! Common types for the chatreel environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one playback engine instance.
///
/// Uses UUID v4 so exported transcripts from different runs never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic SessionId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
    
    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Run tag attached to every scheduled timer.
///
/// Bumped whenever a run starts, is reset, or the scenario changes. A timer
/// whose generation differs from the engine's current one belongs to a
/// superseded run and must be ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    /// Returns the generation following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_session_id_from_seed_is_stable() {
        assert_eq!(SessionId::from_seed(42), SessionId::from_seed(42));
        assert_ne!(SessionId::from_seed(42), SessionId::from_seed(43));
        assert_eq!(SessionId::from_seed(42).to_string().len(), 8);
    }
    
    #[test]
    fn test_generation_next() {
        let g = Generation::default();
        assert_eq!(g.next(), Generation(1));
        assert!(g.next() > g);
        assert_eq!(g.next().to_string(), "gen#1");
    }
    
    #[test]
    fn test_session_id_serde() {
        let id = SessionId::from_seed(7);
        let json = serde_json::to_string(&id).unwrap();
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
