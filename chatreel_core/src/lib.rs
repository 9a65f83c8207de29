//! chatreel Core - Scripted Chat Playback for Insurance Sales Demos
//!
//! Replays pre-authored customer/bot conversations as if they were live:
//! 1. **Catalog**: built-in scenarios plus JSON-loaded ones, validated on load
//! 2. **Engine**: a timed reveal state machine with generation-tagged timers,
//!    so restarting or resetting mid-run never leaks stale messages
//! 3. **Render**: stateless mapping from transcript to chat bubbles, option
//!    lists, tables and the explanation panel

pub mod catalog;
pub mod config;
pub mod driver;
pub mod engine;
pub mod model;
pub mod render;
pub mod validation;

#[cfg(feature = "dashboard")]
pub mod dashboard;

// Re-export key types for convenience
pub use catalog::{CatalogError, ScenarioCatalog};
pub use config::{Edition, FeatureSet, PlaybackTimings, PlayerConfig, Theme, SPEED_RANGE};
pub use driver::{PlaybackDriver, PlayerCommand, PlayerHandle};
pub use engine::{PlaybackEngine, PlaybackEvent, PlaybackSnapshot, PlaybackState, TimerTicket};
pub use model::{Content, ContentKind, Message, Scenario, Sender};
pub use validation::{validate_catalog, ValidationReport};

#[cfg(feature = "dashboard")]
pub use dashboard::ChatDashboard;
