//! chatreel Verification Harness
//!
//! A controlled environment where scripted chat playback runs against a
//! virtual clock, so every timing-sensitive behavior can be checked
//! deterministically and in microseconds.
//!
//! # Core Principle
//!
//! All sources of non-determinism are replaced:
//! - **Time**: the virtual clock jumps straight to the next pending timer
//! - **Randomness**: the random-controls drill draws from a seeded ChaCha8 RNG
//! - **Identity**: session ids are derived from the same seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     DrillRunner                      │
//! │   ┌──────────────┐    fire(ticket)   ┌────────────┐  │
//! │   │  SimContext  │ ───────────────►  │ Playback   │  │
//! │   │ (virtual     │ ◄───────────────  │ Engine     │  │
//! │   │  clock + RNG)│   next_due()      └─────┬──────┘  │
//! │   └──────────────┘                         │ events  │
//! │                                   ┌────────▼──────┐  │
//! │                                   │  assertions   │  │
//! │                                   │  + event log  │  │
//! │                                   └───────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use chatreel_sim::{DrillId, DrillRunner};
//!
//! let runner = DrillRunner::new(Arc::new(ScenarioCatalog::builtin())).with_seed(42);
//! let result = runner.run(DrillId::RestartMidRun, 2);
//! assert!(result.passed);
//! ```

mod context;
pub mod drills;
pub mod exporter;
pub mod runner;

pub use context::SimContext;
pub use drills::DrillId;
pub use exporter::{TimedEvent, TranscriptExport};
pub use runner::{expected_duration, DrillFailure, DrillMetrics, DrillResult, DrillRunner};
