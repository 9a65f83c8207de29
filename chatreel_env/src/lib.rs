//! chatreel Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" clock abstraction that lets the chatreel
//! playback engine run against both the **real** clock (tokio) and a
//! **virtual** clock (the simulation harness in `chatreel_sim`).
//!
//! # Core Concept
//!
//! The playback engine never calls `tokio::time` directly. Every delay it
//! needs (typing a character, a bot "thinking", a system prompt appearing)
//! goes through a [`PlaybackContext`]:
//! - Monotonic time (`now()`, `sleep()`, `sleep_until()`)
//! - Wall-clock stamps (`system_time()`)
//!
//! With a virtual clock, a full scripted conversation replays in
//! microseconds and every run is reproducible.
//!
//! # Example
//!
//! ```ignore
//! use chatreel_env::PlaybackContext;
//!
//! async fn pump<Ctx: PlaybackContext>(ctx: &Ctx, commands: &mut Receiver<Cmd>) {
//!     loop {
//!         tokio::select! {
//!             cmd = commands.recv() => handle(cmd),
//!             _ = ctx.sleep(Duration::from_millis(45)) => type_next_char(),
//!         }
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::PlaybackContext;
pub use types::{Generation, SessionId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
