//! Playback Driver - runs a [`PlaybackEngine`] against a [`PlaybackContext`].
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐  PlayerCommand   ┌──────────────────────────────────┐
//!  │  Dashboard   │ ───────────────► │         PlaybackDriver           │
//!  │  (any thread)│                  │  select! {                       │
//!  │              │ ◄─────────────── │    cmd  = commands.recv()        │
//!  └──────────────┘ PlaybackSnapshot │    tick = ctx.sleep_until(due)   │
//!                   (crossbeam)      │  }                               │
//!                                    │  engine: PlaybackEngine          │
//!                                    └──────────────────────────────────┘
//! ```
//!
//! The driver is the only owner of the engine, so transcript mutation is
//! serialized by construction. Commands win over a due timer when both are
//! ready; a command that restarts or resets the run bumps the generation, and
//! the timer it replaced is simply never fired.

use std::sync::Arc;

use chatreel_env::{EnvError, PlaybackContext};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::{PlaybackEngine, PlaybackEvent, PlaybackSnapshot};
use crate::model::{MessageId, ScenarioId};

/// Operations the UI can request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    Select { scenario: ScenarioId },
    Start,
    Reset,
    Toggle { message_id: MessageId, option_id: String },
    Shutdown,
}

/// Cloneable sender side of the command channel.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    /// A handle plus the receiving end, without a driver attached.
    pub(crate) fn pair() -> (Self, mpsc::UnboundedReceiver<PlayerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, command: PlayerCommand) -> Result<(), EnvError> {
        self.tx.send(command).map_err(|_| EnvError::closed("commands"))
    }

    pub fn select(&self, scenario: ScenarioId) -> Result<(), EnvError> {
        self.send(PlayerCommand::Select { scenario })
    }

    pub fn start(&self) -> Result<(), EnvError> {
        self.send(PlayerCommand::Start)
    }

    pub fn reset(&self) -> Result<(), EnvError> {
        self.send(PlayerCommand::Reset)
    }

    pub fn toggle(&self, message_id: MessageId, option_id: impl Into<String>) -> Result<(), EnvError> {
        self.send(PlayerCommand::Toggle {
            message_id,
            option_id: option_id.into(),
        })
    }

    pub fn shutdown(&self) -> Result<(), EnvError> {
        self.send(PlayerCommand::Shutdown)
    }
}

/// Owns the engine and pumps commands and timers.
pub struct PlaybackDriver<Ctx: PlaybackContext> {
    ctx: Arc<Ctx>,
    engine: PlaybackEngine,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    frames: Sender<PlaybackSnapshot>,
}

impl<Ctx: PlaybackContext> PlaybackDriver<Ctx> {
    /// Creates a driver plus its command handle and snapshot receiver.
    pub fn new(ctx: Arc<Ctx>, engine: PlaybackEngine) -> (Self, PlayerHandle, Receiver<PlaybackSnapshot>) {
        let (handle, commands) = PlayerHandle::pair();
        let (frames, frames_rx) = channel::unbounded();
        let driver = Self {
            ctx,
            engine,
            commands,
            frames,
        };
        (driver, handle, frames_rx)
    }

    /// Runs until `Shutdown`, the command channel closing, or the snapshot
    /// receiver going away (the latter is an error).
    ///
    /// Returns the engine so callers can inspect the final state.
    pub async fn run(mut self) -> Result<PlaybackEngine, EnvError> {
        info!(session = %self.engine.session(), "playback driver started");
        self.publish()?;

        loop {
            let pending = self.engine.pending();
            let deadline = pending.map(|t| t.due).unwrap_or_default();
            let ctx = Arc::clone(&self.ctx);

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    None | Some(PlayerCommand::Shutdown) => break,
                    Some(command) => self.apply(command),
                },

                _ = ctx.sleep_until(deadline), if pending.is_some() => {
                    if let Some(ticket) = pending {
                        let events = self.engine.fire(ticket, self.ctx.now());
                        log_events(&events);
                    }
                }
            }

            self.publish()?;
        }

        info!(
            session = %self.engine.session(),
            appended = self.engine.stats().appended,
            stale = self.engine.stats().stale_firings,
            "playback driver stopped"
        );
        Ok(self.engine)
    }

    fn apply(&mut self, command: PlayerCommand) {
        debug!(?command, "command");
        let events = match command {
            PlayerCommand::Select { scenario } => {
                self.engine.select_scenario(scenario);
                Vec::new()
            }
            PlayerCommand::Start => self.engine.start(self.ctx.now()),
            PlayerCommand::Reset => self.engine.reset(),
            PlayerCommand::Toggle { message_id, option_id } => {
                self.engine.toggle_option(message_id, &option_id);
                Vec::new()
            }
            PlayerCommand::Shutdown => Vec::new(),
        };
        log_events(&events);
    }

    fn publish(&self) -> Result<(), EnvError> {
        self.frames
            .send(self.engine.snapshot())
            .map_err(|_| EnvError::closed("frames"))
    }
}

fn log_events(events: &[PlaybackEvent]) {
    for event in events {
        debug!(?event, "playback event");
    }
}
