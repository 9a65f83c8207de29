//! Playback Engine - Timed Reveal State Machine
//! ============================================
//!
//! Steps a cursor through one scenario's script and appends messages to the
//! transcript on a per-sender delay schedule:
//!
//! ```text
//!            start()                      (turn_gap)
//!   Idle ──────────────► AwaitingTurn ───────────────┐
//!    ▲                        ▲                      │ sender?
//!    │ reset()                │                      ├── user ──► TypingUser ──► SendingUser ──┐
//!    │ (from any state)       │                      ├── bot ───► LoadingBot ──────────────────┤
//!    │                        │                      └── system ► RevealingAuxiliary ──────────┤
//!    │                        │        append + advance cursor                                 │
//!    │                        └────────────────────────────────────────────────────────────────┘
//!    │                                                │ cursor == len
//!    └──────────────────────────────────────────── Finished
//! ```
//!
//! The engine is clock-agnostic: callers pass `now` (a duration on some
//! monotonic clock) and the engine answers with at most one pending
//! [`TimerTicket`]. Each ticket carries the [`Generation`] of the run that
//! scheduled it; `start`, `reset` and scenario selection bump the generation,
//! so a ticket that outlives its run is recognised and ignored.

use std::sync::Arc;
use std::time::Duration;

use chatreel_env::{Generation, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::ScenarioCatalog;
use crate::config::PlaybackTimings;
use crate::model::{Message, MessageId, Scenario, ScenarioId, Sender};

// =============================================================================
// STATES, TIMERS, EVENTS
// =============================================================================

/// Engine state. Transient UI indicators map 1:1 onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No run active
    Idle,
    /// Between messages
    AwaitingTurn,
    /// Animating a user message character by character
    TypingUser,
    /// Typed out, about to land
    SendingUser,
    /// Bot "thinking" indicator
    LoadingBot,
    /// Short pause before a system message
    RevealingAuxiliary,
    /// Script exhausted
    Finished,
}

impl PlaybackState {
    /// True while a run is in progress.
    pub fn is_running(&self) -> bool {
        !matches!(self, PlaybackState::Idle | PlaybackState::Finished)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::AwaitingTurn => "awaiting_turn",
            PlaybackState::TypingUser => "typing_user",
            PlaybackState::SendingUser => "sending_user",
            PlaybackState::LoadingBot => "loading_bot",
            PlaybackState::RevealingAuxiliary => "revealing_auxiliary",
            PlaybackState::Finished => "finished",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Inspect the message at the cursor and branch on its sender
    BeginTurn,
    /// Reveal one more character of the user message
    TypeChar,
    /// Append the message at the cursor to the transcript
    Commit,
}

/// Handle to the single pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerTicket {
    pub generation: Generation,
    /// Due time on the caller's clock
    pub due: Duration,
    pub step: Step,
}

/// Observable consequence of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    StateChanged { from: PlaybackState, to: PlaybackState },
    Typed { message_id: MessageId, visible: String },
    Appended { message_id: MessageId, index: usize },
    SelectionApplied { target: MessageId, option: String },
    Finished { messages: usize },
    Reset,
}

/// Counters kept across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub runs_started: u64,
    pub resets: u64,
    pub appended: u64,
    pub timers_fired: u64,
    /// Tickets from superseded runs (or already consumed) that were ignored
    pub stale_firings: u64,
    pub typed_chars: u64,
    pub selections_applied: u64,
}

/// Which controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// A scenario is selected and no run is active
    pub can_start: bool,
    /// The transcript is not empty
    pub can_reset: bool,
}

/// Immutable copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub session: SessionId,
    pub scenario: Option<ScenarioId>,
    pub state: PlaybackState,
    pub transcript: Vec<Message>,
    /// Partially typed user message while typing/sending
    pub typing_text: Option<String>,
    pub cursor: usize,
    pub script_len: usize,
    pub generation: Generation,
    pub controls: Controls,
}

impl PlaybackSnapshot {
    /// Snapshot of a fresh engine with nothing selected.
    pub fn empty(session: SessionId) -> Self {
        Self {
            session,
            scenario: None,
            state: PlaybackState::Idle,
            transcript: Vec::new(),
            typing_text: None,
            cursor: 0,
            script_len: 0,
            generation: Generation::default(),
            controls: Controls {
                can_start: false,
                can_reset: false,
            },
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// The playback state machine.
///
/// All mutation goes through `select_scenario`, `start`, `reset`,
/// `toggle_option`, `fire` and `poll`.
pub struct PlaybackEngine {
    session: SessionId,
    catalog: Arc<ScenarioCatalog>,
    timings: PlaybackTimings,
    selected: Option<ScenarioId>,
    transcript: Vec<Message>,
    cursor: usize,
    state: PlaybackState,
    /// Characters of the current user message revealed so far
    typed: usize,
    generation: Generation,
    pending: Option<TimerTicket>,
    stats: EngineStats,
}

impl PlaybackEngine {
    pub fn new(catalog: Arc<ScenarioCatalog>, timings: PlaybackTimings) -> Self {
        Self {
            session: SessionId::new(),
            catalog,
            timings,
            selected: None,
            transcript: Vec::new(),
            cursor: 0,
            state: PlaybackState::Idle,
            typed: 0,
            generation: Generation::default(),
            pending: None,
            stats: EngineStats::default(),
        }
    }

    /// Replaces the random session id (deterministic runs).
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    pub fn timings(&self) -> &PlaybackTimings {
        &self.timings
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn pending(&self) -> Option<TimerTicket> {
        self.pending
    }

    /// Due time of the pending timer, if any.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.map(|t| t.due)
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn selected_scenario(&self) -> Option<&Scenario> {
        self.selected.and_then(|id| self.catalog.get(id))
    }

    /// Partially typed user message, while typing or sending.
    pub fn typing_text(&self) -> Option<String> {
        if !matches!(self.state, PlaybackState::TypingUser | PlaybackState::SendingUser) {
            return None;
        }
        let msg = self.selected_scenario()?.script.get(self.cursor)?;
        Some(msg.body.chars().take(self.typed).collect())
    }

    pub fn controls(&self) -> Controls {
        Controls {
            can_start: self.selected.is_some() && !self.is_running(),
            can_reset: !self.transcript.is_empty(),
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            session: self.session,
            scenario: self.selected,
            state: self.state,
            transcript: self.transcript.clone(),
            typing_text: self.typing_text(),
            cursor: self.cursor,
            script_len: self.selected_scenario().map_or(0, Scenario::len),
            generation: self.generation,
            controls: self.controls(),
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Selects a scenario, abandoning any run in progress.
    ///
    /// Unknown ids are ignored and return false.
    pub fn select_scenario(&mut self, id: ScenarioId) -> bool {
        if self.catalog.get(id).is_none() {
            debug!(scenario = id, "select ignored: unknown scenario");
            return false;
        }
        self.cancel_pending();
        self.clear_run();
        let mut events = Vec::new();
        self.transition(PlaybackState::Idle, &mut events);
        self.selected = Some(id);
        debug!(session = %self.session, scenario = id, "scenario selected");
        true
    }

    /// Starts a new run of the selected scenario.
    ///
    /// No-op without a selection. A run already in progress is superseded:
    /// its pending timer is cancelled before the transcript is cleared.
    pub fn start(&mut self, now: Duration) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        let Some(id) = self.selected else {
            debug!("start ignored: no scenario selected");
            return events;
        };

        self.cancel_pending();
        self.clear_run();
        self.stats.runs_started += 1;
        info!(session = %self.session, scenario = id, generation = %self.generation, "playback started");

        let script_len = self.catalog.get(id).map_or(0, Scenario::len);
        if script_len == 0 {
            self.finish(&mut events);
            return events;
        }

        self.transition(PlaybackState::AwaitingTurn, &mut events);
        self.schedule(Step::BeginTurn, now, self.timings.turn_gap);
        events
    }

    /// Stops playback and clears the transcript, from any state.
    pub fn reset(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        self.cancel_pending();
        self.clear_run();
        self.stats.resets += 1;
        self.transition(PlaybackState::Idle, &mut events);
        events.push(PlaybackEvent::Reset);
        debug!(session = %self.session, "playback reset");
        events
    }

    /// Toggles an option on an already revealed option-list message.
    ///
    /// Siblings are cleared, so at most one option stays selected. Unknown
    /// messages or options are ignored and return false.
    pub fn toggle_option(&mut self, message_id: MessageId, option_id: &str) -> bool {
        let toggled = self
            .transcript
            .iter_mut()
            .find(|m| m.id == message_id)
            .is_some_and(|m| m.toggle_option(option_id));
        if !toggled {
            debug!(message = message_id, option = option_id, "toggle ignored");
        }
        toggled
    }

    /// Fires a timer.
    ///
    /// Tickets that are not the currently pending timer (superseded runs,
    /// duplicates) are ignored.
    pub fn fire(&mut self, ticket: TimerTicket, now: Duration) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        if self.pending != Some(ticket) {
            self.stats.stale_firings += 1;
            debug!(
                ticket = %ticket.generation,
                current = %self.generation,
                step = ?ticket.step,
                "stale timer ignored"
            );
            return events;
        }

        self.pending = None;
        self.stats.timers_fired += 1;

        match ticket.step {
            Step::BeginTurn => self.begin_turn(now, &mut events),
            Step::TypeChar => self.type_char(now, &mut events),
            Step::Commit => self.commit(now, &mut events),
        }
        events
    }

    /// Fires every timer due at or before `now`.
    pub fn poll(&mut self, now: Duration) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(ticket) = self.pending {
            if ticket.due > now {
                break;
            }
            events.extend(self.fire(ticket, now));
        }
        events
    }

    // -------------------------------------------------------------------------
    // Steps
    // -------------------------------------------------------------------------

    fn begin_turn(&mut self, now: Duration, events: &mut Vec<PlaybackEvent>) {
        let catalog = Arc::clone(&self.catalog);
        let Some(msg) = self.current_message(&catalog) else {
            self.finish(events);
            return;
        };

        match msg.sender {
            Sender::User => {
                self.typed = 0;
                self.transition(PlaybackState::TypingUser, events);
                if msg.body.is_empty() {
                    self.transition(PlaybackState::SendingUser, events);
                    self.schedule(Step::Commit, now, self.timings.send_settle);
                } else {
                    self.schedule(Step::TypeChar, now, self.timings.typing_interval);
                }
            }
            Sender::Bot => {
                self.transition(PlaybackState::LoadingBot, events);
                self.schedule(Step::Commit, now, self.timings.bot_thinking);
            }
            Sender::System => {
                self.transition(PlaybackState::RevealingAuxiliary, events);
                self.schedule(Step::Commit, now, self.timings.auxiliary_delay);
            }
        }
    }

    fn type_char(&mut self, now: Duration, events: &mut Vec<PlaybackEvent>) {
        let catalog = Arc::clone(&self.catalog);
        let Some(msg) = self.current_message(&catalog) else {
            self.finish(events);
            return;
        };

        let total = msg.body.chars().count();
        self.typed = (self.typed + 1).min(total);
        self.stats.typed_chars += 1;
        events.push(PlaybackEvent::Typed {
            message_id: msg.id,
            visible: msg.body.chars().take(self.typed).collect(),
        });

        if self.typed >= total {
            self.transition(PlaybackState::SendingUser, events);
            self.schedule(Step::Commit, now, self.timings.send_settle);
        } else {
            self.schedule(Step::TypeChar, now, self.timings.typing_interval);
        }
    }

    fn commit(&mut self, now: Duration, events: &mut Vec<PlaybackEvent>) {
        let catalog = Arc::clone(&self.catalog);
        let Some(msg) = self.current_message(&catalog) else {
            self.finish(events);
            return;
        };

        let index = self.transcript.len();
        self.transcript.push(msg.clone());
        self.stats.appended += 1;
        events.push(PlaybackEvent::Appended {
            message_id: msg.id,
            index,
        });

        if let Some(selection) = &msg.selection {
            // Target must be revealed before this message
            let applied = self.transcript[..index]
                .iter_mut()
                .find(|m| m.id == selection.target)
                .is_some_and(|m| m.select_option(&selection.option));
            if applied {
                self.stats.selections_applied += 1;
                events.push(PlaybackEvent::SelectionApplied {
                    target: selection.target,
                    option: selection.option.clone(),
                });
            } else {
                debug!(
                    message = msg.id,
                    target = selection.target,
                    option = %selection.option,
                    "selection event ignored"
                );
            }
        }

        self.cursor += 1;
        self.typed = 0;

        let script_len = self.selected_scenario().map_or(0, Scenario::len);
        if self.cursor >= script_len {
            self.finish(events);
        } else {
            self.transition(PlaybackState::AwaitingTurn, events);
            self.schedule(Step::BeginTurn, now, self.timings.turn_gap);
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn current_message<'c>(&self, catalog: &'c ScenarioCatalog) -> Option<&'c Message> {
        catalog.get(self.selected?)?.script.get(self.cursor)
    }

    fn schedule(&mut self, step: Step, now: Duration, delay: Duration) {
        let ticket = TimerTicket {
            generation: self.generation,
            due: now.saturating_add(delay),
            step,
        };
        self.pending = Some(ticket);
    }

    /// Drops the pending timer and moves to a new generation.
    fn cancel_pending(&mut self) {
        if let Some(ticket) = self.pending.take() {
            debug!(generation = %ticket.generation, step = ?ticket.step, "pending timer cancelled");
        }
        self.generation = self.generation.next();
    }

    fn clear_run(&mut self) {
        self.transcript.clear();
        self.cursor = 0;
        self.typed = 0;
    }

    fn finish(&mut self, events: &mut Vec<PlaybackEvent>) {
        self.pending = None;
        self.transition(PlaybackState::Finished, events);
        events.push(PlaybackEvent::Finished {
            messages: self.transcript.len(),
        });
        info!(session = %self.session, messages = self.transcript.len(), "playback finished");
    }

    fn transition(&mut self, to: PlaybackState, events: &mut Vec<PlaybackEvent>) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, cursor = self.cursor, "state change");
        events.push(PlaybackEvent::StateChanged { from, to });
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const LIFE: ScenarioId = 1;
    const RETIREMENT: ScenarioId = 2;
    const BUNDLE: ScenarioId = 3;

    fn engine(timings: PlaybackTimings) -> PlaybackEngine {
        PlaybackEngine::new(Arc::new(ScenarioCatalog::builtin()), timings)
    }

    /// Fires timers at their due time until none is pending.
    fn run_to_end(engine: &mut PlaybackEngine) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Some(ticket) = engine.pending() {
            events.extend(engine.fire(ticket, ticket.due));
        }
        events
    }

    /// Fires timers until `count` messages are in the transcript.
    fn run_until_len(engine: &mut PlaybackEngine, count: usize) {
        while engine.transcript().len() < count {
            let ticket = engine.pending().expect("run ended early");
            engine.fire(ticket, ticket.due);
        }
    }

    #[test]
    fn test_start_without_selection_is_noop() {
        let mut engine = engine(PlaybackTimings::default());
        assert!(engine.start(Duration::ZERO).is_empty());
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.pending().is_none());
        assert_eq!(engine.stats().runs_started, 0);
    }

    #[test]
    fn test_full_run_appends_script_in_order() {
        let mut engine = engine(PlaybackTimings::default());
        assert!(engine.select_scenario(LIFE));
        engine.start(Duration::ZERO);
        let events = run_to_end(&mut engine);

        assert_eq!(engine.state(), PlaybackState::Finished);
        let catalog = ScenarioCatalog::builtin();
        let script = &catalog.get(LIFE).unwrap().script;
        assert_eq!(engine.transcript(), script.as_slice());
        assert_eq!(engine.transcript()[0].sender, Sender::Bot);
        assert!(engine.transcript()[6].body.contains("detailed quote"));
        assert_eq!(events.last(), Some(&PlaybackEvent::Finished { messages: 7 }));
        assert!(engine.pending().is_none());
    }

    #[test]
    fn test_per_sender_delays() {
        let timings = PlaybackTimings::default();
        let mut engine = engine(timings);
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);

        // Bot: gap, then thinking
        let turn = engine.pending().unwrap();
        assert_eq!(turn.due, timings.turn_gap);
        engine.fire(turn, turn.due);
        assert_eq!(engine.state(), PlaybackState::LoadingBot);
        let commit = engine.pending().unwrap();
        assert_eq!(commit.step, Step::Commit);
        assert_eq!(commit.due, timings.turn_gap + timings.bot_thinking);

        // Nothing lands early
        assert!(engine.poll(commit.due - Duration::from_millis(1)).is_empty());
        assert!(engine.transcript().is_empty());
        engine.poll(commit.due);
        assert_eq!(engine.transcript().len(), 1);
        assert_eq!(engine.state(), PlaybackState::AwaitingTurn);
    }

    #[test]
    fn test_user_typing_reveals_one_char_per_tick() {
        let mut engine = engine(PlaybackTimings::default());
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 1);

        let ticket = engine.pending().unwrap();
        engine.fire(ticket, ticket.due);
        assert_eq!(engine.state(), PlaybackState::TypingUser);
        assert_eq!(engine.typing_text().as_deref(), Some(""));

        let body = "I'm interested in life insurance options for my family.";
        let mut typed = 0;
        while engine.state() == PlaybackState::TypingUser {
            let ticket = engine.pending().unwrap();
            assert_eq!(ticket.step, Step::TypeChar);
            let events = engine.fire(ticket, ticket.due);
            typed += 1;
            let expected: String = body.chars().take(typed).collect();
            assert!(events.contains(&PlaybackEvent::Typed {
                message_id: 2,
                visible: expected.clone(),
            }));
            assert_eq!(engine.typing_text(), Some(expected));
        }

        assert_eq!(typed, body.chars().count());
        assert_eq!(engine.state(), PlaybackState::SendingUser);
        assert_eq!(engine.typing_text().as_deref(), Some(body));
        assert_eq!(engine.transcript().len(), 1);

        let ticket = engine.pending().unwrap();
        engine.fire(ticket, ticket.due);
        assert_eq!(engine.transcript().len(), 2);
        assert_eq!(engine.typing_text(), None);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut engine = engine(PlaybackTimings::default());
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 1);
        // Into the user's typing animation
        for _ in 0..3 {
            let ticket = engine.pending().unwrap();
            engine.fire(ticket, ticket.due);
        }
        assert_eq!(engine.state(), PlaybackState::TypingUser);
        let stale = engine.pending().unwrap();

        let events = engine.reset();
        assert!(events.contains(&PlaybackEvent::Reset));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.cursor(), 0);
        assert!(engine.transcript().is_empty());
        assert!(engine.pending().is_none());

        // The cancelled timer firing late changes nothing
        assert!(engine.fire(stale, stale.due).is_empty());
        assert!(engine.transcript().is_empty());
        assert_eq!(engine.stats().stale_firings, 1);

        // Resetting an idle engine is harmless
        engine.reset();
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_restart_supersedes_previous_run() {
        let mut engine = engine(PlaybackTimings::default());
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 2);
        let old = engine.pending().unwrap();
        let old_generation = engine.generation();

        engine.start(Duration::from_secs(10));
        assert!(engine.generation() > old_generation);
        assert!(engine.transcript().is_empty());
        assert_eq!(engine.state(), PlaybackState::AwaitingTurn);

        assert!(engine.fire(old, old.due).is_empty());
        assert!(engine.transcript().is_empty());

        run_to_end(&mut engine);
        assert_eq!(engine.transcript().len(), 7);
        assert_eq!(engine.stats().runs_started, 2);
    }

    #[test]
    fn test_select_scenario_cancels_run() {
        let mut engine = engine(PlaybackTimings::default());
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 1);
        let old = engine.pending().unwrap();

        assert!(engine.select_scenario(RETIREMENT));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(engine.transcript().is_empty());
        assert!(engine.fire(old, old.due).is_empty());

        assert!(!engine.select_scenario(404));
        assert_eq!(engine.selected_scenario().unwrap().id, RETIREMENT);
    }

    #[test]
    fn test_selection_event_overrides_manual_choice() {
        let mut engine = engine(PlaybackTimings::instant());
        engine.select_scenario(RETIREMENT);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 5);

        // Option list (message 5) is on screen; pick something else by hand
        assert!(engine.toggle_option(5, "growth"));
        assert_eq!(engine.transcript()[4].selected_option(), Some("growth"));

        run_until_len(&mut engine, 6);
        let prompt = &engine.transcript()[4];
        assert_eq!(prompt.selected_option(), Some("income"));
        assert_eq!(prompt.options().unwrap().iter().filter(|o| o.selected).count(), 1);
        assert_eq!(engine.stats().selections_applied, 1);
    }

    #[test]
    fn test_later_selection_replaces_earlier_one() {
        let mut engine = engine(PlaybackTimings::instant());
        engine.select_scenario(BUNDLE);
        engine.start(Duration::ZERO);
        let events = run_to_end(&mut engine);

        let applied: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::SelectionApplied { .. }))
            .collect();
        assert_eq!(applied.len(), 2);
        assert_eq!(engine.transcript()[2].selected_option(), Some("bundle"));

        // The catalog itself is never touched
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(catalog.get(BUNDLE).unwrap().script[2].selected_option(), None);
    }

    #[test]
    fn test_toggle_rules() {
        let mut engine = engine(PlaybackTimings::instant());
        engine.select_scenario(RETIREMENT);
        engine.start(Duration::ZERO);

        // Not revealed yet
        assert!(!engine.toggle_option(5, "income"));

        run_until_len(&mut engine, 5);
        assert!(!engine.toggle_option(5, "nonexistent"));
        assert!(!engine.toggle_option(1, "income"));
        assert!(engine.toggle_option(5, "legacy"));
        assert!(engine.toggle_option(5, "legacy"));
        assert_eq!(engine.transcript()[4].selected_option(), None);
    }

    #[test]
    fn test_controls() {
        let mut engine = engine(PlaybackTimings::instant());
        assert_eq!(engine.controls(), Controls { can_start: false, can_reset: false });

        engine.select_scenario(LIFE);
        assert_eq!(engine.controls(), Controls { can_start: true, can_reset: false });

        engine.start(Duration::ZERO);
        assert_eq!(engine.controls(), Controls { can_start: false, can_reset: false });

        run_until_len(&mut engine, 1);
        assert_eq!(engine.controls(), Controls { can_start: false, can_reset: true });

        run_to_end(&mut engine);
        assert_eq!(engine.controls(), Controls { can_start: true, can_reset: true });
    }

    #[test]
    fn test_poll_with_instant_timings_runs_whole_script() {
        let mut engine = engine(PlaybackTimings::instant());
        engine.select_scenario(RETIREMENT);
        engine.start(Duration::ZERO);
        engine.poll(Duration::ZERO);
        assert_eq!(engine.state(), PlaybackState::Finished);
        assert_eq!(engine.transcript().len(), 10);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut engine = engine(PlaybackTimings::default()).with_session(SessionId::from_seed(1));
        engine.select_scenario(LIFE);
        engine.start(Duration::ZERO);
        run_until_len(&mut engine, 1);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.session, SessionId::from_seed(1));
        assert_eq!(snapshot.scenario, Some(LIFE));
        assert_eq!(snapshot.state, PlaybackState::AwaitingTurn);
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.script_len, 7);
        assert!(snapshot.typing_text.is_none());
    }

    #[test]
    fn test_empty_script_finishes_immediately() {
        let catalog = ScenarioCatalog::new(vec![Scenario::new(1, "Empty", "nothing")]);
        let mut engine = PlaybackEngine::new(Arc::new(catalog), PlaybackTimings::default());
        engine.select_scenario(1);
        let events = engine.start(Duration::ZERO);
        assert_eq!(engine.state(), PlaybackState::Finished);
        assert!(events.contains(&PlaybackEvent::Finished { messages: 0 }));
        assert!(engine.pending().is_none());
    }
}
