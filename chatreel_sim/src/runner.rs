//! Drill runner - executes verification drills against the virtual clock.
//!
//! Drills drive a [`PlaybackEngine`] synchronously: the harness advances the
//! [`SimContext`] clock straight to the pending timer's due time and fires it,
//! so a full scripted conversation replays in microseconds.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chatreel_core::catalog::ScenarioCatalog;
use chatreel_core::config::PlaybackTimings;
use chatreel_core::engine::{EngineStats, PlaybackEngine, PlaybackEvent, PlaybackState, TimerTicket};
use chatreel_core::model::{Message, MessageId, Scenario, ScenarioId, Sender};
use chatreel_env::{Generation, PlaybackContext, SessionId};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::SimContext;
use crate::drills::DrillId;
use crate::exporter::TimedEvent;

/// Upper bound on timer firings while waiting for a condition.
const MAX_STEPS: usize = 100_000;

/// Actions taken by the random-controls drill.
const RANDOM_ACTIONS: usize = 400;

/// Old tickets kept around to replay as stale firings.
const STALE_POOL: usize = 8;

/// Why a drill failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrillFailure {
    #[error("unknown scenario {0}")]
    UnknownScenario(ScenarioId),

    #[error("no timer pending in state {0}")]
    Stalled(PlaybackState),

    #[error("condition not reached within {0} timer firings")]
    StepLimit(usize),

    #[error("{0}")]
    Assertion(String),
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), DrillFailure> {
    if cond {
        Ok(())
    } else {
        Err(DrillFailure::Assertion(msg()))
    }
}

/// How a drill ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Passed,
    /// The scenario has nothing for this drill to exercise
    Skipped,
}

/// Results from running a drill.
#[derive(Debug, Clone)]
pub struct DrillResult {
    /// Drill that was run
    pub drill: DrillId,

    pub scenario_id: ScenarioId,
    pub scenario_title: String,

    /// Seed used
    pub seed: u64,

    pub session: SessionId,

    /// Wall-clock stamp of the run, from the context's fixed epoch
    pub started_at: SystemTime,

    /// Whether the drill passed all assertions (skipped drills pass)
    pub passed: bool,

    pub skipped: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Virtual time consumed
    pub virtual_time: Duration,

    /// Metrics collected during run
    pub metrics: DrillMetrics,

    /// Timed event log
    pub events: Vec<TimedEvent>,

    /// Transcript at the end of the drill
    pub transcript: Vec<Message>,
}

/// Metrics collected during drill execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrillMetrics {
    pub runs_started: u64,
    pub resets: u64,
    pub appended: u64,
    pub timers_fired: u64,

    /// Superseded tickets fired on purpose and ignored by the engine
    pub stale_firings: u64,

    pub typed_chars: u64,
    pub selections_applied: u64,

    /// Manual option toggles attempted
    pub toggles: u64,
}

impl DrillMetrics {
    fn collect(stats: &EngineStats, toggles: u64) -> Self {
        Self {
            runs_started: stats.runs_started,
            resets: stats.resets,
            appended: stats.appended,
            timers_fired: stats.timers_fired,
            stale_firings: stats.stale_firings,
            typed_chars: stats.typed_chars,
            selections_applied: stats.selections_applied,
            toggles,
        }
    }
}

/// Runs verification drills.
pub struct DrillRunner {
    catalog: Arc<ScenarioCatalog>,
    timings: PlaybackTimings,

    /// Configuration seed
    seed: u64,
}

impl DrillRunner {
    /// Creates a new drill runner with default timings.
    pub fn new(catalog: Arc<ScenarioCatalog>) -> Self {
        Self {
            catalog,
            timings: PlaybackTimings::default(),
            seed: 42,
        }
    }

    /// Sets the playback timings.
    pub fn with_timings(mut self, timings: PlaybackTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    /// Runs every drill against every scenario.
    pub fn run_all(&self, drills: &[DrillId], scenarios: &[ScenarioId]) -> Vec<DrillResult> {
        scenarios
            .iter()
            .flat_map(|&scenario| drills.iter().map(move |&drill| (drill, scenario)))
            .map(|(drill, scenario)| self.run(drill, scenario))
            .collect()
    }

    /// Runs a drill and returns the result.
    pub fn run(&self, drill: DrillId, scenario_id: ScenarioId) -> DrillResult {
        info!("Starting drill: {} on scenario {} (seed={})", drill.name(), scenario_id, self.seed);

        let mut harness = Harness::new(Arc::clone(&self.catalog), self.timings, self.seed);
        let scenario = self.catalog.get(scenario_id);

        debug!("  {}", drill.description());
        let started_at = harness.ctx.system_time();

        let outcome = match scenario {
            None => Err(DrillFailure::UnknownScenario(scenario_id)),
            Some(scenario) if drill.needs_options() && !has_options(scenario) => Ok(Outcome::Skipped),
            Some(scenario) => match drill {
                DrillId::FullPlayback => full_playback(&mut harness, scenario),
                DrillId::RestartMidRun => restart_mid_run(&mut harness, scenario),
                DrillId::ResetMidTyping => reset_mid_typing(&mut harness, scenario),
                DrillId::ScenarioSwitch => scenario_switch(&mut harness, scenario),
                DrillId::ManualToggle => manual_toggle(&mut harness, scenario),
                DrillId::SelectionOverride => selection_override(&mut harness, scenario),
                DrillId::RandomControls => random_controls(&mut harness, scenario),
            },
        };

        let (passed, skipped, failure_reason) = match outcome {
            Ok(Outcome::Passed) => (true, false, None),
            Ok(Outcome::Skipped) => {
                debug!("  {} has nothing to exercise in scenario {}", drill.name(), scenario_id);
                (true, true, None)
            }
            Err(failure) => {
                warn!("  {} failed on scenario {}: {}", drill.name(), scenario_id, failure);
                (false, false, Some(failure.to_string()))
            }
        };

        DrillResult {
            drill,
            scenario_id,
            scenario_title: scenario.map(|s| s.title.clone()).unwrap_or_default(),
            seed: self.seed,
            session: harness.engine.session(),
            started_at,
            passed,
            skipped,
            failure_reason,
            virtual_time: harness.ctx.now(),
            metrics: DrillMetrics::collect(harness.engine.stats(), harness.toggles),
            events: harness.events,
            transcript: harness.engine.transcript().to_vec(),
        }
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// Engine plus virtual clock plus event log.
struct Harness {
    ctx: SimContext,
    engine: PlaybackEngine,
    events: Vec<TimedEvent>,
    toggles: u64,
}

impl Harness {
    fn new(catalog: Arc<ScenarioCatalog>, timings: PlaybackTimings, seed: u64) -> Self {
        let ctx = SimContext::new(seed);
        let engine = PlaybackEngine::new(catalog, timings).with_session(ctx.session_id());
        Self {
            ctx,
            engine,
            events: Vec::new(),
            toggles: 0,
        }
    }

    fn record(&mut self, events: Vec<PlaybackEvent>) {
        let at_ms = u64::try_from(self.ctx.now().as_millis()).unwrap_or(u64::MAX);
        self.events
            .extend(events.into_iter().map(|event| TimedEvent { at_ms, event }));
    }

    fn select(&mut self, id: ScenarioId) -> bool {
        self.engine.select_scenario(id)
    }

    fn start(&mut self) {
        let events = self.engine.start(self.ctx.now());
        self.record(events);
    }

    fn reset(&mut self) {
        let events = self.engine.reset();
        self.record(events);
    }

    fn toggle(&mut self, message_id: MessageId, option_id: &str) -> bool {
        self.toggles += 1;
        self.engine.toggle_option(message_id, option_id)
    }

    /// Moves the clock to the pending timer and fires it.
    ///
    /// Returns false when no timer is pending.
    fn step(&mut self) -> bool {
        let Some(ticket) = self.engine.pending() else {
            return false;
        };
        self.ctx.advance_to(ticket.due);
        let events = self.engine.fire(ticket, self.ctx.now());
        self.record(events);
        true
    }

    /// Fires a superseded ticket; it must change nothing.
    fn fire_stale(&mut self, ticket: TimerTicket) -> Result<(), DrillFailure> {
        let len = self.engine.transcript().len();
        let state = self.engine.state();
        let stale = self.engine.stats().stale_firings;

        let events = self.engine.fire(ticket, self.ctx.now());

        ensure(events.is_empty(), || format!("stale ticket {:?} produced {} events", ticket, events.len()))?;
        ensure(self.engine.transcript().len() == len, || {
            format!("stale ticket {:?} changed the transcript", ticket)
        })?;
        ensure(self.engine.state() == state, || format!("stale ticket {:?} changed the state", ticket))?;
        ensure(self.engine.stats().stale_firings == stale + 1, || {
            "stale firing was not counted".to_string()
        })
    }

    fn run_until(&mut self, mut pred: impl FnMut(&PlaybackEngine) -> bool) -> Result<(), DrillFailure> {
        for _ in 0..MAX_STEPS {
            if pred(&self.engine) {
                return Ok(());
            }
            if !self.step() {
                return Err(DrillFailure::Stalled(self.engine.state()));
            }
        }
        Err(DrillFailure::StepLimit(MAX_STEPS))
    }

    fn run_to_end(&mut self) -> Result<(), DrillFailure> {
        self.run_until(|e| e.state() == PlaybackState::Finished)
    }

    fn revealed(&self, message_id: MessageId) -> bool {
        self.engine.transcript().iter().any(|m| m.id == message_id)
    }

    /// Selected option ids of a revealed message.
    fn selected(&self, message_id: MessageId) -> Vec<String> {
        self.engine
            .transcript()
            .iter()
            .find(|m| m.id == message_id)
            .and_then(Message::options)
            .map(|opts| opts.iter().filter(|o| o.selected).map(|o| o.id.clone()).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// CHECKS
// =============================================================================

/// Transcript must be a prefix of the script (the whole script if `full`).
fn check_matches_script(transcript: &[Message], script: &[Message], full: bool) -> Result<(), DrillFailure> {
    ensure(transcript.len() <= script.len(), || {
        format!("transcript has {} messages, script only {}", transcript.len(), script.len())
    })?;
    if full {
        ensure(transcript.len() == script.len(), || {
            format!("transcript has {} of {} messages", transcript.len(), script.len())
        })?;
    }
    for (i, (shown, authored)) in transcript.iter().zip(script).enumerate() {
        ensure(
            shown.id == authored.id && shown.sender == authored.sender && shown.body == authored.body,
            || format!("transcript[{}] is message {} but script has message {}", i, shown.id, authored.id),
        )?;
    }
    Ok(())
}

fn check_single_selection(transcript: &[Message]) -> Result<(), DrillFailure> {
    for msg in transcript {
        if let Some(opts) = msg.options() {
            let selected = opts.iter().filter(|o| o.selected).count();
            ensure(selected <= 1, || format!("message {} has {} options selected", msg.id, selected))?;
        }
    }
    Ok(())
}

/// Invariants that hold after any operation.
fn check_invariants(engine: &PlaybackEngine, last_generation: Generation) -> Result<(), DrillFailure> {
    let script = engine.selected_scenario().map_or(&[][..], |s| s.script.as_slice());
    let transcript = engine.transcript();

    check_matches_script(transcript, script, engine.state() == PlaybackState::Finished)?;
    check_single_selection(transcript)?;

    ensure(engine.cursor() == transcript.len(), || {
        format!("cursor {} but {} messages revealed", engine.cursor(), transcript.len())
    })?;
    ensure(engine.generation() >= last_generation, || {
        format!("generation went back from {} to {}", last_generation, engine.generation())
    })?;
    ensure(engine.is_running() == engine.pending().is_some(), || {
        format!("state {} with pending timer {:?}", engine.state(), engine.pending())
    })?;
    if engine.state() == PlaybackState::Idle {
        ensure(transcript.is_empty(), || "idle with a non-empty transcript".to_string())?;
    }
    Ok(())
}

/// Virtual time a full run takes with the given timings.
pub fn expected_duration(script: &[Message], timings: &PlaybackTimings) -> Duration {
    script
        .iter()
        .map(|msg| {
            let reveal = match msg.sender {
                Sender::User => {
                    let chars = u32::try_from(msg.body.chars().count()).unwrap_or(u32::MAX);
                    timings.typing_interval * chars + timings.send_settle
                }
                Sender::Bot => timings.bot_thinking,
                Sender::System => timings.auxiliary_delay,
            };
            timings.turn_gap + reveal
        })
        .sum()
}

// =============================================================================
// DRILLS
// =============================================================================

/// CR-001: FullPlayback - reveal everything in order.
///
/// **Assertion**: transcript equals the script, typing reveals one character
/// per tick, and the run takes exactly the configured virtual time.
fn full_playback(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    h.select(scenario.id);
    h.start();
    h.run_to_end()?;

    check_matches_script(h.engine.transcript(), &scenario.script, true)?;
    ensure(h.engine.cursor() == scenario.len(), || "cursor not at end of script".to_string())?;

    let expected = expected_duration(&scenario.script, h.engine.timings());
    ensure(h.ctx.now() == expected, || {
        format!("run took {:?}, expected {:?}", h.ctx.now(), expected)
    })?;

    // One more character per typing tick, starting from one
    let mut last: Option<(MessageId, usize)> = None;
    for timed in &h.events {
        if let PlaybackEvent::Typed { message_id, visible } = &timed.event {
            let n = visible.chars().count();
            let want = match last {
                Some((id, prev)) if id == *message_id => prev + 1,
                _ => 1,
            };
            ensure(n == want, || format!("message {} showed {} chars, expected {}", message_id, n, want))?;
            last = Some((*message_id, n));
        }
    }

    let user_chars: usize = scenario
        .script
        .iter()
        .filter(|m| m.sender == Sender::User)
        .map(|m| m.body.chars().count())
        .sum();
    ensure(h.engine.stats().typed_chars == user_chars as u64, || {
        format!("typed {} chars, script has {}", h.engine.stats().typed_chars, user_chars)
    })?;
    ensure(h.engine.stats().stale_firings == 0, || "stale firing in a clean run".to_string())?;

    Ok(Outcome::Passed)
}

/// CR-002: RestartMidRun - start again after two messages.
///
/// **Assertion**: the old run's timer is ignored, no message appears twice.
fn restart_mid_run(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    h.select(scenario.id);
    h.start();
    h.run_until(|e| e.transcript().len() >= scenario.len().min(2))?;

    let stale = h.engine.pending();
    let generation = h.engine.generation();
    h.start();

    ensure(h.engine.transcript().is_empty(), || "restart kept old messages".to_string())?;
    ensure(h.engine.generation() > generation, || "restart did not bump the generation".to_string())?;
    if let Some(ticket) = stale {
        h.fire_stale(ticket)?;
    }

    h.run_to_end()?;
    check_matches_script(h.engine.transcript(), &scenario.script, true)?;
    ensure(h.engine.stats().runs_started == 2, || "expected two runs".to_string())?;
    Ok(Outcome::Passed)
}

/// CR-003: ResetMidTyping - reset while a user message is half typed.
///
/// **Assertion**: Idle, empty transcript, cursor 0, nothing fires afterwards.
fn reset_mid_typing(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    let has_typing = scenario
        .script
        .iter()
        .any(|m| m.sender == Sender::User && !m.body.is_empty());

    h.select(scenario.id);
    h.start();
    if has_typing {
        h.run_until(|e| e.state() == PlaybackState::TypingUser && e.typing_text().is_some_and(|t| !t.is_empty()))?;
    }

    let stale = h.engine.pending();
    h.reset();

    let engine = &h.engine;
    ensure(engine.state() == PlaybackState::Idle, || format!("reset left state {}", engine.state()))?;
    ensure(engine.transcript().is_empty(), || "reset kept messages".to_string())?;
    ensure(engine.cursor() == 0, || "reset kept the cursor".to_string())?;
    ensure(engine.typing_text().is_none(), || "reset kept the typing indicator".to_string())?;
    ensure(engine.pending().is_none(), || "reset kept a timer".to_string())?;
    ensure(engine.controls().can_start && !engine.controls().can_reset, || {
        format!("unexpected controls after reset: {:?}", engine.controls())
    })?;

    if let Some(ticket) = stale {
        h.fire_stale(ticket)?;
    }

    // Nothing left to fire, however long we wait
    h.ctx.advance_time(expected_duration(&scenario.script, h.engine.timings()) + Duration::from_secs(1));
    let events = h.engine.poll(h.ctx.now());
    ensure(events.is_empty() && h.engine.transcript().is_empty(), || {
        "playback resumed after reset".to_string()
    })?;

    Ok(Outcome::Passed)
}

/// CR-004: ScenarioSwitch - select another scenario mid-run.
///
/// **Assertion**: the first run stops immediately and never leaks into the
/// second scenario's transcript.
fn scenario_switch(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    let catalog = Arc::clone(h.engine.catalog());
    let other = catalog
        .iter()
        .find(|s| s.id != scenario.id)
        .unwrap_or(scenario);

    h.select(scenario.id);
    h.start();
    h.run_until(|e| !e.transcript().is_empty())?;
    let stale = h.engine.pending();

    ensure(h.select(other.id), || format!("could not select scenario {}", other.id))?;
    ensure(h.engine.state() == PlaybackState::Idle, || "switch did not stop the run".to_string())?;
    ensure(h.engine.transcript().is_empty(), || "switch kept messages".to_string())?;
    ensure(h.engine.pending().is_none(), || "switch kept a timer".to_string())?;
    if let Some(ticket) = stale {
        h.fire_stale(ticket)?;
    }

    h.start();
    h.run_to_end()?;
    check_matches_script(h.engine.transcript(), &other.script, true)?;
    Ok(Outcome::Passed)
}

fn has_options(scenario: &Scenario) -> bool {
    scenario
        .script
        .iter()
        .any(|m| m.options().is_some_and(|opts| !opts.is_empty()))
}

/// CR-005: ManualToggle - select, move and clear an option by hand.
fn manual_toggle(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    let Some((target, options)) = scenario.script.iter().find_map(|m| {
        let ids: Vec<String> = m.options()?.iter().map(|o| o.id.clone()).collect();
        (!ids.is_empty()).then_some((m.id, ids))
    }) else {
        return Ok(Outcome::Skipped);
    };

    h.select(scenario.id);
    h.start();
    ensure(!h.toggle(target, &options[0]), || "toggled an option before it was revealed".to_string())?;

    h.run_until(|e| e.transcript().iter().any(|m| m.id == target))?;

    // Authored defaults may already select the first option
    h.toggle(target, &options[0]);
    if h.selected(target).is_empty() {
        h.toggle(target, &options[0]);
    }
    ensure(h.selected(target) == [options[0].clone()], || {
        format!("expected {} selected, got {:?}", options[0], h.selected(target))
    })?;

    if let Some(second) = options.get(1) {
        h.toggle(target, second);
        ensure(h.selected(target) == [second.clone()], || {
            format!("expected only {} selected, got {:?}", second, h.selected(target))
        })?;
        h.toggle(target, second);
        ensure(h.selected(target).is_empty(), || "toggling the selected option kept it".to_string())?;
    }

    let before = h.selected(target);
    ensure(!h.toggle(target, "no-such-option"), || "unknown option accepted".to_string())?;
    ensure(!h.toggle(MessageId::MAX, &options[0]), || "unknown message accepted".to_string())?;
    ensure(h.selected(target) == before, || "ignored toggle changed the selection".to_string())?;

    h.run_to_end()?;
    check_single_selection(h.engine.transcript())?;
    Ok(Outcome::Passed)
}

/// CR-006: SelectionOverride - an authored selection replaces a manual one.
fn selection_override(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    let Some((selector, selection)) = scenario.script.iter().find_map(|m| {
        let selection = m.selection.as_ref()?;
        let target = scenario.message(selection.target)?;
        target
            .options()?
            .iter()
            .any(|o| o.id == selection.option)
            .then_some((m.id, selection.clone()))
    }) else {
        return Ok(Outcome::Skipped);
    };

    let manual = scenario
        .message(selection.target)
        .and_then(Message::options)
        .and_then(|opts| opts.iter().find(|o| o.id != selection.option))
        .map(|o| o.id.clone());

    h.select(scenario.id);
    h.start();
    h.run_until(|e| e.transcript().iter().any(|m| m.id == selection.target))?;

    if let Some(manual) = &manual {
        if h.selected(selection.target) != [manual.clone()] {
            h.toggle(selection.target, manual);
        }
        ensure(h.selected(selection.target) == [manual.clone()], || {
            format!("manual choice {} not applied", manual)
        })?;
    }

    h.run_until(|e| e.transcript().iter().any(|m| m.id == selector))?;
    ensure(h.revealed(selector), || format!("message {} never revealed", selector))?;
    ensure(h.selected(selection.target) == [selection.option.clone()], || {
        format!(
            "message {} should select {} on {}, got {:?}",
            selector,
            selection.option,
            selection.target,
            h.selected(selection.target)
        )
    })?;

    // Later authored selections on the same target win in turn
    h.run_to_end()?;
    let last = scenario
        .script
        .iter()
        .filter_map(|m| m.selection.as_ref())
        .filter(|s| s.target == selection.target)
        .last()
        .map(|s| s.option.clone())
        .unwrap_or_else(|| selection.option.clone());
    ensure(h.selected(selection.target) == [last.clone()], || {
        format!("final selection on {} should be {}, got {:?}", selection.target, last, h.selected(selection.target))
    })?;
    ensure(h.engine.stats().selections_applied >= 1, || "no selection applied".to_string())?;
    Ok(Outcome::Passed)
}

/// CR-007: RandomControls - seeded random clicks interleaved with timers.
///
/// **Assertion**: invariants hold after every action, and a final clean run
/// still completes.
fn random_controls(h: &mut Harness, scenario: &Scenario) -> Result<Outcome, DrillFailure> {
    let ids: Vec<ScenarioId> = h.engine.catalog().iter().map(|s| s.id).collect();
    let mut old_tickets: Vec<TimerTicket> = Vec::new();
    let mut generation = h.engine.generation();

    h.select(scenario.id);

    for action in 0..RANDOM_ACTIONS {
        let roll: u32 = h.ctx.with_rng(|rng| rng.gen_range(0..100));
        match roll {
            0..=59 => {
                if let Some(ticket) = h.engine.pending() {
                    if old_tickets.len() == STALE_POOL {
                        old_tickets.remove(0);
                    }
                    old_tickets.push(ticket);
                }
                h.step();
            }
            60..=71 => h.start(),
            72..=77 => h.reset(),
            78..=82 => {
                let pick = h.ctx.with_rng(|rng| rng.gen_range(0..ids.len()));
                h.select(ids[pick]);
            }
            83..=92 => {
                let choices: Vec<(MessageId, Vec<String>)> = h
                    .engine
                    .transcript()
                    .iter()
                    .filter_map(|m| Some((m.id, m.options()?.iter().map(|o| o.id.clone()).collect())))
                    .collect();
                if !choices.is_empty() {
                    let (target, options) = h.ctx.with_rng(|rng| {
                        let (id, opts) = &choices[rng.gen_range(0..choices.len())];
                        let option = if opts.is_empty() || rng.gen_bool(0.1) {
                            "no-such-option".to_string()
                        } else {
                            opts[rng.gen_range(0..opts.len())].clone()
                        };
                        (*id, option)
                    });
                    h.toggle(target, &options);
                }
            }
            _ => {
                if !old_tickets.is_empty() {
                    let pick = h.ctx.with_rng(|rng| rng.gen_range(0..old_tickets.len()));
                    let ticket = old_tickets[pick];
                    // Zero delays can reproduce the pending ticket exactly
                    if h.engine.pending() != Some(ticket) {
                        h.fire_stale(ticket)?;
                    }
                }
            }
        }

        check_invariants(&h.engine, generation).map_err(|failure| {
            DrillFailure::Assertion(format!("after action {} (roll {}): {}", action, roll, failure))
        })?;
        generation = h.engine.generation();
    }

    h.select(scenario.id);
    h.start();
    h.run_to_end()?;
    check_matches_script(h.engine.transcript(), &scenario.script, true)?;
    Ok(Outcome::Passed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> DrillRunner {
        DrillRunner::new(Arc::new(ScenarioCatalog::builtin()))
    }

    #[test]
    fn test_every_drill_passes_on_builtin_catalog() {
        let runner = runner();
        let scenarios: Vec<ScenarioId> = runner.catalog().iter().map(|s| s.id).collect();
        for result in runner.run_all(&DrillId::all(), &scenarios) {
            assert!(
                result.passed,
                "{} on scenario {}: {:?}",
                result.drill,
                result.scenario_id,
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_instant_timings_pass_too() {
        let runner = runner().with_timings(PlaybackTimings::instant()).with_seed(7);
        for drill in DrillId::all() {
            let result = runner.run(drill, 2);
            assert!(result.passed, "{}: {:?}", drill, result.failure_reason);
        }
    }

    #[test]
    fn test_full_playback_duration_life_insurance() {
        let result = runner().run(DrillId::FullPlayback, 1);
        assert!(result.passed);
        assert_eq!(result.transcript.len(), 7);
        let catalog = ScenarioCatalog::builtin();
        let script = &catalog.get(1).unwrap().script;
        assert_eq!(result.virtual_time, expected_duration(script, &PlaybackTimings::default()));
        assert_eq!(result.metrics.appended, 7);
    }

    #[test]
    fn test_option_drills_skip_text_only_scenario() {
        let runner = runner();
        let toggle = runner.run(DrillId::ManualToggle, 1);
        assert!(toggle.passed && toggle.skipped);

        let toggle = runner.run(DrillId::ManualToggle, 2);
        assert!(toggle.passed && !toggle.skipped);
        assert!(toggle.metrics.toggles >= 4);

        // Skipped before the harness is touched
        let skipped = runner.run(DrillId::SelectionOverride, 1);
        assert!(skipped.skipped);
        assert_eq!(skipped.metrics, DrillMetrics::default());
        assert!(skipped.events.is_empty());

        let played = runner.run(DrillId::FullPlayback, 1);
        assert!(!played.skipped);
    }

    #[test]
    fn test_results_are_stamped_from_the_virtual_epoch() {
        let result = runner().run(DrillId::FullPlayback, 2);
        let epoch = std::time::UNIX_EPOCH + Duration::from_secs(1_704_067_200);
        assert_eq!(result.started_at, epoch);
        assert_eq!(result.started_at, runner().run(DrillId::FullPlayback, 2).started_at);
    }

    #[test]
    fn test_stale_firings_are_counted() {
        let result = runner().run(DrillId::RestartMidRun, 3);
        assert!(result.passed);
        assert_eq!(result.metrics.stale_firings, 1);
        assert_eq!(result.metrics.runs_started, 2);
    }

    #[test]
    fn test_unknown_scenario_fails() {
        let result = runner().run(DrillId::FullPlayback, 99);
        assert!(!result.passed);
        assert_eq!(result.failure_reason.as_deref(), Some("unknown scenario 99"));
    }

    #[test]
    fn test_random_controls_is_deterministic() {
        let a = runner().with_seed(11).run(DrillId::RandomControls, 3);
        let b = runner().with_seed(11).run(DrillId::RandomControls, 3);
        assert!(a.passed, "{:?}", a.failure_reason);
        assert_eq!(a.events, b.events);
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.session, b.session);
    }

    #[test]
    fn test_expected_duration() {
        let timings = PlaybackTimings::default();
        let script = vec![Message::bot(1, "Hi"), Message::user(2, "Yes"), Message::system(3, "ok")];
        let expected = timings.turn_gap * 3
            + timings.bot_thinking
            + timings.typing_interval * 3
            + timings.send_settle
            + timings.auxiliary_delay;
        assert_eq!(expected_duration(&script, &timings), expected);
    }
}
