//! JSON exporter for drill transcripts.
//!
//! Writes the revealed transcript, its explanation panel and the timed event
//! log of one drill run, for inspection or replay tooling.

use chatreel_core::engine::PlaybackEvent;
use chatreel_core::model::{Message, ScenarioId};
use chatreel_core::render::{explanation_entry, ExplanationEntry};
use chatreel_env::SessionId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::runner::DrillResult;

/// A playback event stamped with virtual time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Virtual time in milliseconds since the drill started
    pub at_ms: u64,

    #[serde(flatten)]
    pub event: PlaybackEvent,
}

/// Complete drill export.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptExport {
    pub scenario_id: ScenarioId,

    /// Scenario title
    pub scenario: String,

    pub drill: String,

    /// Seed used
    pub seed: u64,

    pub session: SessionId,

    /// Wall-clock start of the run in Unix milliseconds
    pub started_unix_ms: u64,

    /// Virtual duration in milliseconds
    pub duration_ms: u64,

    /// Timed event log
    pub events: Vec<TimedEvent>,

    /// Final transcript, selections applied
    pub transcript: Vec<Message>,

    /// Explanation panel entries, one per transcript message
    pub explanations: Vec<ExplanationEntry>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TranscriptExport {
    /// Creates a new export container.
    pub fn new(scenario_id: ScenarioId, scenario: &str, drill: &str, seed: u64, session: SessionId) -> Self {
        Self {
            scenario_id,
            scenario: scenario.to_string(),
            drill: drill.to_string(),
            seed,
            session,
            started_unix_ms: 0,
            duration_ms: 0,
            events: Vec::new(),
            transcript: Vec::new(),
            explanations: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Builds an export from a finished drill run.
    pub fn from_result(result: &DrillResult) -> Self {
        let mut export = Self::new(
            result.scenario_id,
            &result.scenario_title,
            result.drill.name(),
            result.seed,
            result.session,
        );
        for event in &result.events {
            export.add_event(event.clone());
        }
        export.started_unix_ms = result
            .started_at
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        export.duration_ms = export
            .duration_ms
            .max(u64::try_from(result.virtual_time.as_millis()).unwrap_or(u64::MAX));
        export.finalize(result.passed, result.failure_reason.clone(), &result.transcript);
        export
    }

    /// Adds an event.
    pub fn add_event(&mut self, event: TimedEvent) {
        self.duration_ms = self.duration_ms.max(event.at_ms);
        self.events.push(event);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>, transcript: &[Message]) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.transcript = transcript.to_vec();
        self.explanations = transcript.iter().map(explanation_entry).collect();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::engine::PlaybackState;

    #[test]
    fn test_timed_event_flattens_tag() {
        let event = TimedEvent {
            at_ms: 300,
            event: PlaybackEvent::StateChanged {
                from: PlaybackState::AwaitingTurn,
                to: PlaybackState::LoadingBot,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["at_ms"], 300);
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["to"], "loading_bot");

        let back: TimedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_export_write_to_file() {
        let mut export = TranscriptExport::new(1, "Life Insurance Planning", "full_playback", 42, SessionId::from_seed(42));
        export.add_event(TimedEvent {
            at_ms: 1800,
            event: PlaybackEvent::Appended { message_id: 1, index: 0 },
        });
        let transcript = vec![Message::bot(1, "Hello! I'm your insurance planning assistant.").explain("Greeting")];
        export.finalize(true, None, &transcript);

        let path = std::env::temp_dir().join(format!("chatreel-export-{}.json", std::process::id()));
        export.write_to_file(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(json["duration_ms"], 1800);
        assert_eq!(json["passed"], true);
        assert!(json.get("failure_reason").is_none());
        assert_eq!(json["transcript"][0]["message"], "Hello! I'm your insurance planning assistant.");
        assert_eq!(json["explanations"][0]["heading"], "Bot: \"Hello! I'm your insurance plan...\"");
    }
}
