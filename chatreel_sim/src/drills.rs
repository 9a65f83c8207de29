//! Verification drills run headless against the virtual clock.

/// Drill identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrillId {
    /// CR-001: Play the whole script and check timing and order
    FullPlayback,

    /// CR-002: Start again mid-run; the old run must not leak
    RestartMidRun,

    /// CR-003: Reset while a user message is being typed
    ResetMidTyping,

    /// CR-004: Select another scenario mid-run, then play it
    ScenarioSwitch,

    /// CR-005: Toggle options by hand; at most one stays selected
    ManualToggle,

    /// CR-006: Authored selection events win over earlier manual toggles
    SelectionOverride,

    /// CR-007: Seeded random sequence of controls and timer firings
    RandomControls,
}

impl DrillId {
    /// Returns a list of all drills.
    pub fn all() -> Vec<DrillId> {
        vec![
            DrillId::FullPlayback,
            DrillId::RestartMidRun,
            DrillId::ResetMidTyping,
            DrillId::ScenarioSwitch,
            DrillId::ManualToggle,
            DrillId::SelectionOverride,
            DrillId::RandomControls,
        ]
    }

    /// Returns the drill name.
    pub fn name(&self) -> &'static str {
        match self {
            DrillId::FullPlayback => "full_playback",
            DrillId::RestartMidRun => "restart_mid_run",
            DrillId::ResetMidTyping => "reset_mid_typing",
            DrillId::ScenarioSwitch => "scenario_switch",
            DrillId::ManualToggle => "manual_toggle",
            DrillId::SelectionOverride => "selection_override",
            DrillId::RandomControls => "random_controls",
        }
    }

    /// Returns a description of the drill.
    pub fn description(&self) -> &'static str {
        match self {
            DrillId::FullPlayback => "Reveal every message in order with the configured per-sender delays",
            DrillId::RestartMidRun => "Restart after two messages; stale timers are ignored, no duplicates",
            DrillId::ResetMidTyping => "Reset during the typing animation; transcript and cursor cleared",
            DrillId::ScenarioSwitch => "Switch scenario mid-run; old messages never reach the new run",
            DrillId::ManualToggle => "Toggle options by hand; select, move and clear the selection",
            DrillId::SelectionOverride => "Authored selection events replace a manual choice on reveal",
            DrillId::RandomControls => "Seeded random clicks and timers; invariants hold after every step",
        }
    }

    /// True if the drill only makes sense for scripts with option lists.
    pub fn needs_options(&self) -> bool {
        matches!(self, DrillId::ManualToggle | DrillId::SelectionOverride)
    }
}

impl std::fmt::Display for DrillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DrillId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_playback" | "fullplayback" | "cr-001" => Ok(DrillId::FullPlayback),
            "restart_mid_run" | "restartmidrun" | "cr-002" => Ok(DrillId::RestartMidRun),
            "reset_mid_typing" | "resetmidtyping" | "cr-003" => Ok(DrillId::ResetMidTyping),
            "scenario_switch" | "scenarioswitch" | "cr-004" => Ok(DrillId::ScenarioSwitch),
            "manual_toggle" | "manualtoggle" | "cr-005" => Ok(DrillId::ManualToggle),
            "selection_override" | "selectionoverride" | "cr-006" => Ok(DrillId::SelectionOverride),
            "random_controls" | "randomcontrols" | "cr-007" => Ok(DrillId::RandomControls),
            _ => Err(format!("Unknown drill: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drill_names_round_trip() {
        for drill in DrillId::all() {
            assert_eq!(drill.name().parse::<DrillId>(), Ok(drill));
        }
        assert_eq!("CR-003".parse::<DrillId>(), Ok(DrillId::ResetMidTyping));
        assert!("time_warp".parse::<DrillId>().is_err());
    }

    #[test]
    fn test_only_option_drills_need_options() {
        let needy: Vec<DrillId> = DrillId::all().into_iter().filter(DrillId::needs_options).collect();
        assert_eq!(needy, vec![DrillId::ManualToggle, DrillId::SelectionOverride]);
        assert!(DrillId::all().iter().all(|d| !d.description().is_empty()));
    }
}
