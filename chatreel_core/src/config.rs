//! Player configuration: timings, theme, enabled content kinds, editions.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ContentKind;

/// Delays used by the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackTimings {
    /// Interval between typed characters of a user message
    pub typing_interval: Duration,

    /// Pause after typing finishes, before the user message lands
    pub send_settle: Duration,

    /// How long the bot "thinks" before its message lands
    pub bot_thinking: Duration,

    /// Delay before an auxiliary/system message lands
    pub auxiliary_delay: Duration,

    /// Pause in `AwaitingTurn` before the next message starts
    pub turn_gap: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            typing_interval: Duration::from_millis(45),
            send_settle: Duration::from_millis(600),
            bot_thinking: Duration::from_millis(1500),
            auxiliary_delay: Duration::from_millis(400),
            turn_gap: Duration::from_millis(300),
        }
    }
}

/// Playback speed factors accepted by [`PlaybackTimings::scaled`].
pub const SPEED_RANGE: RangeInclusive<f64> = 0.1..=100.0;

impl PlaybackTimings {
    /// All delays zero. Every step still goes through the timer, so state
    /// order is preserved; only the clock stops moving.
    pub fn instant() -> Self {
        Self {
            typing_interval: Duration::ZERO,
            send_settle: Duration::ZERO,
            bot_thinking: Duration::ZERO,
            auxiliary_delay: Duration::ZERO,
            turn_gap: Duration::ZERO,
        }
    }

    /// Divides every delay by `speed` (2.0 plays twice as fast).
    ///
    /// `speed` is clamped to [`SPEED_RANGE`]; NaN leaves the timings unchanged.
    pub fn scaled(self, speed: f64) -> Self {
        if speed.is_nan() {
            return self;
        }
        let speed = speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        let scale = |d: Duration| Duration::try_from_secs_f64(d.as_secs_f64() / speed).unwrap_or(d);
        Self {
            typing_interval: scale(self.typing_interval),
            send_settle: scale(self.send_settle),
            bot_thinking: scale(self.bot_thinking),
            auxiliary_delay: scale(self.auxiliary_delay),
            turn_gap: scale(self.turn_gap),
        }
    }

    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }
}

/// Visual theme of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark page, blue bot / green user bubbles
    #[default]
    Midnight,
    /// Light page, neutral bubbles
    Daylight,
    /// Phone chrome with status bar
    Phone,
}

/// Content kinds the renderer is allowed to use.
///
/// Disabled kinds degrade to a plain text bubble. `Text` is always enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    enabled: BTreeSet<ContentKind>,
}

impl FeatureSet {
    /// Every content kind enabled.
    pub fn all() -> Self {
        Self::from_kinds(ContentKind::all())
    }

    /// Only plain text bubbles.
    pub fn text_only() -> Self {
        Self::from_kinds([ContentKind::Text])
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = ContentKind>) -> Self {
        let mut enabled: BTreeSet<ContentKind> = kinds.into_iter().collect();
        enabled.insert(ContentKind::Text);
        Self { enabled }
    }

    pub fn allows(&self, kind: ContentKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn with(mut self, kind: ContentKind) -> Self {
        self.enabled.insert(kind);
        self
    }

    pub fn without(mut self, kind: ContentKind) -> Self {
        if kind != ContentKind::Text {
            self.enabled.remove(&kind);
        }
        self
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Successive revisions of the demo page, reproduced as presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    /// Text bubbles only, dark page.
    Classic,
    /// Option lists, tables and images, light page.
    Rich,
    /// Everything, with phone chrome, avatars and a live clock.
    Phone,
}

impl Edition {
    pub fn name(&self) -> &'static str {
        match self {
            Edition::Classic => "classic",
            Edition::Rich => "rich",
            Edition::Phone => "phone",
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" | "v1" => Ok(Edition::Classic),
            "rich" | "v2" => Ok(Edition::Rich),
            "phone" | "v3" => Ok(Edition::Phone),
            _ => Err(format!("Unknown edition: {} (expected classic, rich or phone)", s)),
        }
    }
}

/// Everything the player needs besides the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub timings: PlaybackTimings,
    pub theme: Theme,
    pub features: FeatureSet,
    /// Show "IP" / "YOU" avatars next to bubbles
    pub show_avatars: bool,
    /// Show the live clock in the header
    pub show_clock: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::for_edition(Edition::Phone)
    }
}

impl PlayerConfig {
    pub fn for_edition(edition: Edition) -> Self {
        match edition {
            Edition::Classic => Self {
                timings: PlaybackTimings::default(),
                theme: Theme::Midnight,
                features: FeatureSet::text_only(),
                show_avatars: true,
                show_clock: false,
            },
            Edition::Rich => Self {
                timings: PlaybackTimings::default(),
                theme: Theme::Daylight,
                features: FeatureSet::all(),
                show_avatars: false,
                show_clock: false,
            },
            Edition::Phone => Self {
                timings: PlaybackTimings::default(),
                theme: Theme::Phone,
                features: FeatureSet::all(),
                show_avatars: true,
                show_clock: true,
            },
        }
    }

    pub fn with_timings(mut self, timings: PlaybackTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }
}
