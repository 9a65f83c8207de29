//! Rendering model: a stateless mapping from transcript messages to what the
//! chat pane and explanation panel show. The dashboard only lays these out.

use serde::Serialize;

use crate::config::PlayerConfig;
use crate::engine::{PlaybackSnapshot, PlaybackState};
use crate::model::{Content, Message, MessageId, Sender};

/// Shown in the chat pane before anything has been revealed.
pub const EMPTY_CHAT_PLACEHOLDER: &str = "Select a scenario and press Start to begin the demo";

/// Shown in the explanation panel before anything has been revealed.
pub const EMPTY_EXPLANATION_PLACEHOLDER: &str = "Explanations will appear here as the chat progresses";

/// Placeholder text of the (always disabled) input box.
pub const INPUT_PLACEHOLDER: &str = "Message is automated in this demo";

/// Characters of the message quoted in an explanation heading.
const QUOTE_CHARS: usize = 30;

/// Horizontal placement of a bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistLine {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

impl ChecklistLine {
    /// `[x] label` / `[ ] label`
    pub fn text(&self) -> String {
        format!("[{}] {}", if self.selected { 'x' } else { ' ' }, self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    /// Data cells only; the highlight flag never shows up here
    pub cells: Vec<String>,
    pub highlighted: bool,
}

/// Body template selected by content kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum RenderedBody {
    Bubble,
    Checklist { options: Vec<ChecklistLine> },
    Table { headers: Vec<String>, rows: Vec<RenderedRow> },
    Image { uri: String },
}

/// One message, ready to lay out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub sender: Sender,
    pub align: Align,
    pub avatar: Option<&'static str>,
    /// Bubble text; for structured kinds, the caption above the payload
    pub text: String,
    pub body: RenderedBody,
}

/// Maps a message to its template. Kinds disabled in the config fall back to
/// a plain bubble.
pub fn render_message(msg: &Message, config: &PlayerConfig) -> RenderedMessage {
    let (align, avatar) = match msg.sender {
        Sender::Bot => (Align::Left, Some("IP")),
        Sender::User => (Align::Right, Some("YOU")),
        Sender::System => (Align::Center, None),
    };

    let body = if !config.features.allows(msg.kind()) {
        RenderedBody::Bubble
    } else {
        match &msg.content {
            Content::Text => RenderedBody::Bubble,
            Content::Options(items) => RenderedBody::Checklist {
                options: items
                    .iter()
                    .map(|o| ChecklistLine {
                        id: o.id.clone(),
                        label: o.label.clone(),
                        selected: o.selected,
                    })
                    .collect(),
            },
            Content::Table(table) => RenderedBody::Table {
                headers: table.headers.clone(),
                rows: table
                    .rows
                    .iter()
                    .map(|r| RenderedRow {
                        cells: r.cells.clone(),
                        highlighted: r.highlight,
                    })
                    .collect(),
            },
            Content::Image { uri } => RenderedBody::Image { uri: uri.clone() },
        }
    };

    RenderedMessage {
        id: msg.id,
        sender: msg.sender,
        align,
        avatar: if config.show_avatars { avatar } else { None },
        text: msg.body.clone(),
        body,
    }
}

/// One entry of the "Script Explanation" panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationEntry {
    pub message_id: MessageId,
    /// `Bot: "Hello! I'm your insurance plan..."`
    pub heading: String,
    pub explanation: String,
}

pub fn explanation_entry(msg: &Message) -> ExplanationEntry {
    let quote: String = msg.body.chars().take(QUOTE_CHARS).collect();
    ExplanationEntry {
        message_id: msg.id,
        heading: format!("{}: \"{}...\"", msg.sender.label(), quote),
        explanation: msg.explanation.clone().unwrap_or_default(),
    }
}

/// Transient indicator under the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Indicator {
    /// User message being typed (text so far)
    Typing(String),
    /// User message typed out, about to be sent
    Sending(String),
    /// Bot is "thinking"
    Loading,
}

pub fn indicator(snapshot: &PlaybackSnapshot) -> Option<Indicator> {
    let typed = || snapshot.typing_text.clone().unwrap_or_default();
    match snapshot.state {
        PlaybackState::TypingUser => Some(Indicator::Typing(typed())),
        PlaybackState::SendingUser => Some(Indicator::Sending(typed())),
        PlaybackState::LoadingBot => Some(Indicator::Loading),
        _ => None,
    }
}

/// Renders the whole transcript of a snapshot.
pub fn render_transcript(snapshot: &PlaybackSnapshot, config: &PlayerConfig) -> Vec<RenderedMessage> {
    snapshot
        .transcript
        .iter()
        .map(|m| render_message(m, config))
        .collect()
}

/// Explanation panel entries for a snapshot.
pub fn explanations(snapshot: &PlaybackSnapshot) -> Vec<ExplanationEntry> {
    snapshot.transcript.iter().map(explanation_entry).collect()
}
