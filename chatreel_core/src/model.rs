//! Chat Data Model
//! ================
//!
//! Scenarios, scripted messages and their typed content payloads.
//!
//! Content is a tagged variant so that a message can never declare one kind
//! and carry another kind's payload. In JSON it reads as:
//!
//! ```json
//! { "id": 6, "sender": "system", "message": "Pick one",
//!   "content": { "kind": "options", "payload": [ { "id": "income", "label": "Income" } ] } }
//! ```

use serde::{Deserialize, Serialize};

/// Message identifier, unique within its scenario.
pub type MessageId = u32;

/// Scenario identifier, unique within a catalog.
pub type ScenarioId = u32;

// =============================================================================
// SENDER / CONTENT KIND
// =============================================================================

/// Who "speaks" a scripted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The customer. Animated with a typing effect.
    User,
    /// The insurance assistant. Preceded by a loading indicator.
    Bot,
    /// UI-native prompts (option pickers, notices). Appear almost instantly.
    #[serde(alias = "auxiliary")]
    System,
}

impl Sender {
    /// Label used in the explanation panel.
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "Customer",
            Sender::Bot => "Bot",
            Sender::System => "System",
        }
    }
}

/// Discriminant of [`Content`], used for feature gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Options,
    Table,
    Image,
}

impl ContentKind {
    /// All content kinds, in declaration order.
    pub fn all() -> [ContentKind; 4] {
        [ContentKind::Text, ContentKind::Options, ContentKind::Table, ContentKind::Image]
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// One entry of a single-choice option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub selected: bool,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            selected: false,
        }
    }
}

/// One table row. `highlight` changes styling only; it is never a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<String>,
    #[serde(default)]
    pub highlight: bool,
}

impl TableRow {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
            highlight: false,
        }
    }

    /// Marks this row as highlighted.
    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }
}

/// Tabular payload: header cells plus rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

/// Structured content of a message, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Content {
    /// Plain bubble; the body text is the whole message.
    #[default]
    Text,
    /// Single-choice option list.
    Options(Vec<OptionItem>),
    /// Data table.
    Table(TableData),
    /// Image reference.
    Image { uri: String },
}

impl Content {
    /// Builds an option list from `(id, label)` pairs, nothing selected.
    pub fn options<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Content::Options(items.into_iter().map(|(id, label)| OptionItem::new(id, label)).collect())
    }

    /// Builds a table from headers and rows.
    pub fn table<S: Into<String>>(headers: impl IntoIterator<Item = S>, rows: Vec<TableRow>) -> Self {
        Content::Table(TableData {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        })
    }

    /// Builds an image reference.
    pub fn image(uri: impl Into<String>) -> Self {
        Content::Image { uri: uri.into() }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Text => ContentKind::Text,
            Content::Options(_) => ContentKind::Options,
            Content::Table(_) => ContentKind::Table,
            Content::Image { .. } => ContentKind::Image,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, Content::Text)
    }
}

/// Authored instruction: when the owning message is revealed, mark `option`
/// selected on the earlier option-list message `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub target: MessageId,
    pub option: String,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// One scripted turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Content::is_text")]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionEvent>,
}

impl Message {
    pub fn new(id: MessageId, sender: Sender, body: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            body: body.into(),
            explanation: None,
            content: Content::Text,
            selection: None,
        }
    }

    pub fn bot(id: MessageId, body: impl Into<String>) -> Self {
        Self::new(id, Sender::Bot, body)
    }

    pub fn user(id: MessageId, body: impl Into<String>) -> Self {
        Self::new(id, Sender::User, body)
    }

    pub fn system(id: MessageId, body: impl Into<String>) -> Self {
        Self::new(id, Sender::System, body)
    }

    /// Attaches the side-panel explanation.
    pub fn explain(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    /// Attaches a selection event targeting an earlier option list.
    pub fn selects(mut self, target: MessageId, option: impl Into<String>) -> Self {
        self.selection = Some(SelectionEvent {
            target,
            option: option.into(),
        });
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }

    /// Options of an option-list message, `None` for any other kind.
    pub fn options(&self) -> Option<&[OptionItem]> {
        match &self.content {
            Content::Options(items) => Some(items),
            _ => None,
        }
    }

    /// Id of the currently selected option, if any.
    pub fn selected_option(&self) -> Option<&str> {
        self.options()?
            .iter()
            .find(|o| o.selected)
            .map(|o| o.id.as_str())
    }

    /// Selects `option_id` exclusively.
    ///
    /// Returns false (and changes nothing) if this is not an option list or
    /// the id is not declared on it.
    pub fn select_option(&mut self, option_id: &str) -> bool {
        let Content::Options(items) = &mut self.content else {
            return false;
        };
        if !items.iter().any(|o| o.id == option_id) {
            return false;
        }
        for item in items.iter_mut() {
            item.selected = item.id == option_id;
        }
        true
    }

    /// Flips `option_id` and clears its siblings.
    ///
    /// Toggling the selected option leaves nothing selected. Same no-op rules
    /// as [`Message::select_option`].
    pub fn toggle_option(&mut self, option_id: &str) -> bool {
        let Content::Options(items) = &mut self.content else {
            return false;
        };
        let Some(was_selected) = items.iter().find(|o| o.id == option_id).map(|o| o.selected) else {
            return false;
        };
        for item in items.iter_mut() {
            item.selected = item.id == option_id && !was_selected;
        }
        true
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A named, ordered chat script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub title: String,
    pub description: String,
    pub script: Vec<Message>,
}

impl Scenario {
    pub fn new(id: ScenarioId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            script: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: Vec<Message>) -> Self {
        self.script = script;
        self
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.script.iter().find(|m| m.id == id)
    }

    /// True if any message uses the given content kind.
    pub fn uses(&self, kind: ContentKind) -> bool {
        self.script.iter().any(|m| m.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picker() -> Message {
        Message::system(1, "Pick a plan").with_content(Content::options([
            ("term", "Term life"),
            ("whole", "Whole life"),
            ("none", "Not sure"),
        ]))
    }

    fn selected_count(msg: &Message) -> usize {
        msg.options().unwrap().iter().filter(|o| o.selected).count()
    }

    #[test]
    fn test_select_option_is_exclusive() {
        let mut msg = picker();
        assert!(msg.select_option("term"));
        assert!(msg.select_option("whole"));
        assert_eq!(msg.selected_option(), Some("whole"));
        assert_eq!(selected_count(&msg), 1);
    }

    #[test]
    fn test_toggle_selected_option_clears_it() {
        let mut msg = picker();
        assert!(msg.toggle_option("none"));
        assert_eq!(msg.selected_option(), Some("none"));
        assert!(msg.toggle_option("none"));
        assert_eq!(msg.selected_option(), None);
        assert_eq!(selected_count(&msg), 0);
    }

    #[test]
    fn test_unknown_option_is_noop() {
        let mut msg = picker();
        msg.select_option("term");
        assert!(!msg.select_option("bogus"));
        assert!(!msg.toggle_option("bogus"));
        assert_eq!(msg.selected_option(), Some("term"));

        let mut text = Message::bot(2, "hello");
        assert!(!text.select_option("term"));
        assert_eq!(text.selected_option(), None);
    }

    #[test]
    fn test_message_json_shape() {
        let json = r#"{
            "id": 3,
            "sender": "auxiliary",
            "message": "Pick one",
            "content": { "kind": "options", "payload": [ { "id": "a", "label": "A" } ] }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender, Sender::System);
        assert_eq!(msg.kind(), ContentKind::Options);
        assert!(msg.explanation.is_none());

        let plain: Message = serde_json::from_str(r#"{"id":1,"sender":"bot","message":"hi"}"#).unwrap();
        assert_eq!(plain.content, Content::Text);
        let out = serde_json::to_value(&plain).unwrap();
        assert!(out.get("content").is_none());
    }

    #[test]
    fn test_table_row_highlight_flag() {
        let row = TableRow::new(["Total", "$4,150"]).highlighted();
        assert!(row.highlight);
        assert_eq!(row.cells, vec!["Total".to_string(), "$4,150".to_string()]);
    }
}
