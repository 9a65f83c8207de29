//! Scenario Catalog
//!
//! The read-only table of scripted demo conversations. The built-in catalog
//! is compiled in; an external catalog can be loaded from JSON and is
//! validated before it is handed out.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Content, Message, Scenario, ScenarioId, TableRow};
use crate::validation::{validate_catalog, ValidationReport};

/// Errors raised while loading an external catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog failed validation with {} issue(s)", .0.issues.len())]
    Invalid(ValidationReport),
}

/// Ordered, immutable set of scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    /// Wraps scenarios without validating them.
    ///
    /// Use [`ScenarioCatalog::from_json`] or [`ScenarioCatalog::load`] for
    /// untrusted data.
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// The compiled-in insurance demo scenarios.
    pub fn builtin() -> Self {
        Self::new(vec![life_insurance(), retirement(), home_and_auto()])
    }

    /// Parses and validates a catalog.
    ///
    /// Accepts either `{"scenarios": [...]}` or a bare array of scenarios.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Bare(Vec<Scenario>),
            Wrapped(ScenarioCatalog),
        }

        let catalog = match serde_json::from_str::<Document>(json)? {
            Document::Bare(scenarios) => Self::new(scenarios),
            Document::Wrapped(catalog) => catalog,
        };

        let report = validate_catalog(&catalog);
        if !report.is_clean() {
            return Err(CatalogError::Invalid(report));
        }
        Ok(catalog)
    }

    /// Reads a catalog file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, id: ScenarioId) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Case-insensitive title lookup.
    pub fn find_by_title(&self, title: &str) -> Option<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(title.trim()))
    }

    /// Resolves a CLI-style reference: numeric id or title.
    pub fn resolve(&self, reference: &str) -> Option<&Scenario> {
        match reference.trim().parse::<ScenarioId>() {
            Ok(id) => self.get(id),
            Err(_) => self.find_by_title(reference),
        }
    }
}

impl Default for ScenarioCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// BUILT-IN SCENARIOS
// =============================================================================

const GREETING: &str = "Hello! I'm your insurance planning assistant. How can I help you today?";
const GREETING_WHY: &str = "Initial greeting to establish rapport with the customer.";

fn life_insurance() -> Scenario {
    Scenario::new(
        1,
        "Life Insurance Planning",
        "Explore how life insurance can protect your family's financial future and provide peace of mind during major life transitions.",
    )
    .with_script(vec![
        Message::bot(1, GREETING).explain(GREETING_WHY),
        Message::user(2, "I'm interested in life insurance options for my family.")
            .explain("Customer expresses interest in life insurance products."),
        Message::bot(3, "Great! I'd be happy to help. Could you tell me a bit about your family situation?")
            .explain("Bot asks qualifying questions to understand customer needs."),
        Message::user(4, "I'm married with two children, ages 5 and 7.")
            .explain("Customer provides family information."),
        Message::bot(5, "Thank you for sharing. Based on your family situation, I recommend considering a term life policy with coverage of 10-15 times your annual income. This would provide financial security for your children through their college years.")
            .explain("Bot provides personalized recommendation based on family composition."),
        Message::user(6, "That makes sense. What about the cost?")
            .explain("Customer inquires about pricing."),
        Message::bot(7, "For someone in good health, a 20-year term policy with $500,000 coverage typically ranges from $25-45 per month. Would you like me to provide a more detailed quote?")
            .explain("Bot provides pricing information and offers next steps."),
    ])
}

fn retirement() -> Scenario {
    Scenario::new(
        2,
        "Retirement Planning",
        "Discover how insurance products can complement your retirement strategy and provide guaranteed income during your golden years.",
    )
    .with_script(vec![
        Message::bot(1, GREETING).explain(GREETING_WHY),
        Message::user(2, "I'm thinking about retirement planning and wondering if insurance has a role.")
            .explain("Customer expresses interest in retirement-related insurance products."),
        Message::bot(3, "Absolutely! Insurance can play a crucial role in retirement planning. May I ask how far you are from retirement?")
            .explain("Bot confirms insurance relevance and asks qualifying questions."),
        Message::user(4, "I'm about 15 years away from retirement.")
            .explain("Customer provides timeline information."),
        Message::system(5, "Which retirement goal matters most to you?")
            .explain("Structured prompt narrows the conversation to one priority.")
            .with_content(Content::options([
                ("income", "Guaranteed lifetime income"),
                ("growth", "Growth potential"),
                ("legacy", "Leaving a legacy"),
            ])),
        Message::user(6, "Guaranteed income is my priority.")
            .explain("Customer's answer marks the matching option in the prompt.")
            .selects(5, "income"),
        Message::bot(7, "Guaranteed income it is, and 15 years is a good planning horizon. An annuity can turn part of your savings into income you can't outlive. Fixed indexed annuities add growth potential with downside protection.")
            .explain("Bot ties the chosen priority and the timeline to a specific product type."),
        Message::bot(8, "Here's an illustration of how an annuity could fit into your monthly retirement income:")
            .explain("Bot makes the recommendation concrete with an income breakdown.")
            .with_content(Content::table(
                ["Income source", "Monthly"],
                vec![
                    TableRow::new(["Social Security", "$2,100"]),
                    TableRow::new(["Fixed indexed annuity", "$1,450"]),
                    TableRow::new(["Pension", "$600"]),
                    TableRow::new(["Total", "$4,150"]).highlighted(),
                ],
            )),
        Message::user(9, "How does that differ from just investing in the market?")
            .explain("Customer asks for clarification on product benefits."),
        Message::bot(10, "Unlike market investments, annuities can provide guaranteed income for life, regardless of market performance. This creates a reliable income floor in retirement that you can't outlive. Would you like to explore some specific annuity options?")
            .explain("Bot explains key differentiator and value proposition of insurance products for retirement."),
    ])
}

fn home_and_auto() -> Scenario {
    Scenario::new(
        3,
        "Home & Auto Bundle",
        "See how bundling home and auto coverage simplifies protection and unlocks multi-policy savings.",
    )
    .with_script(vec![
        Message::bot(1, GREETING).explain(GREETING_WHY),
        Message::user(2, "I just bought a house and want to review my car insurance too.")
            .explain("Customer signals two needs at once, a bundling opportunity."),
        Message::system(3, "What would you like to cover?")
            .explain("Option list lets the customer frame the request without typing.")
            .with_content(Content::options([
                ("home", "Home only"),
                ("auto", "Auto only"),
                ("bundle", "Home + Auto bundle"),
            ])),
        Message::user(4, "Just the home for now.")
            .explain("Customer's first answer is recorded on the prompt.")
            .selects(3, "home"),
        Message::bot(5, "Understood. Many new homeowners save by insuring both together. Here's how a typical bundle discount stacks up:")
            .explain("Bot introduces the bundle with a visual instead of a sales pitch.")
            .with_content(Content::image("/images/bundle-savings.png")),
        Message::user(6, "Oh, that's more than I expected. Let's do both.")
            .explain("Customer changes their mind; the earlier selection is replaced.")
            .selects(3, "bundle"),
        Message::system(7, "Bundle selected. A licensed agent will follow up with your quote.")
            .explain("System confirmation feels native to the app rather than a chat turn."),
        Message::bot(8, "Great choice! I'll prepare a combined home and auto quote with your multi-policy discount applied.")
            .explain("Bot confirms next steps and reinforces the value of the decision."),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentKind, Sender};

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = ScenarioCatalog::builtin();
        let report = validate_catalog(&catalog);
        assert!(report.is_clean(), "issues: {:?}", report.issues);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_life_insurance_alternates_bot_user() {
        let catalog = ScenarioCatalog::builtin();
        let life = catalog.find_by_title("life insurance planning").unwrap();
        assert_eq!(life.len(), 7);
        for (i, msg) in life.script.iter().enumerate() {
            let expected = if i % 2 == 0 { Sender::Bot } else { Sender::User };
            assert_eq!(msg.sender, expected);
        }
        assert!(life.script[6].body.contains("detailed quote"));
    }

    #[test]
    fn test_retirement_has_highlighted_total() {
        let catalog = ScenarioCatalog::builtin();
        let retirement = catalog.get(2).unwrap();
        assert!(retirement.uses(ContentKind::Table));
        let Content::Table(table) = &retirement.message(8).unwrap().content else {
            panic!("message 8 should be a table");
        };
        let highlighted: Vec<_> = table.rows.iter().filter(|r| r.highlight).collect();
        assert_eq!(highlighted.len(), 1);
        assert_eq!(highlighted[0].cells[0], "Total");
    }

    #[test]
    fn test_retirement_reply_follows_the_priority_answer() {
        let catalog = ScenarioCatalog::builtin();
        let script = &catalog.get(2).unwrap().script;
        let answer = script.iter().position(|m| m.selection.is_some()).unwrap();
        let reply = &script[answer + 1];
        assert_eq!(reply.sender, Sender::Bot);
        assert!(reply.body.contains("Guaranteed income"));
        assert!(reply.body.contains("15 years"));
    }

    #[test]
    fn test_resolve_by_id_or_title() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(catalog.resolve("3").unwrap().title, "Home & Auto Bundle");
        assert_eq!(catalog.resolve(" Retirement Planning ").unwrap().id, 2);
        assert!(catalog.resolve("99").is_none());
        assert!(catalog.resolve("pet insurance").is_none());
    }

    #[test]
    fn test_from_json_accepts_both_shapes() {
        let bare = r#"[{"id":9,"title":"Tiny","description":"d","script":[{"id":1,"sender":"bot","message":"hi"}]}]"#;
        let catalog = ScenarioCatalog::from_json(bare).unwrap();
        assert_eq!(catalog.get(9).unwrap().len(), 1);

        let wrapped = serde_json::to_string(&ScenarioCatalog::builtin()).unwrap();
        let round = ScenarioCatalog::from_json(&wrapped).unwrap();
        assert_eq!(round, ScenarioCatalog::builtin());
    }

    #[test]
    fn test_from_json_rejects_invalid_selection() {
        let json = r#"[{"id":1,"title":"Bad","description":"d","script":[
            {"id":1,"sender":"user","message":"pick","selection":{"target":2,"option":"a"}},
            {"id":2,"sender":"system","message":"opts","content":{"kind":"options","payload":[{"id":"a","label":"A"}]}}
        ]}]"#;
        match ScenarioCatalog::from_json(json) {
            Err(CatalogError::Invalid(report)) => assert_eq!(report.issues.len(), 1),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_parse_error() {
        assert!(matches!(ScenarioCatalog::from_json("{nope"), Err(CatalogError::Parse(_))));
    }
}
