//! Validation Module - Catalog Integrity Checks
//! =============================================
//!
//! Scenario data is authored by hand, so a malformed script is a content
//! defect rather than a runtime condition. This module finds those defects
//! up front: the built-in catalog is checked by tests, and external catalogs
//! are rejected at load time.
//!
//! Checks:
//! - Every scenario has at least one message, and scenario ids are unique
//! - Message ids are unique within their scenario
//! - Selection events reference an *earlier* option-list message and one of
//!   its declared option ids
//! - Option lists start with at most one option selected
//! - Table rows have as many cells as there are headers
//! - Image references are non-empty
//!
//! Usage:
//! ```ignore
//! use chatreel_core::validation::validate_catalog;
//!
//! let report = validate_catalog(&catalog);
//! for issue in &report.issues {
//!     eprintln!("{}", issue);
//! }
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use thiserror::Error;

use crate::catalog::ScenarioCatalog;
use crate::model::{Content, MessageId, Scenario, ScenarioId};

// =============================================================================
// ISSUES
// =============================================================================

/// What is wrong with a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueKind {
    #[error("script is empty")]
    EmptyScript,

    #[error("scenario id is used more than once")]
    DuplicateScenarioId,

    #[error("message id {message} is used more than once")]
    DuplicateMessageId { message: MessageId },

    #[error("message {message} selects on message {target}, which does not appear earlier")]
    SelectionTargetNotEarlier { message: MessageId, target: MessageId },

    #[error("message {message} selects on message {target}, which is not an option list")]
    SelectionTargetNotOptions { message: MessageId, target: MessageId },

    #[error("message {message} selects unknown option '{option}' on message {target}")]
    UnknownOption { message: MessageId, target: MessageId, option: String },

    #[error("option list {message} starts with {count} options selected")]
    MultipleSelected { message: MessageId, count: usize },

    #[error("table {message} row {row} has {found} cells, expected {expected}")]
    TableWidthMismatch { message: MessageId, row: usize, expected: usize, found: usize },

    #[error("image message {message} has an empty URI")]
    EmptyImageUri { message: MessageId },
}

/// An issue located in a specific scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub scenario: ScenarioId,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scenario {}: {}", self.scenario, self.kind)
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Result of validating a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub scenarios_checked: usize,
    pub messages_checked: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues belonging to one scenario.
    pub fn for_scenario(&self, id: ScenarioId) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.scenario == id)
    }

    /// Scenarios with at least one issue, in id order.
    pub fn affected_scenarios(&self) -> BTreeSet<ScenarioId> {
        self.issues.iter().map(|i| i.scenario).collect()
    }
}

/// Validates every scenario in the catalog.
pub fn validate_catalog(catalog: &ScenarioCatalog) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen_ids = HashSet::new();

    for scenario in catalog.iter() {
        if !seen_ids.insert(scenario.id) {
            report.issues.push(ValidationIssue {
                scenario: scenario.id,
                kind: IssueKind::DuplicateScenarioId,
            });
        }
        report.issues.extend(
            validate_scenario(scenario)
                .into_iter()
                .map(|kind| ValidationIssue { scenario: scenario.id, kind }),
        );
        report.scenarios_checked += 1;
        report.messages_checked += scenario.len();
    }

    report
}

/// Validates a single scenario script.
pub fn validate_scenario(scenario: &Scenario) -> Vec<IssueKind> {
    let mut issues = Vec::new();

    if scenario.is_empty() {
        issues.push(IssueKind::EmptyScript);
        return issues;
    }

    let mut seen: HashSet<MessageId> = HashSet::new();

    for (index, msg) in scenario.script.iter().enumerate() {
        if !seen.insert(msg.id) {
            issues.push(IssueKind::DuplicateMessageId { message: msg.id });
        }

        match &msg.content {
            Content::Options(items) => {
                let count = items.iter().filter(|o| o.selected).count();
                if count > 1 {
                    issues.push(IssueKind::MultipleSelected { message: msg.id, count });
                }
            }
            Content::Table(table) => {
                let expected = table.headers.len();
                for (row, cells) in table.rows.iter().enumerate() {
                    if cells.cells.len() != expected {
                        issues.push(IssueKind::TableWidthMismatch {
                            message: msg.id,
                            row,
                            expected,
                            found: cells.cells.len(),
                        });
                    }
                }
            }
            Content::Image { uri } if uri.trim().is_empty() => {
                issues.push(IssueKind::EmptyImageUri { message: msg.id });
            }
            _ => {}
        }

        if let Some(event) = &msg.selection {
            // Only messages strictly before this one count
            let target = scenario.script[..index].iter().find(|m| m.id == event.target);
            match target.map(|t| t.options()) {
                None => issues.push(IssueKind::SelectionTargetNotEarlier {
                    message: msg.id,
                    target: event.target,
                }),
                Some(None) => issues.push(IssueKind::SelectionTargetNotOptions {
                    message: msg.id,
                    target: event.target,
                }),
                Some(Some(options)) if !options.iter().any(|o| o.id == event.option) => {
                    issues.push(IssueKind::UnknownOption {
                        message: msg.id,
                        target: event.target,
                        option: event.option.clone(),
                    })
                }
                Some(Some(_)) => {}
            }
        }
    }

    issues
}

// =============================================================================
// TESTS
// =============================================================================
