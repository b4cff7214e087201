use serde::{Deserialize, Serialize};
use std::fmt;

/// Header-level view of a message, enough for classification
///
/// Produced by the mail client, consumed by the classifier. Immutable once
/// fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMetadata {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
}

/// Triage action for a single message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    #[serde(rename = "KEEP")]
    Keep,
    #[serde(rename = "ARCHIVE")]
    Archive,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Action {
    /// Parse an action name as emitted by the model; anything unrecognized
    /// falls back to Archive, the conservative choice.
    pub fn parse_lenient(raw: &str) -> Action {
        match raw.trim().to_uppercase().as_str() {
            "KEEP" => Action::Keep,
            "DELETE" => Action::Delete,
            _ => Action::Archive,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Keep => "KEEP",
            Action::Archive => "ARCHIVE",
            Action::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// A classification outcome for one message
///
/// Produced by the classifier; the pipeline may rewrite `action` once
/// (DELETE to ARCHIVE) under the safety override, after which the decision
/// is final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub action: Action,
    pub confidence: f32,
    pub reason: String,
}

/// Pipeline step at which a per-message error occurred
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Metadata,
    Classify,
    Apply,
}

/// A per-message failure recorded during a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    pub id: String,
    pub step: Step,
    pub error: String,
}

/// Counts of actions actually applied to the mailbox
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedCounts {
    #[serde(rename = "KEEP")]
    pub keep: usize,
    #[serde(rename = "ARCHIVE")]
    pub archive: usize,
    #[serde(rename = "DELETE")]
    pub delete: usize,
}

impl AppliedCounts {
    pub fn increment(&mut self, action: Action) {
        match action {
            Action::Keep => self.keep += 1,
            Action::Archive => self.archive += 1,
            Action::Delete => self.delete += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.keep + self.archive + self.delete
    }
}

/// Result of processing one batch of message ids
///
/// Decisions and errors keep input order. In dry-run mode `applied` stays at
/// zero; projected counts can be derived from `decisions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub decisions: Vec<Decision>,
    pub applied: AppliedCounts,
    pub errors: Vec<BatchError>,
}
