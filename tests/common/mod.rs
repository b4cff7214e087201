//! Shared test doubles and fixtures
//!
//! `RecordingMailClient` and `ScriptedClassifier` implement the pipeline's
//! collaborator traits entirely in memory, with call counters so tests can
//! assert exactly which provider operations ran.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use gmail_triage::classifier::Classifier;
use gmail_triage::client::MailClient;
use gmail_triage::error::{Result, TriageError};
use gmail_triage::models::{Action, Decision, EmailMetadata};

pub fn email(id: &str, from: &str, subject: &str) -> EmailMetadata {
    EmailMetadata {
        id: id.to_string(),
        from: from.to_string(),
        subject: subject.to_string(),
        snippet: format!("snippet for {}", subject),
    }
}

#[derive(Debug, Default, Clone)]
pub struct CallCounts {
    pub get_metadata: usize,
    pub create_label_calls: usize,
    pub label_creations: usize,
    pub apply_label: usize,
    pub archive: usize,
    pub trash: usize,
    pub hard_delete: usize,
}

impl CallCounts {
    /// Total count of mutating operations issued against the mailbox
    pub fn mutations(&self) -> usize {
        self.apply_label + self.archive + self.trash + self.hard_delete
    }
}

#[derive(Default)]
struct RecorderState {
    labels: HashMap<String, String>,
    labels_applied: Vec<(String, String)>,
    counts: CallCounts,
}

/// In-memory mail client spy
#[derive(Default)]
pub struct RecordingMailClient {
    emails: HashMap<String, EmailMetadata>,
    fail_metadata: Vec<String>,
    fail_apply: Vec<String>,
    state: Mutex<RecorderState>,
}

impl RecordingMailClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_email(mut self, metadata: EmailMetadata) -> Self {
        self.emails.insert(metadata.id.clone(), metadata);
        self
    }

    /// Make `get_metadata` fail for this id with a permanent error
    pub fn fail_metadata_for(mut self, id: &str) -> Self {
        self.fail_metadata.push(id.to_string());
        self
    }

    /// Make `apply_label` fail for this message id
    pub fn fail_apply_for(mut self, id: &str) -> Self {
        self.fail_apply.push(id.to_string());
        self
    }

    pub fn counts(&self) -> CallCounts {
        self.state.lock().unwrap().counts.clone()
    }

    /// (message id, label id) pairs in application order
    pub fn labels_applied(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().labels_applied.clone()
    }
}

#[async_trait]
impl MailClient for RecordingMailClient {
    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    async fn list_matching(&self, _query: &str, max_results: usize) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.emails.keys().cloned().collect();
        ids.sort();
        ids.truncate(max_results);
        Ok(ids)
    }

    async fn get_metadata(&self, id: &str) -> Result<EmailMetadata> {
        self.state.lock().unwrap().counts.get_metadata += 1;

        if self.fail_metadata.iter().any(|f| f == id) {
            return Err(TriageError::MessageNotFound(id.to_string()));
        }

        self.emails
            .get(id)
            .cloned()
            .ok_or_else(|| TriageError::MessageNotFound(id.to_string()))
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.counts.create_label_calls += 1;

        if let Some(id) = state.labels.get(name) {
            return Ok(id.clone());
        }

        let id = format!("id_{}", name);
        state.labels.insert(name.to_string(), id.clone());
        state.counts.label_creations += 1;
        Ok(id)
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<()> {
        if self.fail_apply.iter().any(|f| f == id) {
            return Err(TriageError::ServerError {
                status: 500,
                message: "injected failure".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.counts.apply_label += 1;
        state
            .labels_applied
            .push((id.to_string(), label_id.to_string()));
        Ok(())
    }

    async fn archive(&self, _id: &str) -> Result<()> {
        self.state.lock().unwrap().counts.archive += 1;
        Ok(())
    }

    async fn trash(&self, _id: &str) -> Result<()> {
        self.state.lock().unwrap().counts.trash += 1;
        Ok(())
    }

    async fn hard_delete(&self, _id: &str) -> Result<()> {
        self.state.lock().unwrap().counts.hard_delete += 1;
        Ok(())
    }
}

/// Classifier double returning pre-scripted decisions by message id
#[derive(Default)]
pub struct ScriptedClassifier {
    script: HashMap<String, Decision>,
    fail_ids: Vec<String>,
    calls: Mutex<usize>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decision(mut self, id: &str, action: Action, confidence: f32, reason: &str) -> Self {
        self.script.insert(
            id.to_string(),
            Decision {
                id: id.to_string(),
                action,
                confidence,
                reason: reason.to_string(),
            },
        );
        self
    }

    /// Make classification fail for this id after retries are exhausted
    pub fn fail_for(mut self, id: &str) -> Self {
        self.fail_ids.push(id.to_string());
        self
    }

    pub fn classify_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, email: &EmailMetadata) -> Result<Decision> {
        *self.calls.lock().unwrap() += 1;

        if self.fail_ids.iter().any(|f| f == &email.id) {
            return Err(TriageError::InferenceError(
                "endpoint unavailable".to_string(),
            ));
        }

        Ok(self.script.get(&email.id).cloned().unwrap_or(Decision {
            id: email.id.clone(),
            action: Action::Archive,
            confidence: 0.75,
            reason: "default".to_string(),
        }))
    }
}
