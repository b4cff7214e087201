//! Offline demo collaborators
//!
//! An in-memory mail client seeded with sample promotional messages and a
//! keyword classifier, so the full pipeline can be exercised without Gmail
//! credentials or an inference API key. Also doubles as a convenient set of
//! fixtures for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::classifier::Classifier;
use crate::client::MailClient;
use crate::error::{Result, TriageError};
use crate::models::{Action, Decision, EmailMetadata};

/// Sample inbox used by demo mode
pub fn sample_emails() -> Vec<EmailMetadata> {
    let raw = [
        (
            "e1",
            "Amazon <orders@amazon.com>",
            "Your order has shipped",
            "Your order #123-456 has been shipped...",
        ),
        (
            "e2",
            "Sale Alerts <promo@randomstore.com>",
            "50% OFF EVERYTHING - LIMITED TIME",
            "Don't miss this amazing sale...",
        ),
        (
            "e3",
            "GitHub <noreply@github.com>",
            "Monthly newsletter",
            "Latest developer news...",
        ),
        (
            "e4",
            "Delta <notify@delta.com>",
            "Your flight is confirmed",
            "Booking ABC123...",
        ),
        (
            "e5",
            "Apple <no-reply@apple.com>",
            "Your receipt from Apple",
            "Receipt for purchase...",
        ),
    ];

    raw.iter()
        .map(|(id, from, subject, snippet)| EmailMetadata {
            id: id.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            snippet: snippet.to_string(),
        })
        .collect()
}

/// What happened to a message in the demo mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    Labeled { id: String, label_id: String },
    Archived { id: String },
    Trashed { id: String },
    HardDeleted { id: String },
}

#[derive(Default)]
struct DemoState {
    labels: HashMap<String, String>,
    label_creations: usize,
    events: Vec<MailboxEvent>,
}

/// In-memory mail client over the sample inbox
pub struct DemoMailClient {
    emails: Vec<EmailMetadata>,
    state: Mutex<DemoState>,
}

impl DemoMailClient {
    pub fn new() -> Self {
        Self::with_emails(sample_emails())
    }

    pub fn with_emails(emails: Vec<EmailMetadata>) -> Self {
        Self {
            emails,
            state: Mutex::new(DemoState::default()),
        }
    }

    /// Everything applied to the mailbox so far, in order
    pub async fn events(&self) -> Vec<MailboxEvent> {
        self.state.lock().await.events.clone()
    }

    /// How many labels were actually created (cache hits excluded)
    pub async fn label_creations(&self) -> usize {
        self.state.lock().await.label_creations
    }
}

impl Default for DemoMailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailClient for DemoMailClient {
    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    async fn list_matching(&self, _query: &str, max_results: usize) -> Result<Vec<String>> {
        Ok(self
            .emails
            .iter()
            .take(max_results)
            .map(|e| e.id.clone())
            .collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<EmailMetadata> {
        self.emails
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| TriageError::MessageNotFound(id.to_string()))
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.labels.get(name) {
            return Ok(id.clone());
        }
        let id = format!("demo_{}", name);
        state.labels.insert(name.to_string(), id.clone());
        state.label_creations += 1;
        Ok(id)
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<()> {
        self.state.lock().await.events.push(MailboxEvent::Labeled {
            id: id.to_string(),
            label_id: label_id.to_string(),
        });
        Ok(())
    }

    async fn archive(&self, id: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .events
            .push(MailboxEvent::Archived { id: id.to_string() });
        Ok(())
    }

    async fn trash(&self, id: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .events
            .push(MailboxEvent::Trashed { id: id.to_string() });
        Ok(())
    }

    async fn hard_delete(&self, id: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .events
            .push(MailboxEvent::HardDeleted { id: id.to_string() });
        Ok(())
    }
}

const KEEP_KEYWORDS: &[&str] = &["receipt", "order", "shipped", "invoice", "confirmed", "flight"];
const DELETE_KEYWORDS: &[&str] = &["% off", "sale", "discount", "limited time", "deal"];

/// Keyword classifier standing in for the LLM in demo mode
pub struct DemoClassifier;

#[async_trait]
impl Classifier for DemoClassifier {
    async fn classify(&self, email: &EmailMetadata) -> Result<Decision> {
        let subject = email.subject.to_lowercase();

        let (action, confidence, reason) = if KEEP_KEYWORDS.iter().any(|k| subject.contains(k)) {
            (Action::Keep, 0.95, "transactional")
        } else if DELETE_KEYWORDS.iter().any(|k| subject.contains(k)) {
            (Action::Delete, 0.9, "promotion")
        } else {
            (Action::Archive, 0.75, "newsletter/brand")
        };

        Ok(Decision {
            id: email.id.clone(),
            action,
            confidence,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_label_idempotent() {
        let client = DemoMailClient::new();

        let first = client.create_label("AI_KEEP").await.unwrap();
        let second = client.create_label("AI_KEEP").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.label_creations().await, 1);
    }

    #[tokio::test]
    async fn test_list_matching_truncates() {
        let client = DemoMailClient::new();
        let ids = client.list_matching("category:promotions", 3).await.unwrap();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
    }

    #[tokio::test]
    async fn test_get_metadata_unknown_id() {
        let client = DemoMailClient::new();
        match client.get_metadata("missing").await {
            Err(TriageError::MessageNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("expected not-found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_demo_classifier_taxonomy() {
        let classifier = DemoClassifier;
        let emails = sample_emails();

        let shipped = classifier.classify(&emails[0]).await.unwrap();
        assert_eq!(shipped.action, Action::Keep);

        let promo = classifier.classify(&emails[1]).await.unwrap();
        assert_eq!(promo.action, Action::Delete);

        let newsletter = classifier.classify(&emails[2]).await.unwrap();
        assert_eq!(newsletter.action, Action::Archive);
    }
}
