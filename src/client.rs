//! Gmail API client with retry logic
//!
//! [`MailClient`] is the seam the pipeline depends on; [`GmailMailClient`]
//! satisfies it over google-gmail1. Every fetching and mutating operation
//! retries transient provider failures with bounded backoff and propagates
//! permanent failures unchanged.

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, ModifyMessageRequest};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::GmailHub;
use crate::error::{Result, TriageError};
use crate::models::EmailMetadata;
use crate::retry::retry_transient;

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Attempts per operation, initial call included
const MAX_ATTEMPTS: u32 = 4;

/// Mail provider operations the pipeline depends on
///
/// Satisfied by the Gmail binding below or by in-memory doubles in tests and
/// demo mode.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Verify the session is usable; idempotent
    async fn authenticate(&self) -> Result<()>;

    /// List message ids matching a provider query, truncated at
    /// `max_results`; ordering is provider-defined
    async fn list_matching(&self, query: &str, max_results: usize) -> Result<Vec<String>>;

    /// Fetch header-level metadata for one message
    async fn get_metadata(&self, id: &str) -> Result<EmailMetadata>;

    /// Resolve a label name to its id, creating it only if it does not
    /// already exist; repeated calls return the same id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Attach a label to a message
    async fn apply_label(&self, id: &str, label_id: &str) -> Result<()>;

    /// Remove the message from the inbox
    async fn archive(&self, id: &str) -> Result<()>;

    /// Move the message to trash (recoverable)
    async fn trash(&self, id: &str) -> Result<()>;

    /// Permanently delete the message; never called by the pipeline, only by
    /// the explicit purge bypass
    async fn hard_delete(&self, id: &str) -> Result<()>;
}

/// Production Gmail client
pub struct GmailMailClient {
    hub: GmailHub,
    label_cache: Mutex<HashMap<String, String>>,
}

impl GmailMailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self {
            hub,
            label_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn find_label_id(&self, name: &str) -> Result<Option<String>> {
        let (_, response) = retry_transient("list_labels", MAX_ATTEMPTS, || async {
            self.hub
                .users()
                .labels_list("me")
                .add_scope(LABELS_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)
        })
        .await?;

        let found = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .find(|label| label.name.as_deref() == Some(name))
            .and_then(|label| label.id);

        Ok(found)
    }
}

#[async_trait]
impl MailClient for GmailMailClient {
    async fn authenticate(&self) -> Result<()> {
        retry_transient("get_profile", MAX_ATTEMPTS, || async {
            self.hub
                .users()
                .get_profile("me")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)
        })
        .await?;

        debug!("Gmail session verified");
        Ok(())
    }

    async fn list_matching(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let mut all_ids: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = max_results.saturating_sub(all_ids.len());
            if remaining == 0 {
                break;
            }
            let page_size = remaining.min(100) as u32;

            let token = page_token.clone();
            let (_, response) = retry_transient("list_messages", MAX_ATTEMPTS, || {
                let token = token.clone();
                async move {
                    let mut call = self
                        .hub
                        .users()
                        .messages_list("me")
                        .q(query)
                        .max_results(page_size);

                    if let Some(t) = token.as_ref() {
                        call = call.page_token(t);
                    }

                    call.add_scope(MODIFY_SCOPE)
                        .doit()
                        .await
                        .map_err(TriageError::from)
                }
            })
            .await?;

            if let Some(messages) = response.messages {
                for msg_ref in messages {
                    if let Some(id) = msg_ref.id {
                        all_ids.push(id);
                        if all_ids.len() >= max_results {
                            return Ok(all_ids);
                        }
                    }
                }
            }

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(all_ids)
    }

    async fn get_metadata(&self, id: &str) -> Result<EmailMetadata> {
        let (_, msg) = retry_transient("get_metadata", MAX_ATTEMPTS, || async {
            self.hub
                .users()
                .messages_get("me", id)
                .format("metadata")
                .add_metadata_headers("From")
                .add_metadata_headers("Subject")
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)
        })
        .await?;

        Ok(parse_email_metadata(id, msg))
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let mut cache = self.label_cache.lock().await;
        if let Some(id) = cache.get(name) {
            return Ok(id.clone());
        }

        // Find-before-create keeps repeated calls idempotent across runs
        if let Some(id) = self.find_label_id(name).await? {
            cache.insert(name.to_string(), id.clone());
            return Ok(id);
        }

        let created = retry_transient("create_label", MAX_ATTEMPTS, || async {
            let label = Label {
                name: Some(name.to_string()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let (_, created_label) = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(LABELS_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)?;

            created_label
                .id
                .ok_or_else(|| TriageError::LabelError("Created label has no ID".to_string()))
        })
        .await?;

        info!("Created label '{}' ({})", name, created);
        cache.insert(name.to_string(), created.clone());
        Ok(created)
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<()> {
        retry_transient("apply_label", MAX_ATTEMPTS, || async {
            let request = ModifyMessageRequest {
                add_label_ids: Some(vec![label_id.to_string()]),
                remove_label_ids: None,
            };

            self.hub
                .users()
                .messages_modify(request, "me", id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)?;

            Ok(())
        })
        .await
    }

    async fn archive(&self, id: &str) -> Result<()> {
        retry_transient("archive", MAX_ATTEMPTS, || async {
            let request = ModifyMessageRequest {
                add_label_ids: None,
                remove_label_ids: Some(vec!["INBOX".to_string()]),
            };

            self.hub
                .users()
                .messages_modify(request, "me", id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)?;

            Ok(())
        })
        .await
    }

    async fn trash(&self, id: &str) -> Result<()> {
        retry_transient("trash", MAX_ATTEMPTS, || async {
            self.hub
                .users()
                .messages_trash("me", id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)?;

            Ok(())
        })
        .await
    }

    async fn hard_delete(&self, id: &str) -> Result<()> {
        retry_transient("hard_delete", MAX_ATTEMPTS, || async {
            self.hub
                .users()
                .messages_delete("me", id)
                .add_scope(MODIFY_SCOPE)
                .doit()
                .await
                .map_err(TriageError::from)?;

            Ok(())
        })
        .await
    }
}

// Allow shared ownership of any client, e.g. when a test keeps a handle to
// its spy while the processor owns another
#[async_trait]
impl<T: MailClient> MailClient for std::sync::Arc<T> {
    async fn authenticate(&self) -> Result<()> {
        self.as_ref().authenticate().await
    }

    async fn list_matching(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        self.as_ref().list_matching(query, max_results).await
    }

    async fn get_metadata(&self, id: &str) -> Result<EmailMetadata> {
        self.as_ref().get_metadata(id).await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        self.as_ref().create_label(name).await
    }

    async fn apply_label(&self, id: &str, label_id: &str) -> Result<()> {
        self.as_ref().apply_label(id, label_id).await
    }

    async fn archive(&self, id: &str) -> Result<()> {
        self.as_ref().archive(id).await
    }

    async fn trash(&self, id: &str) -> Result<()> {
        self.as_ref().trash(id).await
    }

    async fn hard_delete(&self, id: &str) -> Result<()> {
        self.as_ref().hard_delete(id).await
    }
}

/// Map a Gmail API message into the pipeline's metadata view
///
/// Missing headers become empty strings; classification copes with sparse
/// input, so a partial header set is not an error.
fn parse_email_metadata(id: &str, msg: Message) -> EmailMetadata {
    let mut from = String::new();
    let mut subject = String::new();

    if let Some(headers) = msg.payload.as_ref().and_then(|p| p.headers.as_ref()) {
        for header in headers {
            if let (Some(name), Some(value)) = (&header.name, &header.value) {
                match name.to_lowercase().as_str() {
                    "from" => from = value.clone(),
                    "subject" => subject = value.clone(),
                    _ => {}
                }
            }
        }
    }

    EmailMetadata {
        id: id.to_string(),
        from,
        subject,
        snippet: msg.snippet.unwrap_or_default(),
    }
}
