//! The triage pipeline
//!
//! Composes the mail client, the classifier and the rate limiter into the
//! per-batch state machine: ensure labels exist, then per message id fetch
//! metadata, classify, apply the safety override, and (outside dry-run)
//! execute the mutating actions. Message ids are processed strictly in input
//! order on a single task; the limiter gates every provider request.

use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::DecisionCache;
use crate::classifier::Classifier;
use crate::client::MailClient;
use crate::config::{Config, LabelConfig, SafetyConfig};
use crate::error::{Result, TriageError};
use crate::models::{Action, AppliedCounts, BatchError, BatchResult, Decision, EmailMetadata, Step};
use crate::rate_limiter::SlidingWindowLimiter;

/// Outcome of applying a set of decisions to the mailbox
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub applied: AppliedCounts,
    pub errors: Vec<BatchError>,
}

/// Orchestrates fetching, classification and mutation for batches of
/// message ids
pub struct EmailProcessor<M, C> {
    mail: M,
    classifier: C,
    limiter: SlidingWindowLimiter,
    labels: LabelConfig,
    safety: SafetyConfig,
    label_ids: HashMap<String, String>,
    cache: Option<DecisionCache>,
}

impl<M: MailClient, C: Classifier> EmailProcessor<M, C> {
    pub fn new(mail: M, classifier: C, limiter: SlidingWindowLimiter, config: &Config) -> Self {
        Self {
            mail,
            classifier,
            limiter,
            labels: config.labels.clone(),
            safety: config.safety.clone(),
            label_ids: HashMap::new(),
            cache: None,
        }
    }

    /// Attach a decision cache; classification consults it before calling
    /// the inference endpoint
    pub fn with_cache(mut self, cache: DecisionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_mut(&mut self) -> Option<&mut DecisionCache> {
        self.cache.as_mut()
    }

    /// Resolve the three triage labels, creating them if missing
    ///
    /// Ids are cached by name, so repeated batches in one session resolve
    /// each label at most once.
    async fn ensure_labels(&mut self) -> Result<()> {
        for name in [
            self.labels.keep.clone(),
            self.labels.archive.clone(),
            self.labels.review.clone(),
        ] {
            if !self.label_ids.contains_key(&name) {
                let id = self.mail.create_label(&name).await?;
                self.label_ids.insert(name, id);
            }
        }
        Ok(())
    }

    /// Process one batch of message ids
    ///
    /// Per-message failures are recorded and skipped; only label resolution
    /// can fail the batch as a whole. In dry-run mode decisions are computed
    /// (override included) but nothing is mutated and `applied` stays zero.
    pub async fn process_batch(&mut self, ids: &[String], dry_run: bool) -> Result<BatchResult> {
        let mut result = BatchResult::default();
        self.ensure_labels().await?;

        for id in ids {
            self.limiter.wait_if_needed(Duration::ZERO).await;
            let metadata = match self.mail.get_metadata(id).await {
                Ok(meta) => {
                    self.limiter.record_request();
                    meta
                }
                Err(e) => {
                    warn!("Metadata fetch failed for {}: {}", id, e);
                    result.errors.push(BatchError {
                        id: id.clone(),
                        step: Step::Metadata,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let raw = match self.cached_or_classify(&metadata).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("Classification failed for {}: {}", id, e);
                    result.errors.push(BatchError {
                        id: id.clone(),
                        step: Step::Classify,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            result.decisions.push(self.apply_safety_override(raw));
        }

        if !dry_run {
            let decisions = result.decisions.clone();
            let outcome = self.apply_actions(&decisions, false).await;
            result.applied = outcome.applied;
            result.errors.extend(outcome.errors);
        }

        Ok(result)
    }

    /// Execute decisions against the mailbox
    ///
    /// Label selection: KEEP gets the keep label; a low-confidence ARCHIVE is
    /// flagged with the review label instead of the archive label; DELETE
    /// gets the archive label first so the action leaves an audit trail.
    /// Every mutating call is individually rate-limited. Per-message errors
    /// are recorded and do not stop the remaining decisions.
    pub async fn apply_actions(&mut self, decisions: &[Decision], dry_run: bool) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for decision in decisions {
            let label_name = match decision.action {
                Action::Keep => self.labels.keep.clone(),
                Action::Archive if decision.confidence < self.safety.confidence_threshold => {
                    self.labels.review.clone()
                }
                Action::Archive => self.labels.archive.clone(),
                Action::Delete => self.labels.archive.clone(),
            };

            if dry_run {
                outcome.applied.increment(decision.action);
                continue;
            }

            match self.apply_one(decision, &label_name).await {
                Ok(()) => outcome.applied.increment(decision.action),
                Err(e) => {
                    warn!("Apply failed for {}: {}", decision.id, e);
                    outcome.errors.push(BatchError {
                        id: decision.id.clone(),
                        step: Step::Apply,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    async fn apply_one(&mut self, decision: &Decision, label_name: &str) -> Result<()> {
        let label_id = self
            .label_ids
            .get(label_name)
            .cloned()
            .ok_or_else(|| TriageError::LabelError(format!("Unresolved label '{}'", label_name)))?;

        self.limiter.wait_if_needed(Duration::ZERO).await;
        self.mail.apply_label(&decision.id, &label_id).await?;
        self.limiter.record_request();

        match decision.action {
            Action::Keep => {}
            Action::Archive => {
                self.limiter.wait_if_needed(Duration::ZERO).await;
                self.mail.archive(&decision.id).await?;
                self.limiter.record_request();
            }
            Action::Delete => {
                if self.safety.safe_archive_mode {
                    // Safety net: DELETE never actually deletes in this mode
                    self.limiter.wait_if_needed(Duration::ZERO).await;
                    self.mail.archive(&decision.id).await?;
                    self.limiter.record_request();
                } else {
                    // Soft delete only; hard deletion is a separate bypass
                    self.limiter.wait_if_needed(Duration::ZERO).await;
                    self.mail.trash(&decision.id).await?;
                    self.limiter.record_request();
                }
            }
        }

        Ok(())
    }

    async fn cached_or_classify(&mut self, metadata: &EmailMetadata) -> Result<Decision> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&metadata.id) {
                debug!("Decision cache hit for {}", metadata.id);
                return Ok(hit.clone());
            }
        }

        let decision = self.classifier.classify(metadata).await?;
        if let Some(cache) = &mut self.cache {
            cache.insert(decision.clone());
        }
        Ok(decision)
    }

    /// Downgrade a low-confidence DELETE to ARCHIVE
    ///
    /// Runs before the decision is recorded, so reported decisions reflect
    /// the override in dry-run mode too.
    fn apply_safety_override(&self, mut decision: Decision) -> Decision {
        if decision.action == Action::Delete
            && decision.confidence < self.safety.confidence_threshold
        {
            info!(
                "Downgrading DELETE to ARCHIVE for {} (confidence {:.2} < {:.2})",
                decision.id, decision.confidence, self.safety.confidence_threshold
            );
            decision.action = Action::Archive;
            decision.reason = if decision.reason.is_empty() {
                "low-confidence delete downgraded".to_string()
            } else {
                format!("{} (low-confidence delete downgraded)", decision.reason)
            };
        }
        decision
    }

    /// One-line digest of a batch result; pure formatting
    pub fn generate_summary(&self, result: &BatchResult) -> String {
        format!(
            "Decisions: {} | Applied KEEP={} ARCHIVE={} DELETE={} | Errors: {}",
            result.decisions.len(),
            result.applied.keep,
            result.applied.archive,
            result.applied.delete,
            result.errors.len()
        )
    }
}
