//! End-to-end pipeline behavior against in-memory collaborators

mod common;

use common::{email, RecordingMailClient, ScriptedClassifier};
use gmail_triage::cache::DecisionCache;
use gmail_triage::config::Config;
use gmail_triage::models::{Action, Step};
use gmail_triage::processor::EmailProcessor;
use gmail_triage::rate_limiter::SlidingWindowLimiter;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> Config {
    let mut config = Config::default();
    // Generous window so tests never sleep on the limiter
    config.rate_limit.max_requests_per_minute = 1000;
    config
}

fn processor(
    mail: Arc<RecordingMailClient>,
    classifier: Arc<ScriptedClassifier>,
    config: &Config,
) -> EmailProcessor<Arc<RecordingMailClient>, Arc<ScriptedClassifier>> {
    let limiter = SlidingWindowLimiter::new(
        config.rate_limit.max_requests_per_minute,
        Duration::from_secs(60),
    );
    EmailProcessor::new(mail, classifier, limiter, config)
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn low_confidence_delete_downgraded_even_in_dry_run() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "Sale <promo@x.com>", "50% OFF")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("1", Action::Delete, 0.4, "promo"),
    );
    let mut proc = processor(Arc::clone(&mail), classifier, &test_config());

    let result = proc.process_batch(&ids(&["1"]), true).await.unwrap();

    assert_eq!(result.decisions.len(), 1);
    assert_eq!(result.decisions[0].action, Action::Archive);
    assert!((result.decisions[0].confidence - 0.4).abs() < f32::EPSILON);
    assert_eq!(mail.counts().mutations(), 0);
}

#[tokio::test]
async fn high_confidence_delete_passes_through() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "Spam <blast@x.com>", "FINAL HOURS!!!")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("1", Action::Delete, 0.9, "spam"),
    );
    let mut proc = processor(mail, classifier, &test_config());

    let result = proc.process_batch(&ids(&["1"]), true).await.unwrap();

    assert_eq!(result.decisions[0].action, Action::Delete);
    assert_eq!(result.decisions[0].reason, "spam");
}

#[tokio::test]
async fn delete_at_exact_threshold_passes_through() {
    let mail = Arc::new(
        RecordingMailClient::new().with_email(email("1", "a@b.com", "deal")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("1", Action::Delete, 0.6, "promo"),
    );
    let mut proc = processor(mail, classifier, &test_config());

    let result = proc.process_batch(&ids(&["1"]), true).await.unwrap();

    assert_eq!(result.decisions[0].action, Action::Delete);
}

#[tokio::test]
async fn dry_run_never_invokes_mutating_operations() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "a@b.com", "Your receipt"))
            .with_email(email("2", "c@d.com", "Newsletter"))
            .with_email(email("3", "e@f.com", "50% OFF")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .with_decision("1", Action::Keep, 0.95, "receipt")
            .with_decision("2", Action::Archive, 0.8, "newsletter")
            .with_decision("3", Action::Delete, 0.9, "promo"),
    );
    let mut proc = processor(Arc::clone(&mail), classifier, &test_config());

    let result = proc.process_batch(&ids(&["1", "2", "3"]), true).await.unwrap();

    assert_eq!(result.decisions.len(), 3);
    // Dry run reports decisions only; applied totals stay zero
    assert_eq!(result.applied.total(), 0);
    let counts = mail.counts();
    assert_eq!(counts.mutations(), 0);
    assert_eq!(counts.apply_label, 0);
    assert_eq!(counts.archive, 0);
    assert_eq!(counts.trash, 0);
}

#[tokio::test]
async fn metadata_failure_skips_only_that_id() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "a@b.com", "one"))
            .with_email(email("2", "c@d.com", "two"))
            .with_email(email("3", "e@f.com", "three"))
            .fail_metadata_for("2"),
    );
    let classifier = Arc::new(ScriptedClassifier::new());
    let mut proc = processor(mail, classifier, &test_config());

    let result = proc
        .process_batch(&ids(&["1", "2", "3"]), true)
        .await
        .unwrap();

    assert_eq!(result.decisions.len(), 2);
    assert_eq!(result.decisions[0].id, "1");
    assert_eq!(result.decisions[1].id, "3");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].id, "2");
    assert_eq!(result.errors[0].step, Step::Metadata);
}

#[tokio::test]
async fn classify_failure_recorded_and_batch_continues() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "a@b.com", "one"))
            .with_email(email("2", "c@d.com", "two")),
    );
    let classifier = Arc::new(ScriptedClassifier::new().fail_for("1"));
    let mut proc = processor(mail, classifier, &test_config());

    let result = proc.process_batch(&ids(&["1", "2"]), true).await.unwrap();

    assert_eq!(result.decisions.len(), 1);
    assert_eq!(result.decisions[0].id, "2");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].step, Step::Classify);
}

#[tokio::test]
async fn apply_routes_labels_by_action_and_confidence() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("k", "shop@x.com", "Order confirmation"))
            .with_email(email("a", "news@x.com", "Weekly digest"))
            .with_email(email("r", "maybe@x.com", "Brand update"))
            .with_email(email("d", "blast@x.com", "MEGA SALE")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .with_decision("k", Action::Keep, 0.95, "receipt")
            .with_decision("a", Action::Archive, 0.9, "newsletter")
            .with_decision("r", Action::Archive, 0.3, "unsure")
            .with_decision("d", Action::Delete, 0.9, "spam"),
    );
    let mut proc = processor(Arc::clone(&mail), classifier, &test_config());

    let result = proc
        .process_batch(&ids(&["k", "a", "r", "d"]), false)
        .await
        .unwrap();

    let applied = mail.labels_applied();
    assert_eq!(applied[0], ("k".to_string(), "id_AI_KEEP".to_string()));
    assert_eq!(applied[1], ("a".to_string(), "id_AI_ARCHIVED".to_string()));
    // Low-confidence archive is flagged for human review
    assert_eq!(applied[2], ("r".to_string(), "id_AI_REVIEW".to_string()));
    // DELETE carries the archive label for the audit trail
    assert_eq!(applied[3], ("d".to_string(), "id_AI_ARCHIVED".to_string()));

    let counts = mail.counts();
    // "a" and "r" archive; "d" archives too under safe-archive mode
    assert_eq!(counts.archive, 3);
    assert_eq!(counts.trash, 0);
    assert_eq!(counts.hard_delete, 0);

    assert_eq!(result.applied.keep, 1);
    assert_eq!(result.applied.archive, 2);
    assert_eq!(result.applied.delete, 1);
}

#[tokio::test]
async fn delete_trashes_when_safe_archive_disabled() {
    let mut config = test_config();
    config.safety.safe_archive_mode = false;

    let mail = Arc::new(
        RecordingMailClient::new().with_email(email("d", "blast@x.com", "MEGA SALE")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("d", Action::Delete, 0.9, "spam"),
    );
    let mut proc = processor(Arc::clone(&mail), classifier, &config);

    proc.process_batch(&ids(&["d"]), false).await.unwrap();

    let counts = mail.counts();
    assert_eq!(counts.trash, 1);
    assert_eq!(counts.archive, 0);
    // Soft delete only; permanent deletion is never part of the pipeline
    assert_eq!(counts.hard_delete, 0);
}

#[tokio::test]
async fn labels_resolved_once_per_processor_instance() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "a@b.com", "one"))
            .with_email(email("2", "c@d.com", "two")),
    );
    let classifier = Arc::new(ScriptedClassifier::new());
    let mut proc = processor(Arc::clone(&mail), classifier, &test_config());

    proc.process_batch(&ids(&["1"]), true).await.unwrap();
    proc.process_batch(&ids(&["2"]), true).await.unwrap();

    let counts = mail.counts();
    // Three labels, each resolved exactly once despite two batches
    assert_eq!(counts.create_label_calls, 3);
    assert_eq!(counts.label_creations, 3);
}

#[tokio::test]
async fn create_label_is_idempotent_on_the_client() {
    use gmail_triage::client::MailClient;

    let mail = RecordingMailClient::new();
    let first = mail.create_label("X").await.unwrap();
    let second = mail.create_label("X").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mail.counts().label_creations, 1);
}

#[tokio::test]
async fn apply_error_recorded_and_remaining_decisions_applied() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("1", "a@b.com", "one"))
            .with_email(email("2", "c@d.com", "two"))
            .fail_apply_for("1"),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new()
            .with_decision("1", Action::Keep, 0.9, "receipt")
            .with_decision("2", Action::Keep, 0.9, "receipt"),
    );
    let mut proc = processor(Arc::clone(&mail), classifier, &test_config());

    let result = proc.process_batch(&ids(&["1", "2"]), false).await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].id, "1");
    assert_eq!(result.errors[0].step, Step::Apply);
    // The failed decision is not counted as applied
    assert_eq!(result.applied.keep, 1);
}

#[tokio::test]
async fn cache_skips_second_classification() {
    let mail = Arc::new(
        RecordingMailClient::new().with_email(email("1", "a@b.com", "Newsletter")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("1", Action::Archive, 0.8, "newsletter"),
    );
    let mut proc = processor(Arc::clone(&mail), Arc::clone(&classifier), &test_config())
        .with_cache(DecisionCache::new());

    proc.process_batch(&ids(&["1"]), true).await.unwrap();
    let second = proc.process_batch(&ids(&["1"]), true).await.unwrap();

    assert_eq!(classifier.classify_calls(), 1);
    assert_eq!(second.decisions[0].action, Action::Archive);
}

#[tokio::test]
async fn cached_raw_decision_still_gets_safety_override() {
    let mail = Arc::new(
        RecordingMailClient::new().with_email(email("1", "a@b.com", "50% OFF")),
    );
    let classifier = Arc::new(
        ScriptedClassifier::new().with_decision("1", Action::Delete, 0.4, "promo"),
    );
    let mut proc = processor(Arc::clone(&mail), Arc::clone(&classifier), &test_config())
        .with_cache(DecisionCache::new());

    let first = proc.process_batch(&ids(&["1"]), true).await.unwrap();
    let second = proc.process_batch(&ids(&["1"]), true).await.unwrap();

    // The cache stores the raw DELETE; the override re-applies on every read
    assert_eq!(classifier.classify_calls(), 1);
    assert_eq!(first.decisions[0].action, Action::Archive);
    assert_eq!(second.decisions[0].action, Action::Archive);
}

#[tokio::test]
async fn decisions_preserve_input_order() {
    let mail = Arc::new(
        RecordingMailClient::new()
            .with_email(email("c", "1@x.com", "one"))
            .with_email(email("a", "2@x.com", "two"))
            .with_email(email("b", "3@x.com", "three")),
    );
    let classifier = Arc::new(ScriptedClassifier::new());
    let mut proc = processor(mail, classifier, &test_config());

    let result = proc
        .process_batch(&ids(&["c", "a", "b"]), true)
        .await
        .unwrap();

    let order: Vec<&str> = result.decisions.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}
