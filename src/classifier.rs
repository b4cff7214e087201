//! LLM-backed email classification
//!
//! Turns email metadata into a KEEP/ARCHIVE/DELETE decision via a single
//! `generateContent` call against the Gemini API. The raw model output is
//! parsed defensively: anything that cannot be coaxed into the expected JSON
//! shape degrades to the conservative default (ARCHIVE at 0.5 confidence)
//! rather than failing the message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, TriageError};
use crate::models::{Action, Decision, EmailMetadata};
use crate::retry::retry_transient;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classification taxonomy given to the model verbatim on every call
const TAXONOMY_INSTRUCTION: &str = "You are an email triage assistant. Classify a promotional/marketing email into one of: KEEP, ARCHIVE, DELETE.\n\
KEEP: receipts, invoices, order confirmations, shipping notices, account/security alerts, travel bookings, billing statements.\n\
ARCHIVE: newsletters, educational content, known brand communications, potentially useful promotions.\n\
DELETE: spam, repeated or generic discounts, unknown sender promos, irrelevant blasts.\n\
Output STRICT JSON with keys action (KEEP|ARCHIVE|DELETE), confidence (0.0-1.0), reason (short). No extra text.";

/// Classification seam the pipeline depends on
///
/// Implementations must be pure functions of their input apart from the
/// network call itself.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, email: &EmailMetadata) -> Result<Decision>;
}

/// Gemini-backed classifier with strict-JSON prompting and bounded retry
pub struct GeminiClassifier {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_attempts: u32,
}

impl GeminiClassifier {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_attempts: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            max_attempts,
        }
    }

    /// Point the classifier at a different endpoint (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the deterministic prompt for one email
    fn build_prompt(email: &EmailMetadata) -> String {
        let payload = serde_json::json!({
            "from": email.from,
            "subject": email.subject,
            "snippet": email.snippet,
        });
        format!("{}\nEmail JSON:\n{}", TAXONOMY_INSTRUCTION, payload)
    }

    /// One round trip to the inference endpoint, returning the raw model text
    async fn call_endpoint(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(TriageError::RateLimitExceeded { retry_after: 5 });
        }
        if status.is_server_error() {
            return Err(TriageError::ServerError {
                status: status.as_u16(),
                message: "inference endpoint unavailable".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::ClassificationError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let completion: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TriageError::InferenceError(format!("malformed response body: {}", e)))?;

        // An empty candidate list degrades to the conservative default
        // downstream rather than erroring here
        Ok(completion.first_text().unwrap_or_default())
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, email: &EmailMetadata) -> Result<Decision> {
        let prompt = Self::build_prompt(email);

        // The whole prompt+call+parse round is the retried unit
        let decision = retry_transient("classify", self.max_attempts, || {
            let prompt = prompt.clone();
            async move {
                let text = self.call_endpoint(&prompt).await?;
                Ok(parse_decision(&email.id, &text))
            }
        })
        .await?;

        debug!(
            "Classified {} as {} (confidence {:.2})",
            email.id, decision.action, decision.confidence
        );
        Ok(decision)
    }
}

#[async_trait]
impl<T: Classifier> Classifier for std::sync::Arc<T> {
    async fn classify(&self, email: &EmailMetadata) -> Result<Decision> {
        self.as_ref().classify(email).await
    }
}

/// Parse raw model output into a decision, degrading to `{ARCHIVE, 0.5, ""}`
/// when the text cannot be recovered as JSON
pub fn parse_decision(id: &str, text: &str) -> Decision {
    let value = parse_json_lenient(text).unwrap_or(serde_json::Value::Null);

    if value.is_null() && !text.trim().is_empty() {
        warn!("Unparseable classifier output for {}, defaulting to ARCHIVE", id);
    }

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .map(Action::parse_lenient)
        .unwrap_or(Action::Archive);

    let confidence = value
        .get("confidence")
        .and_then(coerce_confidence)
        .unwrap_or(0.5);

    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Decision {
        id: id.to_string(),
        action,
        confidence,
        reason,
    }
}

/// Recovery ladder: direct parse, then fence-stripped, then the substring
/// between the first `{` and the last `}`
fn parse_json_lenient(text: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    if let Some(inner) = strip_code_fences(text) {
        if let Ok(value) = serde_json::from_str(inner) {
            return Some(value);
        }
    }

    if let Some(braced) = extract_braced(text) {
        if let Ok(value) = serde_json::from_str(braced) {
            return Some(value);
        }
    }

    None
}

fn strip_code_fences(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```")?;
    Some(rest.trim())
}

fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Accept numbers and numeric strings; anything else is unusable
fn coerce_confidence(value: &serde_json::Value) -> Option<f32> {
    if let Some(n) = value.as_f64() {
        return Some(n as f32);
    }
    value.as_str().and_then(|s| s.trim().parse::<f32>().ok())
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
            .map(|p| p.text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}
