//! Gmail Triage Assistant
//!
//! Queries a mailbox for promotional messages, classifies each one with an
//! LLM call into KEEP / ARCHIVE / DELETE, and applies the decision subject to
//! a confidence-based safety override.
//!
//! # Overview
//!
//! The crate is a thin orchestration layer over two remote services:
//! - **Mail provider**: metadata fetch, label, archive and trash operations
//!   behind the [`client::MailClient`] trait (Gmail binding included)
//! - **LLM inference**: single-turn classification behind the
//!   [`classifier::Classifier`] trait (Gemini binding included)
//!
//! plus a local sliding-window rate limiter. The interesting part is the
//! decision pipeline in [`processor`]: fetch metadata, classify, downgrade
//! low-confidence deletions, then label/archive/trash under rate limiting.
//! One bad message never aborts a batch; destructive actions are always
//! mediated by the confidence threshold and the safe-archive toggle.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_triage::{auth, cli, config::Config};
//! use gmail_triage::classifier::GeminiClassifier;
//! use gmail_triage::client::GmailMailClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-triage/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     let mail = GmailMailClient::new(hub);
//!     let classifier = GeminiClassifier::new(
//!         std::env::var(&config.classifier.api_key_env)?,
//!         config.classifier.model.clone(),
//!         config.classifier.max_attempts,
//!     );
//!
//!     let totals = cli::run_session(mail, classifier, &config, true).await?;
//!     println!("{}", totals.summary_line());
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail hub construction
//! - [`cache`] - Optional on-disk decision cache
//! - [`classifier`] - LLM-backed classification with defensive parsing
//! - [`cli`] - Command-line interface and session driver
//! - [`client`] - Mail provider contract and Gmail binding with retry logic
//! - [`config`] - Configuration management
//! - [`demo`] - Offline collaborators for demo mode and tests
//! - [`error`] - Error types and result alias
//! - [`models`] - Core data structures
//! - [`processor`] - The triage pipeline
//! - [`rate_limiter`] - Sliding-window request throttle
//! - [`retry`] - Bounded backoff retry helper

pub mod auth;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod models;
pub mod processor;
pub mod rate_limiter;
pub mod retry;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

// Core data models
pub use models::{Action, AppliedCounts, BatchError, BatchResult, Decision, EmailMetadata, Step};

// Collaborator traits and bindings
pub use classifier::{Classifier, GeminiClassifier};
pub use client::{GmailMailClient, MailClient};

// Pipeline
pub use processor::{ApplyOutcome, EmailProcessor};
pub use rate_limiter::SlidingWindowLimiter;

// Config types
pub use config::{
    CacheConfig, ClassifierConfig, Config, LabelConfig, RateLimitConfig, SafetyConfig,
    SearchConfig, SessionConfig,
};

// CLI types (for binary usage)
pub use cli::{Cli, Commands, SessionTotals};
