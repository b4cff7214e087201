//! Command-line interface and session driver

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::DecisionCache;
use crate::classifier::Classifier;
use crate::client::MailClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{AppliedCounts, BatchResult};
use crate::processor::EmailProcessor;
use crate::rate_limiter::SlidingWindowLimiter;

#[derive(Parser, Debug)]
#[command(name = "gmail-triage")]
#[command(version)]
#[command(about = "LLM-assisted triage for promotional email", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-triage/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail and cache the OAuth token
    Auth {
        /// Force re-authentication even if a token exists
        #[arg(long)]
        force: bool,
    },

    /// Query, classify and triage promotional emails
    Run {
        /// Compute decisions but apply nothing (overrides config)
        #[arg(long, conflicts_with = "apply")]
        dry_run: bool,

        /// Apply decisions to the mailbox (overrides config)
        #[arg(long)]
        apply: bool,

        /// Max emails this session
        #[arg(long)]
        max_emails: Option<usize>,

        /// Batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Gmail search query
        #[arg(long)]
        query: Option<String>,
    },

    /// Run the full pipeline offline against sample data
    Demo {
        /// Apply decisions to the in-memory mailbox
        #[arg(long)]
        apply: bool,
    },

    /// Permanently delete one message, bypassing the pipeline entirely
    Purge {
        /// Message id to delete (cannot be undone)
        id: String,

        /// Confirm the permanent deletion
        #[arg(long)]
        yes: bool,
    },

    /// Generate an example configuration file
    InitConfig {
        /// Path to create the config file at
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Effective dry-run setting: CLI flags win over the config default
pub fn effective_dry_run(config: &Config, dry_run_flag: bool, apply_flag: bool) -> bool {
    if dry_run_flag {
        true
    } else if apply_flag {
        false
    } else {
        config.safety.dry_run
    }
}

/// Aggregated outcome of one session
#[derive(Debug, Default)]
pub struct SessionTotals {
    pub decisions: usize,
    pub applied: AppliedCounts,
    pub errors: usize,
}

impl SessionTotals {
    fn absorb(&mut self, result: &BatchResult) {
        self.decisions += result.decisions.len();
        self.applied.keep += result.applied.keep;
        self.applied.archive += result.applied.archive;
        self.applied.delete += result.applied.delete;
        self.errors += result.errors.len();
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Session totals: {} decisions | Applied KEEP={} ARCHIVE={} DELETE={} | Errors: {}",
            self.decisions,
            self.applied.keep,
            self.applied.archive,
            self.applied.delete,
            self.errors
        )
    }
}

/// Drive a full triage session: list, batch, process, pause between batches
///
/// The inter-batch delay is a coarse throttle on top of the per-request rate
/// limiter and deliberately lives here, outside the pipeline.
pub async fn run_session<M, C>(
    mail: M,
    classifier: C,
    config: &Config,
    dry_run: bool,
) -> Result<SessionTotals>
where
    M: MailClient,
    C: Classifier,
{
    mail.authenticate().await?;

    info!("Searching with query: {}", config.search.query);
    let ids = mail
        .list_matching(&config.search.query, config.session.max_emails)
        .await?;
    info!(
        "Found {} emails to process (dry_run={})",
        ids.len(),
        dry_run
    );

    if ids.is_empty() {
        return Ok(SessionTotals::default());
    }

    let limiter = SlidingWindowLimiter::new(
        config.rate_limit.max_requests_per_minute,
        Duration::from_secs(60),
    );
    let mut processor = EmailProcessor::new(mail, classifier, limiter, config);

    if config.cache.enabled {
        let cache = DecisionCache::load(Path::new(&config.cache.path)).await;
        processor = processor.with_cache(cache);
    }

    let progress = ProgressBar::new(ids.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut totals = SessionTotals::default();
    let batches: Vec<&[String]> = ids.chunks(config.session.batch_size).collect();
    let total_batches = batches.len();

    for (index, batch) in batches.into_iter().enumerate() {
        progress.set_message(format!("batch {}/{}", index + 1, total_batches));
        let result = processor.process_batch(batch, dry_run).await?;
        progress.inc(batch.len() as u64);

        info!(
            "Batch {}/{}: {}",
            index + 1,
            total_batches,
            processor.generate_summary(&result)
        );
        totals.absorb(&result);

        if index + 1 < total_batches {
            info!(
                "Waiting {}s before next batch (rate limiting)",
                config.session.batch_delay_seconds
            );
            tokio::time::sleep(Duration::from_secs(config.session.batch_delay_seconds)).await;
        }
    }

    progress.finish_and_clear();

    if config.cache.enabled {
        if let Some(cache) = processor.cache_mut() {
            // Cache persistence is best-effort
            if let Err(e) = cache.save(Path::new(&config.cache.path)).await {
                warn!("Failed to save decision cache: {}", e);
            }
        }
    }

    Ok(totals)
}
