use anyhow::Result;
use clap::Parser;
use gmail_triage::auth;
use gmail_triage::cli::{self, Cli, Commands};
use gmail_triage::classifier::GeminiClassifier;
use gmail_triage::client::{GmailMailClient, MailClient};
use gmail_triage::config::Config;
use gmail_triage::demo::{DemoClassifier, DemoMailClient};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-triage --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls; multiple dependencies pull
    // in different providers, so one must be pinned process-wide
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_triage=info,warn,error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // The token cache lives under .gmail-triage/ by default
    if let Some(parent) = cli.token_cache.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match cli.command {
        Commands::Auth { force } => {
            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let _hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
            tracing::info!("Authentication successful, token cached");
        }

        Commands::Run {
            dry_run,
            apply,
            max_emails,
            batch_size,
            query,
        } => {
            let mut config = Config::load(&cli.config).await?;
            if let Some(v) = max_emails {
                config.session.max_emails = v;
            }
            if let Some(v) = batch_size {
                config.session.batch_size = v;
            }
            if let Some(q) = query {
                config.search.query = q;
            }
            config.validate()?;

            let dry_run = cli::effective_dry_run(&config, dry_run, apply);

            let api_key = std::env::var(&config.classifier.api_key_env).map_err(|_| {
                anyhow::anyhow!(
                    "{} is not set; export your Gemini API key first",
                    config.classifier.api_key_env
                )
            })?;

            let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
            let mail = GmailMailClient::new(hub);
            let classifier = GeminiClassifier::new(
                api_key,
                config.classifier.model.clone(),
                config.classifier.max_attempts,
            );

            let totals = cli::run_session(mail, classifier, &config, dry_run).await?;
            println!("{}", totals.summary_line());
            if dry_run {
                println!("Dry run: nothing was applied. Re-run with --apply to act on decisions.");
            }
        }

        Commands::Demo { apply } => {
            let mut config = Config::default();
            config.cache.enabled = false;
            config.session.batch_delay_seconds = 0;

            let totals =
                cli::run_session(DemoMailClient::new(), DemoClassifier, &config, !apply).await?;
            println!("{}", totals.summary_line());
        }

        Commands::Purge { id, yes } => {
            if !yes {
                anyhow::bail!(
                    "Refusing to permanently delete message {} without --yes",
                    id
                );
            }

            let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
            let mail = GmailMailClient::new(hub);
            mail.hard_delete(&id).await?;
            tracing::warn!("Permanently deleted message {}", id);
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    output.display()
                );
            }

            tokio::fs::write(&output, Config::example_toml()).await?;
            println!("Wrote example configuration to {}", output.display());
        }
    }

    Ok(())
}
