use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_emails")]
    pub max_emails: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_seconds")]
    pub batch_delay_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_emails: default_max_emails(),
            batch_size: default_batch_size(),
            batch_delay_seconds: default_batch_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub safe_archive_mode: bool,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            safe_archive_mode: true,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_query")]
    pub query: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_keep_label")]
    pub keep: String,
    #[serde(default = "default_archive_label")]
    pub archive: String,
    #[serde(default = "default_review_label")]
    pub review: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            keep: default_keep_label(),
            archive: default_archive_label(),
            review: default_review_label(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key; the core never
    /// reads the environment itself
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_path")]
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_cache_path(),
        }
    }
}

fn default_max_emails() -> usize {
    50
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_seconds() -> u64 {
    65
}

fn default_max_requests_per_minute() -> usize {
    14
}

fn default_confidence_threshold() -> f32 {
    0.6
}

fn default_query() -> String {
    "category:promotions newer_than:30d".to_string()
}

fn default_keep_label() -> String {
    "AI_KEEP".to_string()
}

fn default_archive_label() -> String {
    "AI_ARCHIVED".to_string()
}

fn default_review_label() -> String {
    "AI_REVIEW".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cache_path() -> String {
    ".gmail-triage/decisions.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // Missing file means defaults; the defaults are all conservative
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.session.max_emails == 0 {
            return Err(TriageError::ConfigError(
                "session.max_emails must be at least 1".to_string(),
            ));
        }

        if self.session.batch_size == 0 {
            return Err(TriageError::ConfigError(
                "session.batch_size must be at least 1".to_string(),
            ));
        }

        if self.rate_limit.max_requests_per_minute == 0 {
            return Err(TriageError::ConfigError(
                "rate_limit.max_requests_per_minute must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.safety.confidence_threshold) {
            return Err(TriageError::ConfigError(format!(
                "safety.confidence_threshold must be within [0.0, 1.0], got {}",
                self.safety.confidence_threshold
            )));
        }

        if self.search.query.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "search.query cannot be empty".to_string(),
            ));
        }

        for (field, value) in [
            ("labels.keep", &self.labels.keep),
            ("labels.archive", &self.labels.archive),
            ("labels.review", &self.labels.review),
        ] {
            if value.trim().is_empty() {
                return Err(TriageError::ConfigError(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }

        if self.classifier.model.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "classifier.model cannot be empty".to_string(),
            ));
        }

        if self.classifier.max_attempts == 0 {
            return Err(TriageError::ConfigError(
                "classifier.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate an example configuration file with commented defaults
    pub fn example_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).expect("default config always serializes")
    }
}
