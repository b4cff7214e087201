//! Optional on-disk decision cache
//!
//! A plain JSON map from message id to the raw classifier decision, so
//! re-running a session does not re-bill the inference endpoint for messages
//! it has already seen. Cached decisions are pre-override: the pipeline
//! re-applies the safety threshold on every read, so changing the threshold
//! between sessions changes outcomes.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::models::Decision;

#[derive(Debug, Default)]
pub struct DecisionCache {
    decisions: HashMap<String, Decision>,
    dirty: bool,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache from disk; a missing or unreadable file starts fresh
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No decision cache at {:?}, starting fresh", path);
            return Self::new();
        }

        match tokio::fs::read_to_string(path).await {
            Ok(json) => match serde_json::from_str::<HashMap<String, Decision>>(&json) {
                Ok(decisions) => {
                    tracing::info!("Loaded {} cached decisions from {:?}", decisions.len(), path);
                    Self {
                        decisions,
                        dirty: false,
                    }
                }
                Err(e) => {
                    tracing::warn!("Discarding corrupt decision cache {:?}: {}", path, e);
                    Self::new()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read decision cache {:?}: {}", path, e);
                Self::new()
            }
        }
    }

    /// Save the cache to disk if anything changed since load
    pub async fn save(&mut self, path: &Path) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.decisions)?;
        tokio::fs::write(path, json).await?;
        self.dirty = false;
        tracing::debug!("Saved {} decisions to {:?}", self.decisions.len(), path);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Decision> {
        self.decisions.get(id)
    }

    pub fn insert(&mut self, decision: Decision) {
        self.decisions.insert(decision.id.clone(), decision);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}
