//! Settings schema for the skill pipeline.
//!
//! All settings structs use `#[serde(default)]` so partial configuration
//! files work; missing fields fall back to the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};

/// Root settings structure.
///
/// Loaded from `~/.skillfab/settings.toml` with environment variable
/// interpolation support. The version field enables future migrations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SkillfabSettings {
    /// Schema version for migrations
    pub version: u32,

    /// LM provider configuration
    pub provider: ProviderSettings,

    /// Job store configuration
    pub store: StoreSettings,

    /// Taxonomy configuration
    pub taxonomy: TaxonomySettings,

    /// Workflow behavior
    pub workflow: WorkflowSettings,
}

impl SkillfabSettings {
    /// Enforce cross-field contracts.
    ///
    /// The sweeper period must stay at or below half the TTL, otherwise
    /// expired entries linger a full extra period.
    pub fn validate(&self) -> Result<()> {
        if self.store.sweep_period_secs > self.store.ttl_secs / 2 {
            return Err(SkillfabError::InvalidInput(format!(
                "store.sweep_period_secs ({}) must be at most half of store.ttl_secs ({})",
                self.store.sweep_period_secs, self.store.ttl_secs
            )));
        }
        if self.store.capacity == 0 {
            return Err(SkillfabError::InvalidInput(
                "store.capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// LM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// OpenRouter API key (supports $ENV_VAR syntax)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter_api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Response token budget
    pub max_tokens: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            model: "anthropic/claude-3.5-sonnet".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
        }
    }
}

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Memory-tier capacity
    pub capacity: usize,

    /// Memory-tier TTL in seconds
    pub ttl_secs: u64,

    /// Background sweep period in seconds (at most ttl / 2)
    pub sweep_period_secs: u64,

    /// Data directory; defaults to `~/.skillfab`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 60 * 60,
            sweep_period_secs: 5 * 60,
            data_dir: None,
        }
    }
}

impl StoreSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }
}

/// Taxonomy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaxonomySettings {
    /// Taxonomy root directory; defaults to `~/.skillfab/taxonomy`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// Workflow behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Raise a preview checkpoint after generation
    pub preview_checkpoint: bool,

    /// Raise a confirm checkpoint after planning
    pub confirm_plan: bool,

    /// Job retrievability TTL in seconds
    pub job_ttl_secs: i64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            preview_checkpoint: false,
            confirm_plan: false,
            job_ttl_secs: 60 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SkillfabSettings::default().validate().is_ok());
    }

    #[test]
    fn sweeper_contract_is_enforced() {
        let mut settings = SkillfabSettings::default();
        settings.store.ttl_secs = 600;
        settings.store.sweep_period_secs = 301;
        assert_eq!(settings.validate().unwrap_err().kind(), "invalid_input");

        settings.store.sweep_period_secs = 300;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut settings = SkillfabSettings::default();
        settings.store.capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: SkillfabSettings =
            toml::from_str("[provider]\nmodel = \"anthropic/claude-3-haiku\"\n").unwrap();
        assert_eq!(settings.provider.model, "anthropic/claude-3-haiku");
        assert_eq!(settings.store.capacity, 1000);
        assert!(!settings.workflow.preview_checkpoint);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let settings: SkillfabSettings = toml::from_str("").unwrap();
        assert_eq!(settings.store.ttl_secs, 3600);
        assert_eq!(settings.store.sweep_period_secs, 300);
    }
}
