//! Settings loading, saving, and environment variable interpolation.
//!
//! The `SettingsManager` handles:
//! - Loading settings from `~/.skillfab/settings.toml`
//! - Resolving `$VAR` and `${VAR}` environment variable references
//! - Atomic file writes with temp file + rename
//! - First-run template generation

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::RwLock;

use super::schema::SkillfabSettings;

/// Embedded template for first-run generation.
const TEMPLATE: &str = include_str!("template.toml");

/// Get the path to the global settings file.
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillfab")
        .join("settings.toml")
}

/// Default data directory when the settings file names none.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillfab")
}

/// Manages settings loading, interpolation, and persistence.
pub struct SettingsManager {
    /// Cached settings (with env vars resolved)
    settings: RwLock<SkillfabSettings>,

    /// Path to the settings file
    path: PathBuf,
}

impl SettingsManager {
    /// Create a new SettingsManager, loading from disk if available.
    pub async fn new() -> Result<Self> {
        Self::from_path(settings_path()).await
    }

    /// Load from an explicit path (tests and `--config`).
    pub async fn from_path(path: PathBuf) -> Result<Self> {
        let settings = Self::load_from_path(&path).await?;
        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    async fn load_from_path(path: &PathBuf) -> Result<SkillfabSettings> {
        if !path.exists() {
            tracing::debug!("settings file not found at {:?}, using defaults", path);
            return Ok(SkillfabSettings::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read settings file")?;

        let mut settings: SkillfabSettings =
            toml::from_str(&contents).context("Failed to deserialize settings")?;

        Self::resolve_env_vars(&mut settings);
        settings
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid settings: {}", e))?;

        tracing::info!("loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Resolve `$VAR` references in string fields.
    fn resolve_env_vars(settings: &mut SkillfabSettings) {
        fn resolve_opt(value: &mut Option<String>) {
            if let Some(v) = value {
                if let Some(resolved) = resolve_env_ref(v) {
                    *v = resolved;
                }
            }
        }

        resolve_opt(&mut settings.provider.openrouter_api_key);
        resolve_opt(&mut settings.store.data_dir);
        resolve_opt(&mut settings.taxonomy.root);
    }

    /// Get the current settings (read-only).
    pub async fn get(&self) -> SkillfabSettings {
        self.settings.read().await.clone()
    }

    /// Update settings and persist to disk atomically.
    pub async fn update(&self, new_settings: SkillfabSettings) -> Result<()> {
        new_settings
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid settings: {}", e))?;
        *self.settings.write().await = new_settings.clone();

        let toml_string =
            toml::to_string_pretty(&new_settings).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, toml_string).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Write the first-run template if no settings file exists yet.
    pub async fn write_template_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, TEMPLATE).await?;
        tracing::info!("wrote settings template to {:?}", self.path);
        Ok(true)
    }
}

/// Resolve a `$VAR` or `${VAR}` reference against the environment.
///
/// Returns `None` when the value is not a reference or the variable is
/// unset (the literal value is kept in that case).
fn resolve_env_ref(value: &str) -> Option<String> {
    let name = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .or_else(|| value.strip_prefix('$'))?;
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn env_refs_resolve() {
        std::env::set_var("SKILLFAB_TEST_KEY", "secret");
        assert_eq!(
            resolve_env_ref("$SKILLFAB_TEST_KEY").as_deref(),
            Some("secret")
        );
        assert_eq!(
            resolve_env_ref("${SKILLFAB_TEST_KEY}").as_deref(),
            Some("secret")
        );
    }

    #[test]
    fn literals_are_not_resolved() {
        assert!(resolve_env_ref("sk-or-literal-key").is_none());
        assert!(resolve_env_ref("$").is_none());
    }

    #[test]
    fn unset_vars_keep_the_literal() {
        assert!(resolve_env_ref("$SKILLFAB_DEFINITELY_UNSET_VAR").is_none());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::from_path(dir.path().join("settings.toml"))
            .await
            .unwrap();
        let settings = manager.get().await;
        assert_eq!(settings.store.capacity, 1000);
    }

    #[tokio::test]
    async fn update_then_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let manager = SettingsManager::from_path(path.clone()).await.unwrap();

        let mut settings = manager.get().await;
        settings.provider.model = "anthropic/claude-3-haiku".into();
        manager.update(settings).await.unwrap();

        let reloaded = SettingsManager::from_path(path).await.unwrap();
        assert_eq!(
            reloaded.get().await.provider.model,
            "anthropic/claude-3-haiku"
        );
    }

    #[tokio::test]
    async fn invalid_settings_fail_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "[store]\nttl_secs = 100\nsweep_period_secs = 99\n")
            .await
            .unwrap();
        assert!(SettingsManager::from_path(path).await.is_err());
    }

    #[tokio::test]
    async fn template_is_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        let manager = SettingsManager::from_path(path.clone()).await.unwrap();
        assert!(manager.write_template_if_missing().await.unwrap());
        assert!(!manager.write_template_if_missing().await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn template_parses() {
        let settings: SkillfabSettings = toml::from_str(TEMPLATE).unwrap();
        assert_eq!(settings.version, 1);
        assert!(settings.validate().is_ok());
    }
}
