//! CLI bootstrap: logging, settings, provider selection, service assembly.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::lm::client::{LmClient, LmConfig};
use crate::service::SkillService;
use crate::settings::{settings_path, SettingsManager, SkillfabSettings};

use super::args::Args;

/// Everything a CLI command needs.
pub struct CliContext {
    pub service: Arc<SkillService>,
    pub settings: SkillfabSettings,
}

/// Initialize logging once for the process.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "skillfab=debug" } else { "skillfab=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_directive.parse().expect("static directive")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build the service from the CLI arguments.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    // Load .env before anything reads the environment.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            tracing::warn!("failed to load .env file: {}", e);
        }
    }

    // rustls 0.23 needs a process-wide crypto provider before any TLS use.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let path = args.config.clone().unwrap_or_else(settings_path);
    let manager = SettingsManager::from_path(path).await?;
    manager.write_template_if_missing().await?;
    let settings = manager.get().await;

    let lm = build_client(args, &settings)?;
    let service = SkillService::initialize(&settings, lm)
        .await
        .map_err(|e| anyhow::anyhow!("service initialization failed: {}", e))?;

    Ok(CliContext { service, settings })
}

fn build_client(args: &Args, settings: &SkillfabSettings) -> Result<Arc<LmClient>> {
    if args.offline {
        // No provider: commands that reach the LM will fail permanently,
        // which is the point of offline mode.
        return Ok(Arc::new(LmClient::scripted([])));
    }

    let api_key = args
        .api_key
        .clone()
        .or_else(|| settings.provider.openrouter_api_key.clone())
        .context(
            "no OpenRouter API key: set provider.openrouter_api_key, SKILLFAB_API_KEY, \
             or pass --offline",
        )?;

    let config = LmConfig {
        model: settings.provider.model.clone(),
        temperature: settings.provider.temperature,
        max_tokens: settings.provider.max_tokens,
    };
    Ok(Arc::new(LmClient::openrouter(&api_key, config)))
}
