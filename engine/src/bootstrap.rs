//! Wiring from configuration to a ready [`Engine`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use folio_config::FolioConfig;
use folio_providers::{AssistantsClient, AssistantsConfig};

use crate::persistence::JsonFileStore;
use crate::{Engine, EngineOptions};

/// Loads `~/.folio/config.toml`. A missing or unreadable file yields defaults.
#[must_use]
pub fn load_config() -> FolioConfig {
    match FolioConfig::load() {
        Ok(Some(config)) => config,
        Ok(None) => FolioConfig::default(),
        Err(e) => {
            tracing::warn!(path = %e.path().display(), "Using default configuration: {e}");
            FolioConfig::default()
        }
    }
}

pub fn assistants_config(config: &FolioConfig, library_root: &Path) -> Result<AssistantsConfig> {
    let qa = config.qa_settings();
    let mut assistants = AssistantsConfig::new(&qa.base_url, library_root)
        .with_context(|| format!("invalid qa.base_url `{}`", qa.base_url))?;
    assistants.model = qa.model;
    assistants.assistant_name = qa.assistant_name;
    assistants.poll_interval = qa.poll_interval;
    assistants.max_polls = qa.max_polls;
    Ok(assistants)
}

/// Builds an engine over the JSON library store and the Assistants API.
pub fn build_engine(config: &FolioConfig) -> Result<Engine> {
    let data_dir = config
        .data_dir()
        .context("no data directory; set app.data_dir or FOLIO_DATA_DIR")?;
    let store = JsonFileStore::new(&data_dir);
    let client = AssistantsClient::new(assistants_config(config, &data_dir)?)
        .context("failed to build QA HTTP client")?;

    tracing::info!(data_dir = %data_dir.display(), "Engine configured");
    Ok(Engine::new(
        Arc::new(store),
        Arc::new(client),
        EngineOptions::from_config(config),
    ))
}
