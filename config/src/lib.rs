//! Configuration for Folio.
//!
//! Read from `~/.folio/config.toml`. Every section and key is optional; a
//! missing file yields defaults.
//!
//! ```toml
//! [app]
//! data_dir = "${HOME}/Alexandria_Data"
//!
//! [sync]
//! settings_debounce_ms = 500
//!
//! [qa]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4-turbo-preview"
//! assistant_name = "Novel GPT Alexandria"
//! poll_interval_ms = 500
//! max_polls = 120
//!
//! [logging]
//! filter = "folio_engine=debug,info"
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

/// Overrides `app.data_dir` when set.
pub const DATA_DIR_ENV: &str = "FOLIO_DATA_DIR";

/// Name of the library directory under the platform data dir.
pub const LIBRARY_DIR_NAME: &str = "Alexandria_Data";

pub const DEFAULT_SETTINGS_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_QA_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_QA_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_ASSISTANT_NAME: &str = "Novel GPT Alexandria";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_POLLS: u32 = 120;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Default, Deserialize)]
pub struct FolioConfig {
    pub app: Option<AppConfig>,
    pub sync: Option<SyncConfig>,
    pub qa: Option<QaConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Library root holding `books/`, `settings.json` and `GlobalThemes.json`.
    pub data_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before a settings change is written.
    pub settings_debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QaConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub assistant_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// Question-answering settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaSettings {
    pub base_url: String,
    pub model: String,
    pub assistant_name: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

/// Replaces `${VAR}` references with environment values. Unknown variables
/// become empty; an unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_data_dir(
    configured: Option<&str>,
    env_override: Option<OsString>,
    platform_data_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    if let Some(dir) = configured.map(expand_env_vars).filter(|d| !d.trim().is_empty()) {
        return Some(PathBuf::from(dir));
    }
    platform_data_dir.map(|d| d.join(LIBRARY_DIR_NAME))
}

impl FolioConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    /// Loads `path`, returning `Ok(None)` when it does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> Option<PathBuf> {
        resolve_data_dir(
            self.app.as_ref().and_then(|a| a.data_dir.as_deref()),
            env::var_os(DATA_DIR_ENV),
            dirs::data_dir(),
        )
    }

    #[must_use]
    pub fn settings_debounce(&self) -> Duration {
        let ms = self
            .sync
            .as_ref()
            .and_then(|s| s.settings_debounce_ms)
            .unwrap_or(DEFAULT_SETTINGS_DEBOUNCE_MS);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub fn qa_settings(&self) -> QaSettings {
        let qa = self.qa.as_ref();
        let text = |pick: fn(&QaConfig) -> Option<&String>, default: &str| {
            qa.and_then(pick)
                .map(|v| expand_env_vars(v))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        QaSettings {
            base_url: text(|q| q.base_url.as_ref(), DEFAULT_QA_BASE_URL),
            model: text(|q| q.model.as_ref(), DEFAULT_QA_MODEL),
            assistant_name: text(|q| q.assistant_name.as_ref(), DEFAULT_ASSISTANT_NAME),
            poll_interval: Duration::from_millis(
                qa.and_then(|q| q.poll_interval_ms)
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            max_polls: qa
                .and_then(|q| q.max_polls)
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_POLLS),
        }
    }

    #[must_use]
    pub fn log_filter(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.filter.clone())
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".folio").join("config.toml"))
}
