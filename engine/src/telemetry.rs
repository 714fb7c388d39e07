//! Log file setup.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use folio_config::DEFAULT_LOG_FILTER;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "folio.log";

/// Installs the global subscriber and returns the log file in use.
///
/// `RUST_LOG` wins over `filter`. When no log file can be opened nothing is
/// written anywhere; the host owns stdout. Calling this twice is harmless.
pub fn init_tracing(data_dir: Option<&Path>, filter: &str) -> Option<PathBuf> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (log_file, init_warnings) = open_log_file(&log_file_candidates(data_dir));

    let Some((log_path, file)) = log_file else {
        let _ = tracing_subscriber::registry().with(env_filter).try_init();
        return None;
    };

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(env_filter)
        .try_init()
        .is_ok();
    if !installed {
        return None;
    }

    tracing::info!(path = %log_path.display(), "Logging initialized");
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
    Some(log_path)
}

fn log_file_candidates(data_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = data_dir {
        candidates.push(dir.join(LOG_DIR).join(LOG_FILE));
    }
    candidates.push(PathBuf::from(".folio").join(LOG_DIR).join(LOG_FILE));
    candidates
}

fn open_log_file(candidates: &[PathBuf]) -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(candidate) {
            Ok(file) => return (Some((candidate.clone(), file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}
