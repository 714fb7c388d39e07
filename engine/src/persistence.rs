//! Durable storage for session snapshots and global settings.
//!
//! [`PersistenceGateway`] is what the engine calls. [`JsonFileStore`] keeps the
//! host shell's library layout under a data root:
//!
//! ```text
//! <root>/
//!   books/<hash>/<hash>.json   session snapshot
//!   settings.json              preferences (owner-only, holds the API key)
//!   GlobalThemes.json          {"themes": {...}}
//! ```
//!
//! Writes go through [`folio_utils::write_json_atomic`] on the blocking pool.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use folio_types::{
    DocumentHash, Preferences, SessionSnapshot, SettingsSnapshot, Theme, ThemeRegistry,
};
use folio_utils::{AtomicWriteOptions, PersistMode, recover_bak_file, write_json_atomic};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub trait PersistenceGateway: Send + Sync {
    fn save_session<'a>(
        &'a self,
        hash: &'a DocumentHash,
        snapshot: &'a SessionSnapshot,
    ) -> StoreFuture<'a, ()>;

    /// `Ok(None)` means the document has never been read.
    fn load_session<'a>(&'a self, hash: &'a DocumentHash)
    -> StoreFuture<'a, Option<SessionSnapshot>>;

    fn save_global_settings<'a>(&'a self, settings: &'a SettingsSnapshot) -> StoreFuture<'a, ()>;

    /// Missing files read as defaults.
    fn load_global_settings(&self) -> StoreFuture<'_, SettingsSnapshot>;
}

const BOOKS_DIR: &str = "books";
const SETTINGS_FILE: &str = "settings.json";
const THEMES_FILE: &str = "GlobalThemes.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThemesFile {
    #[serde(default)]
    themes: BTreeMap<String, Theme>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
    options: AtomicWriteOptions,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: AtomicWriteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_write_options(mut self, options: AtomicWriteOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn session_path(&self, hash: &DocumentHash) -> PathBuf {
        self.root
            .join(BOOKS_DIR)
            .join(hash.as_str())
            .join(format!("{hash}.json"))
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    #[must_use]
    pub fn themes_path(&self) -> PathBuf {
        self.root.join(THEMES_FILE)
    }
}

async fn blocking<T, F>(work: F) -> Result<T, PersistenceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    options: AtomicWriteOptions,
) -> Result<(), PersistenceError> {
    write_json_atomic(path, value, options).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses `path`. A missing file is `Ok(None)`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    recover_bak_file(path);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistenceError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

impl PersistenceGateway for JsonFileStore {
    fn save_session<'a>(
        &'a self,
        hash: &'a DocumentHash,
        snapshot: &'a SessionSnapshot,
    ) -> StoreFuture<'a, ()> {
        let path = self.session_path(hash);
        let snapshot = snapshot.clone();
        let options = self.options;
        Box::pin(blocking(move || write_json(&path, &snapshot, options)))
    }

    fn load_session<'a>(
        &'a self,
        hash: &'a DocumentHash,
    ) -> StoreFuture<'a, Option<SessionSnapshot>> {
        let path = self.session_path(hash);
        Box::pin(blocking(move || {
            let snapshot: Option<SessionSnapshot> = read_json(&path)?;
            // A record without a locator was created on import and never read.
            Ok(snapshot.filter(|s| !s.data.locator.is_empty()))
        }))
    }

    fn save_global_settings<'a>(&'a self, settings: &'a SettingsSnapshot) -> StoreFuture<'a, ()> {
        let settings_path = self.settings_path();
        let themes_path = self.themes_path();
        let preferences = settings.preferences.clone();
        let themes = ThemesFile {
            themes: settings.themes.clone().into_inner(),
        };
        let options = self.options;
        Box::pin(blocking(move || {
            let private = AtomicWriteOptions {
                mode: PersistMode::OwnerOnly,
                ..options
            };
            write_json(&settings_path, &preferences, private)?;
            write_json(&themes_path, &themes, options)
        }))
    }

    fn load_global_settings(&self) -> StoreFuture<'_, SettingsSnapshot> {
        let settings_path = self.settings_path();
        let themes_path = self.themes_path();
        Box::pin(blocking(move || {
            let preferences: Preferences = read_json(&settings_path)?.unwrap_or_default();
            let themes: ThemesFile = read_json(&themes_path)?.unwrap_or_default();
            Ok(SettingsSnapshot {
                preferences,
                themes: ThemeRegistry::with_builtins(themes.themes),
            })
        }))
    }
}
