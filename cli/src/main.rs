//! Folio CLI - minimal host for the reading engine.
//!
//! ```text
//! folio [HASH] [HASH]
//! ```
//!
//! Loads the configuration and stored settings, opens each document hash in
//! its own view, prints where reading left off, then shuts the engine down.

use std::env;

use anyhow::{Context, Result, bail};
use folio_engine::bootstrap::{build_engine, load_config};
use folio_engine::telemetry::init_tracing;
use folio_engine::{DocumentHash, Engine, MAX_VIEWS, ViewIndex};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    let data_dir = config.data_dir();
    init_tracing(data_dir.as_deref(), &config.log_filter());

    let hashes = env::args()
        .skip(1)
        .map(|arg| DocumentHash::new(arg).context("document hash must not be empty"))
        .collect::<Result<Vec<_>>>()?;
    if hashes.len() > MAX_VIEWS {
        bail!("at most {MAX_VIEWS} documents can be open at once");
    }

    tracing::debug!(documents = hashes.len(), "Starting host");
    let mut engine = build_engine(&config)?;
    engine.load_settings();
    engine.settle().await;

    for (index, hash) in hashes.into_iter().enumerate() {
        engine.open_document(ViewIndex::new(index), hash);
    }
    engine.settle().await;

    print_summary(&engine);
    engine.shutdown().await;
    Ok(())
}

fn print_summary(engine: &Engine) {
    let prefs = &engine.state().settings.preferences;
    println!(
        "theme: {}  question answering: {}",
        prefs.selected_theme,
        if prefs.qa_enabled() { "on" } else { "off" }
    );

    for index in 0..MAX_VIEWS {
        let view = ViewIndex::new(index);
        let Some(slot) = engine.state().view(view) else {
            continue;
        };
        let Some(hash) = &slot.hash else {
            continue;
        };
        match slot.load_error.as_deref() {
            Some(error) => println!("[{view}] {hash}: {error}"),
            None => println!(
                "[{view}] {hash}: {} ({}) {}% {} bookmarks",
                if slot.title.is_empty() { "untitled" } else { slot.title.as_str() },
                slot.load_state,
                slot.position.progress.map_or(0.0, |p| p * 100.0).round(),
                slot.bookmarks.len(),
            ),
        }
    }
}
