//! Durable writes: which changes reach storage, and when.

use std::sync::Arc;
use std::time::Duration;

use folio_core::Action;
use folio_engine::{Engine, EngineOptions, JsonFileStore, PersistenceGateway, QaGateway};
use folio_types::{Locator, ViewIndex};

use crate::common::{Harness, RecordingQa, RecordingStore, hash};

#[tokio::test(start_paused = true)]
async fn each_view_saves_only_its_own_session() {
    let mut h = Harness::new();
    let (a, b) = (hash("alpha"), hash("beta"));
    h.open(ViewIndex::PRIMARY, &a).await;
    h.open(ViewIndex::SECONDARY, &b).await;
    assert!(h.store.saved_sessions().is_empty(), "first reads have no progress");

    h.engine.dispatch(Action::SetPosition {
        view: ViewIndex::PRIMARY,
        locator: Some(Locator::new("epubcfi(/6/4)")),
        progress: Some(0.10),
    });
    h.engine.dispatch(Action::SetPosition {
        view: ViewIndex::SECONDARY,
        locator: Some(Locator::new("epubcfi(/6/12)")),
        progress: Some(0.42),
    });
    h.engine.settle().await;

    let mut saved: Vec<_> = h
        .store
        .saved_sessions()
        .into_iter()
        .map(|(hash, snapshot)| (hash.as_str().to_string(), snapshot.data.progress))
        .collect();
    saved.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(
        saved,
        vec![("alpha".to_string(), 0.10), ("beta".to_string(), 0.42)]
    );
}

#[tokio::test(start_paused = true)]
async fn nothing_is_saved_while_loading() {
    let mut h = Harness::with(RecordingStore::with_held_loads(), RecordingQa::default());
    let view = ViewIndex::PRIMARY;
    assert!(h.engine.open_document(view, hash("dune")));

    h.engine.dispatch(Action::SetPosition {
        view,
        locator: Some(Locator::new("epubcfi(/6/2)")),
        progress: Some(0.3),
    });
    h.engine.dispatch(Action::ToggleBookmark {
        view,
        locator: Locator::new("epubcfi(/6/2)"),
    });
    h.drain().await;
    assert!(h.store.saved_sessions().is_empty());

    h.store.release_loads(1);
    h.engine.settle().await;

    let saved = h.store.saved_sessions();
    assert_eq!(saved.len(), 1, "completion captures the first stable state");
    let (saved_hash, snapshot) = &saved[0];
    assert_eq!(saved_hash, &hash("dune"));
    assert_eq!(snapshot.data.progress, 0.3);
    assert_eq!(snapshot.data.bookmarks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_changes_are_never_persisted() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("dune")).await;

    h.engine.dispatch(Action::ToggleMenu);
    h.engine.dispatch(Action::SetDictionaryWord {
        word: "spice".into(),
    });
    h.engine.dispatch(Action::SetDualReaderMode(true));
    h.engine.bind_excerpt("Fear is the mind-killer");
    h.engine.settle().await;

    assert!(h.store.saved_sessions().is_empty());
    assert!(h.store.saved_settings().is_empty());
    assert!(h.engine.state().settings.ui.dual_reader_mode);
}

#[tokio::test(start_paused = true)]
async fn settings_burst_writes_once_with_latest_state() {
    let mut h = Harness::new();
    for margins in [60, 80, 95] {
        h.engine.dispatch(Action::SetReaderMargins { margins });
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.engine.pump();
    }
    h.engine.dispatch(Action::SelectTheme {
        name: folio_types::DEFAULT_DARK_THEME.to_string(),
    });
    h.engine.settle().await;

    let saved = h.store.saved_settings();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].preferences.reader_margins, 95);
    assert_eq!(
        saved[0].preferences.selected_theme,
        folio_types::DEFAULT_DARK_THEME
    );
}

#[tokio::test(start_paused = true)]
async fn quiet_period_separates_settings_writes() {
    let mut h = Harness::new();
    h.engine.dispatch(Action::SetReaderMargins { margins: 60 });
    h.engine.settle().await;
    h.engine.dispatch(Action::SetReaderMargins { margins: 70 });
    h.engine.settle().await;

    let margins: Vec<u32> = h
        .store
        .saved_settings()
        .iter()
        .map(|s| s.preferences.reader_margins)
        .collect();
    assert_eq!(margins, vec![60, 70]);
}

#[tokio::test(start_paused = true)]
async fn view_writes_are_not_coalesced() {
    let mut h = Harness::new();
    let view = ViewIndex::PRIMARY;
    h.open(view, &hash("dune")).await;

    for progress in [0.1, 0.2, 0.3] {
        h.engine.dispatch(Action::SetPosition {
            view,
            locator: Some(Locator::new(format!("loc-{progress}"))),
            progress: Some(progress),
        });
    }
    h.engine.settle().await;
    let progress: Vec<f64> = h
        .store
        .saved_sessions()
        .iter()
        .map(|(_, snapshot)| snapshot.data.progress)
        .collect();
    assert_eq!(progress, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn position_burst_leaves_latest_position_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let mut engine = Engine::new(
        Arc::clone(&store) as Arc<dyn PersistenceGateway>,
        Arc::new(RecordingQa::default()) as Arc<dyn QaGateway>,
        EngineOptions::default(),
    );
    let view = ViewIndex::PRIMARY;
    let dune = hash("dune");
    assert!(engine.open_document(view, dune.clone()));
    engine.settle().await;

    for i in 1..=50_u32 {
        engine.dispatch(Action::SetPosition {
            view,
            locator: Some(Locator::new(format!("loc-{i}"))),
            progress: Some(f64::from(i) / 50.0),
        });
    }
    engine.settle().await;

    let stored = store
        .load_session(&dune)
        .await
        .expect("load")
        .expect("session on disk");
    assert_eq!(stored.data.progress, 1.0);
    assert_eq!(stored.data.locator, Locator::new("loc-50"));
}

#[tokio::test(start_paused = true)]
async fn rejected_changes_leave_state_and_storage_alone() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("dune")).await;
    let before = h.engine.state().clone();

    assert!(!h.engine.dispatch(Action::SetPosition {
        view: ViewIndex::new(7),
        locator: None,
        progress: Some(0.5),
    }));
    assert!(!h.engine.dispatch(Action::DeleteTheme {
        name: folio_types::DEFAULT_LIGHT_THEME.to_string(),
    }));
    assert!(h.engine.dispatch(Action::RemoveHighlight {
        view: ViewIndex::PRIMARY,
        range: Locator::new("nowhere"),
    }));
    h.engine.settle().await;

    assert_eq!(h.engine.state(), &before);
    assert!(h.store.saved_sessions().is_empty());
    assert!(h.store.saved_settings().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_settings_once() {
    let mut h = Harness::new();
    h.engine.dispatch(Action::SetReaderMargins { margins: 42 });
    h.engine.shutdown().await;

    let saved = h.store.saved_settings();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].preferences.reader_margins, 42);
    assert!(h.engine.is_idle());
}
