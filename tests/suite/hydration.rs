//! Opening documents and restoring stored state.

use folio_core::Action;
use folio_types::{LoadState, Locator, SettingsSnapshot, ViewIndex};

use crate::common::{
    Harness, QaCall, RecordingQa, RecordingStore, credentials, hash, snapshot,
};

#[tokio::test(start_paused = true)]
async fn stored_session_is_restored_on_open() {
    let mut h = Harness::new();
    let dune = hash("dune");
    let mut stored = snapshot("Dune", 0.42, "epubcfi(/6/14)");
    stored.data.bookmarks.toggle(Locator::new("epubcfi(/6/2)"));
    h.store.seed_session(&dune, stored);

    h.open(ViewIndex::PRIMARY, &dune).await;

    let slot = h.engine.state().view(ViewIndex::PRIMARY).expect("slot");
    assert_eq!(slot.load_state, LoadState::Complete);
    assert_eq!(slot.title, "Dune");
    assert_eq!(slot.position.progress, Some(0.42));
    assert_eq!(slot.position.locator, Some(Locator::new("epubcfi(/6/14)")));
    assert_eq!(slot.bookmarks.len(), 1);

    let saved = h.store.saved_sessions();
    assert_eq!(saved.len(), 1, "completion re-saves the hydrated state");
    assert_eq!(saved[0].1.data.progress, 0.42);
    assert_eq!(saved[0].1.data.bookmarks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn first_read_completes_without_progress() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("new-book")).await;

    let slot = h.engine.state().view(ViewIndex::PRIMARY).expect("slot");
    assert_eq!(slot.load_state, LoadState::Complete);
    assert_eq!(slot.position.progress, None);
    assert!(h.store.saved_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_load_marks_the_view() {
    let mut h = Harness::new();
    let broken = hash("broken");
    h.store.fail_load(&broken);

    h.open(ViewIndex::PRIMARY, &broken).await;

    let slot = h.engine.state().view(ViewIndex::PRIMARY).expect("slot");
    assert_eq!(slot.load_state, LoadState::Error);
    assert!(
        slot.load_error
            .as_deref()
            .is_some_and(|e| e.contains("disk unavailable"))
    );
    assert!(h.store.saved_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_for_closed_view_is_discarded() {
    let mut h = Harness::with(RecordingStore::with_held_loads(), RecordingQa::default());
    let dune = hash("dune");
    h.store.seed_session(&dune, snapshot("Dune", 0.42, "epubcfi(/6/14)"));

    assert!(h.engine.open_document(ViewIndex::PRIMARY, dune));
    assert!(h.engine.close_document(ViewIndex::PRIMARY));
    h.store.release_loads(1);
    h.engine.settle().await;

    let slot = h.engine.state().view(ViewIndex::PRIMARY).expect("slot");
    assert_eq!(slot.load_state, LoadState::Empty);
    assert_eq!(slot.title, "");
    assert!(h.store.saved_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reopened_view_keeps_only_latest_load() {
    let mut h = Harness::with(RecordingStore::with_held_loads(), RecordingQa::default());
    let (first, second) = (hash("first"), hash("second"));
    h.store.seed_session(&first, snapshot("First", 0.1, "a"));
    h.store.seed_session(&second, snapshot("Second", 0.9, "b"));

    assert!(h.engine.open_document(ViewIndex::PRIMARY, first));
    assert!(h.engine.close_document(ViewIndex::PRIMARY));
    assert!(h.engine.open_document(ViewIndex::PRIMARY, second.clone()));
    h.store.release_loads(2);
    h.engine.settle().await;

    let slot = h.engine.state().view(ViewIndex::PRIMARY).expect("slot");
    assert_eq!(slot.hash, Some(second.clone()));
    assert_eq!(slot.title, "Second");
    let saved = h.store.saved_sessions();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, second);
}

#[tokio::test(start_paused = true)]
async fn settings_hydration_does_not_echo_a_write() {
    let mut h = Harness::new();
    let mut stored = SettingsSnapshot::default();
    stored.preferences.reader_margins = 120;
    stored.preferences.selected_theme = folio_types::DEFAULT_DARK_THEME.to_string();
    stored.preferences.qa_capability_id = credentials().capability_id;
    stored.preferences.qa_capability_key = credentials().capability_key;
    h.store.seed_settings(stored);

    h.engine.load_settings();
    h.engine.settle().await;

    let prefs = &h.engine.state().settings.preferences;
    assert_eq!(prefs.reader_margins, 120);
    assert_eq!(prefs.selected_theme, folio_types::DEFAULT_DARK_THEME);
    assert!(prefs.qa_enabled());
    assert!(h.store.saved_settings().is_empty());
    assert_eq!(
        h.qa.calls(),
        vec![QaCall::SetCredentials(Some(credentials().capability_id))]
    );
}

#[tokio::test(start_paused = true)]
async fn hydrated_settings_fall_back_to_default_theme() {
    let mut h = Harness::new();
    let mut stored = SettingsSnapshot::default();
    stored.preferences.selected_theme = "Deleted Theme".to_string();
    h.store.seed_settings(stored);

    h.engine.load_settings();
    h.engine.settle().await;
    assert_eq!(
        h.engine.state().settings.preferences.selected_theme,
        folio_types::DEFAULT_LIGHT_THEME
    );

    h.engine.dispatch(Action::SetReaderMargins { margins: 10 });
    h.engine.settle().await;
    assert_eq!(h.store.saved_settings().len(), 1);
}
