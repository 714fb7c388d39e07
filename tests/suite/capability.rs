//! Enabling and disabling question answering.

use folio_types::{CapabilityId, CapabilityKey, QaStatus, ThreadId, ViewIndex};

use crate::common::{
    ASSISTANT_ID, Harness, QaCall, RecordingQa, RecordingStore, credentials, hash, provider_error,
};

const EXCERPT: &str = "The quick brown fox";
const OTHER_KEY: &str = "sk-other";
const OTHER_ASSISTANT: &str = "asst_sk-other";

#[tokio::test(start_paused = true)]
async fn enabling_stores_credentials_and_saves_settings() {
    let mut h = Harness::new();
    h.enable_qa().await;

    let prefs = &h.engine.state().settings.preferences;
    assert_eq!(prefs.qa_credentials(), Some(credentials()));
    assert!(h.engine.capability_error().is_none());
    assert_eq!(
        h.qa.calls(),
        vec![
            QaCall::CreateAssistant,
            QaCall::SetCredentials(Some(CapabilityId::new(ASSISTANT_ID))),
        ]
    );

    let saved = h.store.saved_settings();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].preferences.qa_capability_id.as_str(), ASSISTANT_ID);
}

#[tokio::test(start_paused = true)]
async fn failed_enable_records_error_and_stays_disabled() {
    let mut h = Harness::new();
    h.qa.fail_next_assistant(provider_error(401));

    h.engine.enable_qa(CapabilityKey::new("sk-wrong"));
    h.engine.settle().await;

    assert!(!h.engine.state().settings.preferences.qa_enabled());
    assert!(
        h.engine
            .capability_error()
            .is_some_and(|e| e.contains("401"))
    );
    assert!(h.store.saved_settings().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabling_tears_down_session_then_drops_credentials() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.engine.bind_excerpt("The quick brown fox");
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);

    assert!(h.engine.disable_qa());
    h.engine.settle().await;

    assert!(!h.engine.state().settings.preferences.qa_enabled());
    assert_eq!(h.engine.qa().status(), QaStatus::Closed);

    let calls = h.qa.calls();
    let deleted_assistant = calls
        .iter()
        .position(|c| *c == QaCall::DeleteAssistant(CapabilityId::new(ASSISTANT_ID)))
        .expect("assistant deleted");
    let deleted_thread = calls
        .iter()
        .position(|c| *c == QaCall::DeleteThread(ThreadId::new("thread_1")))
        .expect("thread deleted");
    let cleared = calls
        .iter()
        .rposition(|c| *c == QaCall::SetCredentials(None))
        .expect("credentials cleared");
    assert!(deleted_assistant < deleted_thread);
    assert!(deleted_thread < cleared, "thread delete still had credentials");

    let saved = h.store.saved_settings();
    let last = saved.last().expect("settings saved");
    assert!(last.preferences.qa_capability_id.is_empty());
    assert!(last.preferences.qa_capability_key.is_empty());
}

#[tokio::test(start_paused = true)]
async fn disable_without_capability_does_nothing() {
    let mut h = Harness::new();
    assert!(!h.engine.disable_qa());
    h.engine.settle().await;
    assert!(h.qa.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enabling_with_bound_excerpt_opens_session() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.engine.bind_excerpt("The quick brown fox");
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Closed);

    h.enable_qa().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn new_key_while_ready_replaces_the_session() {
    let mut h = Harness::new();
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.engine.bind_excerpt(EXCERPT);
    h.engine.settle().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);

    h.engine.enable_qa(CapabilityKey::new(OTHER_KEY));
    h.engine.settle().await;

    assert_eq!(
        h.qa.thread_deletions(),
        vec![(ThreadId::new("thread_1"), Some(CapabilityId::new(ASSISTANT_ID)))],
        "old thread deleted under the assistant that created it"
    );
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(
        h.engine.qa().thread().map(|t| t.thread_id.clone()),
        Some(ThreadId::new("thread_2"))
    );

    let calls = h.qa.calls();
    let deleted = calls
        .iter()
        .position(|c| *c == QaCall::DeleteThread(ThreadId::new("thread_1")))
        .expect("old thread deleted");
    let installed = calls
        .iter()
        .position(|c| *c == QaCall::SetCredentials(Some(CapabilityId::new(OTHER_ASSISTANT))))
        .expect("new credentials installed");
    let reopened = calls
        .iter()
        .rposition(|c| matches!(c, QaCall::CreateThread(_)))
        .expect("session reopened");
    assert!(deleted < installed);
    assert!(installed < reopened);

    let saved = h.store.saved_settings();
    let last = saved.last().expect("settings saved");
    assert_eq!(last.preferences.qa_capability_id.as_str(), OTHER_ASSISTANT);
}

#[tokio::test(start_paused = true)]
async fn new_key_while_creating_deletes_late_thread_with_old_key() {
    let mut h = Harness::with(RecordingStore::default(), RecordingQa::with_held_threads());
    h.open(ViewIndex::PRIMARY, &hash("fables")).await;
    h.enable_qa().await;
    h.engine.bind_excerpt(EXCERPT);
    h.drain().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Creating);

    h.engine.enable_qa(CapabilityKey::new(OTHER_KEY));
    h.drain().await;
    assert_eq!(h.engine.qa().status(), QaStatus::Closed);
    assert_eq!(
        h.qa.count(|c| *c == QaCall::SetCredentials(Some(CapabilityId::new(OTHER_ASSISTANT)))),
        0,
        "new credentials wait for the pending create"
    );

    h.qa.release_threads(2);
    h.engine.settle().await;

    assert_eq!(
        h.qa.thread_deletions(),
        vec![(ThreadId::new("thread_1"), Some(CapabilityId::new(ASSISTANT_ID)))]
    );
    assert_eq!(h.engine.qa().status(), QaStatus::Ready);
    assert_eq!(
        h.engine.qa().thread().map(|t| t.thread_id.clone()),
        Some(ThreadId::new("thread_2"))
    );
}
