//! Shared test utilities and fixtures
//!
//! Recording doubles for both gateways, plus a harness that owns an engine
//! wired to them.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use folio_engine::{
    Engine, EngineOptions, PersistenceError, PersistenceGateway, QaError, QaGateway, StoreFuture,
    folio_providers::QaFuture,
};
use folio_types::{
    Bookmarks, CapabilityId, CapabilityKey, DocumentHash, FileRef, Highlights, Locator,
    QaCredentials, ReaderStyle, SessionData, SessionSnapshot, SettingsSnapshot, ThreadHandle,
    ThreadId, ViewIndex,
};
use tokio::sync::Semaphore;

pub const API_KEY: &str = "sk-test";
pub const ASSISTANT_ID: &str = "asst_folio";

pub fn hash(s: &str) -> DocumentHash {
    DocumentHash::new(s).expect("hash")
}

pub fn snapshot(title: &str, progress: f64, locator: &str) -> SessionSnapshot {
    SessionSnapshot {
        title: title.to_string(),
        author: "Anonymous".to_string(),
        modified: 1_700_000_000_000,
        data: SessionData {
            progress,
            locator: Locator::new(locator),
            bookmarks: Bookmarks::default(),
            highlights: Highlights::default(),
            theme: ReaderStyle::default(),
        },
    }
}

pub fn credentials() -> QaCredentials {
    QaCredentials {
        capability_id: CapabilityId::new(ASSISTANT_ID),
        capability_key: CapabilityKey::new(API_KEY),
    }
}

/// Each key owns its own assistant; [`API_KEY`] owns [`ASSISTANT_ID`].
pub fn assistant_for(api_key: &CapabilityKey) -> CapabilityId {
    if api_key.expose() == API_KEY {
        CapabilityId::new(ASSISTANT_ID)
    } else {
        CapabilityId::new(format!("asst_{}", api_key.expose()))
    }
}

pub fn provider_error(status: u16) -> QaError {
    QaError::Http {
        status,
        body: "upstream unavailable".to_string(),
    }
}

async fn pass(gate: Option<&Semaphore>) {
    if let Some(gate) = gate {
        gate.acquire().await.expect("gate open").forget();
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Default)]
pub struct RecordingStore {
    sessions: Mutex<HashMap<DocumentHash, SessionSnapshot>>,
    failing_loads: Mutex<HashSet<DocumentHash>>,
    settings: Mutex<SettingsSnapshot>,
    saved_sessions: Mutex<Vec<(DocumentHash, SessionSnapshot)>>,
    saved_settings: Mutex<Vec<SettingsSnapshot>>,
    load_gate: Option<Semaphore>,
}

impl RecordingStore {
    /// Loads wait until [`RecordingStore::release_loads`] lets them through.
    pub fn with_held_loads() -> Self {
        Self {
            load_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn seed_session(&self, hash: &DocumentHash, snapshot: SessionSnapshot) {
        self.sessions
            .lock()
            .expect("lock")
            .insert(hash.clone(), snapshot);
    }

    pub fn seed_settings(&self, settings: SettingsSnapshot) {
        *self.settings.lock().expect("lock") = settings;
    }

    pub fn fail_load(&self, hash: &DocumentHash) {
        self.failing_loads.lock().expect("lock").insert(hash.clone());
    }

    pub fn release_loads(&self, n: usize) {
        if let Some(gate) = &self.load_gate {
            gate.add_permits(n);
        }
    }

    pub fn saved_sessions(&self) -> Vec<(DocumentHash, SessionSnapshot)> {
        self.saved_sessions.lock().expect("lock").clone()
    }

    pub fn saved_settings(&self) -> Vec<SettingsSnapshot> {
        self.saved_settings.lock().expect("lock").clone()
    }
}

impl PersistenceGateway for RecordingStore {
    fn save_session<'a>(
        &'a self,
        hash: &'a DocumentHash,
        snapshot: &'a SessionSnapshot,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.saved_sessions
                .lock()
                .expect("lock")
                .push((hash.clone(), snapshot.clone()));
            Ok(())
        })
    }

    fn load_session<'a>(
        &'a self,
        hash: &'a DocumentHash,
    ) -> StoreFuture<'a, Option<SessionSnapshot>> {
        Box::pin(async move {
            pass(self.load_gate.as_ref()).await;
            if self.failing_loads.lock().expect("lock").contains(hash) {
                return Err(PersistenceError::Io {
                    path: PathBuf::from(format!("books/{hash}/{hash}.json")),
                    source: io::Error::other("disk unavailable"),
                });
            }
            Ok(self.sessions.lock().expect("lock").get(hash).cloned())
        })
    }

    fn save_global_settings<'a>(&'a self, settings: &'a SettingsSnapshot) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.saved_settings
                .lock()
                .expect("lock")
                .push(settings.clone());
            Ok(())
        })
    }

    fn load_global_settings(&self) -> StoreFuture<'_, SettingsSnapshot> {
        Box::pin(async move { Ok(self.settings.lock().expect("lock").clone()) })
    }
}

// ============================================================================
// Question answering
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QaCall {
    SetCredentials(Option<CapabilityId>),
    CreateAssistant,
    DeleteAssistant(CapabilityId),
    CreateThread(DocumentHash),
    DeleteThread(ThreadId),
    Answer {
        thread: ThreadId,
        excerpt: String,
        question: String,
    },
}

#[derive(Default)]
pub struct RecordingQa {
    calls: Mutex<Vec<QaCall>>,
    threads_created: AtomicUsize,
    assistant_failures: Mutex<VecDeque<QaError>>,
    thread_failures: Mutex<VecDeque<QaError>>,
    answers: Mutex<VecDeque<Result<String, QaError>>>,
    thread_gate: Option<Semaphore>,
    answer_gate: Option<Semaphore>,
    installed: Mutex<Option<CapabilityId>>,
    thread_deletions: Mutex<Vec<(ThreadId, Option<CapabilityId>)>>,
}

impl RecordingQa {
    pub fn with_held_threads() -> Self {
        Self {
            thread_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn with_held_answers() -> Self {
        Self {
            answer_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn fail_next_assistant(&self, error: QaError) {
        self.assistant_failures.lock().expect("lock").push_back(error);
    }

    pub fn fail_next_thread(&self, error: QaError) {
        self.thread_failures.lock().expect("lock").push_back(error);
    }

    /// Queues an answer result. With nothing queued the answer is `"A fox."`.
    pub fn push_answer(&self, result: Result<String, QaError>) {
        self.answers.lock().expect("lock").push_back(result);
    }

    pub fn release_threads(&self, n: usize) {
        if let Some(gate) = &self.thread_gate {
            gate.add_permits(n);
        }
    }

    pub fn release_answers(&self, n: usize) {
        if let Some(gate) = &self.answer_gate {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> Vec<QaCall> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn count(&self, pred: impl Fn(&QaCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn deleted_threads(&self) -> Vec<ThreadId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                QaCall::DeleteThread(thread) => Some(thread),
                _ => None,
            })
            .collect()
    }

    /// Each deleted thread with the assistant whose credentials were installed
    /// when the delete ran.
    pub fn thread_deletions(&self) -> Vec<(ThreadId, Option<CapabilityId>)> {
        self.thread_deletions.lock().expect("lock").clone()
    }

    fn record(&self, call: QaCall) {
        self.calls.lock().expect("lock").push(call);
    }
}

impl QaGateway for RecordingQa {
    fn set_credentials(&self, credentials: Option<QaCredentials>) {
        let assistant = credentials.map(|c| c.capability_id);
        *self.installed.lock().expect("lock") = assistant.clone();
        self.record(QaCall::SetCredentials(assistant));
    }

    fn create_assistant<'a>(&'a self, api_key: &'a CapabilityKey) -> QaFuture<'a, QaCredentials> {
        Box::pin(async move {
            self.record(QaCall::CreateAssistant);
            if let Some(error) = self.assistant_failures.lock().expect("lock").pop_front() {
                return Err(error);
            }
            Ok(QaCredentials {
                capability_id: assistant_for(api_key),
                capability_key: api_key.clone(),
            })
        })
    }

    fn delete_assistant<'a>(&'a self, assistant: &'a CapabilityId) -> QaFuture<'a, ()> {
        Box::pin(async move {
            self.record(QaCall::DeleteAssistant(assistant.clone()));
            Ok(())
        })
    }

    fn create_thread<'a>(&'a self, document: &'a DocumentHash) -> QaFuture<'a, ThreadHandle> {
        Box::pin(async move {
            self.record(QaCall::CreateThread(document.clone()));
            pass(self.thread_gate.as_ref()).await;
            if let Some(error) = self.thread_failures.lock().expect("lock").pop_front() {
                return Err(error);
            }
            let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(ThreadHandle {
                thread_id: ThreadId::new(format!("thread_{n}")),
                file_ref: Some(FileRef::new(format!("file_{n}"))),
            })
        })
    }

    fn delete_thread<'a>(&'a self, thread: &'a ThreadHandle) -> QaFuture<'a, ()> {
        Box::pin(async move {
            self.record(QaCall::DeleteThread(thread.thread_id.clone()));
            let installed = self.installed.lock().expect("lock").clone();
            self.thread_deletions
                .lock()
                .expect("lock")
                .push((thread.thread_id.clone(), installed));
            Ok(())
        })
    }

    fn answer_question<'a>(
        &'a self,
        thread: &'a ThreadId,
        excerpt: &'a str,
        question: &'a str,
    ) -> QaFuture<'a, String> {
        Box::pin(async move {
            self.record(QaCall::Answer {
                thread: thread.clone(),
                excerpt: excerpt.to_string(),
                question: question.to_string(),
            });
            pass(self.answer_gate.as_ref()).await;
            self.answers
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok("A fox.".to_string()))
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<RecordingStore>,
    pub qa: Arc<RecordingQa>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(RecordingStore::default(), RecordingQa::default())
    }

    pub fn with(store: RecordingStore, qa: RecordingQa) -> Self {
        let store = Arc::new(store);
        let qa = Arc::new(qa);
        let engine = Engine::new(
            Arc::clone(&store) as Arc<dyn PersistenceGateway>,
            Arc::clone(&qa) as Arc<dyn QaGateway>,
            EngineOptions::default(),
        );
        Self { engine, store, qa }
    }

    /// Opens `hash` in `view` and waits for the load to finish.
    pub async fn open(&mut self, view: ViewIndex, hash: &DocumentHash) {
        assert!(self.engine.open_document(view, hash.clone()), "open {hash}");
        self.engine.settle().await;
    }

    pub async fn enable_qa(&mut self) {
        self.engine.enable_qa(CapabilityKey::new(API_KEY));
        self.engine.settle().await;
        assert!(self.engine.state().settings.preferences.qa_enabled());
    }

    /// Lets spawned calls run without waiting for held ones.
    pub async fn drain(&mut self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
            self.engine.pump();
        }
    }
}
