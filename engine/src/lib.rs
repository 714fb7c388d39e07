//! Orchestration engine for Folio.
//!
//! [`Engine`] owns the [`AppState`], runs every action through
//! [`folio_core::step`], and carries out the effects it plans: session saves,
//! the settings debounce, and the question-answering session lifecycle.
//!
//! The engine is driven from a tokio runtime by a single owner. Gateway calls
//! run in spawned tasks and report back as [`EngineEvent`]s, which the owner
//! drains with [`Engine::pump`] or [`Engine::settle`]. No state is shared with
//! those tasks; identifiers they need are cloned at issue time.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

pub mod bootstrap;
pub mod persistence;
pub mod qa;
pub mod sync;
pub mod telemetry;

pub use folio_config::FolioConfig;
pub use folio_core::{Action, AppState, Diagnostic, Effect};
pub use folio_providers::{self, QaError, QaGateway};
pub use folio_types::{
    CapabilityId, CapabilityKey, DocumentHash, MAX_VIEWS, NonEmptyString, QaCredentials, QaStatus,
    SessionSnapshot, SettingsSnapshot, ViewIndex,
};
pub use persistence::{JsonFileStore, PersistenceError, PersistenceGateway, StoreFuture};
pub use qa::{AnswerNotice, QaCompletion, QaController, QaRequest, SubmitRejected};
pub use sync::{SettingsDebouncer, SettingsFlush};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub settings_debounce: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settings_debounce: Duration::from_millis(folio_config::DEFAULT_SETTINGS_DEBOUNCE_MS),
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn from_config(config: &FolioConfig) -> Self {
        Self {
            settings_debounce: config.settings_debounce(),
        }
    }
}

/// Completion of a call the engine issued.
#[derive(Debug)]
pub enum EngineEvent {
    SessionLoaded {
        view: ViewIndex,
        epoch: u64,
        hash: DocumentHash,
        result: Result<Option<SessionSnapshot>, PersistenceError>,
    },
    SessionSaved {
        view: ViewIndex,
        hash: DocumentHash,
        result: Result<(), PersistenceError>,
    },
    SettingsLoaded(Result<SettingsSnapshot, PersistenceError>),
    SettingsSaved(SettingsFlush),
    Qa(QaCompletion),
    CapabilityCreated(Result<QaCredentials, QaError>),
    CapabilityDeleted {
        assistant: CapabilityId,
        result: Result<(), QaError>,
    },
}

pub struct Engine {
    state: AppState,
    store: Arc<dyn PersistenceGateway>,
    gateway: Arc<dyn QaGateway>,
    qa: QaController,
    debouncer: SettingsDebouncer,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    /// Bumped on every open and close so late loads for a slot are ignored.
    load_epochs: [u64; MAX_VIEWS],
    /// Spawned calls whose event has not been handled yet.
    outstanding: usize,
    /// Subset of `outstanding` that talks to the QA provider.
    qa_in_flight: usize,
    /// One save per document runs at a time. A key is present while a save
    /// for that hash is in flight; its queue holds the saves waiting behind it.
    session_writes: HashMap<DocumentHash, VecDeque<(ViewIndex, SessionSnapshot)>>,
    /// Replacement credentials held back until calls made under the current
    /// ones have finished.
    deferred_credentials: Option<QaCredentials>,
    capability_error: Option<String>,
}

impl Engine {
    #[must_use]
    pub fn new(
        store: Arc<dyn PersistenceGateway>,
        gateway: Arc<dyn QaGateway>,
        options: EngineOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: AppState::default(),
            store,
            gateway,
            qa: QaController::default(),
            debouncer: SettingsDebouncer::new(options.settings_debounce),
            events_tx,
            events_rx,
            load_epochs: [0; MAX_VIEWS],
            outstanding: 0,
            qa_in_flight: 0,
            session_writes: HashMap::new(),
            deferred_credentials: None,
            capability_error: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub fn qa(&self) -> &QaController {
        &self.qa
    }

    /// Why the last enable or disable of question answering failed.
    #[must_use]
    pub fn capability_error(&self) -> Option<&str> {
        self.capability_error.as_deref()
    }

    /// Whether every issued call has reported back.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.outstanding == 0
    }

    /// Applies `action` and runs its effects. Returns `false` when the action
    /// was rejected and the state is unchanged.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let modified_at = Utc::now().timestamp_millis();
        let step = folio_core::step(&self.state, &action, modified_at);

        let mut accepted = true;
        for diagnostic in &step.diagnostics {
            accepted &= !is_rejection(diagnostic);
            log_diagnostic(diagnostic);
        }

        self.state = step.state;
        for effect in step.effects {
            self.run_effect(effect);
        }
        accepted
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Starts loading `hash` into `view` and hydrates it from storage.
    pub fn open_document(&mut self, view: ViewIndex, hash: DocumentHash) -> bool {
        if !self.dispatch(Action::BeginLoad {
            view,
            hash: hash.clone(),
        }) {
            return false;
        }
        let Some(epoch) = self.bump_load_epoch(view) else {
            return false;
        };

        tracing::debug!(%view, %hash, epoch, "Loading session");
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.load_session(&hash).await;
            EngineEvent::SessionLoaded {
                view,
                epoch,
                hash,
                result,
            }
        });
        true
    }

    pub fn close_document(&mut self, view: ViewIndex) -> bool {
        self.bump_load_epoch(view);
        self.dispatch(Action::ResetView { view })
    }

    /// Reads stored preferences and themes in the background.
    pub fn load_settings(&mut self) {
        let store = Arc::clone(&self.store);
        self.spawn(async move { EngineEvent::SettingsLoaded(store.load_global_settings().await) });
    }

    // ------------------------------------------------------------------
    // Question answering
    // ------------------------------------------------------------------

    /// Finds or creates the assistant for `api_key` and stores its credentials.
    pub fn enable_qa(&mut self, api_key: CapabilityKey) {
        self.capability_error = None;
        let gateway = Arc::clone(&self.gateway);
        self.qa_in_flight += 1;
        self.spawn(async move {
            EngineEvent::CapabilityCreated(gateway.create_assistant(&api_key).await)
        });
    }

    /// Deletes the assistant. Returns `false` when none is configured.
    pub fn disable_qa(&mut self) -> bool {
        let Some(credentials) = self.state.settings.preferences.qa_credentials() else {
            return false;
        };
        self.capability_error = None;
        let gateway = Arc::clone(&self.gateway);
        let assistant = credentials.capability_id;
        self.qa_in_flight += 1;
        self.spawn(async move {
            let result = gateway.delete_assistant(&assistant).await;
            EngineEvent::CapabilityDeleted { assistant, result }
        });
        true
    }

    pub fn bind_excerpt(&mut self, text: impl Into<String>) -> bool {
        self.dispatch(Action::BindExcerpt { text: text.into() })
    }

    pub fn clear_excerpt(&mut self) -> bool {
        self.dispatch(Action::ClearExcerpt)
    }

    pub fn submit_question(&mut self, question: &str) -> Result<(), SubmitRejected> {
        let request = self.qa.submit(question)?;
        self.issue(request);
        Ok(())
    }

    /// Retries the failed thread creation or the question named by the notice.
    pub fn retry_qa(&mut self) -> bool {
        match self.qa.retry() {
            Some(request) => {
                self.issue(request);
                true
            }
            None => false,
        }
    }

    pub fn dismiss_qa_notice(&mut self) {
        self.qa.dismiss_notice();
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Handles every event that is already available. Never waits.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handles events until no issued call is outstanding, including calls
    /// issued while handling.
    pub async fn settle(&mut self) {
        while self.outstanding > 0 {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle_event(event);
        }
    }

    /// Writes a pending settings save now, closes the QA session, and waits
    /// for everything in flight.
    pub async fn shutdown(&mut self) {
        if let Some(snapshot) = self.debouncer.flush() {
            tracing::debug!("Flushing pending settings save");
            if let Err(e) = self.store.save_global_settings(&snapshot).await {
                tracing::warn!("Failed to save settings on shutdown: {e}");
            }
        }
        if let Some(request) = self.qa.teardown() {
            self.issue(request);
        }
        self.settle().await;
        tracing::info!("Engine shut down");
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = EngineEvent> + Send + 'static,
    {
        self.outstanding += 1;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            // The receiver lives as long as the engine.
            let _ = events.send(work.await);
        });
    }

    fn handle_event(&mut self, event: EngineEvent) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match event {
            EngineEvent::SessionLoaded {
                view,
                epoch,
                hash,
                result,
            } => self.on_session_loaded(view, epoch, &hash, result),
            EngineEvent::SessionSaved { view, hash, result } => {
                match result {
                    Ok(()) => tracing::debug!(%view, %hash, "Session saved"),
                    Err(e) => tracing::warn!(%view, %hash, "Failed to save session: {e}"),
                }
                self.next_session_write(hash);
            }
            EngineEvent::SettingsLoaded(Ok(snapshot)) => {
                tracing::debug!(themes = snapshot.themes.len(), "Settings loaded");
                self.dispatch(Action::LoadSettings { snapshot });
            }
            EngineEvent::SettingsLoaded(Err(e)) => {
                tracing::warn!("Failed to load settings, keeping defaults: {e}");
            }
            EngineEvent::SettingsSaved(flush) => {
                self.debouncer.complete(flush.generation);
                match flush.result {
                    None => tracing::trace!(generation = flush.generation, "Settings save superseded"),
                    Some(Ok(())) => tracing::debug!(generation = flush.generation, "Settings saved"),
                    Some(Err(e)) => tracing::warn!(
                        generation = flush.generation,
                        "Failed to save settings: {e}"
                    ),
                }
            }
            EngineEvent::Qa(completion) => {
                self.qa_in_flight = self.qa_in_flight.saturating_sub(1);
                if let Some(request) = self.qa.on_completion(completion) {
                    self.issue(request);
                }
                self.sync_credentials();
            }
            EngineEvent::CapabilityCreated(result) => {
                self.qa_in_flight = self.qa_in_flight.saturating_sub(1);
                match result {
                    Ok(credentials) => {
                        tracing::info!(assistant = %credentials.capability_id, "Question answering enabled");
                        self.dispatch(Action::SetQaCapability { credentials });
                    }
                    Err(e) => {
                        tracing::warn!("Failed to enable question answering: {e}");
                        self.capability_error = Some(e.to_string());
                        self.dispatch(Action::ClearQaCapability);
                    }
                }
                self.sync_credentials();
            }
            EngineEvent::CapabilityDeleted { assistant, result } => {
                self.qa_in_flight = self.qa_in_flight.saturating_sub(1);
                match result {
                    Ok(()) => {
                        tracing::info!(%assistant, "Question answering disabled");
                        self.dispatch(Action::ClearQaCapability);
                    }
                    Err(e) => {
                        tracing::warn!(%assistant, "Failed to delete assistant: {e}");
                        self.capability_error = Some(e.to_string());
                    }
                }
                self.sync_credentials();
            }
        }
    }

    fn on_session_loaded(
        &mut self,
        view: ViewIndex,
        epoch: u64,
        hash: &DocumentHash,
        result: Result<Option<SessionSnapshot>, PersistenceError>,
    ) {
        if self.load_epochs.get(view.index()) != Some(&epoch) {
            tracing::debug!(%view, %hash, epoch, "Discarding load for a reset or reopened view");
            return;
        }
        match result {
            Ok(Some(snapshot)) => {
                tracing::debug!(%view, %hash, progress = snapshot.data.progress, "Hydrating session");
                self.dispatch(Action::HydrateSession { view, snapshot });
                self.dispatch(Action::CompleteLoad { view });
            }
            Ok(None) => {
                tracing::debug!(%view, %hash, "First read, nothing to hydrate");
                self.dispatch(Action::CompleteLoad { view });
            }
            Err(e) => {
                tracing::warn!(%view, %hash, "Failed to load session: {e}");
                self.dispatch(Action::FailLoad {
                    view,
                    reason: e.to_string(),
                });
            }
        }
        self.open_qa_if_bound();
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::SaveSession {
                view,
                hash,
                snapshot,
            } => {
                if let Some(waiting) = self.session_writes.get_mut(&hash) {
                    tracing::trace!(%view, %hash, queued = waiting.len() + 1, "Session save queued");
                    waiting.push_back((view, snapshot));
                } else {
                    self.session_writes.insert(hash.clone(), VecDeque::new());
                    self.write_session(view, hash, snapshot);
                }
            }
            Effect::ScheduleSettingsSave(snapshot) => {
                let flush = self.debouncer.schedule(snapshot, Arc::clone(&self.store));
                self.spawn(async move { EngineEvent::SettingsSaved(flush.await) });
            }
            Effect::ExcerptChanged(Some(excerpt)) => {
                if !self.state.settings.preferences.qa_enabled() {
                    tracing::debug!("Excerpt bound while question answering is disabled");
                    return;
                }
                if self.deferred_credentials.is_some() {
                    tracing::debug!("Excerpt held until replacement credentials are installed");
                    return;
                }
                let document = self.state.qa_document().cloned();
                if let Some(request) = self.qa.bind(excerpt, document.as_ref()) {
                    self.issue(request);
                }
            }
            Effect::ExcerptChanged(None) => self.teardown_qa(),
            Effect::CapabilityChanged(Some(credentials)) => {
                if self.qa.status() == QaStatus::Closed && self.qa_in_flight == 0 {
                    self.gateway.set_credentials(Some(credentials));
                    self.open_qa_if_bound();
                    return;
                }
                // The live thread belongs to the previous assistant and must be
                // deleted with the credentials that created it.
                tracing::info!(
                    assistant = %credentials.capability_id,
                    "Assistant changed, closing the current session first"
                );
                self.deferred_credentials = Some(credentials);
                self.teardown_qa();
                self.sync_credentials();
            }
            Effect::CapabilityChanged(None) => {
                self.deferred_credentials = None;
                self.teardown_qa();
                self.sync_credentials();
            }
        }
    }

    /// Opens a session for an excerpt that was bound before a document or
    /// the capability was ready.
    fn open_qa_if_bound(&mut self) {
        if !self.state.settings.preferences.qa_enabled()
            || self.qa.status() != QaStatus::Closed
            || self.deferred_credentials.is_some()
        {
            return;
        }
        let Some(excerpt) = self
            .state
            .bound_excerpt()
            .and_then(|text| NonEmptyString::new(text).ok())
        else {
            return;
        };
        let document = self.state.qa_document().cloned();
        if let Some(request) = self.qa.bind(excerpt, document.as_ref()) {
            self.issue(request);
        }
    }

    fn teardown_qa(&mut self) {
        if let Some(request) = self.qa.teardown() {
            self.issue(request);
        }
    }

    /// Brings the gateway credentials in line with the preferences once no
    /// call that still needs the installed ones is running.
    fn sync_credentials(&mut self) {
        if self.qa_in_flight > 0 {
            return;
        }
        if let Some(credentials) = self.deferred_credentials.take() {
            tracing::debug!(assistant = %credentials.capability_id, "Installing replacement credentials");
            self.gateway.set_credentials(Some(credentials));
            self.open_qa_if_bound();
        } else if !self.state.settings.preferences.qa_enabled() {
            self.gateway.set_credentials(None);
        }
    }

    fn write_session(&mut self, view: ViewIndex, hash: DocumentHash, snapshot: SessionSnapshot) {
        tracing::debug!(%view, %hash, progress = snapshot.data.progress, "Saving session");
        let store = Arc::clone(&self.store);
        self.spawn(async move {
            let result = store.save_session(&hash, &snapshot).await;
            EngineEvent::SessionSaved { view, hash, result }
        });
    }

    /// Starts the save queued behind the one for `hash` that just finished.
    fn next_session_write(&mut self, hash: DocumentHash) {
        let next = match self.session_writes.get_mut(&hash) {
            Some(waiting) => waiting.pop_front(),
            None => return,
        };
        match next {
            Some((view, snapshot)) => self.write_session(view, hash, snapshot),
            None => {
                self.session_writes.remove(&hash);
            }
        }
    }

    fn issue(&mut self, request: QaRequest) {
        let gateway = Arc::clone(&self.gateway);
        self.qa_in_flight += 1;
        match request {
            QaRequest::CreateThread { epoch, document } => {
                tracing::debug!(epoch, %document, "Creating thread");
                self.spawn(async move {
                    let result = gateway.create_thread(&document).await;
                    EngineEvent::Qa(QaCompletion::ThreadCreated { epoch, result })
                });
            }
            QaRequest::Answer {
                epoch,
                thread,
                excerpt,
                question,
            } => {
                tracing::debug!(epoch, %thread, "Asking question");
                self.spawn(async move {
                    let result = gateway.answer_question(&thread, &excerpt, &question).await;
                    EngineEvent::Qa(QaCompletion::Answered {
                        epoch,
                        question,
                        result,
                    })
                });
            }
            QaRequest::DeleteThread { thread } => {
                tracing::debug!(thread = %thread.thread_id, "Deleting thread");
                self.spawn(async move {
                    let result = gateway.delete_thread(&thread).await;
                    EngineEvent::Qa(QaCompletion::ThreadDeleted { thread, result })
                });
            }
        }
    }

    fn bump_load_epoch(&mut self, view: ViewIndex) -> Option<u64> {
        let epoch = self.load_epochs.get_mut(view.index())?;
        *epoch += 1;
        Some(*epoch)
    }
}

fn is_rejection(diagnostic: &Diagnostic) -> bool {
    matches!(
        diagnostic,
        Diagnostic::Malformed(_)
            | Diagnostic::IllegalLoadTransition { .. }
            | Diagnostic::Rejected { .. }
    )
}

fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::NotDurable { kind } => {
            tracing::warn!(%kind, "Change is outside the durable allow-list, not persisted");
        }
        Diagnostic::Deferred { kind, view, reason } => {
            tracing::debug!(%kind, %view, "Save skipped: {reason}");
        }
        Diagnostic::Malformed(e) => tracing::warn!("Malformed change: {e}"),
        Diagnostic::IllegalLoadTransition { view, from, edge } => {
            tracing::warn!(%view, %from, %edge, "Illegal load transition ignored");
        }
        Diagnostic::Rejected { kind, reason } => {
            tracing::warn!(%kind, "Change rejected: {reason}");
        }
    }
}
