//! Trailing debounce for global settings writes.
//!
//! Every qualifying change reschedules a single pending write of the latest
//! snapshot. Rescheduling aborts the previous timer; a timer that already fired
//! has issued its save and is left to finish.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use folio_types::SettingsSnapshot;
use futures_util::future::{AbortHandle, Abortable};

use crate::persistence::{PersistenceError, PersistenceGateway};

/// Outcome of one scheduled write. `result` is `None` when the timer was
/// superseded before it fired.
#[derive(Debug)]
pub struct SettingsFlush {
    pub generation: u64,
    pub result: Option<Result<(), PersistenceError>>,
}

#[derive(Debug)]
struct PendingSave {
    generation: u64,
    abort: AbortHandle,
    fired: Arc<AtomicBool>,
    snapshot: SettingsSnapshot,
}

#[derive(Debug)]
pub struct SettingsDebouncer {
    window: Duration,
    generation: u64,
    pending: Option<PendingSave>,
}

impl SettingsDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            generation: 0,
            pending: None,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a timer is waiting to write.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| !p.fired.load(Ordering::Acquire))
    }

    /// Restarts the window with `snapshot`. The returned future must be
    /// spawned; it resolves once the write ran or the timer was superseded.
    pub fn schedule(
        &mut self,
        snapshot: SettingsSnapshot,
        store: Arc<dyn PersistenceGateway>,
    ) -> impl Future<Output = SettingsFlush> + Send + 'static {
        if let Some(previous) = self.pending.take() {
            previous.abort.abort();
        }

        self.generation += 1;
        let generation = self.generation;
        let (abort, registration) = AbortHandle::new_pair();
        let fired = Arc::new(AtomicBool::new(false));
        self.pending = Some(PendingSave {
            generation,
            abort,
            fired: Arc::clone(&fired),
            snapshot: snapshot.clone(),
        });

        let window = self.window;
        async move {
            if Abortable::new(tokio::time::sleep(window), registration)
                .await
                .is_err()
            {
                return SettingsFlush {
                    generation,
                    result: None,
                };
            }
            fired.store(true, Ordering::Release);
            let result = store.save_global_settings(&snapshot).await;
            SettingsFlush {
                generation,
                result: Some(result),
            }
        }
    }

    /// Forgets the pending write if `generation` is still the latest.
    pub fn complete(&mut self, generation: u64) {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
        {
            self.pending = None;
        }
    }

    /// Cancels the timer and hands back the snapshot it would have written.
    /// Returns `None` when nothing is waiting or the write already started.
    pub fn flush(&mut self) -> Option<SettingsSnapshot> {
        let pending = self.pending.take()?;
        pending.abort.abort();
        if pending.fired.load(Ordering::Acquire) {
            return None;
        }
        Some(pending.snapshot)
    }
}
