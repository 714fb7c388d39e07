//! Question-answering session controller.
//!
//! Owns the thread handle, the bound excerpt and the chat history of the one
//! live session. It performs no IO: every method returns the [`QaRequest`]
//! the engine must issue, and provider results come back through
//! [`QaController::on_completion`].
//!
//! Each session has an epoch. Requests carry the epoch current when they were
//! issued and completions with any other epoch are stale. A stale thread
//! creation that succeeded is answered with a delete so the thread does not
//! outlive its session.

use folio_providers::QaError;
use folio_types::{ChatMessage, DocumentHash, NonEmptyString, QaStatus, ThreadHandle, ThreadId};
use thiserror::Error;

/// Provider call the engine must run for the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QaRequest {
    CreateThread {
        epoch: u64,
        document: DocumentHash,
    },
    Answer {
        epoch: u64,
        thread: ThreadId,
        excerpt: String,
        question: String,
    },
    DeleteThread {
        thread: ThreadHandle,
    },
}

/// Result of a [`QaRequest`], fed back into the controller.
#[derive(Debug)]
pub enum QaCompletion {
    ThreadCreated {
        epoch: u64,
        result: Result<ThreadHandle, QaError>,
    },
    Answered {
        epoch: u64,
        question: String,
        result: Result<String, QaError>,
    },
    ThreadDeleted {
        thread: ThreadHandle,
        result: Result<(), QaError>,
    },
}

/// Inline, dismissible report of a failed answer. The question can be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerNotice {
    pub question: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error("question answering is {0}, not ready")]
    NotReady(QaStatus),
    #[error("question is empty")]
    EmptyQuestion,
}

#[derive(Debug, Default)]
pub struct QaController {
    status: QaStatus,
    epoch: u64,
    document: Option<DocumentHash>,
    excerpt: Option<NonEmptyString>,
    thread: Option<ThreadHandle>,
    messages: Vec<ChatMessage>,
    notice: Option<AnswerNotice>,
    last_error: Option<String>,
}

impl QaController {
    #[must_use]
    pub fn status(&self) -> QaStatus {
        self.status
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn thread(&self) -> Option<&ThreadHandle> {
        self.thread.as_ref()
    }

    #[must_use]
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_ref().map(NonEmptyString::as_str)
    }

    #[must_use]
    pub fn notice(&self) -> Option<&AnswerNotice> {
        self.notice.as_ref()
    }

    /// Why the last thread creation failed, while in `Failed`.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Binds `excerpt`. Opens a session when closed and a document is
    /// available; otherwise only the excerpt is replaced.
    pub fn bind(
        &mut self,
        excerpt: NonEmptyString,
        document: Option<&DocumentHash>,
    ) -> Option<QaRequest> {
        self.excerpt = Some(excerpt);
        if self.status != QaStatus::Closed {
            tracing::debug!(status = %self.status, "Excerpt rebound to live session");
            return None;
        }
        let Some(document) = document else {
            tracing::debug!("Excerpt bound with no loaded document; session stays closed");
            return None;
        };

        self.document = Some(document.clone());
        self.status = QaStatus::Creating;
        tracing::info!(epoch = self.epoch, %document, "Opening QA session");
        Some(QaRequest::CreateThread {
            epoch: self.epoch,
            document: document.clone(),
        })
    }

    /// Closes the session from any state. In-flight results become stale and
    /// the held thread, if any, is returned for deletion.
    pub fn teardown(&mut self) -> Option<QaRequest> {
        let thread = self.thread.take();
        let was = self.status;
        self.epoch += 1;
        self.status = QaStatus::Closed;
        self.document = None;
        self.excerpt = None;
        self.messages.clear();
        self.notice = None;
        self.last_error = None;

        if was != QaStatus::Closed {
            tracing::info!(from = %was, epoch = self.epoch, "QA session closed");
        }
        thread.map(|thread| QaRequest::DeleteThread { thread })
    }

    /// Appends the question and asks it. Only accepted while `Ready`.
    pub fn submit(&mut self, question: &str) -> Result<QaRequest, SubmitRejected> {
        if self.status != QaStatus::Ready {
            return Err(SubmitRejected::NotReady(self.status));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitRejected::EmptyQuestion);
        }
        let request = self
            .answer_request(question)
            .ok_or(SubmitRejected::NotReady(self.status))?;

        self.messages.push(ChatMessage::user(question));
        self.notice = None;
        self.status = QaStatus::Answering;
        Ok(request)
    }

    /// Re-issues whatever failed last: thread creation from `Failed`, or the
    /// question named by the answer notice.
    pub fn retry(&mut self) -> Option<QaRequest> {
        match self.status {
            QaStatus::Failed => {
                let document = self.document.clone()?;
                self.status = QaStatus::Creating;
                self.last_error = None;
                tracing::info!(epoch = self.epoch, "Retrying thread creation");
                Some(QaRequest::CreateThread {
                    epoch: self.epoch,
                    document,
                })
            }
            QaStatus::Ready => {
                let question = self.notice.as_ref()?.question.clone();
                let request = self.answer_request(&question)?;
                self.notice = None;
                self.status = QaStatus::Answering;
                Some(request)
            }
            _ => None,
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Applies a provider result and returns any follow-up request.
    pub fn on_completion(&mut self, completion: QaCompletion) -> Option<QaRequest> {
        match completion {
            QaCompletion::ThreadCreated { epoch, result } => {
                if epoch != self.epoch || self.status != QaStatus::Creating {
                    return match result {
                        Ok(thread) => {
                            tracing::info!(
                                thread = %thread.thread_id,
                                epoch,
                                "Discarding thread created for a closed session"
                            );
                            Some(QaRequest::DeleteThread { thread })
                        }
                        Err(e) => {
                            tracing::debug!(epoch, "Ignoring stale thread failure: {e}");
                            None
                        }
                    };
                }
                match result {
                    Ok(thread) => {
                        tracing::info!(thread = %thread.thread_id, epoch, "QA session ready");
                        self.thread = Some(thread);
                        self.status = QaStatus::Ready;
                    }
                    Err(e) => {
                        tracing::warn!(epoch, "Thread creation failed: {e}");
                        self.last_error = Some(e.to_string());
                        self.status = QaStatus::Failed;
                    }
                }
                None
            }
            QaCompletion::Answered {
                epoch,
                question,
                result,
            } => {
                if epoch != self.epoch || self.status != QaStatus::Answering {
                    tracing::debug!(epoch, "Ignoring stale answer");
                    return None;
                }
                match result {
                    Ok(answer) => self.messages.push(ChatMessage::bot(answer.trim())),
                    Err(e) => {
                        tracing::warn!(epoch, "Answer failed: {e}");
                        self.notice = Some(AnswerNotice {
                            question,
                            message: e.to_string(),
                        });
                    }
                }
                self.status = QaStatus::Ready;
                None
            }
            QaCompletion::ThreadDeleted { thread, result } => {
                match result {
                    Ok(()) => tracing::debug!(thread = %thread.thread_id, "Thread deleted"),
                    Err(e) => tracing::warn!(
                        thread = %thread.thread_id,
                        "Failed to delete thread, it may be orphaned: {e}"
                    ),
                }
                None
            }
        }
    }

    fn answer_request(&self, question: &str) -> Option<QaRequest> {
        let thread = self.thread.as_ref()?;
        let excerpt = self.excerpt.as_ref()?;
        Some(QaRequest::Answer {
            epoch: self.epoch,
            thread: thread.thread_id.clone(),
            excerpt: excerpt.as_str().to_string(),
            question: question.to_string(),
        })
    }
}
