//! Question-answering session types.

use std::fmt;

use crate::{CapabilityId, CapabilityKey, FileRef, ThreadId};

/// Credentials for the provider-side assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaCredentials {
    pub capability_id: CapabilityId,
    pub capability_key: CapabilityKey,
}

/// A live provider thread plus the uploaded document it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadHandle {
    pub thread_id: ThreadId,
    pub file_ref: Option<FileRef>,
}

/// Lifecycle of a question-answering session.
///
/// ```text
///            bind               created
///  Closed ────────► Creating ────────► Ready ◄──────┐
///    ▲                 │                 │ submit   │ answered / answer failed
///    │                 │ failed          ▼          │
///    │                 └──────► Failed  Answering ──┘
///    │                      retry │
///    │                            └──► Creating
///    └──── excerpt cleared / capability disabled (from any state)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QaStatus {
    #[default]
    Closed,
    Creating,
    Ready,
    Answering,
    Failed,
}

impl QaStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Answering => "answering",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for QaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatSender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
}

impl ChatMessage {
    pub const USER_PREFIX: &'static str = "User: ";
    pub const BOT_PREFIX: &'static str = "QABot: ";

    #[must_use]
    pub fn user(question: &str) -> Self {
        Self {
            sender: ChatSender::User,
            text: format!("{}{question}", Self::USER_PREFIX),
        }
    }

    #[must_use]
    pub fn bot(answer: &str) -> Self {
        Self {
            sender: ChatSender::Bot,
            text: format!("{}{answer}", Self::BOT_PREFIX),
        }
    }
}
