//! Question-answering provider gateway.
//!
//! - [`QaGateway`] - the contract the engine calls: assistants, threads and
//!   answers
//! - [`assistants`] - an implementation over the OpenAI Assistants API
//! - [`retry`] - backoff and retry policy for every HTTP call
//!
//! Calls return [`QaFuture`]s so the engine can hold the gateway as
//! `Arc<dyn QaGateway>` and swap in a recording double in tests.

pub mod assistants;
pub mod retry;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use folio_types::{CapabilityId, CapabilityKey, DocumentHash, QaCredentials, ThreadHandle, ThreadId};
use serde_json::Value;
use thiserror::Error;

pub use assistants::{AssistantsClient, AssistantsConfig};
pub use folio_types;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

pub type QaFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QaError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("question answering is not configured")]
    NotConfigured,
    #[error("no PDF available to upload for document {hash}")]
    DocumentUnavailable { hash: DocumentHash },
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("run {run_id} ended as {status}")]
    RunFailed { run_id: String, status: String },
    #[error("run {run_id} still running after {polls} polls")]
    RunTimedOut { run_id: String, polls: u32 },
    #[error("assistant returned no text")]
    EmptyAnswer,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl QaError {
    /// Whether a later identical call could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport { .. } | Self::RunTimedOut { .. } => true,
            _ => false,
        }
    }
}

/// Provider calls the engine relies on.
///
/// `create_assistant` uses the key it is given. Every other call uses the
/// credentials most recently installed with `set_credentials` and fails with
/// [`QaError::NotConfigured`] when there are none.
pub trait QaGateway: Send + Sync {
    fn set_credentials(&self, credentials: Option<QaCredentials>);

    /// Finds or creates the reading assistant for `api_key`.
    fn create_assistant<'a>(&'a self, api_key: &'a CapabilityKey) -> QaFuture<'a, QaCredentials>;

    fn delete_assistant<'a>(&'a self, assistant: &'a CapabilityId) -> QaFuture<'a, ()>;

    /// Uploads the document and opens a thread scoped to it.
    fn create_thread<'a>(&'a self, document: &'a DocumentHash) -> QaFuture<'a, ThreadHandle>;

    /// Deletes the thread and its uploaded file. Already-deleted resources
    /// count as success.
    fn delete_thread<'a>(&'a self, thread: &'a ThreadHandle) -> QaFuture<'a, ()>;

    fn answer_question<'a>(
        &'a self,
        thread: &'a ThreadId,
        excerpt: &'a str,
        question: &'a str,
    ) -> QaFuture<'a, String>;
}

/// Client builder shared by gateway implementations.
///
/// HTTPS is enforced for `https` base URLs only, so local test servers work.
pub fn client_builder(https_only: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Reads at most 32 KiB of an error response body.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            return format!("{}...(truncated)", String::from_utf8_lossy(&body));
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Pulls the human-readable message out of a provider error body, falling
/// back to the trimmed raw body.
#[must_use]
pub fn extract_error_message(raw: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(raw.trim()).ok();
    parsed
        .as_ref()
        .and_then(|payload| {
            ["/error/message", "/response/error/message", "/message"]
                .iter()
                .find_map(|pointer| payload.pointer(pointer).and_then(Value::as_str))
        })
        .map_or_else(|| raw.trim().to_string(), ToString::to_string)
}
