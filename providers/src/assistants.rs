//! OpenAI Assistants API client.
//!
//! One assistant per API key, found by name or created on first use. Each QA
//! session gets its own thread seeded with the document's PDF as a
//! `file_search` attachment. Answers come from a run polled to completion.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use folio_types::{
    CapabilityId, CapabilityKey, DocumentHash, FileRef, QaCredentials, ThreadHandle, ThreadId,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::retry::{RetryOutcome, RetryPolicy, send_with_retry};
use crate::{
    QaError, QaFuture, QaGateway, client_builder, extract_error_message, read_capped_error_body,
};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";
const ASSISTANT_LIST_LIMIT: &str = "20";

const ASSISTANT_INSTRUCTIONS: &str = "You are a Novel answering chatbot with access to the books \
in which questions are asked. Use your knowledge base to best respond to the questions.";
const THREAD_PRIMER: &str = "Answer based on the book I have attached";

#[derive(Debug, Clone)]
pub struct AssistantsConfig {
    /// API root, always ending in `/` (e.g. `https://api.openai.com/v1/`).
    pub base_url: Url,
    pub model: String,
    pub assistant_name: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Library root; documents live under `books/<hash>/`.
    pub library_root: PathBuf,
    pub retry: RetryPolicy,
}

impl AssistantsConfig {
    pub fn new(base_url: &str, library_root: impl Into<PathBuf>) -> Result<Self, url::ParseError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/"))?;
        Ok(Self {
            base_url,
            model: "gpt-4-turbo-preview".to_string(),
            assistant_name: "Novel GPT Alexandria".to_string(),
            poll_interval: Duration::from_millis(500),
            max_polls: 120,
            library_root: library_root.into(),
            retry: RetryPolicy::default(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn document_dir(&self, hash: &DocumentHash) -> PathBuf {
        self.library_root.join("books").join(hash.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AssistantObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

enum RunState {
    Pending,
    Completed,
    Ended,
}

fn classify_run(status: &str) -> RunState {
    match status {
        "queued" | "in_progress" | "cancelling" => RunState::Pending,
        "completed" => RunState::Completed,
        _ => RunState::Ended,
    }
}

pub struct AssistantsClient {
    http: reqwest::Client,
    config: AssistantsConfig,
    credentials: RwLock<Option<QaCredentials>>,
}

impl AssistantsClient {
    pub fn new(config: AssistantsConfig) -> Result<Self, reqwest::Error> {
        let https_only = config.base_url.scheme() == "https";
        let http = client_builder(https_only).build()?;
        Ok(Self {
            http,
            config,
            credentials: RwLock::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AssistantsConfig {
        &self.config
    }

    fn credentials(&self) -> Result<QaCredentials, QaError> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|c| !c.capability_id.is_empty() && !c.capability_key.is_empty())
            .ok_or(QaError::NotConfigured)
    }

    async fn send<F>(&self, key: &CapabilityKey, build: F) -> Result<Response, QaError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let outcome = send_with_retry(
            || {
                build(&self.http)
                    .bearer_auth(key.expose())
                    .header(BETA_HEADER, BETA_VALUE)
            },
            &self.config.retry,
        )
        .await;

        match outcome {
            RetryOutcome::Success(response) => Ok(response),
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = extract_error_message(&read_capped_error_body(response).await);
                Err(QaError::Http { status, body })
            }
            RetryOutcome::Transport { attempts, source } => {
                Err(QaError::Transport { attempts, source })
            }
        }
    }

    async fn send_json<T, F>(&self, key: &CapabilityKey, build: F) -> Result<T, QaError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send(key, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| QaError::Decode(e.to_string()))
    }

    async fn delete_resource(&self, key: &CapabilityKey, path: &str) -> Result<(), QaError> {
        let url = self.config.endpoint(path);
        match self.send(key, |http| http.delete(&url)).await {
            Ok(_) => Ok(()),
            Err(QaError::Http { status: 404, .. }) => {
                tracing::debug!(path, "Resource already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn find_or_create_assistant(&self, key: &CapabilityKey) -> Result<String, QaError> {
        if key.is_empty() {
            return Err(QaError::NotConfigured);
        }

        let list_url = self.config.endpoint("assistants");
        let page_url = format!("{list_url}?limit={ASSISTANT_LIST_LIMIT}");
        let page: Page<AssistantObject> = self
            .send_json(key, |http| http.get(&page_url))
            .await?;

        let name = self.config.assistant_name.as_str();
        if let Some(existing) = page
            .data
            .into_iter()
            .find(|a| a.name.as_deref() == Some(name))
        {
            tracing::info!(assistant = %existing.id, "Reusing existing assistant");
            return Ok(existing.id);
        }

        let body = json!({
            "name": name,
            "model": self.config.model,
            "instructions": ASSISTANT_INSTRUCTIONS,
            "tools": [{"type": "file_search"}],
        });
        let created: Created = self
            .send_json(key, |http| http.post(&list_url).json(&body))
            .await?;
        tracing::info!(assistant = %created.id, "Created assistant");
        Ok(created.id)
    }

    async fn locate_pdf(&self, hash: &DocumentHash) -> Result<PathBuf, QaError> {
        let dir = self.config.document_dir(hash);
        let unavailable = || QaError::DocumentUnavailable { hash: hash.clone() };
        let io = |source| QaError::Io {
            path: dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(unavailable()),
            Err(e) => return Err(io(e)),
        };

        let mut pdfs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io)? {
            let path = entry.path();
            if is_pdf(&path) {
                pdfs.push(path);
            }
        }
        pdfs.sort();
        pdfs.into_iter().next().ok_or_else(unavailable)
    }

    async fn upload_document(
        &self,
        key: &CapabilityKey,
        hash: &DocumentHash,
    ) -> Result<String, QaError> {
        let path = self.locate_pdf(hash).await?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| QaError::Io {
            path: path.clone(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| format!("{hash}.pdf"), |n| n.to_string_lossy().into_owned());

        let url = self.config.endpoint("files");
        let uploaded: Created = self
            .send_json(key, |http| {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = Form::new().text("purpose", "assistants").part("file", part);
                http.post(&url).multipart(form)
            })
            .await?;
        tracing::info!(file = %uploaded.id, document = %hash, bytes = bytes.len(), "Uploaded document");
        Ok(uploaded.id)
    }

    async fn open_thread(&self, document: &DocumentHash) -> Result<ThreadHandle, QaError> {
        let credentials = self.credentials()?;
        let key = &credentials.capability_key;
        let file_id = self.upload_document(key, document).await?;

        let body = json!({
            "messages": [{
                "role": "user",
                "content": THREAD_PRIMER,
                "attachments": [{
                    "file_id": file_id,
                    "tools": [{"type": "file_search"}],
                }],
            }],
        });
        let url = self.config.endpoint("threads");
        match self
            .send_json::<Created, _>(key, |http| http.post(&url).json(&body))
            .await
        {
            Ok(thread) => {
                tracing::info!(thread = %thread.id, document = %document, "Thread created");
                Ok(ThreadHandle {
                    thread_id: ThreadId::new(thread.id),
                    file_ref: Some(FileRef::new(file_id)),
                })
            }
            Err(e) => {
                if let Err(cleanup) = self.delete_resource(key, &format!("files/{file_id}")).await {
                    tracing::warn!(file = %file_id, "Failed to remove orphaned upload: {cleanup}");
                }
                Err(e)
            }
        }
    }

    async fn close_thread(&self, thread: &ThreadHandle) -> Result<(), QaError> {
        let credentials = self.credentials()?;
        let key = &credentials.capability_key;

        let thread_result = self
            .delete_resource(key, &format!("threads/{}", thread.thread_id))
            .await;
        let file_result = match &thread.file_ref {
            Some(file) => self.delete_resource(key, &format!("files/{file}")).await,
            None => Ok(()),
        };
        thread_result.and(file_result)
    }

    async fn ask(&self, thread: &ThreadId, excerpt: &str, question: &str) -> Result<String, QaError> {
        let credentials = self.credentials()?;
        let key = &credentials.capability_key;

        let messages_url = self.config.endpoint(&format!("threads/{thread}/messages"));
        let message = json!({
            "role": "user",
            "content": format!("Context: {excerpt}, Question: {question}"),
        });
        self.send(key, |http| http.post(&messages_url).json(&message))
            .await?;

        let runs_url = self.config.endpoint(&format!("threads/{thread}/runs"));
        let run_body = json!({ "assistant_id": credentials.capability_id.as_str() });
        let run: RunObject = self
            .send_json(key, |http| http.post(&runs_url).json(&run_body))
            .await?;
        tracing::debug!(%thread, run = %run.id, "Run started");

        self.await_run(key, thread, run).await?;

        let latest_url = format!("{messages_url}?limit=1&order=desc");
        let latest: Page<MessageObject> = self
            .send_json(key, |http| http.get(&latest_url))
            .await?;
        let answer = latest
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .into_iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } => Some(text.value),
                        ContentPart::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(QaError::EmptyAnswer);
        }
        Ok(answer)
    }

    async fn await_run(
        &self,
        key: &CapabilityKey,
        thread: &ThreadId,
        mut run: RunObject,
    ) -> Result<(), QaError> {
        let run_id = run.id.clone();
        let url = self
            .config
            .endpoint(&format!("threads/{thread}/runs/{run_id}"));

        for poll in 1..=self.config.max_polls {
            match classify_run(&run.status) {
                RunState::Completed => return Ok(()),
                RunState::Ended => {
                    return Err(QaError::RunFailed {
                        run_id,
                        status: run.status,
                    });
                }
                RunState::Pending => {}
            }
            tokio::time::sleep(self.config.poll_interval).await;
            run = self.send_json(key, |http| http.get(&url)).await?;
            tracing::trace!(run = %run_id, poll, status = %run.status, "Polled run");
        }

        match classify_run(&run.status) {
            RunState::Completed => Ok(()),
            RunState::Ended => Err(QaError::RunFailed {
                run_id,
                status: run.status,
            }),
            RunState::Pending => Err(QaError::RunTimedOut {
                run_id,
                polls: self.config.max_polls,
            }),
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

impl QaGateway for AssistantsClient {
    fn set_credentials(&self, credentials: Option<QaCredentials>) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    fn create_assistant<'a>(&'a self, api_key: &'a CapabilityKey) -> QaFuture<'a, QaCredentials> {
        Box::pin(async move {
            let id = self.find_or_create_assistant(api_key).await?;
            Ok(QaCredentials {
                capability_id: CapabilityId::new(id),
                capability_key: api_key.clone(),
            })
        })
    }

    fn delete_assistant<'a>(&'a self, assistant: &'a CapabilityId) -> QaFuture<'a, ()> {
        Box::pin(async move {
            let credentials = self.credentials()?;
            self.delete_resource(&credentials.capability_key, &format!("assistants/{assistant}"))
                .await
        })
    }

    fn create_thread<'a>(&'a self, document: &'a DocumentHash) -> QaFuture<'a, ThreadHandle> {
        Box::pin(self.open_thread(document))
    }

    fn delete_thread<'a>(&'a self, thread: &'a ThreadHandle) -> QaFuture<'a, ()> {
        Box::pin(self.close_thread(thread))
    }

    fn answer_question<'a>(
        &'a self,
        thread: &'a ThreadId,
        excerpt: &'a str,
        question: &'a str,
    ) -> QaFuture<'a, String> {
        Box::pin(self.ask(thread, excerpt, question))
    }
}
