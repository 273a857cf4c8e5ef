//! REST client for the task backend.
//!
//! Every call is a single request/response. Non-2xx replies become
//! [`ClientError::Status`] carrying the backend's own message when it sent one.

use crate::model::{ApiStatus, SavedTask, TaskSession, ThoughtEntry, UiSnapshot, UploadedFile};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Attachments above this size are refused before any request is made.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("attachment {path}: {reason}")]
    Attachment { path: String, reason: String },
    #[error("invalid backend url {0:?}")]
    BaseUrl(String),
}

impl ClientError {
    fn attachment(path: &Path, reason: impl Into<String>) -> Self {
        ClientError::Attachment {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Deserialize)]
struct SavedTaskList {
    #[serde(default)]
    tasks: Vec<SavedTask>,
}

#[derive(Deserialize)]
struct SavedTaskEnvelope {
    task: Option<SavedTask>,
}

#[derive(Clone)]
pub struct TaskClient {
    base_url: String,
    client: Client,
}

impl TaskClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let parsed =
            url::Url::parse(base_url).map_err(|_| ClientError::BaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::BaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn send_message(
        &self,
        message: &str,
        attachment: Option<&Path>,
    ) -> ClientResult<UiSnapshot> {
        let file = match attachment {
            Some(path) => Some(self.upload_file(path).await?),
            None => None,
        };
        let body = json!({ "message": message, "file": file });
        self.execute(self.client.post(self.url("/send_message")).json(&body))
            .await
    }

    /// Open a new task. Without a name the backend gets `Task <unix millis>`.
    pub async fn new_task(&self, name: Option<&str>) -> ClientResult<UiSnapshot> {
        let task_name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => default_task_name(),
        };
        let body = json!({ "task_name": task_name });
        self.execute(self.client.post(self.url("/new_task")).json(&body))
            .await
    }

    pub async fn stop_task(&self) -> ClientResult<UiSnapshot> {
        self.execute(self.client.post(self.url("/stop_task"))).await
    }

    pub async fn continue_task(&self) -> ClientResult<UiSnapshot> {
        self.execute(self.client.post(self.url("/continue_task")))
            .await
    }

    /// Poll the server state, asking only for thoughts newer than `last_thought`.
    pub async fn get_ui_state(&self, last_thought: &str) -> ClientResult<UiSnapshot> {
        let req = self
            .client
            .get(self.url("/get_ui_state"))
            .query(&[("last_thought", last_thought)]);
        self.execute(req).await
    }

    pub async fn get_task(&self, task_id: &str) -> ClientResult<TaskSession> {
        let path = format!("/tasks/{}", urlencoding::encode(task_id));
        let value: serde_json::Value = self.execute(self.client.get(self.url(&path))).await?;
        if !value
            .get("conversation_history")
            .is_some_and(|h| h.is_array())
        {
            return Err(ClientError::Malformed(
                "task state has no conversation history".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    pub async fn resume_task(&self, task_id: &str) -> ClientResult<UiSnapshot> {
        let path = format!("/tasks/resume/{}", urlencoding::encode(task_id));
        self.execute(self.client.post(self.url(&path))).await
    }

    pub async fn task_history(&self) -> ClientResult<Vec<TaskSession>> {
        self.execute(self.client.get(self.url("/tasks/history")))
            .await
    }

    pub async fn task_thoughts(&self, task_id: &str) -> ClientResult<Vec<ThoughtEntry>> {
        let path = format!("/tasks/thoughts/{}", urlencoding::encode(task_id));
        self.execute(self.client.get(self.url(&path))).await
    }

    pub async fn list_saved_tasks(&self) -> ClientResult<Vec<SavedTask>> {
        let list: SavedTaskList = self
            .execute(self.client.get(self.url("/tasks/list")))
            .await?;
        Ok(list.tasks)
    }

    pub async fn retrieve_saved_task(&self, id: &str) -> ClientResult<SavedTask> {
        let path = format!("/tasks/retrieve/{}", urlencoding::encode(id));
        let envelope: SavedTaskEnvelope = self.execute(self.client.get(self.url(&path))).await?;
        envelope
            .task
            .ok_or_else(|| ClientError::Malformed("Task not found".to_string()))
    }

    pub async fn save_task(&self, name: &str, plan: &str) -> ClientResult<ApiStatus> {
        let body = json!({ "name": name, "plan": plan });
        self.execute(self.client.post(self.url("/tasks/save")).json(&body))
            .await
    }

    pub async fn update_task(&self, name: &str, plan: &str) -> ClientResult<ApiStatus> {
        let body = json!({ "name": name, "plan": plan });
        self.execute(self.client.post(self.url("/tasks/update")).json(&body))
            .await
    }

    pub async fn delete_task(&self, name: &str) -> ClientResult<ApiStatus> {
        let body = json!({ "name": name });
        self.execute(self.client.post(self.url("/tasks/delete")).json(&body))
            .await
    }

    pub async fn update_api_key(&self, api_key: &str) -> ClientResult<ApiStatus> {
        let body = json!({ "api_key": api_key });
        self.execute(self.client.post(self.url("/update_api_key")).json(&body))
            .await
    }

    pub async fn upload_file(&self, path: &Path) -> ClientResult<UploadedFile> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ClientError::attachment(path, e.to_string()))?;
        if !meta.is_file() {
            return Err(ClientError::attachment(path, "not a regular file"));
        }
        if meta.len() > MAX_ATTACHMENT_BYTES {
            return Err(ClientError::attachment(
                path,
                format!("{} bytes exceeds the 10 MiB limit", meta.len()),
            ));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::attachment(path, e.to_string()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime.as_ref())?;
        let form = reqwest::multipart::Form::new().part("file", part);
        self.execute(self.client.post(self.url("/upload_file")).multipart(form))
            .await
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> ClientResult<T> {
        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().path().to_string();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let message = error_message(status.as_u16(), &bytes);
            warn!("{} failed ({}): {}", url, status, message);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        debug!("{} ok ({} bytes)", url, bytes.len());
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

fn default_task_name() -> String {
    format!("Task {}", chrono::Utc::now().timestamp_millis())
}

/// The backend's `message` (or `error`) when the body carries one.
fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(String::from))
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {status}"))
}
