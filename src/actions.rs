//! Task-level flows built from client calls.
//!
//! Each flow runs on its own spawned task and reports back through an
//! [`AppEvent`]; only the view loop writes to the store.

use crate::client::{ClientError, ClientResult, TaskClient};
use crate::model::{ApiStatus, SavedTask, TaskSession, ThoughtEntry, UiSnapshot};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

#[derive(Debug)]
pub enum AppEvent {
    Polled(ClientResult<UiSnapshot>),
    Sent(ClientResult<SendOutcome>),
    /// A suggested or saved task was started; the server history is
    /// authoritative here.
    Started(ClientResult<SendOutcome>),
    /// New, stop, continue and resume all answer with a full snapshot.
    Control {
        action: Control,
        result: ClientResult<UiSnapshot>,
    },
    TaskLoaded(ClientResult<TaskSession>),
    History(ClientResult<Vec<TaskSession>>),
    Thoughts {
        task_id: String,
        result: ClientResult<Vec<ThoughtEntry>>,
    },
    SavedTasks(ClientResult<Vec<SavedTask>>),
    SavedTaskChanged(ClientResult<ApiStatus>),
    ApiKey(ClientResult<ApiStatus>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    New(Option<String>),
    Stop,
    Continue,
    Resume(String),
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Snapshot from `/new_task` when the send opened a task.
    pub created: Option<UiSnapshot>,
    pub reply: UiSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub name: &'static str,
    pub description: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        name: "File Organization",
        description: "Organize files in a specific directory",
        prompt: "Please help me organize my files in the Documents folder by creating appropriate subfolders and moving files accordingly.",
    },
    Suggestion {
        name: "Data Analysis",
        description: "Analyze CSV data and generate reports",
        prompt: "Can you analyze this CSV file and generate a summary report with key insights?",
    },
    Suggestion {
        name: "System Check",
        description: "Check system health and performance",
        prompt: "Please check my system performance and provide recommendations for optimization.",
    },
];

/// Send `message`, opening a task named after it first when `start_new`.
pub async fn send(
    client: &TaskClient,
    message: &str,
    attachment: Option<&Path>,
    start_new: bool,
) -> ClientResult<SendOutcome> {
    let created = if start_new {
        info!("opening new task before send");
        Some(client.new_task(Some(message)).await?)
    } else {
        None
    };
    let reply = client.send_message(message, attachment).await?;
    Ok(SendOutcome { created, reply })
}

/// Open a task called `name` and send `prompt` into it. The prompt is only
/// sent when the backend accepted the new task.
pub async fn start_named_task(
    client: &TaskClient,
    name: &str,
    prompt: &str,
) -> ClientResult<SendOutcome> {
    let created = client.new_task(Some(name)).await?;
    if created.status.as_deref() == Some("error") {
        return Err(ClientError::Status {
            status: 200,
            message: created
                .message
                .clone()
                .unwrap_or_else(|| "Failed to execute task".to_string()),
        });
    }
    let reply = client.send_message(prompt, None).await?;
    Ok(SendOutcome {
        created: Some(created),
        reply,
    })
}

pub async fn run_suggestion(
    client: &TaskClient,
    suggestion: &Suggestion,
) -> ClientResult<SendOutcome> {
    start_named_task(client, suggestion.name, suggestion.prompt).await
}

pub async fn control(client: &TaskClient, action: &Control) -> ClientResult<UiSnapshot> {
    match action {
        Control::New(name) => client.new_task(name.as_deref()).await,
        Control::Stop => client.stop_task().await,
        Control::Continue => client.continue_task().await,
        Control::Resume(id) => client.resume_task(id).await,
    }
}

/// Spawns flows against one client and funnels their results into the
/// view's event channel.
#[derive(Clone)]
pub struct Dispatcher {
    client: TaskClient,
    events: UnboundedSender<AppEvent>,
}

impl Dispatcher {
    pub fn new(client: TaskClient, events: UnboundedSender<AppEvent>) -> Self {
        Self { client, events }
    }

    pub fn client(&self) -> &TaskClient {
        &self.client
    }

    fn spawn<F, Fut>(&self, flow: F)
    where
        F: FnOnce(TaskClient) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = AppEvent> + Send + 'static,
    {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = flow(client).await;
            let _ = events.send(event);
        });
    }

    pub fn send(&self, message: String, attachment: Option<PathBuf>, start_new: bool) {
        self.spawn(move |client| async move {
            AppEvent::Sent(send(&client, &message, attachment.as_deref(), start_new).await)
        });
    }

    pub fn suggestion(&self, suggestion: Suggestion) {
        self.spawn(move |client| async move {
            AppEvent::Started(run_suggestion(&client, &suggestion).await)
        });
    }

    /// Run a saved task: a new task named after it, seeded with its plan.
    pub fn run_saved(&self, task: SavedTask) {
        self.spawn(move |client| async move {
            AppEvent::Started(start_named_task(&client, &task.name, &task.full_plan).await)
        });
    }

    pub fn control(&self, action: Control) {
        self.spawn(move |client| async move {
            let result = control(&client, &action).await;
            AppEvent::Control { action, result }
        });
    }

    pub fn load_task(&self, task_id: String) {
        self.spawn(move |client| async move { AppEvent::TaskLoaded(client.get_task(&task_id).await) });
    }

    pub fn load_history(&self) {
        self.spawn(|client| async move { AppEvent::History(client.task_history().await) });
    }

    pub fn load_thoughts(&self, task_id: String) {
        self.spawn(move |client| async move {
            let result = client.task_thoughts(&task_id).await;
            AppEvent::Thoughts { task_id, result }
        });
    }

    pub fn load_saved_tasks(&self) {
        self.spawn(|client| async move { AppEvent::SavedTasks(client.list_saved_tasks().await) });
    }

    pub fn save_task(&self, name: String, plan: String, update: bool) {
        self.spawn(move |client| async move {
            let result = if update {
                client.update_task(&name, &plan).await
            } else {
                client.save_task(&name, &plan).await
            };
            AppEvent::SavedTaskChanged(result)
        });
    }

    pub fn delete_task(&self, name: String) {
        self.spawn(move |client| async move {
            AppEvent::SavedTaskChanged(client.delete_task(&name).await)
        });
    }

    pub fn update_api_key(&self, key: String) {
        self.spawn(move |client| async move { AppEvent::ApiKey(client.update_api_key(&key).await) });
    }
}
