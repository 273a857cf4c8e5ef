//! Wire types shared with the task backend.
//!
//! Field names follow the backend's JSON exactly: UI snapshots are camelCase,
//! task sessions and thought entries are snake_case.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl ThoughtEntry {
    /// Human-readable body. Planner thoughts arrive as JSON with
    /// `next_action` / `reasoning`; anything else is shown verbatim.
    pub fn display_content(&self) -> String {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.content) else {
            return self.content.clone();
        };
        if !value.is_object() {
            return self.content.clone();
        }
        let mut out = String::new();
        if let Some(action) = value.get("next_action") {
            let action_type = action
                .get("action_type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            out.push_str(&format!("Action: {action_type}\n"));
            if let Some(params) = action.get("parameters") {
                let pretty = serde_json::to_string_pretty(params).unwrap_or_default();
                out.push_str(&format!("Parameters: {pretty}\n"));
            }
        }
        if let Some(reasoning) = value.get("reasoning").and_then(|v| v.as_str()) {
            out.push_str(&format!("\nReasoning: {reasoning}"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<Vec<ThoughtEntry>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            image: None,
            image_data: None,
            references: None,
            thoughts: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Same turn as `other`, ignoring any locally attached thoughts.
    pub fn same_turn(&self, other: &Message) -> bool {
        self.role == other.role && self.content == other.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
    Failed,
    /// History listings report `unknown` for sessions with broken metadata.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }

    pub fn status_message(self) -> &'static str {
        match self {
            TaskStatus::Paused => "Waiting for input",
            TaskStatus::Active => "Processing task",
            TaskStatus::Completed => "Task completed",
            TaskStatus::Failed => "Task failed",
            TaskStatus::Unknown => "Ready for new task",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub candidates_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One backend task. History listings only carry the identity and status
/// fields, so everything else defaults to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSession {
    pub task_id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub agent_thoughts: Vec<ThoughtEntry>,
    #[serde(default)]
    pub execution_log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<TokenUsage>,
}

/// A saved task structure (name + plan text) managed through `/tasks/*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub full_plan: String,
}

/// Generic `{success|status, message}` reply of the CRUD and credential routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ApiStatus {
    pub fn is_ok(&self) -> bool {
        self.success.unwrap_or(true) && self.status.as_deref() != Some("error")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub success: bool,
    pub filename: String,
    pub filepath: String,
}

/// Locally-owned presentation flags. Server snapshots never touch these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFlags {
    pub sidebar_open: bool,
    pub code_view_open: bool,
    pub command_palette_open: bool,
    pub settings_open: bool,
}

impl Default for LocalFlags {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            code_view_open: false,
            command_palette_open: false,
            settings_open: false,
        }
    }
}

/// Partial UI snapshot as returned by every state-changing route and by
/// `/get_ui_state`. Absent fields leave the client state untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    pub user_input_interactive: Option<bool>,
    pub send_interactive: Option<bool>,
    pub stop_interactive: Option<bool>,
    pub stop_visible: Option<bool>,
    pub continue_interactive: Option<bool>,
    pub continue_visible: Option<bool>,
    pub status_message: Option<String>,
    pub conversation_history: Option<Vec<Message>>,
    pub execution_log: Option<String>,
    pub task_history: Option<Vec<TaskSession>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<Option<String>>,
    pub current_task_name: Option<String>,
    pub total_tokens: Option<TokenUsage>,
    pub is_thinking: Option<bool>,
    pub show_thoughts: Option<bool>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub latest_reasoning: Option<Option<String>>,
    pub agent_thoughts: Option<Vec<ThoughtEntry>>,
    // Echoed by some backends; accepted on the wire and never applied.
    pub is_sidebar_open: Option<bool>,
    pub is_code_view_open: Option<bool>,
    pub is_command_palette_open: Option<bool>,
    pub show_settings: Option<bool>,
    // `{status, message}` envelope fields of the task routes.
    pub status: Option<String>,
    pub message: Option<String>,
}

/// Distinguishes an explicit `null` from an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
