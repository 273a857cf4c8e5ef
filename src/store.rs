//! Client-side UI state and its reconciliation with server snapshots.
//!
//! The store is the single writer of [`UiState`]. Server snapshots and local
//! patches both land here; the locally-owned [`LocalFlags`] are re-asserted
//! on every server merge.

use crate::model::{
    LocalFlags, Message, Role, TaskSession, ThoughtEntry, TokenUsage, UiSnapshot,
};

#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub user_input_interactive: bool,
    pub send_interactive: bool,
    pub stop_interactive: bool,
    pub stop_visible: bool,
    pub continue_interactive: bool,
    pub continue_visible: bool,
    pub status_message: String,
    pub conversation_history: Vec<Message>,
    pub execution_log: String,
    pub task_history: Vec<TaskSession>,
    pub current_task_id: Option<String>,
    pub current_task_name: String,
    pub total_tokens: TokenUsage,
    pub is_thinking: bool,
    pub show_thoughts: bool,
    pub latest_reasoning: Option<String>,
    pub agent_thoughts: Vec<ThoughtEntry>,
    pub local: LocalFlags,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            user_input_interactive: true,
            send_interactive: true,
            stop_interactive: false,
            stop_visible: true,
            continue_interactive: false,
            continue_visible: false,
            status_message: "Ready for new task".to_string(),
            conversation_history: Vec::new(),
            execution_log: String::new(),
            task_history: Vec::new(),
            current_task_id: None,
            current_task_name: "None".to_string(),
            total_tokens: TokenUsage::default(),
            is_thinking: false,
            show_thoughts: false,
            latest_reasoning: None,
            agent_thoughts: Vec::new(),
            local: LocalFlags::default(),
        }
    }
}

/// Which top-level view is showing. Polling only runs in `Chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Chat,
    Tasks,
}

/// Client-owned changes. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct LocalPatch {
    pub sidebar_open: Option<bool>,
    pub code_view_open: Option<bool>,
    pub command_palette_open: Option<bool>,
    pub settings_open: Option<bool>,
    pub is_thinking: Option<bool>,
    pub show_thoughts: Option<bool>,
    pub status_message: Option<String>,
    pub clear_thoughts: bool,
    pub push_message: Option<Message>,
}

#[derive(Debug, Default)]
pub struct Store {
    state: UiState,
    error: Option<String>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.error = Some(message);
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Merge a full server snapshot. History is replaced by the server's,
    /// with the trailing assistant turn annotated by its thoughts.
    pub fn apply_server_snapshot(&mut self, snapshot: UiSnapshot) {
        let next = self.merged(snapshot, HistoryMerge::Replace);
        self.state = next;
    }

    /// Merge the reply to a send. The local history (holding the optimistic
    /// user turn) is kept and only the reply's assistant turn is appended.
    pub fn apply_reply_snapshot(&mut self, snapshot: UiSnapshot) {
        let mut next = self.merged(snapshot, HistoryMerge::AppendReply);
        next.show_thoughts = true;
        self.state = next;
    }

    /// Apply a polled snapshot only if it changes anything. Returns whether
    /// the state changed.
    pub fn apply_polled(&mut self, snapshot: UiSnapshot) -> bool {
        let next = self.merged(snapshot, HistoryMerge::Replace);
        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }

    pub fn apply_local_patch(&mut self, patch: LocalPatch) {
        let s = &mut self.state;
        if let Some(v) = patch.sidebar_open {
            s.local.sidebar_open = v;
        }
        if let Some(v) = patch.code_view_open {
            s.local.code_view_open = v;
        }
        if let Some(v) = patch.command_palette_open {
            s.local.command_palette_open = v;
        }
        if let Some(v) = patch.settings_open {
            s.local.settings_open = v;
        }
        if let Some(v) = patch.is_thinking {
            s.is_thinking = v;
        }
        if let Some(v) = patch.show_thoughts {
            s.show_thoughts = v;
        }
        if let Some(v) = patch.status_message {
            s.status_message = v;
        }
        if patch.clear_thoughts {
            s.agent_thoughts.clear();
        }
        if let Some(msg) = patch.push_message {
            s.conversation_history.push(msg);
        }
    }

    /// Optimistically record the user's turn before the request goes out.
    pub fn begin_send(&mut self, text: &str) {
        self.error = None;
        self.apply_local_patch(LocalPatch {
            is_thinking: Some(true),
            show_thoughts: Some(true),
            clear_thoughts: true,
            push_message: Some(Message::user(text)),
            ..LocalPatch::default()
        });
    }

    /// Load a task's full state. Reloading the current task keeps thoughts
    /// already attached to matching turns, since the backend does not store
    /// them per message; switching tasks replaces history wholesale.
    pub fn apply_task_session(&mut self, session: TaskSession) {
        let s = &mut self.state;
        s.status_message = session.status.status_message().to_string();
        s.conversation_history = if s.current_task_id.as_deref() == Some(session.task_id.as_str()) {
            reconcile_history(&s.conversation_history, session.conversation_history, Vec::new())
        } else {
            session.conversation_history
        };
        s.current_task_id = Some(session.task_id);
        s.current_task_name = session.task_name;
    }

    pub fn set_task_history(&mut self, history: Vec<TaskSession>) {
        self.state.task_history = history;
    }

    /// A send must open a new task when none is tracked or the tracked one
    /// has finished.
    pub fn should_start_new_task(&self) -> bool {
        let Some(current) = self.state.current_task_id.as_deref() else {
            return true;
        };
        self.state
            .task_history
            .iter()
            .find(|s| s.task_id == current)
            .is_some_and(|s| s.status.is_terminal())
    }

    pub fn should_poll(&self, view: View) -> bool {
        view == View::Chat && (self.state.is_thinking || self.state.continue_visible)
    }

    pub fn last_thought_timestamp(&self) -> String {
        self.state
            .agent_thoughts
            .last()
            .map(|t| t.timestamp.clone())
            .unwrap_or_default()
    }

    fn merged(&self, snapshot: UiSnapshot, history: HistoryMerge) -> UiState {
        let prev = &self.state;
        let mut next = prev.clone();
        let thoughts = snapshot.agent_thoughts.clone().unwrap_or_default();

        if let Some(v) = snapshot.user_input_interactive {
            next.user_input_interactive = v;
        }
        if let Some(v) = snapshot.send_interactive {
            next.send_interactive = v;
        }
        if let Some(v) = snapshot.stop_interactive {
            next.stop_interactive = v;
        }
        if let Some(v) = snapshot.stop_visible {
            next.stop_visible = v;
        }
        if let Some(v) = snapshot.continue_interactive {
            next.continue_interactive = v;
        }
        if let Some(v) = snapshot.continue_visible {
            next.continue_visible = v;
        }
        if let Some(v) = snapshot.status_message {
            next.status_message = v;
        }
        if let Some(v) = snapshot.execution_log {
            next.execution_log = v;
        }
        if let Some(v) = snapshot.task_history {
            next.task_history = v;
        }
        if let Some(v) = snapshot.current_task_id {
            next.current_task_id = v;
        }
        if let Some(v) = snapshot.current_task_name {
            next.current_task_name = v;
        }
        if let Some(v) = snapshot.total_tokens {
            next.total_tokens = v;
        }
        if let Some(v) = snapshot.is_thinking {
            next.is_thinking = v;
        }
        if let Some(v) = snapshot.show_thoughts {
            next.show_thoughts = v;
        }
        if let Some(v) = snapshot.latest_reasoning {
            next.latest_reasoning = v;
        }
        if let Some(v) = snapshot.agent_thoughts {
            next.agent_thoughts = v;
        }

        if let Some(incoming) = snapshot.conversation_history {
            match history {
                HistoryMerge::Replace => {
                    next.conversation_history =
                        reconcile_history(&prev.conversation_history, incoming, thoughts);
                }
                HistoryMerge::AppendReply => {
                    if let Some(mut reply) = incoming.into_iter().last() {
                        if reply.role == Role::Assistant {
                            reply.thoughts = Some(thoughts);
                            next.conversation_history.push(reply);
                        }
                    }
                }
            }
        }

        next.local = prev.local;
        next
    }
}

#[derive(Debug, Clone, Copy)]
enum HistoryMerge {
    Replace,
    AppendReply,
}

/// Take the server's history, keeping thoughts already attached locally to
/// the same turns and annotating a trailing assistant turn with `thoughts`.
fn reconcile_history(
    previous: &[Message],
    incoming: Vec<Message>,
    thoughts: Vec<ThoughtEntry>,
) -> Vec<Message> {
    let last = incoming.len().checked_sub(1);
    incoming
        .into_iter()
        .enumerate()
        .map(|(i, mut msg)| {
            let carried = previous
                .get(i)
                .filter(|p| p.same_turn(&msg))
                .and_then(|p| p.thoughts.clone());
            if Some(i) == last && msg.role == Role::Assistant {
                if !thoughts.is_empty() {
                    msg.thoughts = Some(thoughts.clone());
                } else if msg.thoughts.is_none() {
                    msg.thoughts = Some(carried.unwrap_or_default());
                }
            } else if msg.thoughts.is_none() {
                msg.thoughts = carried;
            }
            msg
        })
        .collect()
}
