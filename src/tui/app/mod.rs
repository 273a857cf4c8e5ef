mod events;
mod input;
mod rendering;

use crate::actions::Dispatcher;
use crate::diagram::{self, DiagramBlock};
use crate::model::{Role, SavedTask, ThoughtEntry};
use crate::store::{Store, View};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;

const LOGO: &str = "▀█▀ ▄▀█ █▀ █▄▀ █▀▄ █▀▀ █▀▀ █▄▀";
const MAX_NOTICES: usize = 50;

/// Entries of the Ctrl+P palette: label and the command it runs. Commands
/// ending in a space need an argument and are placed in the input instead.
pub(super) const PALETTE: &[(&str, &str)] = &[
    ("New task", "/new"),
    ("Stop task", "/stop"),
    ("Continue task", "/continue"),
    ("Resume task…", "/resume "),
    ("Reload task history", "/history"),
    ("Show task thoughts…", "/thoughts "),
    ("Attach file…", "/attach "),
    ("Saved tasks", "/tasks"),
    ("Chat", "/chat"),
    ("Suggested task…", "/suggest "),
    ("Diagrams", "/diagrams"),
    ("Help", "/help"),
];

/// Thoughts of a past task, opened with `/thoughts <id>`.
pub struct ThoughtsPanel {
    pub task_id: String,
    pub entries: Vec<ThoughtEntry>,
}

pub struct App {
    pub store: Store,
    pub dispatcher: Dispatcher,
    pub view: View,
    pub input: String,
    pub banner: Vec<Line<'static>>,
    /// Local feedback lines (help output, confirmations). Never sent anywhere.
    pub notices: Vec<String>,
    pub attachment: Option<PathBuf>,
    /// Scroll offset from the bottom. 0 = follow tail, >0 = scrolled up.
    pub scroll_offset: usize,
    pub saved_tasks: Vec<SavedTask>,
    pub selected_task: usize,
    pub palette_selected: usize,
    pub settings_input: String,
    pub settings_message: Option<String>,
    pub thoughts_panel: Option<ThoughtsPanel>,
    /// Diagrams seen in each task, in first-seen order, unique by code.
    pub task_diagrams: HashMap<String, Vec<DiagramBlock>>,
    /// Index of the diagram shown while the Ctrl+D panel is open.
    pub diagram_panel: Option<usize>,
    /// Task whose full state was last requested for the chat view.
    loaded_task: Option<String>,
    last_thought: watch::Sender<String>,
}

impl App {
    pub fn new(dispatcher: Dispatcher, last_thought: watch::Sender<String>) -> Self {
        let version = env!("CARGO_PKG_VERSION");
        let logo = Style::default().fg(Color::Cyan);
        let dim = Style::default().fg(Color::DarkGray);
        let accent = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);

        let banner = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled("  ", dim),
                Span::styled(LOGO, logo),
                Span::styled(format!("   v{version}"), dim),
            ]),
            Line::from(vec![
                Span::styled("  Backend  ", dim),
                Span::styled(
                    dispatcher.client().base_url().to_string(),
                    Style::default().fg(Color::White),
                ),
            ]),
            Line::from(Span::styled("  Describe a task to get started.", accent)),
            Line::from(""),
            Line::from(Span::styled(
                "  /help  Ctrl+P commands  Tab saved tasks  Ctrl+C quit",
                dim,
            )),
            Line::from(""),
        ];

        Self {
            store: Store::new(),
            dispatcher,
            view: View::Chat,
            input: String::new(),
            banner,
            notices: Vec::new(),
            attachment: None,
            scroll_offset: 0,
            saved_tasks: Vec::new(),
            selected_task: 0,
            palette_selected: 0,
            settings_input: String::new(),
            settings_message: None,
            thoughts_panel: None,
            task_diagrams: HashMap::new(),
            diagram_panel: None,
            loaded_task: None,
            last_thought,
        }
    }

    pub fn should_poll(&self) -> bool {
        self.store.should_poll(self.view)
    }

    pub(super) fn notice(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    pub(super) fn set_view(&mut self, view: View) {
        if self.view == view {
            return;
        }
        self.view = view;
        self.scroll_offset = 0;
        match view {
            View::Tasks => self.dispatcher.load_saved_tasks(),
            // Re-entering chat refetches the current task.
            View::Chat => self.loaded_task = None,
        }
    }

    /// Bring side effects in line with the state after any key or event:
    /// fetch the current task's full state when the chat view shows a task
    /// it has not loaded yet, and publish the newest thought timestamp for
    /// the poller.
    pub fn settle(&mut self) {
        if self.view == View::Chat {
            let current = self.store.state().current_task_id.clone();
            if let Some(id) = current {
                if self.loaded_task.as_deref() != Some(id.as_str()) {
                    self.loaded_task = Some(id.clone());
                    self.dispatcher.load_task(id);
                }
            }
        }
        if self.diagram_panel.is_some() {
            self.collect_diagrams();
        }
        let latest = self.store.last_thought_timestamp();
        self.last_thought.send_if_modified(|current| {
            if *current == latest {
                false
            } else {
                *current = latest;
                true
            }
        });
    }

    pub fn current_diagrams(&self) -> &[DiagramBlock] {
        self.store
            .state()
            .current_task_id
            .as_deref()
            .and_then(|id| self.task_diagrams.get(id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Add the current task's not yet seen diagrams to its collection.
    /// Returns false when no task is current.
    pub(super) fn collect_diagrams(&mut self) -> bool {
        let state = self.store.state();
        let Some(task_id) = state.current_task_id.clone() else {
            return false;
        };
        let found: Vec<DiagramBlock> = state
            .conversation_history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| diagram::extract(&m.content))
            .collect();
        let known = self.task_diagrams.entry(task_id).or_default();
        for block in found {
            if !known.iter().any(|k| k.code == block.code) {
                known.push(block);
            }
        }
        true
    }

    pub(super) fn open_diagram_panel(&mut self) {
        if self.collect_diagrams() {
            self.diagram_panel = Some(0);
        } else {
            self.notice("No task yet: diagrams are collected per task.");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::actions::AppEvent;
    use crate::client::TaskClient;
    use tokio::sync::mpsc;

    pub struct Harness {
        pub app: App,
        pub events: mpsc::UnboundedReceiver<AppEvent>,
        pub sender: mpsc::UnboundedSender<AppEvent>,
        pub last_thought: watch::Receiver<String>,
    }

    pub fn app(base_url: &str) -> Harness {
        let client = TaskClient::new(base_url).unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let (ts_tx, last_thought) = watch::channel(String::new());
        Harness {
            app: App::new(Dispatcher::new(client, tx.clone()), ts_tx),
            events,
            sender: tx,
            last_thought,
        }
    }
}
