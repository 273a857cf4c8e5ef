use super::{App, PALETTE};
use crate::actions::{Control, SUGGESTIONS};
use crate::client::MAX_ATTACHMENT_BYTES;
use crate::store::{LocalPatch, View};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

impl App {
    /// Returns `true` when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Ok(true);
        }

        let local = self.store.state().local;
        if local.settings_open {
            self.handle_settings_key(key);
            return Ok(false);
        }
        if local.command_palette_open {
            return self.handle_palette_key(key);
        }
        if self.diagram_panel.is_some() {
            self.handle_diagram_key(key);
            return Ok(false);
        }

        if ctrl {
            match key.code {
                KeyCode::Char('b') => self.store.apply_local_patch(LocalPatch {
                    sidebar_open: Some(!local.sidebar_open),
                    ..LocalPatch::default()
                }),
                KeyCode::Char('e') => self.store.apply_local_patch(LocalPatch {
                    code_view_open: Some(!local.code_view_open),
                    ..LocalPatch::default()
                }),
                KeyCode::Char('p') => {
                    self.palette_selected = 0;
                    self.store.apply_local_patch(LocalPatch {
                        command_palette_open: Some(true),
                        ..LocalPatch::default()
                    });
                }
                KeyCode::Char('s') => self.open_settings(),
                KeyCode::Char('d') => self.open_diagram_panel(),
                KeyCode::Char('t') => {
                    let show = !self.store.state().show_thoughts;
                    self.store.apply_local_patch(LocalPatch {
                        show_thoughts: Some(show),
                        ..LocalPatch::default()
                    });
                }
                _ => {}
            }
            return Ok(false);
        }

        match key.code {
            KeyCode::Tab => {
                let next = match self.view {
                    View::Chat => View::Tasks,
                    View::Tasks => View::Chat,
                };
                self.set_view(next);
            }
            KeyCode::Up if self.view == View::Tasks && self.input.is_empty() => {
                self.selected_task = self.selected_task.saturating_sub(1);
            }
            KeyCode::Down if self.view == View::Tasks && self.input.is_empty() => {
                if self.selected_task + 1 < self.saved_tasks.len() {
                    self.selected_task += 1;
                }
            }
            KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_add(1);
            }
            KeyCode::Down => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
            }
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(20);
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(20);
            }
            KeyCode::Char(ch) => {
                self.scroll_offset = 0;
                self.input.push(ch);
            }
            KeyCode::Backspace => {
                self.scroll_offset = 0;
                self.input.pop();
            }
            KeyCode::Enter => {
                let line = self.input.trim().to_string();
                self.input.clear();
                self.scroll_offset = 0;
                if line.starts_with('/') {
                    return self.handle_command(&line);
                }
                match self.view {
                    View::Chat => self.submit_message(line),
                    View::Tasks if line.is_empty() => self.run_selected_task(),
                    View::Tasks => {
                        self.notice("Use /save <name> | <plan> to store a task plan.")
                    }
                }
            }
            KeyCode::Esc => {
                if self.thoughts_panel.is_some() {
                    self.thoughts_panel = None;
                } else if self.store.error().is_some() {
                    self.store.dismiss_error();
                } else {
                    self.input.clear();
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_palette_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Up => {
                self.palette_selected = self
                    .palette_selected
                    .checked_sub(1)
                    .unwrap_or(PALETTE.len() - 1);
            }
            KeyCode::Down => {
                self.palette_selected = (self.palette_selected + 1) % PALETTE.len();
            }
            KeyCode::Enter => {
                self.close_palette();
                let (_, command) = PALETTE[self.palette_selected];
                if command.ends_with(' ') {
                    self.input = command.to_string();
                } else {
                    return self.handle_command(command);
                }
            }
            KeyCode::Esc => self.close_palette(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_diagram_key(&mut self, key: KeyEvent) {
        let count = self.current_diagrams().len();
        let Some(selected) = self.diagram_panel else {
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Left | KeyCode::Up if count > 0 => {
                self.diagram_panel = Some(selected.checked_sub(1).unwrap_or(count - 1));
            }
            KeyCode::Right | KeyCode::Down if count > 0 => {
                self.diagram_panel = Some((selected + 1) % count);
            }
            KeyCode::Esc => self.diagram_panel = None,
            KeyCode::Char('d') if ctrl => self.diagram_panel = None,
            _ => {}
        }
    }

    fn close_palette(&mut self) {
        self.store.apply_local_patch(LocalPatch {
            command_palette_open: Some(false),
            ..LocalPatch::default()
        });
    }

    fn open_settings(&mut self) {
        self.settings_input.clear();
        self.settings_message = None;
        self.store.apply_local_patch(LocalPatch {
            settings_open: Some(true),
            ..LocalPatch::default()
        });
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(ch) => self.settings_input.push(ch),
            KeyCode::Backspace => {
                self.settings_input.pop();
            }
            KeyCode::Enter => {
                let key = self.settings_input.trim().to_string();
                if key.is_empty() {
                    self.settings_message = Some("Enter an API key first.".to_string());
                } else {
                    self.settings_message = Some("Validating…".to_string());
                    self.dispatcher.update_api_key(key);
                }
            }
            KeyCode::Esc => {
                self.settings_input.clear();
                self.store.apply_local_patch(LocalPatch {
                    settings_open: Some(false),
                    ..LocalPatch::default()
                });
            }
            _ => {}
        }
    }

    /// Send a chat message, opening a new task first when the current one
    /// is missing or finished.
    pub(super) fn submit_message(&mut self, text: String) {
        if text.is_empty() && self.attachment.is_none() {
            return;
        }
        if !self.store.state().send_interactive {
            self.notice("The agent is busy; wait for it or /stop the task.");
            return;
        }
        let start_new = self.store.should_start_new_task();
        self.store.begin_send(&text);
        let attachment = self.attachment.take();
        self.dispatcher.send(text, attachment, start_new);
    }

    fn run_selected_task(&mut self) {
        match self.saved_tasks.get(self.selected_task).cloned() {
            Some(task) => {
                self.notice(format!("Starting saved task: {}", task.name));
                self.dispatcher.run_saved(task);
                self.set_view(View::Chat);
            }
            None => self.notice("No saved task selected."),
        }
    }

    pub(super) fn handle_command(&mut self, line: &str) -> Result<bool> {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => return Ok(true),
            "/help" => self.show_help(),
            "/new" => {
                let name = (!arg.is_empty()).then(|| arg.to_string());
                self.attachment = None;
                self.dispatcher.control(Control::New(name));
            }
            "/stop" => self.dispatcher.control(Control::Stop),
            "/continue" => self.dispatcher.control(Control::Continue),
            "/resume" if !arg.is_empty() => {
                self.dispatcher.control(Control::Resume(arg.to_string()));
            }
            "/history" => self.dispatcher.load_history(),
            "/thoughts" if !arg.is_empty() => self.dispatcher.load_thoughts(arg.to_string()),
            "/attach" if !arg.is_empty() => self.attach(arg),
            "/detach" => {
                if self.attachment.take().is_some() {
                    self.notice("Attachment removed.");
                }
            }
            "/suggest" => match arg.parse::<usize>() {
                Ok(n) if (1..=SUGGESTIONS.len()).contains(&n) => {
                    let suggestion = SUGGESTIONS[n - 1];
                    self.notice(format!("Starting suggested task: {}", suggestion.name));
                    self.dispatcher.suggestion(suggestion);
                    self.set_view(View::Chat);
                }
                _ => {
                    self.notice("Suggested tasks:");
                    for (i, s) in SUGGESTIONS.iter().enumerate() {
                        self.notice(format!("  /suggest {}  {}: {}", i + 1, s.name, s.description));
                    }
                }
            },
            "/diagrams" => self.open_diagram_panel(),
            "/tasks" => self.set_view(View::Tasks),
            "/chat" => self.set_view(View::Chat),
            "/save" | "/update" => match arg.split_once('|') {
                Some((name, plan)) if !name.trim().is_empty() && !plan.trim().is_empty() => {
                    self.dispatcher.save_task(
                        name.trim().to_string(),
                        plan.trim().to_string(),
                        command == "/update",
                    );
                }
                _ => self.notice(format!("Usage: {command} <name> | <plan>")),
            },
            "/delete" => {
                let name = if arg.is_empty() {
                    self.saved_tasks
                        .get(self.selected_task)
                        .map(|t| t.name.clone())
                } else {
                    Some(arg.to_string())
                };
                match name {
                    Some(name) => self.dispatcher.delete_task(name),
                    None => self.notice("No saved task selected."),
                }
            }
            "/run" => {
                if !arg.is_empty() {
                    match self.saved_tasks.iter().position(|t| t.name == arg) {
                        Some(i) => self.selected_task = i,
                        None => {
                            self.notice(format!("No saved task named {arg:?}."));
                            return Ok(false);
                        }
                    }
                }
                self.run_selected_task();
            }
            "/key" if !arg.is_empty() => {
                self.open_settings();
                self.settings_message = Some("Validating…".to_string());
                self.dispatcher.update_api_key(arg.to_string());
            }
            "/key" => self.open_settings(),
            "/dismiss" => self.store.dismiss_error(),
            _ => self.notice(format!("Unknown or incomplete command: {line}  (try /help)")),
        }
        Ok(false)
    }

    fn attach(&mut self, arg: &str) {
        let path = PathBuf::from(arg);
        match std::fs::metadata(&path) {
            Ok(meta) if !meta.is_file() => self.notice(format!("{arg} is not a file.")),
            Ok(meta) if meta.len() > MAX_ATTACHMENT_BYTES => {
                self.notice(format!("{arg} is larger than the 10 MiB attachment limit."))
            }
            Ok(_) => {
                self.notice(format!("Attached {arg}; it is uploaded with the next message."));
                self.attachment = Some(path);
            }
            Err(e) => self.notice(format!("Cannot attach {arg}: {e}")),
        }
    }

    fn show_help(&mut self) {
        const HELP: &[&str] = &[
            "Commands:",
            "  <text>                 send to the current task (opens one if needed)",
            "  /new [name]            start a new task",
            "  /stop, /continue       stop or continue the current task",
            "  /resume <task-id>      make a past task current",
            "  /history               reload task history",
            "  /thoughts <task-id>    show the thoughts of a task",
            "  /attach <path>         attach a file to the next message",
            "  /detach                drop the pending attachment",
            "  /suggest [n]           list or start a suggested task",
            "  /diagrams              browse the current task's diagrams",
            "  /tasks, /chat          switch between saved tasks and chat",
            "  /save <name> | <plan>  save a task plan",
            "  /update <name> | <plan> update a saved plan",
            "  /delete [name]         delete a saved plan",
            "  /run [name]            start a saved plan as a new task",
            "  /key [api-key]         update the backend API key",
            "  /dismiss               hide the error banner",
            "  /quit, /exit           exit",
            "Keys:",
            "  Ctrl+B sidebar   Ctrl+E execution log   Ctrl+P commands",
            "  Ctrl+S settings  Ctrl+T thoughts        Ctrl+D diagrams",
            "  Tab switch view  ←/→ step through diagrams",
            "  ↑/↓, PgUp/PgDn scroll   Esc close / dismiss   Ctrl+C quit",
        ];
        for line in HELP {
            self.notice(*line);
        }
    }
}
