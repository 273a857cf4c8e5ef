use super::{App, ThoughtsPanel};
use crate::actions::{AppEvent, Control};
use crate::client::ClientError;
use tracing::{info, warn};

impl App {
    /// Apply the result of a finished flow. This is the only place server
    /// data enters the store.
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Polled(Ok(snapshot)) => {
                self.store.apply_polled(snapshot);
            }
            AppEvent::Polled(Err(e)) => {
                // Keep the banner stable while the backend stays unreachable.
                let message = e.to_string();
                if self.store.error() != Some(message.as_str()) {
                    self.store.set_error(message);
                }
            }
            AppEvent::Sent(Ok(outcome)) => {
                if let Some(created) = outcome.created {
                    self.store.apply_reply_snapshot(created);
                    self.reset_diagrams();
                }
                self.store.apply_reply_snapshot(outcome.reply);
            }
            AppEvent::Started(Ok(outcome)) => {
                if let Some(created) = outcome.created {
                    self.store.apply_server_snapshot(created);
                    self.reset_diagrams();
                }
                self.store.apply_server_snapshot(outcome.reply);
            }
            AppEvent::Sent(Err(e)) | AppEvent::Started(Err(e)) => {
                self.store.set_error(e.to_string());
            }
            AppEvent::Control { action, result } => match result {
                Ok(snapshot) => {
                    self.store.apply_server_snapshot(snapshot);
                    match action {
                        Control::New(_) => {
                            self.reset_diagrams();
                            self.notice("New task started.");
                        }
                        Control::Resume(id) => {
                            self.diagram_panel = None;
                            self.notice(format!("Resumed task {id}."));
                        }
                        Control::Stop | Control::Continue => {}
                    }
                }
                Err(e) => self.store.set_error(e.to_string()),
            },
            AppEvent::TaskLoaded(Ok(session)) => {
                // A stale load for a task that is no longer current is dropped.
                if self.store.state().current_task_id.as_deref() == Some(session.task_id.as_str()) {
                    self.store.apply_task_session(session);
                }
            }
            AppEvent::TaskLoaded(Err(e)) => {
                warn!("Error fetching task state: {}", e);
            }
            AppEvent::History(Ok(history)) => {
                info!("loaded {} task sessions", history.len());
                self.store.set_task_history(history);
            }
            AppEvent::History(Err(e)) => {
                warn!("task history: {}", e);
                self.store.set_error("Failed to load task history");
            }
            AppEvent::Thoughts { task_id, result } => match result {
                Ok(entries) => {
                    self.thoughts_panel = Some(ThoughtsPanel { task_id, entries });
                }
                Err(e) => {
                    warn!("thoughts for {}: {}", task_id, e);
                    self.store.set_error("Failed to load task thoughts");
                }
            },
            AppEvent::SavedTasks(Ok(tasks)) => {
                self.saved_tasks = tasks;
                if self.selected_task >= self.saved_tasks.len() {
                    self.selected_task = self.saved_tasks.len().saturating_sub(1);
                }
            }
            AppEvent::SavedTasks(Err(e)) => self.store.set_error(e.to_string()),
            AppEvent::SavedTaskChanged(Ok(status)) => {
                if status.is_ok() {
                    self.notice(status.message);
                } else {
                    self.store.set_error(status.message);
                }
                self.dispatcher.load_saved_tasks();
            }
            AppEvent::SavedTaskChanged(Err(e)) => self.store.set_error(e.to_string()),
            AppEvent::ApiKey(result) => {
                self.settings_message = Some(match result {
                    Ok(status) if status.is_ok() => {
                        self.settings_input.clear();
                        "API key validated and updated successfully!".to_string()
                    }
                    Ok(status) if !status.message.is_empty() => status.message,
                    Ok(_) => "Failed to validate API key".to_string(),
                    Err(ClientError::Status { message, .. }) => message,
                    Err(_) => "Failed to update API key. Please try again.".to_string(),
                });
            }
        }
    }

    /// A freshly created task starts with no diagrams and the panel closed.
    fn reset_diagrams(&mut self) {
        if let Some(id) = self.store.state().current_task_id.clone() {
            self.task_diagrams.remove(&id);
        }
        self.diagram_panel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use crate::actions::{AppEvent, Control, SendOutcome};
    use crate::client::ClientError;
    use crate::mock_backend::MockBackend;
    use crate::model::{ApiStatus, Message, TaskSession, TaskStatus, UiSnapshot};
    use serde_json::json;

    fn status_error(message: &str) -> ClientError {
        ClientError::Status {
            status: 500,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_poll_errors_keep_one_banner() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.handle_event(AppEvent::Polled(Err(status_error("HTTP error! status: 500"))));
        h.app.store.dismiss_error();
        h.app.handle_event(AppEvent::Polled(Err(status_error("HTTP error! status: 502"))));
        h.app.handle_event(AppEvent::Polled(Err(status_error("HTTP error! status: 502"))));
        assert_eq!(h.app.store.error(), Some("HTTP error! status: 502"));
    }

    #[tokio::test]
    async fn send_failure_keeps_optimistic_message() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.store.begin_send("hello");
        h.app.handle_event(AppEvent::Sent(Err(status_error("No active task"))));
        assert_eq!(
            h.app.store.state().conversation_history,
            vec![Message::user("hello")]
        );
        assert_eq!(h.app.store.error(), Some("No active task"));
    }

    #[tokio::test]
    async fn started_task_takes_server_history() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.handle_event(AppEvent::Started(Ok(SendOutcome {
            created: Some(UiSnapshot {
                current_task_id: Some(Some("t1".into())),
                ..Default::default()
            }),
            reply: UiSnapshot {
                conversation_history: Some(vec![
                    Message::user("prompt"),
                    Message::assistant("on it"),
                ]),
                ..Default::default()
            },
        })));
        let state = h.app.store.state();
        assert_eq!(state.conversation_history.len(), 2);
        assert_eq!(state.current_task_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn stale_task_load_is_ignored() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.store.apply_server_snapshot(UiSnapshot {
            current_task_id: Some(Some("current".into())),
            ..Default::default()
        });
        let session: TaskSession = serde_json::from_value(json!({
            "task_id": "old", "task_name": "Old", "status": "completed",
            "conversation_history": [{ "role": "assistant", "content": "stale" }]
        }))
        .unwrap();
        h.app.handle_event(AppEvent::TaskLoaded(Ok(session)));
        assert!(h.app.store.state().conversation_history.is_empty());
    }

    #[tokio::test]
    async fn chat_view_loads_current_task_once() {
        let mock = MockBackend::start().await;
        mock.respond(
            "/tasks/t1",
            200,
            json!({
                "task_id": "t1", "task_name": "One", "status": "paused",
                "conversation_history": [{ "role": "assistant", "content": "welcome back" }]
            }),
        );
        let mut h = test_support::app(&mock.base_url);
        h.app.handle_event(AppEvent::Control {
            action: Control::Resume("t1".into()),
            result: Ok(UiSnapshot {
                current_task_id: Some(Some("t1".into())),
                ..Default::default()
            }),
        });
        h.app.settle();
        h.app.settle();

        let event = h.events.recv().await.unwrap();
        h.app.handle_event(event);
        let state = h.app.store.state();
        assert_eq!(state.conversation_history, vec![Message::assistant("welcome back")]);
        assert_eq!(state.status_message, TaskStatus::Paused.status_message());
        assert_eq!(mock.count("/tasks/t1"), 1);
    }

    #[tokio::test]
    async fn first_reply_keeps_thoughts_after_task_load() {
        let mock = MockBackend::start().await;
        mock.respond("/new_task", 200, json!({ "currentTaskId": "t1" }));
        mock.respond(
            "/send_message",
            200,
            json!({
                "conversationHistory": [
                    { "role": "user", "content": "hello" },
                    { "role": "assistant", "content": "Hi there" }
                ],
                "agentThoughts": [
                    { "timestamp": "2024-05-01T10:00:00", "content": "greet", "type": "reasoning" }
                ]
            }),
        );
        mock.respond(
            "/tasks/t1",
            200,
            json!({
                "task_id": "t1", "task_name": "hello", "status": "paused",
                "conversation_history": [
                    { "role": "user", "content": "hello" },
                    { "role": "assistant", "content": "Hi there" }
                ]
            }),
        );
        let mut h = test_support::app(&mock.base_url);

        h.app.submit_message("hello".to_string());
        let sent = h.events.recv().await.unwrap();
        assert!(matches!(sent, AppEvent::Sent(Ok(_))));
        h.app.handle_event(sent);

        h.app.settle();
        let loaded = h.events.recv().await.unwrap();
        assert!(matches!(loaded, AppEvent::TaskLoaded(Ok(_))));
        h.app.handle_event(loaded);

        let history = &h.app.store.state().conversation_history;
        assert_eq!(history.len(), 2);
        let thoughts = history[1].thoughts.as_deref().unwrap_or_default();
        assert_eq!(thoughts.len(), 1);
        assert_eq!(thoughts[0].content, "greet");
        assert_eq!(mock.count("/tasks/t1"), 1);
    }

    fn control_ok(action: Control, task_id: &str, history: Vec<Message>) -> AppEvent {
        AppEvent::Control {
            action,
            result: Ok(UiSnapshot {
                current_task_id: Some(Some(task_id.into())),
                conversation_history: Some(history),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn diagrams_are_kept_per_task_and_restored_on_resume() {
        let mut h = test_support::app("http://127.0.0.1:1");
        let first = vec![Message::assistant("```mermaid\ngraph TD\nA-->B\n```")];
        h.app.handle_event(control_ok(Control::Resume("t1".into()), "t1", first));
        h.app.open_diagram_panel();
        assert_eq!(h.app.current_diagrams().len(), 1);

        h.app.handle_event(control_ok(
            Control::Resume("t2".into()),
            "t2",
            vec![Message::assistant("no pictures here")],
        ));
        assert!(h.app.diagram_panel.is_none());
        assert!(h.app.current_diagrams().is_empty());

        h.app.handle_event(control_ok(Control::Resume("t1".into()), "t1", Vec::new()));
        assert_eq!(h.app.current_diagrams().len(), 1);
        assert_eq!(h.app.current_diagrams()[0].code, "graph TD\nA-->B");
    }

    #[tokio::test]
    async fn diagram_collection_is_unique_by_code() {
        let mut h = test_support::app("http://127.0.0.1:1");
        let graph = "```mermaid\ngraph TD\nA-->B\n```";
        let history = vec![
            Message::assistant(graph),
            Message::user("again please"),
            Message::assistant(format!(
                "{graph}\n--- START MERMAID CODE ---\nsequenceDiagram\nA->>B: hi\n--- END MERMAID CODE ---"
            )),
        ];
        h.app.handle_event(control_ok(Control::Resume("t1".into()), "t1", history));
        h.app.open_diagram_panel();
        h.app.settle();

        let codes: Vec<&str> = h.app.current_diagrams().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["graph TD\nA-->B", "sequenceDiagram\nA->>B: hi"]);
    }

    #[tokio::test]
    async fn new_task_starts_with_empty_diagram_list() {
        let mut h = test_support::app("http://127.0.0.1:1");
        let history = vec![Message::assistant("```mermaid\npie\n\"a\": 1\n```")];
        h.app.handle_event(control_ok(Control::Resume("t1".into()), "t1", history));
        h.app.open_diagram_panel();
        assert_eq!(h.app.current_diagrams().len(), 1);

        // The new task reuses the id, but must not inherit the old list.
        h.app.handle_event(control_ok(Control::New(None), "t1", Vec::new()));
        assert!(h.app.diagram_panel.is_none());
        assert!(h.app.current_diagrams().is_empty());
    }

    #[tokio::test]
    async fn settle_publishes_last_thought() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.store.apply_server_snapshot(UiSnapshot {
            agent_thoughts: Some(vec![serde_json::from_value(json!({
                "timestamp": "2024-05-01T10:00:00", "content": "x", "type": "reasoning"
            }))
            .unwrap()]),
            ..Default::default()
        });
        h.app.settle();
        assert_eq!(*h.last_thought.borrow(), "2024-05-01T10:00:00");
    }

    #[tokio::test]
    async fn api_key_result_updates_settings_message() {
        let mut h = test_support::app("http://127.0.0.1:1");
        h.app.settings_input = "sk-test".into();
        h.app.handle_event(AppEvent::ApiKey(Ok(ApiStatus {
            success: Some(true),
            status: None,
            message: "ok".into(),
        })));
        assert!(h.app.settings_input.is_empty());
        assert_eq!(
            h.app.settings_message.as_deref(),
            Some("API key validated and updated successfully!")
        );

        h.app.handle_event(AppEvent::ApiKey(Err(status_error("Invalid API key"))));
        assert_eq!(h.app.settings_message.as_deref(), Some("Invalid API key"));
    }
}
