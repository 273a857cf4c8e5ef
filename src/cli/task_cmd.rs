use crate::actions::{self, Control};
use crate::client::TaskClient;
use crate::diagram;
use crate::model::{Message, Role, TaskSession, ThoughtEntry, UiSnapshot};
use crate::store::Store;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub enum TaskAction {
    Send {
        message: String,
        file: Option<PathBuf>,
    },
    History,
    Thoughts {
        task_id: String,
    },
    Resume {
        task_id: String,
    },
    Stop,
    Continue,
    State,
    Key {
        api_key: String,
    },
    Upload {
        path: PathBuf,
    },
}

pub async fn run(action: TaskAction, client: &TaskClient) -> Result<()> {
    match action {
        TaskAction::Send { message, file } => {
            let reply = send_once(client, &message, file).await?;
            println!("{}", reply);
        }
        TaskAction::History => {
            let history = client.task_history().await?;
            print!("{}", format_history(&history));
        }
        TaskAction::Thoughts { task_id } => {
            let thoughts = client.task_thoughts(&task_id).await?;
            print!("{}", format_thoughts(&thoughts));
        }
        TaskAction::Resume { task_id } => {
            let snapshot = actions::control(client, &Control::Resume(task_id)).await?;
            print!("{}", format_state(&snapshot));
        }
        TaskAction::Stop => {
            let snapshot = actions::control(client, &Control::Stop).await?;
            print!("{}", format_state(&snapshot));
        }
        TaskAction::Continue => {
            let snapshot = actions::control(client, &Control::Continue).await?;
            print!("{}", format_state(&snapshot));
        }
        TaskAction::State => {
            let snapshot = client.get_ui_state("").await?;
            print!("{}", format_state(&snapshot));
        }
        TaskAction::Key { api_key } => {
            let status = client.update_api_key(&api_key).await?;
            if !status.is_ok() {
                anyhow::bail!("{}", status.message);
            }
            println!("API key validated and updated successfully!");
        }
        TaskAction::Upload { path } => {
            let uploaded = client.upload_file(&path).await?;
            println!("Uploaded {} -> {}", uploaded.filename, uploaded.filepath);
        }
    }
    Ok(())
}

/// Send one message the way the chat view does: the server's current state
/// decides whether a new task is opened first. Returns the printable reply.
pub async fn send_once(
    client: &TaskClient,
    message: &str,
    file: Option<PathBuf>,
) -> Result<String> {
    let mut store = Store::new();
    store.apply_server_snapshot(client.get_ui_state("").await?);
    let start_new = store.should_start_new_task();
    info!("one-shot send, start_new={}", start_new);

    store.begin_send(message);
    let outcome = actions::send(client, message, file.as_deref(), start_new).await?;
    if let Some(created) = outcome.created {
        store.apply_reply_snapshot(created);
    }
    store.apply_reply_snapshot(outcome.reply);

    let reply = store
        .state()
        .conversation_history
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant);
    Ok(reply.map(format_reply).unwrap_or_default())
}

/// Assistant text with diagram sources listed after it.
pub fn format_reply(msg: &Message) -> String {
    let mut out = diagram::strip(&msg.content);
    for (i, block) in diagram::extract(&msg.content).iter().enumerate() {
        match diagram::validate(&block.code) {
            Ok(kind) => {
                let _ = write!(out, "\n\n[Diagram {} ({})]\n{}", i + 1, kind.keyword(), block.code);
            }
            Err(err) => {
                let _ = write!(out, "\n\nError rendering diagram: {err}");
            }
        }
    }
    out
}

pub fn format_history(history: &[TaskSession]) -> String {
    if history.is_empty() {
        return "No tasks yet.\n".to_string();
    }
    let mut out = String::new();
    for session in history {
        let _ = writeln!(
            out,
            "{}  {:<10} {}  {}",
            session.task_id,
            session.status.label(),
            session.start_time,
            session.task_name
        );
    }
    out
}

pub fn format_thoughts(thoughts: &[ThoughtEntry]) -> String {
    if thoughts.is_empty() {
        return "No thoughts recorded.\n".to_string();
    }
    let mut out = String::new();
    for thought in thoughts {
        let _ = writeln!(out, "[{}] {}", thought.timestamp, thought.kind);
        for line in thought.display_content().lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out
}

pub fn format_state(snapshot: &UiSnapshot) -> String {
    let mut out = String::new();
    if let Some(message) = snapshot.message.as_deref().filter(|m| !m.is_empty()) {
        let _ = writeln!(out, "{message}");
    }
    if let Some(Some(id)) = &snapshot.current_task_id {
        let name = snapshot.current_task_name.as_deref().unwrap_or("");
        let _ = writeln!(out, "Task: {name} ({id})");
    }
    if let Some(status) = &snapshot.status_message {
        let _ = writeln!(out, "Status: {status}");
    }
    if let Some(usage) = &snapshot.total_tokens {
        let _ = writeln!(
            out,
            "Tokens: prompt {} / candidates {} / total {}",
            usage.prompt_tokens, usage.candidates_tokens, usage.total_tokens
        );
    }
    if let Some(history) = &snapshot.conversation_history {
        let _ = writeln!(out, "Messages: {}", history.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_backend::MockBackend;
    use serde_json::json;

    #[tokio::test]
    async fn send_once_opens_task_when_none_is_current() {
        let mock = MockBackend::start().await;
        mock.respond("/get_ui_state", 200, json!({ "currentTaskId": null }));
        mock.respond("/new_task", 200, json!({ "currentTaskId": "t9" }));
        mock.respond(
            "/send_message",
            200,
            json!({ "conversationHistory": [
                { "role": "user", "content": "hello" },
                { "role": "assistant", "content": "Hi there" }
            ]}),
        );
        let client = TaskClient::new(&mock.base_url).unwrap();

        let reply = send_once(&client, "hello", None).await.unwrap();
        assert_eq!(reply, "Hi there");
        assert_eq!(
            mock.paths(),
            vec!["/get_ui_state", "/new_task", "/send_message"]
        );
    }

    #[tokio::test]
    async fn send_once_reuses_paused_task() {
        let mock = MockBackend::start().await;
        mock.respond(
            "/get_ui_state",
            200,
            json!({ "currentTaskId": "t1", "statusMessage": "Waiting for input" }),
        );
        mock.respond(
            "/send_message",
            200,
            json!({ "conversationHistory": [{ "role": "assistant", "content": "ok" }] }),
        );
        let client = TaskClient::new(&mock.base_url).unwrap();

        send_once(&client, "more", None).await.unwrap();
        assert_eq!(mock.count("/new_task"), 0);
        assert_eq!(mock.count("/send_message"), 1);
    }

    #[test]
    fn reply_lists_diagrams_after_text() {
        let msg = Message::assistant("Plan:\n```mermaid\ngraph TD\nA-->B\n```");
        let out = format_reply(&msg);
        assert!(out.starts_with("Plan:"));
        assert!(out.contains("[Diagram 1 (graph)]\ngraph TD\nA-->B"));
        assert!(!out.contains("```"));
    }

    #[test]
    fn history_lines_carry_status() {
        let session: TaskSession = serde_json::from_value(json!({
            "task_id": "t1", "task_name": "Sort files", "status": "completed",
            "start_time": "2024-05-01T10:00:00"
        }))
        .unwrap();
        let out = format_history(&[session]);
        assert!(out.starts_with("t1  completed"));
        assert!(out.trim_end().ends_with("Sort files"));
        assert_eq!(format_history(&[]), "No tasks yet.\n");
    }
}
