mod actions;
mod cli;
mod client;
mod config;
mod diagram;
mod logging;
#[cfg(test)]
mod mock_backend;
mod model;
mod poller;
mod store;
mod tui;

use crate::cli::saved_cmd::SavedAction;
use crate::cli::task_cmd::TaskAction;
use crate::client::TaskClient;
use crate::config::Config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskdeck", version)]
#[command(about = "Terminal client for an AI task-execution backend", long_about = None)]
struct Cli {
    /// Backend host (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Backend port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message and print the reply
    Send {
        message: String,

        /// Attach a file (max 10 MiB)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List past task sessions
    History,
    /// Print the recorded thoughts of a task
    Thoughts { task_id: String },
    /// Make a past task current again
    Resume { task_id: String },
    /// Stop the running task
    Stop,
    /// Continue a paused task
    Continue,
    /// Print the backend's current UI state
    State,
    /// Manage saved tasks
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
    /// Validate and store an API key on the backend
    Key { api_key: String },
    /// Upload a file without sending a message
    Upload { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum TasksAction {
    /// List saved tasks
    List,
    /// Print one saved task
    Show { id: String },
    /// Save a new task
    Save { name: String, plan: String },
    /// Replace the plan of a saved task
    Update { name: String, plan: String },
    /// Delete a saved task
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let (mut config, config_path) = Config::load_with_path().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config, using defaults: {e}");
        (Config::default(), None)
    });

    let cli = Cli::parse();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    // ratatui owns the terminal in TUI mode.
    let will_run_tui = cli.cmd.is_none();
    let log_dir = logging::setup_tracing_with_settings(logging::LoggingSettings {
        level: config.logging.level.as_deref(),
        directory: config.logging.directory.as_deref(),
        retention_days: config.logging.retention_days,
        suppress_stdout: will_run_tui,
    });
    if log_dir.is_none() {
        eprintln!("Failed to initialize file logging");
    }
    match config_path.as_ref() {
        Some(path) => tracing::info!("Config File: {}", path.display()),
        None => tracing::info!("Config File: (default)"),
    }
    tracing::info!("Backend: {}", config.base_url());

    let Some(cmd) = cli.cmd else {
        return tui::run_tui(&config).await;
    };

    let client = TaskClient::new(&config.base_url())?;
    match cmd {
        Command::Tasks { action } => {
            let action = match action {
                TasksAction::List => SavedAction::List,
                TasksAction::Show { id } => SavedAction::Show { id },
                TasksAction::Save { name, plan } => SavedAction::Save { name, plan },
                TasksAction::Update { name, plan } => SavedAction::Update { name, plan },
                TasksAction::Delete { name } => SavedAction::Delete { name },
            };
            cli::saved_cmd::run(action, &client).await
        }
        other => {
            let action = match other {
                Command::Send { message, file } => TaskAction::Send { message, file },
                Command::History => TaskAction::History,
                Command::Thoughts { task_id } => TaskAction::Thoughts { task_id },
                Command::Resume { task_id } => TaskAction::Resume { task_id },
                Command::Stop => TaskAction::Stop,
                Command::Continue => TaskAction::Continue,
                Command::State => TaskAction::State,
                Command::Key { api_key } => TaskAction::Key { api_key },
                Command::Upload { path } => TaskAction::Upload { path },
                // Handled above
                Command::Tasks { .. } => unreachable!(),
            };
            cli::task_cmd::run(action, &client).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from(["taskdeck", "send", "hello", "--port", "6000"]).unwrap();
        assert_eq!(cli.port, Some(6000));
        assert!(matches!(
            cli.cmd,
            Some(Command::Send { ref message, file: None }) if message == "hello"
        ));
    }

    #[test]
    fn bare_invocation_runs_tui() {
        let cli = Cli::try_parse_from(["taskdeck", "--host", "10.0.0.2"]).unwrap();
        assert!(cli.cmd.is_none());
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn saved_task_subcommands_parse() {
        let cli = Cli::try_parse_from(["taskdeck", "tasks", "save", "Backup", "copy files"]).unwrap();
        assert!(matches!(
            cli.cmd,
            Some(Command::Tasks { action: TasksAction::Save { .. } })
        ));
    }
}
