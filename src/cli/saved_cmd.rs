use crate::client::TaskClient;
use crate::model::{ApiStatus, SavedTask};
use anyhow::Result;
use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub enum SavedAction {
    List,
    Show { id: String },
    Save { name: String, plan: String },
    Update { name: String, plan: String },
    Delete { name: String },
}

pub async fn run(action: SavedAction, client: &TaskClient) -> Result<()> {
    match action {
        SavedAction::List => {
            let tasks = client.list_saved_tasks().await?;
            print!("{}", format_list(&tasks));
        }
        SavedAction::Show { id } => {
            let task = client.retrieve_saved_task(&id).await?;
            println!("{} ({})\n\n{}", task.name, task.id, task.full_plan);
        }
        SavedAction::Save { name, plan } => {
            report(client.save_task(&name, &plan).await?)?;
        }
        SavedAction::Update { name, plan } => {
            report(client.update_task(&name, &plan).await?)?;
        }
        SavedAction::Delete { name } => {
            report(client.delete_task(&name).await?)?;
        }
    }
    Ok(())
}

fn report(status: ApiStatus) -> Result<()> {
    if !status.is_ok() {
        anyhow::bail!("{}", status.message);
    }
    println!("{}", status.message);
    Ok(())
}

pub fn format_list(tasks: &[SavedTask]) -> String {
    if tasks.is_empty() {
        return "No saved tasks.\n".to_string();
    }
    let width = tasks.iter().map(|t| t.name.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for task in tasks {
        let preview = if task.preview.is_empty() {
            task.full_plan.lines().next().unwrap_or("")
        } else {
            task.preview.as_str()
        };
        let _ = writeln!(out, "{:<width$}  {}", task.name, preview, width = width);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, preview: &str, plan: &str) -> SavedTask {
        SavedTask {
            id: name.to_lowercase(),
            name: name.into(),
            preview: preview.into(),
            full_plan: plan.into(),
        }
    }

    #[test]
    fn list_aligns_names_and_falls_back_to_plan() {
        let out = format_list(&[
            task("Backup", "", "copy ~/docs\nverify"),
            task("Cleanup tmp", "remove stale files", "rm ..."),
        ]);
        assert_eq!(
            out,
            "Backup       copy ~/docs\nCleanup tmp  remove stale files\n"
        );
        assert_eq!(format_list(&[]), "No saved tasks.\n");
    }

    #[test]
    fn failed_status_becomes_error() {
        let err = report(ApiStatus {
            success: Some(false),
            status: None,
            message: "Task name already exists".into(),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Task name already exists");
    }
}
