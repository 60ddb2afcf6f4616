//! `taskboard task add|move|delete`.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::Path;

use taskboard::MoveOutcome;
use taskboard::models::{Priority, TaskDraft};

use super::{Workspace, ensure_ok, print_json, resolve_column, resolve_task};
use crate::{Cli, TaskCommands};

pub async fn cmd_task(project_dir: &Path, cli: &Cli, command: &TaskCommands) -> Result<()> {
    let ws = Workspace::open(project_dir, cli)?;
    let ctx = ws.context()?;

    match command {
        TaskCommands::Add {
            board,
            title,
            column,
            description,
            assignee,
            due,
            priority,
        } => {
            let draft = TaskDraft {
                title: title.clone(),
                description: description.clone(),
                assignee: assignee.clone(),
                due_date: due
                    .as_deref()
                    .map(|d| {
                        NaiveDate::parse_from_str(d, "%Y-%m-%d")
                            .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", d))
                    })
                    .transpose()?,
                priority: priority
                    .as_deref()
                    .map(|p| p.to_lowercase().parse::<Priority>().map_err(anyhow::Error::msg))
                    .transpose()?,
            };

            let mut mutator = ws.load_board(&ctx, board).await?;
            let created = match column {
                Some(column) => {
                    let column_id = resolve_column(mutator.columns(), column)?;
                    mutator.create_task(column_id, draft).await
                }
                None => mutator.create_task_in_first_column(draft).await,
            };
            ensure_ok(mutator.error())?;
            let Some(task) = created else {
                bail!("Task was not created");
            };
            if ws.json {
                return print_json(&task);
            }
            println!("Added task '{}' ({})", task.title, task.id);
        }
        TaskCommands::Move {
            board,
            task,
            column,
            index,
        } => {
            let mut mutator = ws.load_board(&ctx, board).await?;
            let task_id = resolve_task(mutator.columns(), task)?.id;
            let column_id = resolve_column(mutator.columns(), column)?;

            let outcome = mutator.move_task(task_id, column_id, *index).await;
            ensure_ok(mutator.error())?;
            let position = mutator.state().locate_task(task_id);
            if ws.json {
                return print_json(&serde_json::json!({
                    "outcome": outcome_label(outcome),
                    "position": position,
                }));
            }
            match (outcome, position) {
                (MoveOutcome::Committed, Some(pos)) => {
                    println!("Moved '{}' to '{}' at position {}", task, column, pos.index)
                }
                (MoveOutcome::Unchanged, _) => println!("'{}' is already at that position", task),
                _ => bail!("Task '{}' was not moved", task),
            }
        }
        TaskCommands::Delete { board, task } => {
            let mut mutator = ws.load_board(&ctx, board).await?;
            let task_id = resolve_task(mutator.columns(), task)?.id;
            if !ws.confirm(&format!("Delete task '{}'?", task)) {
                println!("Deletion cancelled.");
                return Ok(());
            }
            mutator.delete_task(task_id).await;
            ensure_ok(mutator.error())?;
            println!("Deleted task '{}'", task);
        }
    }

    Ok(())
}

fn outcome_label(outcome: MoveOutcome) -> &'static str {
    match outcome {
        MoveOutcome::NotFound => "not_found",
        MoveOutcome::Unchanged => "unchanged",
        MoveOutcome::Committed => "committed",
        MoveOutcome::RolledBack => "rolled_back",
        MoveOutcome::Superseded => "superseded",
    }
}
