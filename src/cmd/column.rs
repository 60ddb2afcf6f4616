//! `taskboard column add|rename|delete`.

use anyhow::{Result, bail};
use std::path::Path;

use super::{Workspace, ensure_ok, print_json, resolve_column};
use crate::{Cli, ColumnCommands};

pub async fn cmd_column(project_dir: &Path, cli: &Cli, command: &ColumnCommands) -> Result<()> {
    let ws = Workspace::open(project_dir, cli)?;
    let ctx = ws.context()?;

    match command {
        ColumnCommands::Add { board, title } => {
            let mut mutator = ws.load_board(&ctx, board).await?;
            let created = mutator.create_column(title).await;
            ensure_ok(mutator.error())?;
            let Some(column) = created else {
                bail!("Column was not created");
            };
            if ws.json {
                return print_json(&column);
            }
            println!("Added column '{}' ({})", column.title, column.id);
        }
        ColumnCommands::Rename {
            board,
            column,
            title,
        } => {
            let mut mutator = ws.load_board(&ctx, board).await?;
            let column_id = resolve_column(mutator.columns(), column)?;
            let updated = mutator.update_column_title(column_id, title).await;
            ensure_ok(mutator.error())?;
            let Some(column) = updated else {
                bail!("Column was not renamed");
            };
            if ws.json {
                return print_json(&column);
            }
            println!("Renamed column to '{}'", column.title);
        }
        ColumnCommands::Delete { board, column } => {
            let mut mutator = ws.load_board(&ctx, board).await?;
            let column_id = resolve_column(mutator.columns(), column)?;
            let task_count = mutator
                .state()
                .column(column_id)
                .map(|c| c.tasks.len())
                .unwrap_or(0);
            let prompt = format!("Delete column '{}' and its {} task(s)?", column, task_count);
            if !ws.confirm(&prompt) {
                println!("Deletion cancelled.");
                return Ok(());
            }
            mutator.delete_column(column_id).await;
            ensure_ok(mutator.error())?;
            println!("Deleted column '{}'", column);
        }
    }

    Ok(())
}
