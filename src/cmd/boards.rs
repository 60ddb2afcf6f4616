//! `taskboard boards list|create|delete`.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::Path;

use taskboard::BoardList;
use taskboard::filter::BoardFilter;
use taskboard::models::BoardDraft;

use super::{Workspace, ensure_ok, print_json, resolve_board};
use crate::{BoardsCommands, Cli};

pub fn parse_board_filter(
    search: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<BoardFilter> {
    let day = |d: &str| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", d))
    };
    let filter = BoardFilter {
        search: search.map(str::trim).filter(|s| !s.is_empty()).map(String::from),
        created_from: from.map(day).transpose()?,
        created_to: to.map(day).transpose()?,
    };
    if let (Some(from), Some(to)) = (filter.created_from, filter.created_to)
        && from > to
    {
        bail!("--from {} is after --to {}", from, to);
    }
    Ok(filter)
}

pub async fn cmd_boards(project_dir: &Path, cli: &Cli, command: &BoardsCommands) -> Result<()> {
    let ws = Workspace::open(project_dir, cli)?;
    let ctx = ws.context()?;
    if ctx.session.user_id().is_none() {
        bail!("User not authenticated (pass --user or set TASKBOARD_USER)");
    }
    let mut list = BoardList::with_config(ctx.clone(), &ws.config);

    match command {
        BoardsCommands::List { search, from, to } => {
            let filter = parse_board_filter(search.as_deref(), from.as_deref(), to.as_deref())?;
            list.load().await;
            ensure_ok(list.error())?;
            let boards = list.filtered(&filter);
            if ws.json {
                return print_json(&boards);
            }
            if list.boards().is_empty() {
                println!("No boards yet. Create one with `taskboard boards create <title>`.");
                return Ok(());
            }
            if boards.is_empty() {
                println!("No boards match the filter.");
                return Ok(());
            }
            for board in &boards {
                println!(
                    "{}  {}  {}",
                    console::style(board.id).dim(),
                    console::style(&board.title).bold(),
                    board.description.as_deref().unwrap_or("")
                );
            }
        }
        BoardsCommands::Create {
            title,
            description,
            color,
        } => {
            let created = list
                .create_board(BoardDraft {
                    title: title.clone(),
                    description: description.clone(),
                    color: color.clone(),
                })
                .await;
            ensure_ok(list.error())?;
            let Some(board) = created else {
                bail!("Board was not created");
            };
            if ws.json {
                return print_json(&board);
            }
            println!("Created board '{}' ({})", board.title, board.id);
        }
        BoardsCommands::Delete { board } => {
            let board_id = resolve_board(&ctx, board).await?;
            let prompt = format!(
                "Delete board '{}' with all its columns and tasks?",
                board
            );
            if !ws.confirm(&prompt) {
                println!("Deletion cancelled.");
                return Ok(());
            }
            list.delete_board(board_id).await;
            ensure_ok(list.error())?;
            println!("Deleted board '{}'", board);
        }
    }

    Ok(())
}
