//! `taskboard show`: render a board, optionally filtered.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use taskboard::filter::TaskFilter;
use taskboard::models::{Priority, Task};

use super::{Workspace, print_json, short_id};
use crate::Cli;

pub fn parse_filter(
    priorities: &[String],
    assignee: Option<&str>,
    due_before: Option<&str>,
) -> Result<TaskFilter> {
    let priorities = priorities
        .iter()
        .map(|p| p.to_lowercase().parse::<Priority>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;
    let due_on_or_before = due_before
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", d))
        })
        .transpose()?;
    Ok(TaskFilter {
        priorities,
        assignee: assignee.map(str::trim).filter(|a| !a.is_empty()).map(String::from),
        due_on_or_before,
    })
}

pub async fn cmd_show(project_dir: &Path, cli: &Cli, board_ref: &str, filter: TaskFilter) -> Result<()> {
    let ws = Workspace::open(project_dir, cli)?;
    let ctx = ws.context()?;
    let mutator = ws.load_board(&ctx, board_ref).await?;
    let columns = filter.apply(mutator.columns());

    if ws.json {
        return print_json(&serde_json::json!({
            "board": mutator.board(),
            "columns": columns,
        }));
    }

    if let Some(board) = mutator.board() {
        println!("{}  {}", console::style(&board.title).bold().cyan(), console::style(board.id).dim());
        if let Some(desc) = &board.description {
            println!("{}", desc);
        }
    }
    if !filter.is_empty() {
        println!(
            "{}",
            console::style(format!("{} filter(s) active", filter.active_count())).yellow()
        );
    }

    for col in &columns {
        println!();
        println!(
            "{} ({})  {}",
            console::style(&col.column.title).bold(),
            col.tasks.len(),
            console::style(col.id()).dim()
        );
        if col.tasks.is_empty() {
            println!("  {}", console::style("(empty)").dim());
        }
        for task in &col.tasks {
            println!("  {}", task_line(task));
        }
    }
    Ok(())
}

fn task_line(task: &Task) -> String {
    let mut line = format!("- {} [{}]", task.title, priority_label(task.priority));
    if let Some(assignee) = &task.assignee {
        line.push_str(&format!(" @{}", assignee));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due));
    }
    format!("{}  {}", line, console::style(short_id(&task.id)).dim())
}

fn priority_label(priority: Priority) -> String {
    match priority {
        Priority::High => console::style(priority).red().to_string(),
        Priority::Medium => console::style(priority).yellow().to_string(),
        Priority::Low => console::style(priority).green().to_string(),
    }
}
