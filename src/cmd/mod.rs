//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `init`    | `Init`                    |
//! | `boards`  | `Boards`                  |
//! | `show`    | `Show`                    |
//! | `column`  | `Column`                  |
//! | `task`    | `Task`                    |
//!
//! Every command opens the SQLite store, runs one mutator operation and
//! turns a populated error slot into a non-zero exit.

pub mod boards;
pub mod column;
pub mod init;
pub mod show;
pub mod task;

pub use boards::cmd_boards;
pub use column::cmd_column;
pub use init::cmd_init;
pub use show::{cmd_show, parse_filter};
pub use task::cmd_task;

use anyhow::{Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use taskboard::config::{self, BoardConfig};
use taskboard::models::{BoardId, ColumnId, ColumnWithTasks, Task, TaskId};
use taskboard::store::SqliteStore;
use taskboard::{BoardContext, OptimisticMutator, Session};

use crate::Cli;

/// Resolved settings for one CLI invocation (file → env → flags).
pub struct Workspace {
    pub config: BoardConfig,
    pub config_dir: PathBuf,
    pub db_path: PathBuf,
    pub session: Session,
    pub yes: bool,
    pub json: bool,
}

impl Workspace {
    pub fn open(project_dir: &Path, cli: &Cli) -> Result<Self> {
        let config_dir = config::config_dir(project_dir);
        let config = BoardConfig::load_or_default(&config_dir)?;
        for warning in config.validate() {
            tracing::warn!(%warning, "taskboard.toml");
        }
        let db_path = cli
            .db
            .clone()
            .unwrap_or_else(|| config.db_path(&config_dir));
        let session = Session::from_user(cli.user.clone().or_else(|| config.user_id()));

        Ok(Self {
            config,
            config_dir,
            db_path,
            session,
            yes: cli.yes,
            json: cli.json,
        })
    }

    pub fn context(&self) -> Result<BoardContext> {
        let store = SqliteStore::open(&self.db_path)?;
        Ok(BoardContext::new(Arc::new(store), self.session.clone()))
    }

    /// Ask before destructive actions unless `--yes` was given.
    pub fn confirm(&self, prompt: &str) -> bool {
        if self.yes {
            return true;
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    /// Resolve `board_ref` and load that board into a fresh mutator.
    pub async fn load_board(&self, ctx: &BoardContext, board_ref: &str) -> Result<OptimisticMutator> {
        let board_id = resolve_board(ctx, board_ref).await?;
        let mut mutator = OptimisticMutator::with_config(ctx.clone(), board_id, &self.config);
        if !mutator.load().await {
            ensure_ok(mutator.error())?;
        }
        Ok(mutator)
    }
}

/// Fail the command with whatever the mutator recorded.
pub fn ensure_ok(error: Option<&str>) -> Result<()> {
    match error {
        Some(msg) => bail!("{}", msg),
        None => Ok(()),
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A board id, or the title of one of the session user's boards.
pub async fn resolve_board(ctx: &BoardContext, board_ref: &str) -> Result<BoardId> {
    if let Ok(id) = Uuid::parse_str(board_ref) {
        return Ok(id);
    }
    let Some(user_id) = ctx.session.user_id() else {
        bail!(
            "Board '{}' not found (use the board id, or pass --user to look up by title)",
            board_ref
        );
    };
    let boards = ctx.store().list_boards(user_id).await?;
    match boards
        .iter()
        .find(|b| b.title.eq_ignore_ascii_case(board_ref.trim()))
    {
        Some(board) => Ok(board.id),
        None => bail!("Board '{}' not found", board_ref),
    }
}

/// A column id or title on the loaded board.
pub fn resolve_column(columns: &[ColumnWithTasks], column_ref: &str) -> Result<ColumnId> {
    let parsed = Uuid::parse_str(column_ref).ok();
    let found = columns.iter().find(|c| match parsed {
        Some(id) => c.id() == id,
        None => c.column.title.eq_ignore_ascii_case(column_ref.trim()),
    });
    match found {
        Some(col) => Ok(col.id()),
        None => bail!("Column '{}' not found", column_ref),
    }
}

/// A task id or title on the loaded board.
pub fn resolve_task<'a>(columns: &'a [ColumnWithTasks], task_ref: &str) -> Result<&'a Task> {
    let parsed = Uuid::parse_str(task_ref).ok();
    let found = columns
        .iter()
        .flat_map(|c| c.tasks.iter())
        .find(|t| match parsed {
            Some(id) => t.id == id,
            None => t.title.eq_ignore_ascii_case(task_ref.trim()),
        });
    match found {
        Some(task) => Ok(task),
        None => bail!("Task '{}' not found", task_ref),
    }
}

pub fn short_id(id: &TaskId) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskboard::models::{Column, Priority};

    fn columns() -> Vec<ColumnWithTasks> {
        let now = Utc::now();
        let column = Column {
            id: Uuid::new_v4(),
            title: "In Progress".into(),
            board_id: Uuid::new_v4(),
            sort_order: 0,
            user_id: "ada".into(),
            created_at: now,
            updated_at: now,
        };
        let task = Task {
            id: Uuid::new_v4(),
            title: "Ship it".into(),
            description: None,
            assignee: None,
            due_date: None,
            priority: Priority::Medium,
            column_id: column.id,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        };
        vec![ColumnWithTasks::new(column, vec![task])]
    }

    #[test]
    fn test_resolve_column_by_id_or_title() {
        let cols = columns();
        let id = cols[0].id();
        assert_eq!(resolve_column(&cols, "in progress").unwrap(), id);
        assert_eq!(resolve_column(&cols, &id.to_string()).unwrap(), id);
        assert!(resolve_column(&cols, "Done").is_err());
    }

    #[test]
    fn test_resolve_task_by_title() {
        let cols = columns();
        assert_eq!(resolve_task(&cols, "SHIP IT").unwrap().title, "Ship it");
        let err = resolve_task(&cols, "nope").unwrap_err();
        assert_eq!(err.to_string(), "Task 'nope' not found");
    }

    #[test]
    fn test_ensure_ok_surfaces_error_slot() {
        assert!(ensure_ok(None).is_ok());
        let err = ensure_ok(Some("Failed to move the task: offline")).unwrap_err();
        assert_eq!(err.to_string(), "Failed to move the task: offline");
    }
}
