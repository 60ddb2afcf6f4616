//! Record store contract and the composite board reads/writes built on it.
//!
//! The store is the source of truth. Everything above it (local state,
//! mutator, drag controller) is a cache that talks to it only through
//! [`RecordStore`].
//!
//! | Implementation | Backing                                                |
//! |----------------|--------------------------------------------------------|
//! | `sqlite`       | rusqlite file or in-memory DB behind `DbHandle`        |
//! | `memory`       | `RwLock<HashMap>` with failure injection and a call log|

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{Entity, StoreError};
use crate::models::*;

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, StoreCall};
pub use sqlite::{BoardDb, DbHandle, SqliteStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// One task placement: `(task, column, sort_order)`.
pub type TaskMove = (TaskId, ColumnId, i32);

/// Titles of the columns every new board starts with, in display order.
pub const DEFAULT_COLUMNS: [&str; 4] = ["To Do", "In Progress", "In Review", "Done"];

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_board(&self, id: BoardId) -> StoreResult<Board>;
    /// Boards owned by `user_id`, newest first.
    async fn list_boards(&self, user_id: &str) -> StoreResult<Vec<Board>>;
    async fn insert_board(&self, board: NewBoard) -> StoreResult<Board>;
    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> StoreResult<Board>;
    /// Cascades to the board's columns and tasks.
    async fn delete_board(&self, id: BoardId) -> StoreResult<()>;

    /// Columns of a board by `sort_order` ascending.
    async fn list_columns(&self, board_id: BoardId) -> StoreResult<Vec<Column>>;
    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column>;
    async fn update_column_title(&self, id: ColumnId, title: &str) -> StoreResult<Column>;
    /// Cascades to the column's tasks.
    async fn delete_column(&self, id: ColumnId) -> StoreResult<()>;

    /// All tasks on a board (joined through their column) by `sort_order` ascending.
    async fn list_tasks_by_board(&self, board_id: BoardId) -> StoreResult<Vec<Task>>;
    async fn insert_task(&self, task: NewTask) -> StoreResult<Task>;
    async fn delete_task(&self, id: TaskId) -> StoreResult<()>;
    async fn move_task(&self, id: TaskId, new_column_id: ColumnId, new_order: i32)
    -> StoreResult<()>;
    /// Apply every placement or none of them.
    async fn move_tasks(&self, moves: &[TaskMove]) -> StoreResult<()>;
}

/// Load a board with its columns, each column carrying its ordered tasks.
pub async fn fetch_board_with_columns(
    store: &dyn RecordStore,
    board_id: BoardId,
) -> StoreResult<BoardWithColumns> {
    let (board, columns) = futures::try_join!(store.get_board(board_id), store.list_columns(board_id))?;
    let tasks = store.list_tasks_by_board(board_id).await?;
    debug!(board = %board_id, columns = columns.len(), tasks = tasks.len(), "fetched board");

    let columns = columns
        .into_iter()
        .map(|column| {
            let col_tasks = tasks
                .iter()
                .filter(|t| t.column_id == column.id)
                .cloned()
                .collect();
            ColumnWithTasks::new(column, col_tasks)
        })
        .collect();

    Ok(BoardWithColumns { board, columns })
}

/// Insert a board and its default columns.
///
/// Not atomic: the board is stored first, so a failed column insert leaves
/// it behind with only some of its columns.
pub async fn create_board_with_default_columns(
    store: &dyn RecordStore,
    board: NewBoard,
    column_titles: &[String],
) -> StoreResult<Board> {
    if board.title.trim().is_empty() {
        return Err(StoreError::Validation(format!("{} title must not be empty", Entity::Board)));
    }
    if column_titles.iter().any(|t| t.trim().is_empty()) {
        return Err(StoreError::Validation(format!("{} title must not be empty", Entity::Column)));
    }
    let user_id = board.user_id.clone();
    let board = store.insert_board(board).await?;

    let inserts = column_titles.iter().enumerate().map(|(i, title)| {
        store.insert_column(NewColumn {
            title: title.clone(),
            board_id: board.id,
            sort_order: i as i32,
            user_id: user_id.clone(),
        })
    });
    futures::future::try_join_all(inserts).await?;

    Ok(board)
}

pub fn default_column_titles() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|s| s.to_string()).collect()
}
