use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

use super::{RecordStore, StoreResult, TaskMove};
use crate::errors::{Entity, StoreError};
use crate::models::*;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct BoardDb {
    conn: Connection,
}

const BOARD_COLUMNS: &str = "id, title, description, color, user_id, created_at, updated_at";
const COLUMN_COLUMNS: &str = "id, title, board_id, sort_order, user_id, created_at, updated_at";
const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.assignee, t.due_date, t.priority, t.column_id, t.sort_order, t.created_at, t.updated_at";

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS boards (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                description TEXT,
                color TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS columns (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                sort_order INTEGER NOT NULL DEFAULT 0,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(trim(title)) > 0),
                description TEXT,
                assignee TEXT,
                due_date TEXT,
                priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high')),
                column_id TEXT NOT NULL REFERENCES columns(id) ON DELETE CASCADE,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_boards_user ON boards(user_id);
            CREATE INDEX IF NOT EXISTS idx_columns_board ON columns(board_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id);
            ",
        )?;
        Ok(())
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub fn get_board(&self, id: BoardId) -> Result<Option<Board>> {
        let sql = format!("SELECT {} FROM boards WHERE id = ?1", BOARD_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id.to_string()], BoardRow::from_row)
            .optional()
            .context("Failed to query board")?;
        row.map(BoardRow::into_board).transpose()
    }

    pub fn list_boards(&self, user_id: &str) -> Result<Vec<Board>> {
        let sql = format!(
            "SELECT {} FROM boards WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            BOARD_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map(params![user_id], BoardRow::from_row)
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?.into_board()?);
        }
        Ok(boards)
    }

    pub fn insert_board(&self, board: &NewBoard) -> Result<Board> {
        let id = Uuid::new_v4();
        let now = now_stamp();
        self.conn
            .execute(
                "INSERT INTO boards (id, title, description, color, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id.to_string(), board.title, board.description, board.color, board.user_id, now],
            )
            .context("Failed to insert board")?;
        self.get_board(id)?.context("Board not found after insert")
    }

    pub fn update_board(&self, id: BoardId, update: &BoardUpdate) -> Result<Option<Board>> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let now = now_stamp();
        let id_str = id.to_string();

        if let Some(t) = &update.title {
            tx.execute(
                "UPDATE boards SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![t, now, id_str],
            )
            .context("Failed to update board title")?;
        }
        if let Some(d) = &update.description {
            tx.execute(
                "UPDATE boards SET description = ?1, updated_at = ?2 WHERE id = ?3",
                params![d, now, id_str],
            )
            .context("Failed to update board description")?;
        }
        if let Some(c) = &update.color {
            tx.execute(
                "UPDATE boards SET color = ?1, updated_at = ?2 WHERE id = ?3",
                params![c, now, id_str],
            )
            .context("Failed to update board color")?;
        }
        tx.execute(
            "UPDATE boards SET updated_at = ?1 WHERE id = ?2",
            params![now, id_str],
        )
        .context("Failed to touch board")?;

        tx.commit().context("Failed to commit board update")?;
        self.get_board(id)
    }

    pub fn delete_board(&self, id: BoardId) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM boards WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete board")?;
        Ok(count > 0)
    }

    // ── Columns ───────────────────────────────────────────────────────

    pub fn get_column(&self, id: ColumnId) -> Result<Option<Column>> {
        let sql = format!("SELECT {} FROM columns WHERE id = ?1", COLUMN_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id.to_string()], ColumnRow::from_row)
            .optional()
            .context("Failed to query column")?;
        row.map(ColumnRow::into_column).transpose()
    }

    pub fn list_columns(&self, board_id: BoardId) -> Result<Vec<Column>> {
        let sql = format!(
            "SELECT {} FROM columns WHERE board_id = ?1 ORDER BY sort_order ASC, rowid ASC",
            COLUMN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_columns")?;
        let rows = stmt
            .query_map(params![board_id.to_string()], ColumnRow::from_row)
            .context("Failed to query columns")?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.context("Failed to read column row")?.into_column()?);
        }
        Ok(columns)
    }

    pub fn insert_column(&self, column: &NewColumn) -> Result<Column> {
        let id = Uuid::new_v4();
        let now = now_stamp();
        self.conn
            .execute(
                "INSERT INTO columns (id, title, board_id, sort_order, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    column.title,
                    column.board_id.to_string(),
                    column.sort_order,
                    column.user_id,
                    now
                ],
            )
            .context("Failed to insert column")?;
        self.get_column(id)?.context("Column not found after insert")
    }

    pub fn update_column_title(&self, id: ColumnId, title: &str) -> Result<Option<Column>> {
        self.conn
            .execute(
                "UPDATE columns SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now_stamp(), id.to_string()],
            )
            .context("Failed to update column title")?;
        self.get_column(id)
    }

    pub fn delete_column(&self, id: ColumnId) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM columns WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete column")?;
        Ok(count > 0)
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks t WHERE t.id = ?1", TASK_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id.to_string()], TaskRow::from_row)
            .optional()
            .context("Failed to query task")?;
        row.map(TaskRow::into_task).transpose()
    }

    pub fn list_tasks_by_board(&self, board_id: BoardId) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks t
             INNER JOIN columns c ON c.id = t.column_id
             WHERE c.board_id = ?1
             ORDER BY t.sort_order ASC, t.rowid ASC",
            TASK_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_tasks_by_board")?;
        let rows = stmt
            .query_map(params![board_id.to_string()], TaskRow::from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?.into_task()?);
        }
        Ok(tasks)
    }

    pub fn insert_task(&self, task: &NewTask) -> Result<Task> {
        let id = Uuid::new_v4();
        let now = now_stamp();
        self.conn
            .execute(
                "INSERT INTO tasks (id, title, description, assignee, due_date, priority, column_id, sort_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    id.to_string(),
                    task.title,
                    task.description,
                    task.assignee,
                    task.due_date.map(|d| d.to_string()),
                    task.priority.as_str(),
                    task.column_id.to_string(),
                    task.sort_order,
                    now
                ],
            )
            .context("Failed to insert task")?;
        self.get_task(id)?.context("Task not found after insert")
    }

    pub fn delete_task(&self, id: TaskId) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }

    pub fn move_task(&self, id: TaskId, column_id: ColumnId, sort_order: i32) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE tasks SET column_id = ?1, sort_order = ?2, updated_at = ?3 WHERE id = ?4",
                params![column_id.to_string(), sort_order, now_stamp(), id.to_string()],
            )
            .context("Failed to move task")?;
        Ok(count > 0)
    }

    /// Apply all placements in one transaction. Returns the first missing
    /// row instead, with nothing written.
    pub fn move_tasks(&self, moves: &[TaskMove]) -> Result<Option<(Entity, Uuid)>> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let now = now_stamp();

        for &(id, column_id, sort_order) in moves {
            let column_exists = tx
                .query_row(
                    "SELECT 1 FROM columns WHERE id = ?1",
                    params![column_id.to_string()],
                    |_| Ok(()),
                )
                .optional()
                .context("Failed to query column")?
                .is_some();
            if !column_exists {
                return Ok(Some((Entity::Column, column_id)));
            }
            let count = tx
                .execute(
                    "UPDATE tasks SET column_id = ?1, sort_order = ?2, updated_at = ?3 WHERE id = ?4",
                    params![column_id.to_string(), sort_order, now, id.to_string()],
                )
                .context("Failed to move task")?;
            if count == 0 {
                return Ok(Some((Entity::Task, id)));
            }
        }

        tx.commit().context("Failed to commit task moves")?;
        Ok(None)
    }
}

/// `RecordStore` over SQLite. Internal failures surface as
/// `StoreError::Transport`, missing rows as `StoreError::NotFound`, and
/// blank titles are rejected as `StoreError::Validation` before any I/O.
#[derive(Clone)]
pub struct SqliteStore {
    db: DbHandle,
}

impl SqliteStore {
    pub fn new(db: BoardDb) -> Self {
        Self {
            db: DbHandle::new(db),
        }
    }

    /// Open the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        debug!(path = %path.display(), "opening board database");
        Ok(Self::new(BoardDb::new(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(BoardDb::new_in_memory()?))
    }

    async fn call<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.db.call(f).await.map_err(StoreError::transport)
    }
}

fn require_title(entity: Entity, title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation(format!("{} title must not be empty", entity)));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_board(&self, id: BoardId) -> StoreResult<Board> {
        self.call(move |db| db.get_board(id))
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Board, id))
    }

    async fn list_boards(&self, user_id: &str) -> StoreResult<Vec<Board>> {
        let user_id = user_id.to_string();
        self.call(move |db| db.list_boards(&user_id)).await
    }

    async fn insert_board(&self, board: NewBoard) -> StoreResult<Board> {
        require_title(Entity::Board, &board.title)?;
        self.call(move |db| db.insert_board(&board)).await
    }

    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> StoreResult<Board> {
        if let Some(title) = &update.title {
            require_title(Entity::Board, title)?;
        }
        self.call(move |db| db.update_board(id, &update))
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Board, id))
    }

    async fn delete_board(&self, id: BoardId) -> StoreResult<()> {
        if self.call(move |db| db.delete_board(id)).await? {
            Ok(())
        } else {
            Err(StoreError::not_found(Entity::Board, id))
        }
    }

    async fn list_columns(&self, board_id: BoardId) -> StoreResult<Vec<Column>> {
        self.call(move |db| db.list_columns(board_id)).await
    }

    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column> {
        require_title(Entity::Column, &column.title)?;
        let board_id = column.board_id;
        let exists = self.call(move |db| Ok(db.get_board(board_id)?.is_some())).await?;
        if !exists {
            return Err(StoreError::not_found(Entity::Board, board_id));
        }
        self.call(move |db| db.insert_column(&column)).await
    }

    async fn update_column_title(&self, id: ColumnId, title: &str) -> StoreResult<Column> {
        require_title(Entity::Column, title)?;
        let title = title.to_string();
        self.call(move |db| db.update_column_title(id, &title))
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Column, id))
    }

    async fn delete_column(&self, id: ColumnId) -> StoreResult<()> {
        if self.call(move |db| db.delete_column(id)).await? {
            Ok(())
        } else {
            Err(StoreError::not_found(Entity::Column, id))
        }
    }

    async fn list_tasks_by_board(&self, board_id: BoardId) -> StoreResult<Vec<Task>> {
        self.call(move |db| db.list_tasks_by_board(board_id)).await
    }

    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        require_title(Entity::Task, &task.title)?;
        let column_id = task.column_id;
        let exists = self.call(move |db| Ok(db.get_column(column_id)?.is_some())).await?;
        if !exists {
            return Err(StoreError::not_found(Entity::Column, column_id));
        }
        self.call(move |db| db.insert_task(&task)).await
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        if self.call(move |db| db.delete_task(id)).await? {
            Ok(())
        } else {
            Err(StoreError::not_found(Entity::Task, id))
        }
    }

    async fn move_task(
        &self,
        id: TaskId,
        new_column_id: ColumnId,
        new_order: i32,
    ) -> StoreResult<()> {
        let exists = self
            .call(move |db| Ok(db.get_column(new_column_id)?.is_some()))
            .await?;
        if !exists {
            return Err(StoreError::not_found(Entity::Column, new_column_id));
        }
        if self
            .call(move |db| db.move_task(id, new_column_id, new_order))
            .await?
        {
            Ok(())
        } else {
            Err(StoreError::not_found(Entity::Task, id))
        }
    }

    async fn move_tasks(&self, moves: &[TaskMove]) -> StoreResult<()> {
        let moves = moves.to_vec();
        match self.call(move |db| db.move_tasks(&moves)).await? {
            None => Ok(()),
            Some((entity, id)) => Err(StoreError::not_found(entity, id)),
        }
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Failed to parse {} '{}'", field, value))
}

fn parse_stamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse {} '{}'", field, value))
}

/// Intermediate row struct for reading boards before converting id and
/// timestamp strings into typed values.
struct BoardRow {
    id: String,
    title: String,
    description: Option<String>,
    color: String,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl BoardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            color: row.get(3)?,
            user_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_board(self) -> Result<Board> {
        Ok(Board {
            id: parse_uuid(&self.id, "board id")?,
            title: self.title,
            description: self.description,
            color: self.color,
            user_id: self.user_id,
            created_at: parse_stamp(&self.created_at, "created_at")?,
            updated_at: parse_stamp(&self.updated_at, "updated_at")?,
        })
    }
}

struct ColumnRow {
    id: String,
    title: String,
    board_id: String,
    sort_order: i32,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl ColumnRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            board_id: row.get(2)?,
            sort_order: row.get(3)?,
            user_id: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_column(self) -> Result<Column> {
        Ok(Column {
            id: parse_uuid(&self.id, "column id")?,
            title: self.title,
            board_id: parse_uuid(&self.board_id, "board id")?,
            sort_order: self.sort_order,
            user_id: self.user_id,
            created_at: parse_stamp(&self.created_at, "created_at")?,
            updated_at: parse_stamp(&self.updated_at, "updated_at")?,
        })
    }
}

struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    assignee: Option<String>,
    due_date: Option<String>,
    priority: String,
    column_id: String,
    sort_order: i32,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            assignee: row.get(3)?,
            due_date: row.get(4)?,
            priority: row.get(5)?,
            column_id: row.get(6)?,
            sort_order: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_task(self) -> Result<Task> {
        let priority = Priority::from_str(&self.priority)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse task priority")?;
        let due_date = self
            .due_date
            .as_deref()
            .map(NaiveDate::from_str)
            .transpose()
            .context("Failed to parse task due_date")?;

        Ok(Task {
            id: parse_uuid(&self.id, "task id")?,
            title: self.title,
            description: self.description,
            assignee: self.assignee,
            due_date,
            priority,
            column_id: parse_uuid(&self.column_id, "column id")?,
            sort_order: self.sort_order,
            created_at: parse_stamp(&self.created_at, "created_at")?,
            updated_at: parse_stamp(&self.updated_at, "updated_at")?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
