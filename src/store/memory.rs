use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, StoreResult, TaskMove};
use crate::errors::{Entity, StoreError};
use crate::models::*;

/// One entry in the call log, recorded before the call is served or failed.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    GetBoard(BoardId),
    ListBoards(String),
    InsertBoard(String),
    UpdateBoard(BoardId),
    DeleteBoard(BoardId),
    ListColumns(BoardId),
    InsertColumn(String),
    UpdateColumnTitle(ColumnId, String),
    DeleteColumn(ColumnId),
    ListTasks(BoardId),
    InsertTask(String),
    DeleteTask(TaskId),
    MoveTask(TaskId, ColumnId, i32),
    MoveTasks(Vec<TaskMove>),
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            StoreCall::GetBoard(_)
                | StoreCall::ListBoards(_)
                | StoreCall::ListColumns(_)
                | StoreCall::ListTasks(_)
        )
    }
}

#[derive(Default)]
struct MemoryState {
    // Insertion order is kept so equal timestamps still list newest first.
    boards: Vec<Board>,
    columns: HashMap<ColumnId, Column>,
    tasks: HashMap<TaskId, Task>,
    calls: Vec<StoreCall>,
    fail_writes: Option<String>,
    fail_next_write: Option<String>,
    fail_task_moves: Option<(TaskId, String)>,
}

impl MemoryState {
    fn record(&mut self, call: StoreCall) -> StoreResult<()> {
        let is_write = call.is_write();
        self.calls.push(call);
        if !is_write {
            return Ok(());
        }
        if let Some(msg) = self.fail_next_write.take() {
            return Err(StoreError::Transport(msg));
        }
        if let Some(msg) = &self.fail_writes {
            return Err(StoreError::Transport(msg.clone()));
        }
        Ok(())
    }

    fn check_task_move(&self, id: TaskId) -> StoreResult<()> {
        match &self.fail_task_moves {
            Some((failing, msg)) if *failing == id => Err(StoreError::Transport(msg.clone())),
            _ => Ok(()),
        }
    }

    /// Everything that would make `(id, column_id)` fail, without touching state.
    fn check_move(&self, id: TaskId, column_id: ColumnId) -> StoreResult<()> {
        self.check_task_move(id)?;
        if !self.columns.contains_key(&column_id) {
            return Err(StoreError::not_found(Entity::Column, column_id));
        }
        if !self.tasks.contains_key(&id) {
            return Err(StoreError::not_found(Entity::Task, id));
        }
        Ok(())
    }

    fn place_task(&mut self, id: TaskId, column_id: ColumnId, sort_order: i32) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.column_id = column_id;
            task.sort_order = sort_order;
            task.updated_at = Utc::now();
        }
    }

    fn board_mut(&mut self, id: BoardId) -> StoreResult<&mut Board> {
        self.boards
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::not_found(Entity::Board, id))
    }
}

/// In-process record store with failure injection.
///
/// Reads always succeed; writes fail with `StoreError::Transport` while a
/// failure is armed. Every call lands in the call log, including failed ones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write until `heal` is called.
    pub async fn fail_writes(&self, message: &str) {
        self.inner.write().await.fail_writes = Some(message.to_string());
    }

    /// Fail only the next write.
    pub async fn fail_next_write(&self, message: &str) {
        self.inner.write().await.fail_next_write = Some(message.to_string());
    }

    /// Fail any move that places `task_id`, alone or inside a batch.
    pub async fn fail_moves_of(&self, task_id: TaskId, message: &str) {
        self.inner.write().await.fail_task_moves = Some((task_id, message.to_string()));
    }

    pub async fn heal(&self) {
        let mut inner = self.inner.write().await;
        inner.fail_writes = None;
        inner.fail_next_write = None;
        inner.fail_task_moves = None;
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.read().await.calls.clone()
    }

    pub async fn write_calls(&self) -> Vec<StoreCall> {
        self.calls().await.into_iter().filter(StoreCall::is_write).collect()
    }

    pub async fn clear_calls(&self) {
        self.inner.write().await.calls.clear();
    }

    pub async fn task(&self, id: TaskId) -> Option<Task> {
        self.inner.read().await.tasks.get(&id).cloned()
    }
}

fn require_title(entity: Entity, title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation(format!("{} title must not be empty", entity)));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_board(&self, id: BoardId) -> StoreResult<Board> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::GetBoard(id))?;
        inner.board_mut(id).map(|b| b.clone())
    }

    async fn list_boards(&self, user_id: &str) -> StoreResult<Vec<Board>> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::ListBoards(user_id.to_string()))?;
        let mut boards: Vec<Board> = inner
            .boards
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn insert_board(&self, board: NewBoard) -> StoreResult<Board> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::InsertBoard(board.title.clone()))?;
        require_title(Entity::Board, &board.title)?;
        let now = Utc::now();
        let board = Board {
            id: Uuid::new_v4(),
            title: board.title,
            description: board.description,
            color: board.color,
            user_id: board.user_id,
            created_at: now,
            updated_at: now,
        };
        inner.boards.push(board.clone());
        Ok(board)
    }

    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> StoreResult<Board> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::UpdateBoard(id))?;
        if let Some(title) = &update.title {
            require_title(Entity::Board, title)?;
        }
        let board = inner.board_mut(id)?;
        if let Some(title) = update.title {
            board.title = title;
        }
        if let Some(description) = update.description {
            board.description = Some(description);
        }
        if let Some(color) = update.color {
            board.color = color;
        }
        board.updated_at = Utc::now();
        Ok(board.clone())
    }

    async fn delete_board(&self, id: BoardId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::DeleteBoard(id))?;
        inner.board_mut(id)?;
        inner.boards.retain(|b| b.id != id);
        let column_ids: Vec<ColumnId> = inner
            .columns
            .values()
            .filter(|c| c.board_id == id)
            .map(|c| c.id)
            .collect();
        inner.columns.retain(|_, c| c.board_id != id);
        inner.tasks.retain(|_, t| !column_ids.contains(&t.column_id));
        Ok(())
    }

    async fn list_columns(&self, board_id: BoardId) -> StoreResult<Vec<Column>> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::ListColumns(board_id))?;
        let mut columns: Vec<Column> = inner
            .columns
            .values()
            .filter(|c| c.board_id == board_id)
            .cloned()
            .collect();
        columns.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.created_at.cmp(&b.created_at)));
        Ok(columns)
    }

    async fn insert_column(&self, column: NewColumn) -> StoreResult<Column> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::InsertColumn(column.title.clone()))?;
        require_title(Entity::Column, &column.title)?;
        inner.board_mut(column.board_id)?;
        let now = Utc::now();
        let column = Column {
            id: Uuid::new_v4(),
            title: column.title,
            board_id: column.board_id,
            sort_order: column.sort_order,
            user_id: column.user_id,
            created_at: now,
            updated_at: now,
        };
        inner.columns.insert(column.id, column.clone());
        Ok(column)
    }

    async fn update_column_title(&self, id: ColumnId, title: &str) -> StoreResult<Column> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::UpdateColumnTitle(id, title.to_string()))?;
        require_title(Entity::Column, title)?;
        let column = inner
            .columns
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(Entity::Column, id))?;
        column.title = title.to_string();
        column.updated_at = Utc::now();
        Ok(column.clone())
    }

    async fn delete_column(&self, id: ColumnId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::DeleteColumn(id))?;
        if inner.columns.remove(&id).is_none() {
            return Err(StoreError::not_found(Entity::Column, id));
        }
        inner.tasks.retain(|_, t| t.column_id != id);
        Ok(())
    }

    async fn list_tasks_by_board(&self, board_id: BoardId) -> StoreResult<Vec<Task>> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::ListTasks(board_id))?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| {
                inner
                    .columns
                    .get(&t.column_id)
                    .is_some_and(|c| c.board_id == board_id)
            })
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.created_at.cmp(&b.created_at)));
        Ok(tasks)
    }

    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::InsertTask(task.title.clone()))?;
        require_title(Entity::Task, &task.title)?;
        if !inner.columns.contains_key(&task.column_id) {
            return Err(StoreError::not_found(Entity::Column, task.column_id));
        }
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            assignee: task.assignee,
            due_date: task.due_date,
            priority: task.priority,
            column_id: task.column_id,
            sort_order: task.sort_order,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::DeleteTask(id))?;
        inner
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Entity::Task, id))
    }

    async fn move_task(
        &self,
        id: TaskId,
        new_column_id: ColumnId,
        new_order: i32,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::MoveTask(id, new_column_id, new_order))?;
        inner.check_move(id, new_column_id)?;
        inner.place_task(id, new_column_id, new_order);
        Ok(())
    }

    async fn move_tasks(&self, moves: &[TaskMove]) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.record(StoreCall::MoveTasks(moves.to_vec()))?;
        for &(id, column_id, _) in moves {
            inner.check_move(id, column_id)?;
        }
        for &(id, column_id, sort_order) in moves {
            inner.place_task(id, column_id, sort_order);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_board(title: &str, user: &str) -> NewBoard {
        NewBoard {
            title: title.into(),
            description: None,
            color: DEFAULT_BOARD_COLOR.into(),
            user_id: user.into(),
        }
    }

    #[tokio::test]
    async fn test_list_boards_newest_first_and_scoped_to_user() {
        let store = MemoryStore::new();
        store.insert_board(new_board("first", "ada")).await.unwrap();
        store.insert_board(new_board("other", "bob")).await.unwrap();
        store.insert_board(new_board("second", "ada")).await.unwrap();

        let boards = store.list_boards("ada").await.unwrap();
        let titles: Vec<_> = boards.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_armed_failure_hits_writes_only() {
        let store = MemoryStore::new();
        let board = store.insert_board(new_board("b", "ada")).await.unwrap();

        store.fail_next_write("network down").await;
        let err = store
            .update_board(board.id, BoardUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(ref m) if m == "network down"));

        // One-shot: the next write goes through, reads were never affected.
        store.get_board(board.id).await.unwrap();
        store.update_board(board.id, BoardUpdate::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_writes_until_healed() {
        let store = MemoryStore::new();
        store.fail_writes("offline").await;
        assert!(store.insert_board(new_board("b", "ada")).await.is_err());
        assert!(store.insert_board(new_board("b", "ada")).await.is_err());
        store.heal().await;
        assert!(store.insert_board(new_board("b", "ada")).await.is_ok());
        assert_eq!(store.write_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let store = MemoryStore::new();
        let board = store.insert_board(new_board("b", "ada")).await.unwrap();
        let column = store
            .insert_column(NewColumn {
                title: "To Do".into(),
                board_id: board.id,
                sort_order: 0,
                user_id: "ada".into(),
            })
            .await
            .unwrap();
        let task = store
            .insert_task(NewTask {
                title: "t".into(),
                description: None,
                assignee: None,
                due_date: None,
                priority: Priority::Low,
                column_id: column.id,
                sort_order: 0,
            })
            .await
            .unwrap();

        store.delete_board(board.id).await.unwrap();
        assert!(store.task(task.id).await.is_none());
        assert!(store.list_columns(board.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_unknown_task_is_not_found() {
        let store = MemoryStore::new();
        let board = store.insert_board(new_board("b", "ada")).await.unwrap();
        let column = store
            .insert_column(NewColumn {
                title: "c".into(),
                board_id: board.id,
                sort_order: 0,
                user_id: "ada".into(),
            })
            .await
            .unwrap();
        let err = store.move_task(Uuid::new_v4(), column.id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: Entity::Task, .. }));
    }

    async fn seed_column(store: &MemoryStore, board: &Board, title: &str) -> Column {
        store
            .insert_column(NewColumn {
                title: title.into(),
                board_id: board.id,
                sort_order: 0,
                user_id: "ada".into(),
            })
            .await
            .unwrap()
    }

    async fn seed_task(store: &MemoryStore, column: &Column, title: &str, sort_order: i32) -> Task {
        store
            .insert_task(NewTask {
                title: title.into(),
                description: None,
                assignee: None,
                due_date: None,
                priority: Priority::Medium,
                column_id: column.id,
                sort_order,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_move_tasks_applies_whole_batch() {
        let store = MemoryStore::new();
        let board = store.insert_board(new_board("b", "ada")).await.unwrap();
        let todo = seed_column(&store, &board, "To Do").await;
        let done = seed_column(&store, &board, "Done").await;
        let t1 = seed_task(&store, &todo, "t1", 0).await;
        let t2 = seed_task(&store, &todo, "t2", 1).await;

        store
            .move_tasks(&[(t1.id, done.id, 0), (t2.id, todo.id, 0)])
            .await
            .unwrap();
        let moved = store.task(t1.id).await.unwrap();
        assert_eq!((moved.column_id, moved.sort_order), (done.id, 0));
        assert_eq!(store.task(t2.id).await.unwrap().sort_order, 0);
        assert_eq!(store.write_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_move_tasks_failing_entry_leaves_earlier_entries_unapplied() {
        let store = MemoryStore::new();
        let board = store.insert_board(new_board("b", "ada")).await.unwrap();
        let todo = seed_column(&store, &board, "To Do").await;
        let done = seed_column(&store, &board, "Done").await;
        let t1 = seed_task(&store, &todo, "t1", 0).await;
        let t2 = seed_task(&store, &todo, "t2", 1).await;

        store.fail_moves_of(t2.id, "disk full").await;
        let err = store
            .move_tasks(&[(t1.id, done.id, 0), (t2.id, todo.id, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(ref m) if m == "disk full"));
        assert_eq!(store.task(t1.id).await.unwrap(), t1);
        assert_eq!(store.task(t2.id).await.unwrap(), t2);

        let err = store
            .move_tasks(&[(t1.id, done.id, 0), (Uuid::new_v4(), todo.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: Entity::Task, .. }));
        assert_eq!(store.task(t1.id).await.unwrap().column_id, todo.id);
    }
}
