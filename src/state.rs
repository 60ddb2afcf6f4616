//! In-memory view of one board: ordered columns, each with ordered tasks.
//!
//! Everything here is synchronous and does no I/O. The mutator decides when
//! an edit is speculative and when it reflects a confirmed write.

use std::sync::Arc;

use serde::Serialize;

use crate::models::*;

/// Where a task sits: its column and its index in that column's array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskPosition {
    pub column_id: ColumnId,
    pub index: usize,
}

/// Immutable copy of the whole local state, restored wholesale on rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    inner: Arc<(Option<Board>, Vec<ColumnWithTasks>)>,
}

impl BoardSnapshot {
    pub fn columns(&self) -> &[ColumnWithTasks] {
        &self.inner.1
    }

    /// Position of a task as of the snapshot.
    pub fn locate_task(&self, task_id: TaskId) -> Option<TaskPosition> {
        locate(&self.inner.1, task_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalBoardState {
    board: Option<Board>,
    columns: Vec<ColumnWithTasks>,
}

fn locate(columns: &[ColumnWithTasks], task_id: TaskId) -> Option<TaskPosition> {
    columns.iter().find_map(|col| {
        col.position_of(task_id).map(|index| TaskPosition {
            column_id: col.id(),
            index,
        })
    })
}

impl LocalBoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything after a full load.
    pub fn replace_all(&mut self, board: Board, mut columns: Vec<ColumnWithTasks>) {
        columns.sort_by_key(|c| c.column.sort_order);
        for col in &mut columns {
            col.tasks.sort_by_key(|t| t.sort_order);
        }
        self.board = Some(board);
        self.columns = columns;
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            inner: Arc::new((self.board.clone(), self.columns.clone())),
        }
    }

    pub fn restore(&mut self, snapshot: &BoardSnapshot) {
        self.board = snapshot.inner.0.clone();
        self.columns = snapshot.inner.1.clone();
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn set_board(&mut self, board: Board) {
        self.board = Some(board);
    }

    pub fn columns(&self) -> &[ColumnWithTasks] {
        &self.columns
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&ColumnWithTasks> {
        self.columns.iter().find(|c| c.id() == column_id)
    }

    fn column_mut(&mut self, column_id: ColumnId) -> Option<&mut ColumnWithTasks> {
        self.columns.iter_mut().find(|c| c.id() == column_id)
    }

    fn column_index(&self, column_id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == column_id)
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.id == task_id)
    }

    pub fn locate_task(&self, task_id: TaskId) -> Option<TaskPosition> {
        locate(&self.columns, task_id)
    }

    pub fn total_tasks(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Remove the task from `source_column_id` and insert it into
    /// `target_column_id` at `target_index` (clamped to the target length).
    ///
    /// Returns `false` and leaves state untouched when the task is not in
    /// the source column or the target column does not exist.
    pub fn apply_local_move(
        &mut self,
        task_id: TaskId,
        source_column_id: ColumnId,
        target_column_id: ColumnId,
        target_index: usize,
    ) -> bool {
        let Some(target) = self.column_index(target_column_id) else {
            return false;
        };
        let Some(source) = self.column_index(source_column_id) else {
            return false;
        };
        let Some(from) = self.columns[source].position_of(task_id) else {
            return false;
        };
        let mut task = self.columns[source].tasks.remove(from);
        task.column_id = target_column_id;

        let tasks = &mut self.columns[target].tasks;
        let at = target_index.min(tasks.len());
        tasks.insert(at, task);
        true
    }

    /// Append a confirmed task to its column.
    pub fn apply_local_create(&mut self, column_id: ColumnId, task: Task) -> bool {
        match self.column_mut(column_id) {
            Some(col) => {
                col.tasks.push(task);
                true
            }
            None => false,
        }
    }

    pub fn apply_local_delete(&mut self, column_id: ColumnId, task_id: TaskId) -> Option<Task> {
        let col = self.column_mut(column_id)?;
        let index = col.position_of(task_id)?;
        Some(col.tasks.remove(index))
    }

    pub fn apply_local_column_create(&mut self, column: Column) {
        self.columns.push(ColumnWithTasks {
            column,
            tasks: Vec::new(),
        });
    }

    pub fn apply_local_column_title(&mut self, column_id: ColumnId, title: &str) -> bool {
        match self.column_mut(column_id) {
            Some(col) => {
                col.column.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// Merge a confirmed column record, keeping the local task list.
    pub fn merge_column(&mut self, column: Column) -> bool {
        match self.column_mut(column.id) {
            Some(col) => {
                col.column = column;
                true
            }
            None => false,
        }
    }

    /// Drop a column together with every task it holds.
    pub fn apply_local_column_delete(&mut self, column_id: ColumnId) -> Option<ColumnWithTasks> {
        let index = self.column_index(column_id)?;
        Some(self.columns.remove(index))
    }

    /// Make `sort_order` match array position within a column.
    pub fn renumber_column(&mut self, column_id: ColumnId) {
        if let Some(col) = self.column_mut(column_id) {
            for (i, task) in col.tasks.iter_mut().enumerate() {
                task.sort_order = i as i32;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    pub fn board() -> Board {
        let now = Utc::now();
        Board {
            id: Uuid::new_v4(),
            title: "Board".into(),
            description: None,
            color: DEFAULT_BOARD_COLOR.into(),
            user_id: "ada".into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn column(board: &Board, title: &str, sort_order: i32) -> Column {
        let now = Utc::now();
        Column {
            id: Uuid::new_v4(),
            title: title.into(),
            board_id: board.id,
            sort_order,
            user_id: board.user_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task(column: &Column, title: &str, sort_order: i32) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            assignee: None,
            due_date: None,
            priority: Priority::Medium,
            column_id: column.id,
            sort_order,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn titles(state: &LocalBoardState, column_id: ColumnId) -> Vec<String> {
        state
            .column(column_id)
            .map(|c| c.tasks.iter().map(|t| t.title.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    /// Column A = [T1, T2, T3], column B = [].
    fn two_columns() -> (LocalBoardState, ColumnId, ColumnId) {
        let b = board();
        let a = column(&b, "A", 0);
        let bb = column(&b, "B", 1);
        let tasks = vec![task(&a, "T1", 0), task(&a, "T2", 1), task(&a, "T3", 2)];
        let (a_id, b_id) = (a.id, bb.id);
        let mut state = LocalBoardState::new();
        state.replace_all(
            b,
            vec![ColumnWithTasks::new(bb, vec![]), ColumnWithTasks::new(a, tasks)],
        );
        (state, a_id, b_id)
    }

    fn id_of(state: &LocalBoardState, title: &str) -> TaskId {
        state
            .columns()
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.title == title)
            .map(|t| t.id)
            .expect("task present")
    }

    #[test]
    fn test_replace_all_orders_columns_by_sort_order() {
        let (state, a, b) = two_columns();
        assert_eq!(state.columns()[0].id(), a);
        assert_eq!(state.columns()[1].id(), b);
        assert_eq!(state.total_tasks(), 3);
    }

    #[test]
    fn test_move_within_column_is_remove_then_insert() {
        let (mut state, a, _) = two_columns();
        let t1 = id_of(&state, "T1");
        assert!(state.apply_local_move(t1, a, a, 2));
        assert_eq!(titles(&state, a), vec!["T2", "T3", "T1"]);

        let t3 = id_of(&state, "T3");
        assert!(state.apply_local_move(t3, a, a, 0));
        assert_eq!(titles(&state, a), vec!["T3", "T2", "T1"]);
    }

    #[test]
    fn test_move_into_empty_column_lands_at_zero() {
        let (mut state, a, b) = two_columns();
        let t2 = id_of(&state, "T2");
        assert!(state.apply_local_move(t2, a, b, 0));
        assert_eq!(titles(&state, b), vec!["T2"]);
        assert_eq!(titles(&state, a), vec!["T1", "T3"]);
        assert_eq!(state.task(t2).unwrap().column_id, b);
    }

    #[test]
    fn test_move_index_is_clamped() {
        let (mut state, a, b) = two_columns();
        let t1 = id_of(&state, "T1");
        assert!(state.apply_local_move(t1, a, b, 99));
        assert_eq!(state.locate_task(t1), Some(TaskPosition { column_id: b, index: 0 }));
    }

    #[test]
    fn test_move_with_wrong_source_is_rejected() {
        let (mut state, a, b) = two_columns();
        let before = state.clone();
        let t1 = id_of(&state, "T1");
        assert!(!state.apply_local_move(t1, b, a, 0));
        assert!(!state.apply_local_move(t1, a, uuid::Uuid::new_v4(), 0));
        assert_eq!(state, before);
    }

    #[test]
    fn test_snapshot_restore_is_wholesale() {
        let (mut state, a, b) = two_columns();
        let snapshot = state.snapshot();
        let t1 = id_of(&state, "T1");
        state.apply_local_move(t1, a, b, 0);
        state.apply_local_column_delete(a);
        assert_ne!(state.snapshot(), snapshot);

        state.restore(&snapshot);
        assert_eq!(state.snapshot(), snapshot);
        assert_eq!(titles(&state, a), vec!["T1", "T2", "T3"]);
        assert_eq!(snapshot.locate_task(t1), Some(TaskPosition { column_id: a, index: 0 }));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_edits() {
        let (mut state, a, _) = two_columns();
        let snapshot = state.snapshot();
        state.apply_local_column_title(a, "Renamed");
        assert_eq!(snapshot.columns()[0].column.title, "A");
    }

    #[test]
    fn test_create_and_delete_task() {
        let (mut state, a, b) = two_columns();
        let col_b = state.column(b).unwrap().column.clone();
        let new_task = task(&col_b, "T4", 0);
        let id = new_task.id;
        assert!(state.apply_local_create(b, new_task));
        assert_eq!(titles(&state, b), vec!["T4"]);

        let removed = state.apply_local_delete(b, id).expect("removed");
        assert_eq!(removed.title, "T4");
        assert!(state.apply_local_delete(a, id).is_none());
    }

    #[test]
    fn test_column_delete_drops_its_tasks() {
        let (mut state, a, _) = two_columns();
        let t1 = id_of(&state, "T1");
        let removed = state.apply_local_column_delete(a).expect("removed");
        assert_eq!(removed.tasks.len(), 3);
        assert!(state.task(t1).is_none());
        assert_eq!(state.total_tasks(), 0);
    }

    #[test]
    fn test_renumber_matches_array_order() {
        let (mut state, a, _) = two_columns();
        let t3 = id_of(&state, "T3");
        state.apply_local_move(t3, a, a, 0);
        state.renumber_column(a);
        let orders: Vec<_> = state.column(a).unwrap().tasks.iter().map(|t| t.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(state.task(t3).unwrap().sort_order, 0);
    }
}
