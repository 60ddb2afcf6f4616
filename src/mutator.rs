//! Optimistic board mutations.
//!
//! ## Overview
//!
//! [`OptimisticMutator`] owns one board's [`LocalBoardState`] for a UI
//! session and coordinates each edit with the [`RecordStore`]:
//!
//! | Operation             | Local edit applied          | On store failure        |
//! |-----------------------|-----------------------------|-------------------------|
//! | `move_task`           | before the write            | snapshot restored       |
//! | `update_column_title` | before the write            | snapshot restored       |
//! | `delete_column`       | before the write            | snapshot restored       |
//! | `delete_task`         | before the write            | snapshot restored       |
//! | `create_task`         | after the insert resolves   | nothing to undo         |
//! | `create_column`       | after the insert resolves   | nothing to undo         |
//! | `update_board`        | after the write resolves    | nothing to undo         |
//!
//! Creates wait for the store because ids are assigned there; a task with a
//! placeholder id is never visible.
//!
//! Failures never escape as `Err`. They are written to a single sticky error
//! slot (`error()`) and the call reports `None`, `false` or a [`MoveOutcome`].
//! Local validation (blank titles, missing user) fails before any state is
//! touched or any store call is made.
//!
//! ## In-flight moves
//!
//! `move_task` is `begin_move` + store write + `finish_move`. The split form
//! lets several moves be in flight at once. Each `begin_move` takes a fresh
//! per-task sequence number; when a write fails after a newer move of the
//! same task was applied, its rollback is skipped (`MoveOutcome::Superseded`).
//! When other edits were applied since its snapshot, only the failed task is
//! put back where it was instead of restoring the whole snapshot.
//!
//! ## Edits during a drag
//!
//! A drag preview is not a real edit. Every other local edit, rollbacks
//! included, first lifts the preview, applies to the board underneath, then
//! re-anchors the drag at the dragged task's new place. Ending the drag can
//! therefore never bring back a layout that an edit replaced.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::BoardConfig;
use crate::drag::{DragController, DragState, DropOutcome, DropTarget, Point};
use crate::errors::{BoardError, Entity, require_title};
use crate::filter::BoardFilter;
use crate::models::*;
use crate::session::BoardContext;
use crate::state::{BoardSnapshot, LocalBoardState, TaskPosition};
use crate::store::{self, RecordStore, StoreResult, TaskMove};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Task or target column unknown locally; nothing done.
    NotFound,
    /// Already at that column and index; nothing done.
    Unchanged,
    /// Applied locally and persisted.
    Committed,
    /// Persisting failed; the local edit was undone.
    RolledBack,
    /// Persisting failed, but a newer move of the same task already replaced it.
    Superseded,
}

/// A move applied locally whose store write has not resolved yet.
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub task_id: TaskId,
    pub origin: TaskPosition,
    pub target: TaskPosition,
    /// Store writes, moved task first, then siblings whose order changed.
    /// Persisted as one batch.
    pub writes: Vec<TaskMove>,
    snapshot: BoardSnapshot,
    seq: u64,
    generation: u64,
}

#[derive(Debug)]
pub enum MoveStart {
    Done(MoveOutcome),
    InFlight(PendingMove),
}

pub struct OptimisticMutator {
    ctx: BoardContext,
    board_id: BoardId,
    state: LocalBoardState,
    drag: DragController,
    error: Option<String>,
    loaded: bool,
    /// Bumped by every local edit; tells a failing move whether it may restore wholesale.
    generation: u64,
    next_seq: u64,
    latest_move: HashMap<TaskId, u64>,
}

impl OptimisticMutator {
    pub fn new(ctx: BoardContext, board_id: BoardId) -> Self {
        Self {
            ctx,
            board_id,
            state: LocalBoardState::new(),
            drag: DragController::default(),
            error: None,
            loaded: false,
            generation: 0,
            next_seq: 0,
            latest_move: HashMap::new(),
        }
    }

    pub fn with_config(ctx: BoardContext, board_id: BoardId, config: &BoardConfig) -> Self {
        let mut mutator = Self::new(ctx, board_id);
        mutator.drag = DragController::new(config.drag.activation_distance);
        mutator
    }

    pub fn state(&self) -> &LocalBoardState {
        &self.state
    }

    pub fn board(&self) -> Option<&Board> {
        self.state.board()
    }

    pub fn columns(&self) -> &[ColumnWithTasks] {
        self.state.columns()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn fail(&mut self, action: &str, err: impl Into<BoardError>) {
        let err = err.into();
        warn!(board = %self.board_id, error = %err, "{}", action);
        self.error = Some(format!("{}: {}", action, err));
    }

    fn store(&self) -> &dyn RecordStore {
        self.ctx.store()
    }

    /// Run a local edit on the board without the drag preview.
    fn with_base<R>(&mut self, edit: impl FnOnce(&mut Self) -> R) -> R {
        self.drag.lift_preview(&mut self.state);
        let result = edit(self);
        self.drag.rebase(&self.state);
        result
    }

    // ── Load / board ──────────────────────────────────────────────────

    /// Fetch the board and replace local state wholesale.
    pub async fn load(&mut self) -> bool {
        self.error = None;
        match store::fetch_board_with_columns(self.store(), self.board_id).await {
            Ok(data) => {
                info!(board = %self.board_id, columns = data.columns.len(), "board loaded");
                self.with_base(|m| m.state.replace_all(data.board, data.columns));
                self.generation += 1;
                self.loaded = true;
                true
            }
            Err(e) => {
                self.fail("Failed to load the board", e);
                false
            }
        }
    }

    pub async fn update_board(&mut self, mut update: BoardUpdate) -> Option<Board> {
        const ACTION: &str = "Failed to update the board";
        if self.state.board().is_none() {
            self.fail(ACTION, BoardError::BoardNotLoaded);
            return None;
        }
        if let Some(title) = update.title.take() {
            match require_title(Entity::Board, &title) {
                Ok(t) => update.title = Some(t),
                Err(e) => {
                    self.fail(ACTION, e);
                    return None;
                }
            }
        }
        match self.store().update_board(self.board_id, update).await {
            Ok(board) => {
                self.state.set_board(board.clone());
                Some(board)
            }
            Err(e) => {
                self.fail(ACTION, e);
                None
            }
        }
    }

    // ── Moves ─────────────────────────────────────────────────────────

    /// Move a task to `new_index` in `new_column_id`, optimistically.
    pub async fn move_task(
        &mut self,
        task_id: TaskId,
        new_column_id: ColumnId,
        new_index: usize,
    ) -> MoveOutcome {
        let pending = match self.begin_move(task_id, new_column_id, new_index) {
            MoveStart::Done(outcome) => return outcome,
            MoveStart::InFlight(pending) => pending,
        };
        let result = persist_move(self.store(), &pending.writes).await;
        self.finish_move(pending, result)
    }

    /// Apply a move locally and describe the writes needed to persist it.
    pub fn begin_move(
        &mut self,
        task_id: TaskId,
        new_column_id: ColumnId,
        new_index: usize,
    ) -> MoveStart {
        self.with_base(|m| m.apply_move(task_id, new_column_id, new_index))
    }

    fn apply_move(&mut self, task_id: TaskId, new_column_id: ColumnId, new_index: usize) -> MoveStart {
        let Some(origin) = self.state.locate_task(task_id) else {
            debug!(task = %task_id, "move ignored: task not on board");
            return MoveStart::Done(MoveOutcome::NotFound);
        };
        let Some(target_col) = self.state.column(new_column_id) else {
            debug!(column = %new_column_id, "move ignored: column not on board");
            return MoveStart::Done(MoveOutcome::NotFound);
        };
        // Clamp the same way the splice does so the no-op check sees the real landing spot.
        let max = if origin.column_id == new_column_id {
            target_col.tasks.len().saturating_sub(1)
        } else {
            target_col.tasks.len()
        };
        let target = TaskPosition {
            column_id: new_column_id,
            index: new_index.min(max),
        };
        if target == origin {
            return MoveStart::Done(MoveOutcome::Unchanged);
        }

        let snapshot = self.state.snapshot();
        self.state
            .apply_local_move(task_id, origin.column_id, target.column_id, target.index);
        self.generation += 1;
        self.next_seq += 1;
        let seq = self.next_seq;
        self.latest_move.insert(task_id, seq);
        debug!(task = %task_id, from = ?origin, to = ?target, seq, "optimistic move applied");

        let writes = self.pending_writes(task_id, origin.column_id, target);
        MoveStart::InFlight(PendingMove {
            task_id,
            origin,
            target,
            writes,
            snapshot,
            seq,
            generation: self.generation,
        })
    }

    /// The moved task at its new index, then every sibling in the touched
    /// columns whose stored order no longer matches its array position.
    fn pending_writes(
        &self,
        task_id: TaskId,
        source: ColumnId,
        target: TaskPosition,
    ) -> Vec<TaskMove> {
        let mut writes = vec![(task_id, target.column_id, target.index as i32)];
        let mut touched = vec![target.column_id];
        if source != target.column_id {
            touched.push(source);
        }
        for column_id in touched {
            let Some(col) = self.state.column(column_id) else {
                continue;
            };
            for (i, task) in col.tasks.iter().enumerate() {
                if task.id != task_id && task.sort_order != i as i32 {
                    writes.push((task.id, column_id, i as i32));
                }
            }
        }
        writes
    }

    /// Resolve an in-flight move with the store's answer.
    pub fn finish_move(&mut self, pending: PendingMove, result: StoreResult<()>) -> MoveOutcome {
        self.with_base(|m| m.resolve_move(pending, result))
    }

    fn resolve_move(&mut self, pending: PendingMove, result: StoreResult<()>) -> MoveOutcome {
        let is_latest = self.latest_move.get(&pending.task_id) == Some(&pending.seq);
        if is_latest {
            self.latest_move.remove(&pending.task_id);
        }

        match result {
            Ok(()) => {
                if is_latest {
                    self.state.renumber_column(pending.target.column_id);
                    self.state.renumber_column(pending.origin.column_id);
                }
                debug!(task = %pending.task_id, "move committed");
                MoveOutcome::Committed
            }
            Err(e) => {
                let outcome = if !is_latest {
                    MoveOutcome::Superseded
                } else if self.generation == pending.generation {
                    self.state.restore(&pending.snapshot);
                    MoveOutcome::RolledBack
                } else {
                    self.put_back(&pending);
                    MoveOutcome::RolledBack
                };
                self.generation += 1;
                self.fail("Failed to move the task", e);
                outcome
            }
        }
    }

    fn put_back(&mut self, pending: &PendingMove) {
        if let Some(current) = self.state.locate_task(pending.task_id) {
            self.state.apply_local_move(
                pending.task_id,
                current.column_id,
                pending.origin.column_id,
                pending.origin.index,
            );
        }
    }

    // ── Drag ──────────────────────────────────────────────────────────

    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    pub fn press_task(&mut self, task_id: TaskId, point: Point) -> bool {
        self.drag.press(&self.state, task_id, point)
    }

    pub fn pointer_moved(&mut self, point: Point) -> bool {
        self.drag.pointer_move(&self.state, point)
    }

    /// Preview only: no store call.
    pub fn drag_over(&mut self, target: DropTarget) -> bool {
        let changed = self.drag.drag_over(&mut self.state, target);
        if changed {
            self.generation += 1;
        }
        changed
    }

    pub fn cancel_drag(&mut self) -> DropOutcome {
        self.drag.cancel(&mut self.state)
    }

    /// End the gesture; persists through `move_task` only if the task's place changed.
    pub async fn finish_drag(
        &mut self,
        target: Option<DropTarget>,
    ) -> (DropOutcome, Option<MoveOutcome>) {
        let outcome = self.drag.drop(&mut self.state, target);
        match outcome {
            DropOutcome::Move(intent) => {
                let moved = self
                    .move_task(intent.task_id, intent.column_id, intent.index)
                    .await;
                (outcome, Some(moved))
            }
            _ => (outcome, None),
        }
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    /// Insert a task at the end of `column_id`. Visible only once stored.
    pub async fn create_task(&mut self, column_id: ColumnId, draft: TaskDraft) -> Option<Task> {
        const ACTION: &str = "Failed to create the task";
        let new_task = match self.prepare_task(column_id, draft) {
            Ok(t) => t,
            Err(e) => {
                self.fail(ACTION, e);
                return None;
            }
        };
        match self.store().insert_task(new_task).await {
            Ok(task) => {
                info!(task = %task.id, column = %column_id, "task created");
                self.state.apply_local_create(column_id, task.clone());
                Some(task)
            }
            Err(e) => {
                self.fail(ACTION, e);
                None
            }
        }
    }

    fn prepare_task(&self, column_id: ColumnId, draft: TaskDraft) -> Result<NewTask, BoardError> {
        self.ctx.session.require_user()?;
        let title = require_title(Entity::Task, &draft.title)?;
        let column = self.state.column(column_id).ok_or_else(|| BoardError::NotFound {
            entity: Entity::Column,
            id: column_id.to_string(),
        })?;
        Ok(NewTask {
            title,
            description: non_blank(draft.description),
            assignee: non_blank(draft.assignee),
            due_date: draft.due_date,
            priority: draft.priority.unwrap_or_default(),
            column_id,
            sort_order: column.tasks.len() as i32,
        })
    }

    /// Insert a task into the first column.
    pub async fn create_task_in_first_column(&mut self, draft: TaskDraft) -> Option<Task> {
        match self.state.columns().first().map(|c| c.id()) {
            Some(column_id) => self.create_task(column_id, draft).await,
            None => {
                self.fail("Failed to create the task", BoardError::NoColumn);
                None
            }
        }
    }

    pub async fn delete_task(&mut self, task_id: TaskId) -> bool {
        const ACTION: &str = "Failed to delete the task";
        if let Err(e) = self.ctx.session.require_user() {
            self.fail(ACTION, e);
            return false;
        }
        let removed = self.with_base(|m| {
            let pos = m.state.locate_task(task_id)?;
            let snapshot = m.state.snapshot();
            m.state.apply_local_delete(pos.column_id, task_id);
            Some(snapshot)
        });
        let Some(snapshot) = removed else {
            self.fail(
                ACTION,
                BoardError::NotFound {
                    entity: Entity::Task,
                    id: task_id.to_string(),
                },
            );
            return false;
        };
        self.generation += 1;

        let result = self.store().delete_task(task_id).await;
        self.settle(ACTION, &snapshot, result)
    }

    // ── Columns ───────────────────────────────────────────────────────

    /// Append a column. Visible only once stored.
    pub async fn create_column(&mut self, title: &str) -> Option<Column> {
        const ACTION: &str = "Failed to create the column";
        let new_column = match self.prepare_column(title) {
            Ok(c) => c,
            Err(e) => {
                self.fail(ACTION, e);
                return None;
            }
        };
        match self.store().insert_column(new_column).await {
            Ok(column) => {
                info!(column = %column.id, board = %self.board_id, "column created");
                self.state.apply_local_column_create(column.clone());
                Some(column)
            }
            Err(e) => {
                self.fail(ACTION, e);
                None
            }
        }
    }

    fn prepare_column(&self, title: &str) -> Result<NewColumn, BoardError> {
        let board = self.state.board().ok_or(BoardError::BoardNotLoaded)?;
        let user_id = self.ctx.session.require_user()?;
        let title = require_title(Entity::Column, title)?;
        Ok(NewColumn {
            title,
            board_id: board.id,
            sort_order: self.state.columns().len() as i32,
            user_id: user_id.to_string(),
        })
    }

    pub async fn update_column_title(&mut self, column_id: ColumnId, title: &str) -> Option<Column> {
        const ACTION: &str = "Failed to update the column";
        let title = match require_title(Entity::Column, title) {
            Ok(t) => t,
            Err(e) => {
                self.fail(ACTION, e);
                return None;
            }
        };
        let (snapshot, applied) = self.with_base(|m| {
            let snapshot = m.state.snapshot();
            let applied = m.state.apply_local_column_title(column_id, &title);
            (snapshot, applied)
        });
        if !applied {
            self.fail(
                ACTION,
                BoardError::NotFound {
                    entity: Entity::Column,
                    id: column_id.to_string(),
                },
            );
            return None;
        }
        self.generation += 1;

        match self.store().update_column_title(column_id, &title).await {
            Ok(column) => {
                self.state.merge_column(column.clone());
                Some(column)
            }
            Err(e) => {
                self.settle(ACTION, &snapshot, Err(e));
                None
            }
        }
    }

    /// Remove a column and, with it, all of its tasks.
    pub async fn delete_column(&mut self, column_id: ColumnId) -> bool {
        const ACTION: &str = "Failed to delete the column";
        if let Err(e) = self.ctx.session.require_user() {
            self.fail(ACTION, e);
            return false;
        }
        let (snapshot, removed) = self.with_base(|m| {
            let snapshot = m.state.snapshot();
            let removed = m.state.apply_local_column_delete(column_id);
            (snapshot, removed)
        });
        let Some(removed) = removed else {
            self.fail(
                ACTION,
                BoardError::NotFound {
                    entity: Entity::Column,
                    id: column_id.to_string(),
                },
            );
            return false;
        };
        self.generation += 1;
        debug!(column = %column_id, tasks = removed.tasks.len(), "optimistic column delete");

        let result = self.store().delete_column(column_id).await;
        self.settle(ACTION, &snapshot, result)
    }

    /// Keep the optimistic edit on success; restore `snapshot` on failure.
    fn settle(&mut self, action: &str, snapshot: &BoardSnapshot, result: StoreResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.with_base(|m| m.state.restore(snapshot));
                self.generation += 1;
                self.fail(action, e);
                false
            }
        }
    }
}

/// Persist a move's writes as one batch: all of them land or none do.
pub async fn persist_move(store: &dyn RecordStore, writes: &[TaskMove]) -> StoreResult<()> {
    store.move_tasks(writes).await
}

/// The dashboard: boards owned by the session user.
pub struct BoardList {
    ctx: BoardContext,
    boards: Vec<Board>,
    error: Option<String>,
    default_color: String,
    column_titles: Vec<String>,
}

impl BoardList {
    pub fn new(ctx: BoardContext) -> Self {
        Self {
            ctx,
            boards: Vec::new(),
            error: None,
            default_color: DEFAULT_BOARD_COLOR.to_string(),
            column_titles: store::default_column_titles(),
        }
    }

    pub fn with_config(ctx: BoardContext, config: &BoardConfig) -> Self {
        Self {
            default_color: config.boards.default_color.clone(),
            column_titles: config.boards.default_columns.clone(),
            ..Self::new(ctx)
        }
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    /// Loaded boards narrowed by `filter`, newest first.
    pub fn filtered(&self, filter: &BoardFilter) -> Vec<Board> {
        filter.apply(&self.boards)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn fail(&mut self, action: &str, err: impl Into<BoardError>) {
        let err = err.into();
        warn!(error = %err, "{}", action);
        self.error = Some(format!("{}: {}", action, err));
    }

    /// Load the session user's boards, newest first. Signed out loads nothing.
    pub async fn load(&mut self) -> bool {
        let Some(user_id) = self.ctx.session.user_id().map(str::to_string) else {
            return false;
        };
        self.error = None;
        match self.ctx.store().list_boards(&user_id).await {
            Ok(boards) => {
                self.boards = boards;
                true
            }
            Err(e) => {
                self.fail("Failed to load boards", e);
                false
            }
        }
    }

    /// Create a board with the default columns and put it first.
    pub async fn create_board(&mut self, draft: BoardDraft) -> Option<Board> {
        const ACTION: &str = "Failed to create the board";
        let new_board = match self.prepare_board(draft) {
            Ok(b) => b,
            Err(e) => {
                self.fail(ACTION, e);
                return None;
            }
        };
        match store::create_board_with_default_columns(self.ctx.store(), new_board, &self.column_titles)
            .await
        {
            Ok(board) => {
                info!(board = %board.id, "board created");
                self.boards.insert(0, board.clone());
                Some(board)
            }
            Err(e) => {
                self.fail(ACTION, e);
                None
            }
        }
    }

    fn prepare_board(&self, draft: BoardDraft) -> Result<NewBoard, BoardError> {
        let user_id = self.ctx.session.require_user()?;
        let title = require_title(Entity::Board, &draft.title)?;
        Ok(NewBoard {
            title,
            description: non_blank(draft.description),
            color: non_blank(draft.color).unwrap_or_else(|| self.default_color.clone()),
            user_id: user_id.to_string(),
        })
    }

    pub async fn delete_board(&mut self, board_id: BoardId) -> bool {
        const ACTION: &str = "Failed to delete the board";
        if let Err(e) = self.ctx.session.require_user() {
            self.fail(ACTION, e);
            return false;
        }
        match self.ctx.store().delete_board(board_id).await {
            Ok(()) => {
                self.boards.retain(|b| b.id != board_id);
                true
            }
            Err(e) => {
                self.fail(ACTION, e);
                false
            }
        }
    }
}
