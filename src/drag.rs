//! Drag interaction state machine.
//!
//! ```text
//!   press ──> Pressed ──(moved ≥ activation distance)──> Dragging
//!     ^          │                                          │
//!     │       release (click)             drag_over: preview splice, no I/O
//!     │          v                                          │
//!     └──────── Idle <──── drop / cancel (task put back) ────┘
//! ```
//!
//! Previews splice `LocalBoardState` directly so the board re-renders as the
//! pointer moves. Only the dragged task is ever displaced, so every exit from
//! `Dragging` puts that one task back at its origin and leaves the rest of the
//! board as it is now. A drop that changes the task's place yields a
//! [`MoveIntent`] for the mutator to apply and persist.
//!
//! Edits made elsewhere while dragging must go through
//! [`DragController::lift_preview`] and [`DragController::rebase`] so the
//! recorded origin stays valid.

use serde::Serialize;

use crate::models::{ColumnId, TaskId};
use crate::state::{LocalBoardState, TaskPosition};

pub const DEFAULT_ACTIVATION_DISTANCE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// What the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// The body of a column; lands at its end.
    Column(ColumnId),
    /// Another task; lands at that task's index.
    Task(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveIntent {
    pub task_id: TaskId,
    pub column_id: ColumnId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released before the activation distance; treat as a click.
    Click(TaskId),
    /// Dropped outside any target or cancelled; nothing changed.
    Cancelled,
    /// Dropped back where it started.
    Unchanged,
    Move(MoveIntent),
    /// No gesture was in progress.
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Pressed {
        task_id: TaskId,
        origin_point: Point,
    },
    Dragging {
        task_id: TaskId,
        /// Where the task sits on the board without the preview.
        origin: TaskPosition,
    },
}

#[derive(Debug, Clone)]
pub struct DragController {
    state: DragState,
    activation_distance: f64,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVATION_DISTANCE)
    }
}

impl DragController {
    pub fn new(activation_distance: f64) -> Self {
        Self {
            state: DragState::Idle,
            activation_distance,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn active_task(&self) -> Option<TaskId> {
        match &self.state {
            DragState::Idle => None,
            DragState::Pressed { task_id, .. } | DragState::Dragging { task_id, .. } => Some(*task_id),
        }
    }

    /// Pointer down on a task. Ignored unless idle and the task exists.
    pub fn press(&mut self, board: &LocalBoardState, task_id: TaskId, point: Point) -> bool {
        if !matches!(self.state, DragState::Idle) || board.locate_task(task_id).is_none() {
            return false;
        }
        self.state = DragState::Pressed {
            task_id,
            origin_point: point,
        };
        true
    }

    /// Pointer moved. Returns `true` on the move that activates the drag.
    pub fn pointer_move(&mut self, board: &LocalBoardState, point: Point) -> bool {
        let DragState::Pressed {
            task_id,
            origin_point,
        } = self.state
        else {
            return false;
        };
        if origin_point.distance(&point) < self.activation_distance {
            return false;
        }
        let Some(origin) = board.locate_task(task_id) else {
            self.state = DragState::Idle;
            return false;
        };
        tracing::debug!(task = %task_id, "drag activated");
        self.state = DragState::Dragging { task_id, origin };
        true
    }

    /// Preview the task at `target`. Returns `true` if the preview changed.
    pub fn drag_over(&mut self, board: &mut LocalBoardState, target: DropTarget) -> bool {
        let DragState::Dragging { task_id, .. } = self.state else {
            return false;
        };
        let Some(current) = board.locate_task(task_id) else {
            return false;
        };
        match resolve_target(board, task_id, current, target) {
            Some(next) if next != current => {
                board.apply_local_move(task_id, current.column_id, next.column_id, next.index)
            }
            _ => false,
        }
    }

    /// Release the pointer over `target`, or outside any target with `None`.
    pub fn drop(&mut self, board: &mut LocalBoardState, target: Option<DropTarget>) -> DropOutcome {
        let Some(target) = target else {
            return self.cancel(board);
        };
        self.drag_over(board, target);
        let landed = self.active_task().and_then(|id| board.locate_task(id));
        self.lift_preview(board);
        match std::mem::take(&mut self.state) {
            DragState::Idle => DropOutcome::Ignored,
            DragState::Pressed { task_id, .. } => DropOutcome::Click(task_id),
            DragState::Dragging { task_id, origin } => match landed {
                Some(pos) if pos == origin => DropOutcome::Unchanged,
                Some(pos) => DropOutcome::Move(MoveIntent {
                    task_id,
                    column_id: pos.column_id,
                    index: pos.index,
                }),
                None => DropOutcome::Cancelled,
            },
        }
    }

    /// Abort the gesture, undoing any preview splices.
    pub fn cancel(&mut self, board: &mut LocalBoardState) -> DropOutcome {
        self.lift_preview(board);
        match std::mem::take(&mut self.state) {
            DragState::Idle => DropOutcome::Ignored,
            DragState::Pressed { .. } | DragState::Dragging { .. } => DropOutcome::Cancelled,
        }
    }

    /// Put the dragged task back at its origin. The gesture stays active.
    pub fn lift_preview(&mut self, board: &mut LocalBoardState) {
        let DragState::Dragging { task_id, origin } = self.state else {
            return;
        };
        if let Some(current) = board.locate_task(task_id).filter(|pos| *pos != origin) {
            board.apply_local_move(task_id, current.column_id, origin.column_id, origin.index);
        }
    }

    /// Re-read the dragged task's origin after an edit. A task that is gone ends the gesture.
    pub fn rebase(&mut self, board: &LocalBoardState) {
        let DragState::Dragging { task_id, .. } = self.state else {
            return;
        };
        match board.locate_task(task_id) {
            Some(pos) => self.state = DragState::Dragging { task_id, origin: pos },
            None => {
                tracing::debug!(task = %task_id, "dragged task removed; drag ended");
                self.state = DragState::Idle;
            }
        }
    }
}

/// Where `task_id` would land for `target`, given its `current` position.
fn resolve_target(
    board: &LocalBoardState,
    task_id: TaskId,
    current: TaskPosition,
    target: DropTarget,
) -> Option<TaskPosition> {
    match target {
        DropTarget::Task(over) if over == task_id => None,
        DropTarget::Task(over) => board.locate_task(over),
        DropTarget::Column(column_id) if column_id == current.column_id => None,
        DropTarget::Column(column_id) => board.column(column_id).map(|col| TaskPosition {
            column_id,
            index: col.tasks.len(),
        }),
    }
}
