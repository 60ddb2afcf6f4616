use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BoardId = Uuid;
pub type ColumnId = Uuid;
pub type TaskId = Uuid;

pub const DEFAULT_BOARD_COLOR: &str = "bg-blue-500";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub color: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub board_id: BoardId,
    pub sort_order: i32,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub column_id: ColumnId,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column joined with its tasks, ordered by `sort_order` ascending.
/// Built on read; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnWithTasks {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
}

impl ColumnWithTasks {
    pub fn new(column: Column, mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(|t| t.sort_order);
        Self { column, tasks }
    }

    pub fn id(&self) -> ColumnId {
        self.column.id
    }

    pub fn position_of(&self, task_id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardWithColumns {
    pub board: Board,
    pub columns: Vec<ColumnWithTasks>,
}

// Insert payloads. Ids and timestamps are assigned by the record store.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBoard {
    pub title: String,
    pub description: Option<String>,
    pub color: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewColumn {
    pub title: String,
    pub board_id: BoardId,
    pub sort_order: i32,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub column_id: ColumnId,
    pub sort_order: i32,
}

/// Partial board update; `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

// Drafts are what the user supplies; the mutator fills in placement and ownership.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardDraft {
    pub title: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Treat empty or whitespace-only optional text as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trips_through_str() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_str(p.as_str()).unwrap(), p);
        }
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn test_priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(TaskDraft::titled("x").priority, None);
    }

    #[test]
    fn test_priority_serializes_snake_case() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
    }

    #[test]
    fn test_non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" ada ".into())), Some("ada".into()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_column_with_tasks_sorts_by_sort_order() {
        let now = Utc::now();
        let column = Column {
            id: Uuid::new_v4(),
            title: "To Do".into(),
            board_id: Uuid::new_v4(),
            sort_order: 0,
            user_id: "u".into(),
            created_at: now,
            updated_at: now,
        };
        let task = |title: &str, sort_order| Task {
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
        };
        let cwt = ColumnWithTasks::new(column.clone(), vec![task("b", 5), task("a", 1)]);
        assert_eq!(cwt.tasks[0].title, "a");
        assert_eq!(cwt.tasks[1].title, "b");
        assert_eq!(cwt.position_of(cwt.tasks[1].id), Some(1));
    }
}
