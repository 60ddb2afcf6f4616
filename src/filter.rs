//! Task filtering by priority, assignee and due date; board filtering by
//! title and creation date.
//!
//! Filtering is a read-side view; it never touches `LocalBoardState`.

use chrono::NaiveDate;

use crate::models::{Board, ColumnWithTasks, Priority, Task};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// Any of these priorities; empty means any priority.
    pub priorities: Vec<Priority>,
    /// Case-insensitive exact match on the assignee.
    pub assignee: Option<String>,
    /// Tasks due on or before this date. Tasks without a due date are excluded.
    pub due_on_or_before: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Number of active criteria (shown next to the filter button).
    pub fn active_count(&self) -> usize {
        usize::from(!self.priorities.is_empty())
            + usize::from(self.assignee.is_some())
            + usize::from(self.due_on_or_before.is_some())
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        if let Some(wanted) = &self.assignee {
            match &task.assignee {
                Some(a) if a.eq_ignore_ascii_case(wanted) => {}
                _ => return false,
            }
        }
        if let Some(limit) = self.due_on_or_before {
            match task.due_date {
                Some(due) if due <= limit => {}
                _ => return false,
            }
        }
        true
    }

    /// Columns in the same order, each keeping only matching tasks.
    pub fn apply(&self, columns: &[ColumnWithTasks]) -> Vec<ColumnWithTasks> {
        columns
            .iter()
            .map(|col| ColumnWithTasks {
                column: col.column.clone(),
                tasks: col.tasks.iter().filter(|t| self.matches(t)).cloned().collect(),
            })
            .collect()
    }
}

/// Dashboard filter. Date bounds are whole UTC days, both inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardFilter {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl BoardFilter {
    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    pub fn active_count(&self) -> usize {
        usize::from(self.search.is_some())
            + usize::from(self.created_from.is_some() || self.created_to.is_some())
    }

    pub fn matches(&self, board: &Board) -> bool {
        if let Some(search) = &self.search
            && !board.title.to_lowercase().contains(&search.to_lowercase())
        {
            return false;
        }
        let created = board.created_at.date_naive();
        self.created_from.is_none_or(|from| created >= from)
            && self.created_to.is_none_or(|to| created <= to)
    }

    /// Matching boards, order kept.
    pub fn apply(&self, boards: &[Board]) -> Vec<Board> {
        boards.iter().filter(|b| self.matches(b)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fixtures::*;

    fn sample() -> Vec<ColumnWithTasks> {
        let b = board();
        let col = column(&b, "To Do", 0);
        let mut high = task(&col, "high", 0);
        high.priority = Priority::High;
        high.assignee = Some("Ada".into());
        high.due_date = NaiveDate::from_ymd_opt(2026, 1, 10);
        let mut low = task(&col, "low", 1);
        low.priority = Priority::Low;
        low.due_date = NaiveDate::from_ymd_opt(2026, 2, 1);
        let plain = task(&col, "plain", 2);
        vec![ColumnWithTasks::new(col, vec![high, low, plain])]
    }

    fn titles(columns: &[ColumnWithTasks]) -> Vec<String> {
        columns[0].tasks.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = TaskFilter::default();
        assert!(filter.is_empty());
        assert_eq!(titles(&filter.apply(&sample())), vec!["high", "low", "plain"]);
    }

    #[test]
    fn test_priority_filter() {
        let filter = TaskFilter {
            priorities: vec![Priority::Low, Priority::Medium],
            ..TaskFilter::default()
        };
        assert_eq!(titles(&filter.apply(&sample())), vec!["low", "plain"]);
    }

    #[test]
    fn test_assignee_filter_ignores_case() {
        let filter = TaskFilter {
            assignee: Some("ada".into()),
            ..TaskFilter::default()
        };
        assert_eq!(titles(&filter.apply(&sample())), vec!["high"]);
    }

    #[test]
    fn test_due_date_filter_excludes_undated() {
        let filter = TaskFilter {
            due_on_or_before: NaiveDate::from_ymd_opt(2026, 1, 31),
            ..TaskFilter::default()
        };
        assert_eq!(titles(&filter.apply(&sample())), vec!["high"]);
        assert_eq!(filter.active_count(), 1);
    }

    #[test]
    fn test_criteria_combine() {
        let filter = TaskFilter {
            priorities: vec![Priority::High],
            assignee: Some("bob".into()),
            due_on_or_before: None,
        };
        assert_eq!(filter.active_count(), 2);
        assert!(filter.apply(&sample())[0].tasks.is_empty());
    }

    fn boards() -> Vec<Board> {
        let created = |title: &str, day: u32| {
            let mut b = board();
            b.title = title.into();
            b.created_at = NaiveDate::from_ymd_opt(2026, 3, day)
                .and_then(|d| d.and_hms_opt(23, 30, 0))
                .unwrap()
                .and_utc();
            b
        };
        vec![created("Roadmap", 20), created("Sprint 12", 10), created("road trip", 1)]
    }

    fn board_titles(boards: &[Board]) -> Vec<String> {
        boards.iter().map(|b| b.title.clone()).collect()
    }

    #[test]
    fn test_board_search_is_case_insensitive_substring() {
        let filter = BoardFilter {
            search: Some("ROAD".into()),
            ..BoardFilter::default()
        };
        assert_eq!(board_titles(&filter.apply(&boards())), vec!["Roadmap", "road trip"]);
        assert_eq!(filter.active_count(), 1);
    }

    #[test]
    fn test_board_date_range_includes_both_end_days() {
        let filter = BoardFilter {
            created_from: NaiveDate::from_ymd_opt(2026, 3, 10),
            created_to: NaiveDate::from_ymd_opt(2026, 3, 20),
            ..BoardFilter::default()
        };
        assert_eq!(board_titles(&filter.apply(&boards())), vec!["Roadmap", "Sprint 12"]);
        assert_eq!(filter.active_count(), 1);

        let open_start = BoardFilter {
            created_to: NaiveDate::from_ymd_opt(2026, 3, 9),
            ..BoardFilter::default()
        };
        assert_eq!(board_titles(&open_start.apply(&boards())), vec!["road trip"]);
    }

    #[test]
    fn test_board_criteria_combine() {
        let filter = BoardFilter {
            search: Some("road".into()),
            created_from: NaiveDate::from_ymd_opt(2026, 3, 2),
            created_to: None,
        };
        assert_eq!(board_titles(&filter.apply(&boards())), vec!["Roadmap"]);
        assert!(BoardFilter::default().is_empty());
        assert_eq!(BoardFilter::default().apply(&boards()).len(), 3);
    }
}
