//! To-do task model created from voice commands.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    High = 0,
    #[default]
    Medium = 1,
    Low = 2,
}

impl TaskPriority {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "high" | "urgent" => Some(TaskPriority::High),
            "medium" | "normal" => Some(TaskPriority::Medium),
            "low" => Some(TaskPriority::Low),
            _ => None,
        }
    }
}

/// Core task type.
///
/// Note: we keep this small + serializable. Storage is behind a port in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by the store on insert.
    pub id: i64,
    pub title: String,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub recurrence_rule: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, created_at: NaiveDateTime) -> Self {
        Self {
            id: 0,
            title: title.into(),
            priority: TaskPriority::Medium,
            due_date: None,
            completed: false,
            completed_at: None,
            created_at,
            recurrence_rule: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_recurrence(mut self, rule: &RecurrenceRule) -> Result<Self> {
        self.recurrence_rule = if rule.is_recurring() {
            Some(rule.to_json()?)
        } else {
            None
        };
        Ok(self)
    }

    pub fn recurrence(&self) -> Result<Option<RecurrenceRule>> {
        self.recurrence_rule
            .as_deref()
            .map(RecurrenceRule::from_json)
            .transpose()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|d| d < today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_words() {
        assert_eq!(TaskPriority::from_word("HIGH"), Some(TaskPriority::High));
        assert_eq!(TaskPriority::from_word("low"), Some(TaskPriority::Low));
        assert_eq!(TaskPriority::from_word("someday"), None);
        assert!(TaskPriority::High < TaskPriority::Low);
    }

    #[test]
    fn overdue_only_when_open_and_past_due() {
        let created = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let mut t = Task::new("file taxes", created).with_due_date(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        assert!(t.is_overdue(today));
        t.completed = true;
        assert!(!t.is_overdue(today));
    }
}
