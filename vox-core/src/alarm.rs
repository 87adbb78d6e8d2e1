//! Alarm entity; recurrence follows the same rule contract as reminders.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: i64,
    pub label: String,
    pub scheduled_time: NaiveDateTime,
    pub recurrence_rule: Option<String>,
    pub enabled: bool,
    pub snooze_count: u32,
    pub created_at: NaiveDateTime,
}

impl Alarm {
    pub fn new(label: impl Into<String>, scheduled_time: NaiveDateTime, created_at: NaiveDateTime) -> Self {
        Self {
            id: 0,
            label: label.into(),
            scheduled_time,
            recurrence_rule: None,
            enabled: true,
            snooze_count: 0,
            created_at,
        }
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
}
