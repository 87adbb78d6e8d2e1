//! Reminder entity as stored by the persistence layer.
//!
//! Sub-objects (location data, recurrence rule) travel as JSON blobs; mutate by
//! reading the blob, changing a copy and writing the whole blob back.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::location::LocationData;
use crate::recurrence::RecurrenceRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderType {
    TimeBased,
    LocationBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Assigned by the store on insert; 0 before that.
    pub id: i64,
    pub message: String,
    /// `None` for location-based reminders.
    pub scheduled_time: Option<NaiveDateTime>,
    pub status: ReminderStatus,
    pub created_at: NaiveDateTime,
    pub reminder_type: ReminderType,
    pub location_data: Option<String>,
    pub geofence_id: Option<String>,
    pub recurrence_rule: Option<String>,
    pub snooze_count: u32,
    pub original_scheduled_time: Option<NaiveDateTime>,
}

impl Reminder {
    pub fn time_based(message: impl Into<String>, scheduled_time: NaiveDateTime, created_at: NaiveDateTime) -> Self {
        Self {
            id: 0,
            message: message.into(),
            scheduled_time: Some(scheduled_time),
            status: ReminderStatus::Pending,
            created_at,
            reminder_type: ReminderType::TimeBased,
            location_data: None,
            geofence_id: None,
            recurrence_rule: None,
            snooze_count: 0,
            original_scheduled_time: None,
        }
    }

    pub fn location_based(
        message: impl Into<String>,
        data: &LocationData,
        created_at: NaiveDateTime,
    ) -> Result<Self> {
        Ok(Self {
            id: 0,
            message: message.into(),
            scheduled_time: None,
            status: ReminderStatus::Pending,
            created_at,
            reminder_type: ReminderType::LocationBased,
            location_data: Some(data.to_json()?),
            geofence_id: None,
            recurrence_rule: None,
            snooze_count: 0,
            original_scheduled_time: None,
        })
    }

    pub fn with_recurrence(mut self, rule: &RecurrenceRule) -> Result<Self> {
        self.recurrence_rule = if rule.is_recurring() {
            Some(rule.to_json()?)
        } else {
            None
        };
        Ok(self)
    }

    pub fn with_location(mut self, data: &LocationData) -> Result<Self> {
        self.location_data = Some(data.to_json()?);
        Ok(self)
    }

    pub fn with_status(mut self, status: ReminderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn location(&self) -> Result<Option<LocationData>> {
        self.location_data
            .as_deref()
            .map(LocationData::from_json)
            .transpose()
    }

    pub fn recurrence(&self) -> Result<Option<RecurrenceRule>> {
        self.recurrence_rule
            .as_deref()
            .map(RecurrenceRule::from_json)
            .transpose()
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReminderStatus::Pending
    }

    pub fn is_location_based(&self) -> bool {
        self.reminder_type == ReminderType::LocationBased
    }
}
