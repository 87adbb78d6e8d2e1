//! Transcript in, manager call out.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};
use vox_core::time::format_friendly;
use vox_core::{TransactionType, TriggerType};
use vox_parse::{Command, CommandKind, CommandParser};

use crate::alarms::EnhancedAlarmManager;
use crate::error::{EngineError, EngineResult};
use crate::finance::FinanceManager;
use crate::location_reminders::LocationReminderManager;
use crate::ports::{AlarmKey, Clock};
use crate::reminders::ReminderManager;
use crate::tasks::{TaskCompletion, TaskManager};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub kind: CommandKind,
    pub entity_id: Option<i64>,
    /// What to show or speak back.
    pub message: String,
}

impl CommandResponse {
    fn new(kind: CommandKind, entity_id: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct CommandRouter {
    pub(crate) parser: Arc<CommandParser>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) reminders: Arc<ReminderManager>,
    pub(crate) alarms: Arc<EnhancedAlarmManager>,
    pub(crate) tasks: Arc<TaskManager>,
    pub(crate) finance: Arc<FinanceManager>,
    pub(crate) locations: Arc<LocationReminderManager>,
}

impl CommandRouter {
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub async fn handle(&self, text: &str) -> EngineResult<CommandResponse> {
        let now = self.clock.now();
        let command = self.parser.parse(text, now)?;
        let kind = command.kind();
        debug!(?kind, "routing command");

        let response = match command {
            Command::Timed(cmd) if cmd.kind == CommandKind::Alarm => {
                let alarm = self.alarms.create(&cmd).await?;
                CommandResponse::new(
                    kind,
                    Some(alarm.id),
                    format!("Alarm set for {}.", format_friendly(alarm.scheduled_time)),
                )
            }
            Command::Timed(cmd) => {
                let reminder = self.reminders.create(&cmd).await?;
                CommandResponse::new(
                    kind,
                    Some(reminder.id),
                    format!("Okay, I'll remind you to {} on {}.", cmd.message, format_friendly(cmd.scheduled_time)),
                )
            }
            Command::Recurring(cmd) => {
                let when = format!("{} at {}", cmd.rule.describe(), cmd.time_of_day.format("%-I:%M %p"));
                if cmd.kind == CommandKind::RecurringAlarm {
                    let alarm = self.alarms.create_recurring(&cmd).await?;
                    CommandResponse::new(kind, Some(alarm.id), format!("Alarm set {when}."))
                } else {
                    let reminder = self.reminders.create_recurring(&cmd).await?;
                    CommandResponse::new(kind, Some(reminder.id), format!("I'll remind you to {} {when}.", cmd.message))
                }
            }
            Command::Task(parsed) => {
                let task = self.tasks.create(&parsed).await?;
                let due = task
                    .due_date
                    .map(|d| format!(", due {}", d.format("%a %b %-d")))
                    .unwrap_or_default();
                CommandResponse::new(kind, Some(task.id), format!("Added \"{}\" to your tasks{due}.", task.title))
            }
            Command::CompleteTask { query } => match self.tasks.complete_by_title(&query).await? {
                TaskCompletion::Completed(task) => {
                    CommandResponse::new(kind, Some(task.id), format!("Marked \"{}\" as done.", task.title))
                }
                TaskCompletion::Advanced(task) => {
                    let next = task.due_date.map(|d| d.format("%a %b %-d").to_string()).unwrap_or_default();
                    CommandResponse::new(kind, Some(task.id), format!("Done. \"{}\" is next due {next}.", task.title))
                }
            },
            Command::Snooze { minutes } => self.snooze_latest(minutes).await?,
            Command::Location(cmd) => {
                let created = self.locations.create(&cmd).await?;
                let verb = if cmd.trigger_type() == TriggerType::Exit { "leave" } else { "get to" };
                let place = cmd
                    .place_name
                    .clone()
                    .or_else(|| cmd.place_category.map(|c| format!("a {}", c.label())))
                    .unwrap_or_else(|| "that place".to_string());
                let mut message = format!("I'll remind you to {} when you {verb} {place}.", cmd.message);
                if created.fired_immediately {
                    message.push_str(" You're already there, so here it is now.");
                }
                CommandResponse::new(kind, Some(created.reminder_id), message)
            }
            Command::Finance(cmd) => {
                let entry = self.finance.record(&cmd).await?;
                let direction = match entry.transaction_type {
                    TransactionType::Debit => "spent",
                    TransactionType::Credit => "received",
                };
                CommandResponse::new(
                    kind,
                    Some(entry.id),
                    format!(
                        "Recorded {:.2} {} {direction} for {} ({}).",
                        entry.amount,
                        entry.currency,
                        entry.description,
                        entry.category.label()
                    ),
                )
            }
        };
        info!(kind = ?response.kind, entity_id = ?response.entity_id, "command handled");
        Ok(response)
    }

    /// Snooze whichever reminder or alarm went off most recently.
    async fn snooze_latest(&self, minutes: i64) -> EngineResult<CommandResponse> {
        let reminder = self.reminders.last_fired().await.map(|(id, at)| (at, AlarmKey::Reminder(id)));
        let alarm = self.alarms.last_fired().await.map(|(id, at)| (at, AlarmKey::Alarm(id)));
        let (_, key) = [reminder, alarm]
            .into_iter()
            .flatten()
            .max_by_key(|(at, _)| *at)
            .ok_or_else(|| EngineError::validation("Nothing has gone off recently to snooze."))?;

        let (id, message) = match key {
            AlarmKey::Alarm(id) => {
                let at = self.alarms.snooze(id, Some(minutes)).await?;
                (id, format!("Snoozed for {minutes} minutes, ringing at {}.", at.format("%-I:%M %p")))
            }
            AlarmKey::Reminder(id) => {
                let at = self.reminders.snooze(id, Some(minutes)).await?;
                (id, format!("Snoozed for {minutes} minutes, I'll remind you at {}.", at.format("%-I:%M %p")))
            }
        };
        Ok(CommandResponse::new(CommandKind::Snooze, Some(id), message))
    }
}
