//! Time-based reminders: persist, arm a system alarm, and re-arm or complete on fire.

use chrono::{NaiveDateTime, TimeDelta};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use vox_core::{EngineConfig, Reminder, ReminderStatus, next_occurrence_after};
use vox_parse::{CommandError, ParsedCommand, ParsedRecurringCommand};

use crate::error::{EngineError, EngineResult, PlatformError, StoreError};
use crate::ports::{AlarmKey, AlarmScheduler, Notification, NotificationAction, Ports};

pub const REMINDER_CHANNEL: &str = "reminders";

/// Exact when the platform allows it, inexact otherwise. Returns whether the
/// alarm ended up exact.
pub(crate) async fn arm_alarm(scheduler: &dyn AlarmScheduler, key: AlarmKey, at: NaiveDateTime) -> Result<bool, PlatformError> {
    if scheduler.can_schedule_exact().await {
        match scheduler.schedule_exact(key, at).await {
            Ok(()) => return Ok(true),
            Err(e) => warn!(?key, error = %e, "exact alarm refused, falling back to inexact"),
        }
    }
    scheduler.schedule_inexact(key, at).await?;
    Ok(false)
}

/// `now + minutes`, rejecting non-positive or out-of-range snoozes.
pub(crate) fn snooze_end(now: NaiveDateTime, minutes: i64) -> EngineResult<NaiveDateTime> {
    if minutes <= 0 {
        return Err(EngineError::validation("Snooze for at least a minute."));
    }
    TimeDelta::try_minutes(minutes)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| EngineError::validation("That snooze is too long."))
}

pub struct ReminderManager {
    ports: Ports,
    config: EngineConfig,
    last_fired: Mutex<Option<(i64, NaiveDateTime)>>,
}

impl ReminderManager {
    pub fn new(ports: Ports, config: EngineConfig) -> Self {
        Self {
            ports,
            config,
            last_fired: Mutex::new(None),
        }
    }

    pub async fn create(&self, cmd: &ParsedCommand) -> EngineResult<Reminder> {
        let now = self.ports.clock.now();
        if cmd.scheduled_time <= now {
            return Err(CommandError::past_time().into());
        }
        self.persist_and_arm(Reminder::time_based(cmd.message.clone(), cmd.scheduled_time, now))
            .await
    }

    pub async fn create_recurring(&self, cmd: &ParsedRecurringCommand) -> EngineResult<Reminder> {
        let now = self.ports.clock.now();
        let reminder = Reminder::time_based(cmd.message.clone(), cmd.first_time, now).with_recurrence(&cmd.rule)?;
        self.persist_and_arm(reminder).await
    }

    async fn persist_and_arm(&self, mut reminder: Reminder) -> EngineResult<Reminder> {
        reminder.id = self.ports.reminders.insert_reminder(reminder.clone()).await?;
        let at = reminder
            .scheduled_time
            .ok_or_else(|| StoreError::Corrupt(format!("reminder {} has no time", reminder.id)))?;
        if let Err(e) = arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Reminder(reminder.id), at).await {
            error!(reminder_id = reminder.id, error = %e, "scheduling failed, removing reminder");
            if let Err(del) = self.ports.reminders.delete_reminder(reminder.id).await {
                warn!(reminder_id = reminder.id, error = %del, "compensating delete failed");
            }
            return Err(e.into());
        }
        info!(reminder_id = reminder.id, %at, "reminder scheduled");
        Ok(reminder)
    }

    async fn load(&self, id: i64) -> EngineResult<Reminder> {
        Ok(self
            .ports
            .reminders
            .reminder(id)
            .await?
            .filter(|r| !r.is_location_based())
            .ok_or(StoreError::not_found("reminder", id))?)
    }

    /// The system alarm went off. Recurring reminders move to their next slot
    /// after now; everything else completes. Returns the next time, if any.
    pub async fn on_fired(&self, id: i64) -> EngineResult<Option<NaiveDateTime>> {
        let mut reminder = self.load(id).await?;
        if !reminder.is_pending() {
            info!(reminder_id = id, status = ?reminder.status, "stale alarm for inactive reminder");
            return Ok(None);
        }
        let now = self.ports.clock.now();
        let notification = Notification {
            key: AlarmKey::Reminder(id),
            channel: REMINDER_CHANNEL.to_string(),
            title: "Reminder".to_string(),
            body: reminder.message.clone(),
            actions: vec![
                NotificationAction::Snooze {
                    minutes: self.config.reminder_snooze_minutes,
                },
                NotificationAction::Done,
            ],
        };
        if let Err(e) = self.ports.notifier.notify(notification).await {
            warn!(reminder_id = id, error = %e, "notification failed");
        }
        *self.last_fired.lock().await = Some((id, now));

        // A snoozed ring of a recurring reminder that already advanced still
        // owes its pending slot.
        let next = match (reminder.recurrence()?, reminder.original_scheduled_time, reminder.scheduled_time) {
            (Some(_), Some(pending), _) if pending > now => Some(pending),
            (Some(rule), original, scheduled) => original
                .or(scheduled)
                .and_then(|base| next_occurrence_after(base, &rule, now)),
            _ => None,
        };
        reminder.original_scheduled_time = None;
        match next {
            Some(at) => {
                reminder.scheduled_time = Some(at);
                reminder.snooze_count = 0;
                self.ports.reminders.update_reminder(&reminder).await?;
                arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Reminder(id), at).await?;
                info!(reminder_id = id, next = %at, "recurring reminder re-armed");
            }
            None => {
                reminder.status = ReminderStatus::Completed;
                self.ports.reminders.update_reminder(&reminder).await?;
                info!(reminder_id = id, "reminder completed");
            }
        }
        Ok(next)
    }

    /// Push the reminder `minutes` (default from config) past now. The first
    /// snooze remembers the scheduled time: for a recurring reminder that has
    /// already advanced, that is the next slot, which the snoozed ring re-arms.
    pub async fn snooze(&self, id: i64, minutes: Option<i64>) -> EngineResult<NaiveDateTime> {
        let mut reminder = self.load(id).await?;
        let minutes = minutes.unwrap_or(self.config.reminder_snooze_minutes);
        let at = snooze_end(self.ports.clock.now(), minutes)?;
        if reminder.original_scheduled_time.is_none() {
            reminder.original_scheduled_time = reminder.scheduled_time;
        }
        reminder.scheduled_time = Some(at);
        reminder.snooze_count += 1;
        reminder.status = ReminderStatus::Pending;
        self.ports.reminders.update_reminder(&reminder).await?;
        arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Reminder(id), at).await?;
        info!(reminder_id = id, %at, snooze_count = reminder.snooze_count, "reminder snoozed");
        Ok(at)
    }

    pub async fn cancel(&self, id: i64) -> EngineResult<()> {
        let reminder = self.load(id).await?;
        self.ports.scheduler.cancel(AlarmKey::Reminder(id)).await?;
        self.ports
            .reminders
            .update_reminder(&reminder.with_status(ReminderStatus::Cancelled))
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> EngineResult<()> {
        if let Err(e) = self.ports.scheduler.cancel(AlarmKey::Reminder(id)).await {
            warn!(reminder_id = id, error = %e, "cancelling alarm failed");
        }
        match self.ports.reminders.delete_reminder(id).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Pending time-based reminders, soonest first.
    pub async fn upcoming(&self) -> EngineResult<Vec<Reminder>> {
        let mut pending: Vec<Reminder> = self
            .ports
            .reminders
            .reminders_with_status(ReminderStatus::Pending)
            .await?
            .into_iter()
            .filter(|r| !r.is_location_based())
            .collect();
        pending.sort_by_key(|r| r.scheduled_time);
        Ok(pending)
    }

    /// Re-arm every pending reminder after a restart. Overdue one-shots fire
    /// as soon as possible; overdue recurring ones skip to their next slot.
    pub async fn reschedule_all(&self) -> EngineResult<usize> {
        let now = self.ports.clock.now();
        let mut armed = 0;
        for mut reminder in self.upcoming().await? {
            let Some(at) = reminder.scheduled_time else {
                continue;
            };
            let at = match reminder.recurrence()? {
                Some(rule) if at <= now => match next_occurrence_after(at, &rule, now) {
                    Some(next) => {
                        reminder.scheduled_time = Some(next);
                        reminder.original_scheduled_time = None;
                        self.ports.reminders.update_reminder(&reminder).await?;
                        next
                    }
                    None => {
                        self.ports
                            .reminders
                            .update_reminder(&reminder.with_status(ReminderStatus::Completed))
                            .await?;
                        continue;
                    }
                },
                _ => at.max(now),
            };
            match arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Reminder(reminder.id), at).await {
                Ok(_) => armed += 1,
                Err(e) => warn!(reminder_id = reminder.id, error = %e, "re-arming reminder failed"),
            }
        }
        info!(armed, "reminders rescheduled");
        Ok(armed)
    }

    pub async fn last_fired(&self) -> Option<(i64, NaiveDateTime)> {
        *self.last_fired.lock().await
    }
}
