//! Alarms: one-shot or recurring wake-ups with snooze and enable/disable.

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use vox_core::{Alarm, EngineConfig, next_occurrence_after};
use vox_parse::{CommandError, ParsedCommand, ParsedRecurringCommand};

use crate::error::{EngineError, EngineResult, StoreError};
use crate::ports::{AlarmKey, Notification, NotificationAction, Ports};
use crate::reminders::{arm_alarm, snooze_end};

pub const ALARM_CHANNEL: &str = "alarms";

pub struct EnhancedAlarmManager {
    ports: Ports,
    config: EngineConfig,
    last_fired: Mutex<Option<(i64, NaiveDateTime)>>,
}

impl EnhancedAlarmManager {
    pub fn new(ports: Ports, config: EngineConfig) -> Self {
        Self {
            ports,
            config,
            last_fired: Mutex::new(None),
        }
    }

    pub async fn create(&self, cmd: &ParsedCommand) -> EngineResult<Alarm> {
        let now = self.ports.clock.now();
        if cmd.scheduled_time <= now {
            return Err(CommandError::past_time().into());
        }
        self.persist_and_arm(Alarm::new(cmd.message.clone(), cmd.scheduled_time, now))
            .await
    }

    pub async fn create_recurring(&self, cmd: &ParsedRecurringCommand) -> EngineResult<Alarm> {
        let now = self.ports.clock.now();
        let alarm = Alarm::new(cmd.message.clone(), cmd.first_time, now).with_recurrence(&cmd.rule)?;
        self.persist_and_arm(alarm).await
    }

    async fn persist_and_arm(&self, mut alarm: Alarm) -> EngineResult<Alarm> {
        alarm.id = self.ports.alarms.insert_alarm(alarm.clone()).await?;
        if let Err(e) = arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Alarm(alarm.id), alarm.scheduled_time).await {
            error!(alarm_id = alarm.id, error = %e, "scheduling failed, removing alarm");
            if let Err(del) = self.ports.alarms.delete_alarm(alarm.id).await {
                warn!(alarm_id = alarm.id, error = %del, "compensating delete failed");
            }
            return Err(e.into());
        }
        info!(alarm_id = alarm.id, at = %alarm.scheduled_time, "alarm set");
        Ok(alarm)
    }

    async fn load(&self, id: i64) -> EngineResult<Alarm> {
        self.ports
            .alarms
            .alarm(id)
            .await?
            .ok_or_else(|| StoreError::not_found("alarm", id).into())
    }

    /// Ring, then re-arm a recurring alarm or disable a one-shot.
    pub async fn on_fired(&self, id: i64) -> EngineResult<Option<NaiveDateTime>> {
        let mut alarm = self.load(id).await?;
        if !alarm.enabled {
            info!(alarm_id = id, "ignoring fire for disabled alarm");
            return Ok(None);
        }
        let now = self.ports.clock.now();
        let notification = Notification {
            key: AlarmKey::Alarm(id),
            channel: ALARM_CHANNEL.to_string(),
            title: alarm.label.clone(),
            body: vox_core::time::format_friendly(alarm.scheduled_time),
            actions: vec![
                NotificationAction::Snooze {
                    minutes: self.config.alarm_snooze_minutes,
                },
                NotificationAction::Done,
            ],
        };
        if let Err(e) = self.ports.notifier.notify(notification).await {
            warn!(alarm_id = id, error = %e, "notification failed");
        }
        *self.last_fired.lock().await = Some((id, now));

        // A snoozed ring lands before the slot that is still pending.
        let next = match alarm.recurrence()? {
            Some(_) if alarm.scheduled_time > now => Some(alarm.scheduled_time),
            Some(rule) => next_occurrence_after(alarm.scheduled_time, &rule, now),
            None => None,
        };
        match next {
            Some(at) => {
                alarm.scheduled_time = at;
                alarm.snooze_count = 0;
                self.ports.alarms.update_alarm(&alarm).await?;
                arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Alarm(id), at).await?;
            }
            None => {
                alarm.enabled = false;
                self.ports.alarms.update_alarm(&alarm).await?;
            }
        }
        Ok(next)
    }

    /// Ring again in `minutes` (default from config). A recurring alarm keeps
    /// its stored next slot; the snoozed ring re-arms it.
    pub async fn snooze(&self, id: i64, minutes: Option<i64>) -> EngineResult<NaiveDateTime> {
        let mut alarm = self.load(id).await?;
        let minutes = minutes.unwrap_or(self.config.alarm_snooze_minutes);
        let at = snooze_end(self.ports.clock.now(), minutes)?;
        alarm.snooze_count += 1;
        if alarm.recurrence()?.is_none() {
            alarm.scheduled_time = at;
            alarm.enabled = true;
        }
        self.ports.alarms.update_alarm(&alarm).await?;
        arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Alarm(id), at).await?;
        info!(alarm_id = id, %at, "alarm snoozed");
        Ok(at)
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> EngineResult<Alarm> {
        let mut alarm = self.load(id).await?;
        let now = self.ports.clock.now();
        if enabled {
            if alarm.scheduled_time <= now {
                match alarm.recurrence()? {
                    Some(rule) => {
                        alarm.scheduled_time = next_occurrence_after(alarm.scheduled_time, &rule, now)
                            .ok_or_else(|| EngineError::validation("That alarm's schedule has ended."))?;
                    }
                    None => return Err(CommandError::past_time().into()),
                }
            }
            arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Alarm(id), alarm.scheduled_time).await?;
        } else {
            self.ports.scheduler.cancel(AlarmKey::Alarm(id)).await?;
        }
        alarm.enabled = enabled;
        self.ports.alarms.update_alarm(&alarm).await?;
        Ok(alarm)
    }

    pub async fn delete(&self, id: i64) -> EngineResult<()> {
        if let Err(e) = self.ports.scheduler.cancel(AlarmKey::Alarm(id)).await {
            warn!(alarm_id = id, error = %e, "cancelling alarm failed");
        }
        match self.ports.alarms.delete_alarm(id).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All alarms, next ring first.
    pub async fn list(&self) -> EngineResult<Vec<Alarm>> {
        let mut alarms = self.ports.alarms.alarms().await?;
        alarms.sort_by_key(|a| (!a.enabled, a.scheduled_time));
        Ok(alarms)
    }

    /// Re-arm enabled alarms after a restart.
    pub async fn reschedule_all(&self) -> EngineResult<usize> {
        let now = self.ports.clock.now();
        let mut armed = 0;
        for mut alarm in self.ports.alarms.alarms().await?.into_iter().filter(|a| a.enabled) {
            if alarm.scheduled_time <= now {
                let next = match alarm.recurrence()? {
                    Some(rule) => next_occurrence_after(alarm.scheduled_time, &rule, now),
                    None => None,
                };
                match next {
                    Some(at) => alarm.scheduled_time = at,
                    None => {
                        alarm.enabled = false;
                        self.ports.alarms.update_alarm(&alarm).await?;
                        continue;
                    }
                }
                self.ports.alarms.update_alarm(&alarm).await?;
            }
            match arm_alarm(self.ports.scheduler.as_ref(), AlarmKey::Alarm(alarm.id), alarm.scheduled_time).await {
                Ok(_) => armed += 1,
                Err(e) => warn!(alarm_id = alarm.id, error = %e, "re-arming alarm failed"),
            }
        }
        Ok(armed)
    }

    pub async fn last_fired(&self) -> Option<(i64, NaiveDateTime)> {
        *self.last_fired.lock().await
    }
}
