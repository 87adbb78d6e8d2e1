//! Location-triggered reminders: creation, transition gating, firing, snooze
//! and the permission revoke/restore cycle.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use vox_core::{
    Coordinates, EngineConfig, LocationData, LocationRecurrence, LocationTarget, Reminder, ReminderStatus,
    Transition, TriggerType, within_radius,
};
use vox_parse::ParsedLocationCommand;

use crate::error::{EngineError, EngineResult, PlatformError, StoreError};
use crate::gating::{IgnoreReason, cooldown_elapsed, cooldown_for, recurrence_constraint};
use crate::geofence::{GeofenceManager, base_geofence_id, fanout_id, geofence_id};
use crate::ports::{AlarmKey, GeofenceRequest, Notification, NotificationAction, Ports};
use crate::reminders::snooze_end;
use crate::retry::{RetryPolicy, with_backoff};

pub const LOCATION_CHANNEL: &str = "location_reminders";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationReminderCreated {
    pub reminder_id: i64,
    pub geofence_ids: Vec<String>,
    /// The user was already inside the region, so the reminder fired on creation.
    pub fired_immediately: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Fired { reminder_id: i64, completed: bool },
    Ignored { reason: IgnoreReason },
}

impl TransitionOutcome {
    fn ignored(reason: IgnoreReason) -> Self {
        TransitionOutcome::Ignored { reason }
    }

    pub fn fired(&self) -> bool {
        matches!(self, TransitionOutcome::Fired { .. })
    }
}

pub struct LocationReminderManager {
    ports: Ports,
    config: EngineConfig,
    geofences: Arc<GeofenceManager>,
    /// Last fire per reminder id. Check-and-set happens under this lock so two
    /// racing transitions cannot both pass the cooldown.
    cooldowns: Mutex<HashMap<i64, NaiveDateTime>>,
}

impl LocationReminderManager {
    pub fn new(ports: Ports, config: EngineConfig, geofences: Arc<GeofenceManager>) -> Self {
        Self {
            ports,
            config,
            geofences,
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    pub fn geofences(&self) -> &GeofenceManager {
        &self.geofences
    }

    fn location_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.location_retry_attempts, self.config.location_retry_base_ms)
    }

    /// Single-shot fix with bounded retry. Any failure is an unknown location.
    async fn current_location(&self) -> Option<Coordinates> {
        let provider = self.ports.location.clone();
        let result = with_backoff(self.location_policy(), "current_location", || {
            let provider = provider.clone();
            async move { provider.current_location().await }
        })
        .await;
        match result {
            Ok(here) => here,
            Err(e) => {
                warn!(error = %e, "current location unavailable");
                None
            }
        }
    }

    pub async fn create(&self, cmd: &ParsedLocationCommand) -> EngineResult<LocationReminderCreated> {
        if !self.ports.permissions.has_location_permission().await {
            return Err(PlatformError::PermissionDenied.into());
        }
        if !self.ports.permissions.has_background_location_permission().await {
            warn!("background location not granted; geofences may only fire while in use");
        }

        let resolved = match (&cmd.coordinates, &cmd.place_name) {
            (None, Some(name)) if cmd.place_category.is_none() => Some(
                self.ports
                    .saved_places
                    .lookup(name)
                    .await
                    .ok_or_else(|| EngineError::validation(format!("I don't know where {name} is yet. Save it first.")))?,
            ),
            _ => None,
        };
        let data = cmd
            .to_location_data(resolved, self.config.default_radius_meters)
            .ok_or_else(|| EngineError::validation("I couldn't tell which place you meant."))?;
        data.validate().map_err(|e| EngineError::validation(e.to_string()))?;

        let now = self.ports.clock.now();
        let mut reminder = Reminder::location_based(cmd.message.clone(), &data, now)?;
        if let Some(rule) = cmd.recurrence_rule() {
            reminder = reminder.with_recurrence(&rule)?;
        }
        reminder.id = self.ports.reminders.insert_reminder(reminder.clone()).await?;
        reminder.geofence_id = Some(geofence_id(reminder.id));
        info!(reminder_id = reminder.id, target = %data.target.display_name(), "location reminder created");

        match self.arm(&mut reminder, &data, now).await {
            Ok(created) => Ok(created),
            Err(e) => {
                error!(reminder_id = reminder.id, error = %e, "registration failed, removing reminder");
                self.geofences.remove_group(&geofence_id(reminder.id)).await;
                if let Err(del) = self.ports.reminders.delete_reminder(reminder.id).await {
                    warn!(reminder_id = reminder.id, error = %del, "compensating delete failed");
                }
                Err(e)
            }
        }
    }

    /// Already-at-location check followed by registration.
    async fn arm(&self, reminder: &mut Reminder, data: &LocationData, now: NaiveDateTime) -> EngineResult<LocationReminderCreated> {
        let here = self.current_location().await;
        let targets = self.targets(reminder.id, data, here).await?;

        let inside = here.is_some_and(|here| targets.iter().any(|t| within_radius(here, t.center, t.radius)));
        let mut fired_immediately = false;
        // Arriving on creation goes through the same checks as a platform ENTER.
        let mut admitted = false;
        if inside && data.trigger_type.includes_enter() {
            let verdict = match gate(data, Transition::Enter, now) {
                Ok(()) => self.admit(reminder, data, now, false).await?,
                Err(reason) => Err(reason),
            };
            match verdict {
                Ok(()) => admitted = true,
                Err(reason) => info!(reminder_id = reminder.id, %reason, "already at location, not firing now"),
            }
        }
        if admitted {
            info!(reminder_id = reminder.id, "already at location, firing now");
            let completed = self.fire(reminder.clone(), data.clone(), now).await?;
            fired_immediately = true;
            if completed {
                return Ok(LocationReminderCreated {
                    reminder_id: reminder.id,
                    geofence_ids: Vec::new(),
                    fired_immediately,
                });
            }
            if let Some(fresh) = self.ports.reminders.reminder(reminder.id).await? {
                *reminder = fresh;
            }
        }

        let geofence_ids = self.geofences.register_all(targets).await?;
        self.ports.reminders.update_reminder(reminder).await?;
        Ok(LocationReminderCreated {
            reminder_id: reminder.id,
            geofence_ids,
            fired_immediately,
        })
    }

    /// One request for a specific place, or one per resolved place for a category.
    async fn targets(&self, reminder_id: i64, data: &LocationData, near: Option<Coordinates>) -> EngineResult<Vec<GeofenceRequest>> {
        match &data.target {
            LocationTarget::SpecificPlace { latitude, longitude, .. } => Ok(vec![GeofenceRequest {
                id: geofence_id(reminder_id),
                center: Coordinates::new(*latitude, *longitude),
                radius: data.radius,
                trigger: data.trigger_type,
            }]),
            LocationTarget::GenericCategory { place_category, .. } => {
                let near = near.ok_or_else(|| PlatformError::Unavailable("current location unknown".into()))?;
                let places = self.ports.places.nearby(*place_category, near).await?;
                if places.is_empty() {
                    return Err(EngineError::validation(format!(
                        "I couldn't find any {} nearby.",
                        place_category.label()
                    )));
                }
                Ok(places
                    .into_iter()
                    .take(self.config.max_places_per_category)
                    .enumerate()
                    .map(|(i, place)| GeofenceRequest {
                        id: fanout_id(reminder_id, i),
                        center: place.coordinates,
                        radius: data.radius,
                        trigger: data.trigger_type,
                    })
                    .collect())
            }
        }
    }

    async fn register_reminder(&self, reminder: &Reminder) -> EngineResult<Vec<String>> {
        let data = location_of(reminder)?;
        let near = match data.target {
            LocationTarget::GenericCategory { .. } => self.current_location().await,
            LocationTarget::SpecificPlace { .. } => None,
        };
        let targets = self.targets(reminder.id, &data, near).await?;
        Ok(self.geofences.register_all(targets).await?)
    }

    /// Gate a platform transition and fire the owning reminder if it passes.
    pub async fn handle_transition(&self, geofence: &str, transition: Transition) -> EngineResult<TransitionOutcome> {
        let base = base_geofence_id(geofence);
        let Some(reminder) = self.ports.reminders.reminder_by_geofence(base).await? else {
            debug!(geofence, "transition for unknown geofence");
            return Ok(TransitionOutcome::ignored(IgnoreReason::UnknownGeofence));
        };
        if !reminder.is_pending() {
            debug!(reminder_id = reminder.id, "transition for non-pending reminder");
            return Ok(TransitionOutcome::ignored(IgnoreReason::NotPending));
        }
        let data = location_of(&reminder)?;
        let now = self.ports.clock.now();

        // The exit promised by snooze-until-leave is the deferred half of a
        // fire that already passed the cooldown.
        let leaving = transition == Transition::Exit && data.restore_trigger_type.is_some();

        if let Err(reason) = gate(&data, transition, now) {
            debug!(reminder_id = reminder.id, %reason, "transition ignored");
            if leaving {
                self.restore_trigger(reminder, data).await?;
            }
            return Ok(TransitionOutcome::ignored(reason));
        }
        if let Err(reason) = self.admit(&reminder, &data, now, leaving).await? {
            debug!(reminder_id = reminder.id, %reason, "transition ignored");
            return Ok(TransitionOutcome::ignored(reason));
        }

        let reminder_id = reminder.id;
        let completed = self.fire(reminder, data, now).await?;
        Ok(TransitionOutcome::Fired { reminder_id, completed })
    }

    /// Cooldown and recurrence checks, stamping the cooldown when they pass.
    /// Both run under one lock so two racing transitions cannot both pass.
    async fn admit(
        &self,
        reminder: &Reminder,
        data: &LocationData,
        now: NaiveDateTime,
        skip_cooldown: bool,
    ) -> EngineResult<Result<(), IgnoreReason>> {
        let mut cooldowns = self.cooldowns.lock().await;
        if !skip_cooldown {
            let last = cooldowns.get(&reminder.id).copied().max(data.last_triggered_at);
            let rule = reminder.recurrence()?;
            let cooldown = cooldown_for(data.recurrence, rule.is_some());
            if !cooldown_elapsed(last, cooldown, now) {
                return Ok(Err(IgnoreReason::CoolingDown));
            }
            if let Err(reason) = recurrence_constraint(data.recurrence, rule.as_ref(), last, now) {
                return Ok(Err(reason));
            }
        }
        cooldowns.insert(reminder.id, now);
        Ok(Ok(()))
    }

    /// Put back the trigger a snooze-until-leave replaced, without firing.
    async fn restore_trigger(&self, reminder: Reminder, mut data: LocationData) -> EngineResult<()> {
        let Some(original) = data.restore_trigger_type.take() else {
            return Ok(());
        };
        data.trigger_type = original;
        let reminder = reminder.with_location(&data)?;
        self.ports.reminders.update_reminder(&reminder).await?;
        if let Err(e) = self.geofences.reregister_group(&geofence_id(reminder.id), original).await {
            warn!(reminder_id = reminder.id, error = %e, "restoring trigger failed");
        }
        info!(reminder_id = reminder.id, "trigger restored without firing");
        Ok(())
    }

    /// Notify, then persist the advanced trigger metadata. Returns true when a
    /// one-shot reminder completed.
    async fn fire(&self, mut reminder: Reminder, data: LocationData, now: NaiveDateTime) -> EngineResult<bool> {
        let entering = data.trigger_type != TriggerType::Exit;
        let place = data.target.display_name();
        let completes = data.recurrence == LocationRecurrence::Once;
        // A reminder this fire completes has nothing left to snooze.
        let mut actions = Vec::new();
        if !completes {
            actions.push(NotificationAction::Snooze {
                minutes: self.config.location_snooze_minutes,
            });
            if entering {
                actions.push(NotificationAction::SnoozeUntilLeave);
            }
        }
        actions.push(NotificationAction::Done);
        let notification = Notification {
            key: AlarmKey::Reminder(reminder.id),
            channel: LOCATION_CHANNEL.to_string(),
            title: reminder.message.clone(),
            body: if entering {
                format!("You're at {place}")
            } else {
                format!("You left {place}")
            },
            actions,
        };
        if let Err(e) = self.ports.notifier.notify(notification).await {
            warn!(reminder_id = reminder.id, error = %e, "notification failed");
        }

        let restored = data.restore_trigger_type.is_some();
        let next = data.triggered(now);
        let completed = next.recurrence == LocationRecurrence::Once;
        reminder = reminder.with_location(&next)?;
        if completed {
            reminder.status = ReminderStatus::Completed;
        }
        self.ports.reminders.update_reminder(&reminder).await?;
        info!(reminder_id = reminder.id, trigger_count = next.trigger_count, completed, "location reminder fired");

        let base = geofence_id(reminder.id);
        if completed {
            self.geofences.remove_group(&base).await;
        } else if restored {
            if let Err(e) = self.geofences.reregister_group(&base, next.trigger_type).await {
                warn!(reminder_id = reminder.id, error = %e, "restoring trigger failed");
            }
        }
        Ok(completed)
    }

    async fn load(&self, id: i64) -> EngineResult<(Reminder, LocationData)> {
        let reminder = self
            .ports
            .reminders
            .reminder(id)
            .await?
            .filter(Reminder::is_location_based)
            .ok_or(StoreError::not_found("location reminder", id))?;
        let data = location_of(&reminder)?;
        Ok((reminder, data))
    }

    async fn load_pending(&self, id: i64) -> EngineResult<(Reminder, LocationData)> {
        let (reminder, data) = self.load(id).await?;
        if !reminder.is_pending() {
            return Err(EngineError::validation("That reminder isn't active anymore."));
        }
        Ok((reminder, data))
    }

    /// Suppress triggers for `minutes` (default from config). Returns the snooze end.
    pub async fn snooze(&self, id: i64, minutes: Option<i64>) -> EngineResult<NaiveDateTime> {
        let (reminder, data) = self.load_pending(id).await?;
        let minutes = minutes.unwrap_or(self.config.location_snooze_minutes);
        let until = snooze_end(self.ports.clock.now(), minutes)?;
        let next = data.snoozed(until);
        self.ports.reminders.update_reminder(&reminder.with_location(&next)?).await?;
        info!(reminder_id = id, %until, "location reminder snoozed");
        Ok(until)
    }

    /// Fire again on leaving instead of arriving; the configured trigger comes
    /// back after that fire.
    pub async fn snooze_until_leave(&self, id: i64) -> EngineResult<()> {
        let (reminder, mut data) = self.load_pending(id).await?;
        if data.restore_trigger_type.is_none() {
            data.restore_trigger_type = Some(data.trigger_type);
        }
        data.trigger_type = TriggerType::Exit;
        data.snooze_count += 1;
        let reminder = reminder.with_location(&data)?;
        self.ports.reminders.update_reminder(&reminder).await?;

        let reregistered = self.geofences.reregister_group(&geofence_id(id), TriggerType::Exit).await?;
        if reregistered.is_empty() {
            self.register_reminder(&reminder).await?;
        }
        info!(reminder_id = id, "snoozed until leaving");
        Ok(())
    }

    /// The notification's "Done" action.
    pub async fn complete(&self, id: i64) -> EngineResult<()> {
        let (reminder, _) = self.load(id).await?;
        self.geofences.remove_group(&geofence_id(id)).await;
        self.ports
            .reminders
            .update_reminder(&reminder.with_status(ReminderStatus::Completed))
            .await?;
        Ok(())
    }

    pub async fn pending(&self) -> EngineResult<Vec<Reminder>> {
        Ok(self
            .ports
            .reminders
            .reminders_with_status(ReminderStatus::Pending)
            .await?
            .into_iter()
            .filter(Reminder::is_location_based)
            .collect())
    }

    /// Cancel every pending location reminder and remember which ones we touched.
    pub async fn on_permission_revoked(&self) -> EngineResult<usize> {
        let pending = self.pending().await?;
        let mut disabled: BTreeSet<i64> = self.ports.preferences.auto_disabled_ids().await?.into_iter().collect();
        for reminder in &pending {
            self.geofences.remove_group(&geofence_id(reminder.id)).await;
            self.ports
                .reminders
                .update_reminder(&reminder.clone().with_status(ReminderStatus::Cancelled))
                .await?;
            disabled.insert(reminder.id);
        }
        let ids: Vec<i64> = disabled.into_iter().collect();
        self.ports.preferences.set_auto_disabled_ids(&ids).await?;
        info!(cancelled = pending.len(), "location permission revoked");
        Ok(pending.len())
    }

    /// Bring back only the reminders cancelled by a revoke. Running it twice is a no-op.
    pub async fn on_permission_granted(&self) -> EngineResult<usize> {
        let ids = self.ports.preferences.auto_disabled_ids().await?;
        let mut restored = 0;
        for id in &ids {
            let Some(reminder) = self.ports.reminders.reminder(*id).await? else {
                continue;
            };
            if reminder.status != ReminderStatus::Cancelled {
                continue;
            }
            let reminder = reminder.with_status(ReminderStatus::Pending);
            self.ports.reminders.update_reminder(&reminder).await?;
            if let Err(e) = self.register_reminder(&reminder).await {
                warn!(reminder_id = id, error = %e, "re-registering after permission grant failed");
            }
            restored += 1;
        }
        self.ports.preferences.set_auto_disabled_ids(&[]).await?;
        info!(restored, "location permission granted");
        Ok(restored)
    }

    /// Register geofences for every pending location reminder. Run once at start.
    pub async fn restore_geofences(&self) -> EngineResult<usize> {
        if !self.ports.permissions.has_location_permission().await {
            info!("no location permission, skipping geofence restore");
            return Ok(0);
        }
        let mut restored = 0;
        for reminder in self.pending().await? {
            match self.register_reminder(&reminder).await {
                Ok(_) => restored += 1,
                Err(e) => warn!(reminder_id = reminder.id, error = %e, "geofence restore failed"),
            }
        }
        info!(restored, "geofences restored");
        Ok(restored)
    }

    /// Re-register groups the cache no longer tracks. Returns the reminder ids repaired.
    pub async fn reconcile(&self) -> EngineResult<Vec<i64>> {
        let pending = self.pending().await?;
        let expected: BTreeSet<String> = pending.iter().map(|r| geofence_id(r.id)).collect();
        let missing = self.geofences.detect_removed_geofences(&expected).await;
        let mut repaired = Vec::new();
        for reminder in pending.iter().filter(|r| missing.contains(&geofence_id(r.id))) {
            match self.register_reminder(reminder).await {
                Ok(_) => repaired.push(reminder.id),
                Err(e) => warn!(reminder_id = reminder.id, error = %e, "reconcile failed"),
            }
        }
        if !repaired.is_empty() {
            info!(?repaired, "re-registered drifted geofences");
        }
        Ok(repaired)
    }

    /// Geofences go first; the store delete is best effort and deleting twice is fine.
    pub async fn delete(&self, id: i64) -> EngineResult<()> {
        self.geofences.remove_group(&geofence_id(id)).await;
        self.cooldowns.lock().await.remove(&id);
        match self.ports.reminders.delete_reminder(id).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => {}
            Err(e) => warn!(reminder_id = id, error = %e, "deleting location reminder failed"),
        }
        Ok(())
    }
}

fn location_of(reminder: &Reminder) -> EngineResult<LocationData> {
    reminder
        .location()?
        .ok_or_else(|| StoreError::Corrupt(format!("reminder {} has no location data", reminder.id)).into())
}

/// Per-event checks that need no history: direction, snooze, time window.
fn gate(data: &LocationData, transition: Transition, now: NaiveDateTime) -> Result<(), IgnoreReason> {
    if !data.trigger_type.accepts(transition) {
        return Err(IgnoreReason::WrongDirection);
    }
    if data.is_snoozed(now) {
        return Err(IgnoreReason::Snoozed);
    }
    if data.time_constraint.is_some_and(|tc| !tc.contains(now)) {
        return Err(IgnoreReason::OutsideTimeWindow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vox_core::{PlaceCategory, TimeConstraint};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn home() -> LocationData {
        LocationData::new(LocationTarget::SpecificPlace {
            latitude: 9.03,
            longitude: 38.74,
            place_name: Some("home".into()),
        })
    }

    #[test]
    fn test_gate_order() {
        let data = home().with_trigger(TriggerType::Enter);
        assert_eq!(gate(&data, Transition::Exit, at(9, 0)), Err(IgnoreReason::WrongDirection));

        let snoozed = data.snoozed(at(10, 0));
        assert_eq!(gate(&snoozed, Transition::Enter, at(9, 30)), Err(IgnoreReason::Snoozed));
        assert_eq!(gate(&snoozed, Transition::Enter, at(10, 0)), Ok(()));
    }

    #[test]
    fn test_gate_time_window_wraps() {
        let data = LocationData::new(LocationTarget::GenericCategory {
            place_category: PlaceCategory::Pharmacy,
            place_name: None,
        })
        .with_time_constraint(TimeConstraint::new(20, 6));
        assert_eq!(gate(&data, Transition::Enter, at(22, 0)), Ok(()));
        assert_eq!(gate(&data, Transition::Enter, at(5, 59)), Ok(()));
        assert_eq!(gate(&data, Transition::Enter, at(12, 0)), Err(IgnoreReason::OutsideTimeWindow));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_string(&TransitionOutcome::ignored(IgnoreReason::CoolingDown)).unwrap();
        assert_eq!(json, r#"{"outcome":"ignored","reason":"cooling_down"}"#);
    }
}
