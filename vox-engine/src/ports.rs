//! Ports: everything the engine consumes from persistence and the platform.
//!
//! Persistence follows update-by-copy semantics: callers read a whole record,
//! change a copy and write the whole record back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use vox_core::{Alarm, Coordinates, FinanceEntry, PlaceCategory, Reminder, ReminderStatus, Task, TriggerType};

use crate::error::{PlatformError, StoreError};

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Insert and return the generated id.
    async fn insert_reminder(&self, reminder: Reminder) -> Result<i64, StoreError>;
    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), StoreError>;
    async fn delete_reminder(&self, id: i64) -> Result<(), StoreError>;
    async fn reminder(&self, id: i64) -> Result<Option<Reminder>, StoreError>;
    async fn reminder_by_geofence(&self, geofence_id: &str) -> Result<Option<Reminder>, StoreError>;
    async fn reminders(&self) -> Result<Vec<Reminder>, StoreError>;

    async fn reminders_with_status(&self, status: ReminderStatus) -> Result<Vec<Reminder>, StoreError> {
        Ok(self
            .reminders()
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }
}

#[async_trait]
pub trait AlarmStore: Send + Sync {
    async fn insert_alarm(&self, alarm: Alarm) -> Result<i64, StoreError>;
    async fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError>;
    async fn delete_alarm(&self, id: i64) -> Result<(), StoreError>;
    async fn alarm(&self, id: i64) -> Result<Option<Alarm>, StoreError>;
    async fn alarms(&self) -> Result<Vec<Alarm>, StoreError>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> Result<i64, StoreError>;
    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;
    async fn delete_task(&self, id: i64) -> Result<(), StoreError>;
    async fn task(&self, id: i64) -> Result<Option<Task>, StoreError>;
    async fn tasks(&self) -> Result<Vec<Task>, StoreError>;
}

#[async_trait]
pub trait FinanceStore: Send + Sync {
    async fn insert_entry(&self, entry: FinanceEntry) -> Result<i64, StoreError>;
    async fn entries(&self) -> Result<Vec<FinanceEntry>, StoreError>;
}

/// Which entity a system alarm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlarmKey {
    Reminder(i64),
    Alarm(i64),
}

#[async_trait]
pub trait AlarmScheduler: Send + Sync {
    /// Exact alarms may be denied by the platform; callers fall back to inexact.
    async fn can_schedule_exact(&self) -> bool;
    async fn schedule_exact(&self, key: AlarmKey, at: NaiveDateTime) -> Result<(), PlatformError>;
    async fn schedule_inexact(&self, key: AlarmKey, at: NaiveDateTime) -> Result<(), PlatformError>;
    async fn cancel(&self, key: AlarmKey) -> Result<(), PlatformError>;
}

/// One circular region handed to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRequest {
    pub id: String,
    pub center: Coordinates,
    pub radius: f32,
    pub trigger: TriggerType,
}

#[async_trait]
pub trait GeofencingClient: Send + Sync {
    async fn add_geofences(&self, geofences: &[GeofenceRequest]) -> Result<(), PlatformError>;
    async fn remove_geofences(&self, ids: &[String]) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Single-shot fix. `Ok(None)` means no fix is available right now.
    async fn current_location(&self) -> Result<Option<Coordinates>, PlatformError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
}

#[async_trait]
pub trait PlaceResolver: Send + Sync {
    /// Candidate places near `near`, in the resolver's preferred order.
    async fn nearby(&self, category: PlaceCategory, near: Coordinates) -> Result<Vec<ResolvedPlace>, PlatformError>;
}

#[async_trait]
pub trait SavedPlaces: Send + Sync {
    /// Coordinates for a named place such as "home" or "work".
    async fn lookup(&self, name: &str) -> Option<Coordinates>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    Snooze { minutes: i64 },
    SnoozeUntilLeave,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub key: AlarmKey,
    pub channel: String,
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait PermissionState: Send + Sync {
    async fn has_location_permission(&self) -> bool;
    async fn has_background_location_permission(&self) -> bool;
}

/// Small persisted settings the engine owns.
#[async_trait]
pub trait Preferences: Send + Sync {
    /// Reminders cancelled because location permission was revoked.
    async fn auto_disabled_ids(&self) -> Result<Vec<i64>, StoreError>;
    async fn set_auto_disabled_ids(&self, ids: &[i64]) -> Result<(), StoreError>;
}

pub trait Clock: Send + Sync {
    /// Local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// Everything the managers need, wired once by the composition root.
#[derive(Clone)]
pub struct Ports {
    pub reminders: Arc<dyn ReminderStore>,
    pub alarms: Arc<dyn AlarmStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub finance: Arc<dyn FinanceStore>,
    pub scheduler: Arc<dyn AlarmScheduler>,
    pub geofencing: Arc<dyn GeofencingClient>,
    pub location: Arc<dyn LocationProvider>,
    pub places: Arc<dyn PlaceResolver>,
    pub saved_places: Arc<dyn SavedPlaces>,
    pub notifier: Arc<dyn Notifier>,
    pub permissions: Arc<dyn PermissionState>,
    pub preferences: Arc<dyn Preferences>,
    pub clock: Arc<dyn Clock>,
}
