//! In-memory and recording adapters for every port.
//!
//! These back the CLI (the store snapshot is what `vox` writes to disk) and the
//! tests, which reach into the recording adapters to assert on platform calls.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use vox_core::{Alarm, Coordinates, FinanceEntry, PlaceCategory, Reminder, Task};

use crate::error::{PlatformError, StoreError};
use crate::ports::{
    AlarmKey, AlarmScheduler, AlarmStore, Clock, FinanceStore, GeofenceRequest, GeofencingClient, LocationProvider,
    Notification, Notifier, PermissionState, PlaceResolver, Ports, Preferences, ReminderStore, ResolvedPlace,
    SavedPlaces, TaskStore,
};

/// Everything the store holds, in the shape the CLI persists as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub next_id: i64,
    pub reminders: Vec<Reminder>,
    pub alarms: Vec<Alarm>,
    pub tasks: Vec<Task>,
    pub finance: Vec<FinanceEntry>,
    pub auto_disabled_ids: Vec<i64>,
}

impl StoreSnapshot {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// One id sequence shared by every entity, like a single SQLite file would give.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.lock().await.clone()
    }
}

fn replace<T>(items: &mut [T], id: i64, id_of: impl Fn(&T) -> i64, value: T, entity: &'static str) -> Result<(), StoreError> {
    let slot = items
        .iter_mut()
        .find(|item| id_of(item) == id)
        .ok_or_else(|| StoreError::not_found(entity, id))?;
    *slot = value;
    Ok(())
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn insert_reminder(&self, mut reminder: Reminder) -> Result<i64, StoreError> {
        let mut s = self.inner.lock().await;
        reminder.id = s.allocate_id();
        let id = reminder.id;
        s.reminders.push(reminder);
        Ok(id)
    }

    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        replace(&mut s.reminders, reminder.id, |r| r.id, reminder.clone(), "reminder")
    }

    async fn delete_reminder(&self, id: i64) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        let before = s.reminders.len();
        s.reminders.retain(|r| r.id != id);
        if s.reminders.len() == before {
            return Err(StoreError::not_found("reminder", id));
        }
        Ok(())
    }

    async fn reminder(&self, id: i64) -> Result<Option<Reminder>, StoreError> {
        Ok(self.inner.lock().await.reminders.iter().find(|r| r.id == id).cloned())
    }

    async fn reminder_by_geofence(&self, geofence_id: &str) -> Result<Option<Reminder>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .reminders
            .iter()
            .find(|r| r.geofence_id.as_deref() == Some(geofence_id))
            .cloned())
    }

    async fn reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        Ok(self.inner.lock().await.reminders.clone())
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn insert_alarm(&self, mut alarm: Alarm) -> Result<i64, StoreError> {
        let mut s = self.inner.lock().await;
        alarm.id = s.allocate_id();
        let id = alarm.id;
        s.alarms.push(alarm);
        Ok(id)
    }

    async fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        replace(&mut s.alarms, alarm.id, |a| a.id, alarm.clone(), "alarm")
    }

    async fn delete_alarm(&self, id: i64) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        let before = s.alarms.len();
        s.alarms.retain(|a| a.id != id);
        if s.alarms.len() == before {
            return Err(StoreError::not_found("alarm", id));
        }
        Ok(())
    }

    async fn alarm(&self, id: i64) -> Result<Option<Alarm>, StoreError> {
        Ok(self.inner.lock().await.alarms.iter().find(|a| a.id == id).cloned())
    }

    async fn alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        Ok(self.inner.lock().await.alarms.clone())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, mut task: Task) -> Result<i64, StoreError> {
        let mut s = self.inner.lock().await;
        task.id = s.allocate_id();
        let id = task.id;
        s.tasks.push(task);
        Ok(id)
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        replace(&mut s.tasks, task.id, |t| t.id, task.clone(), "task")
    }

    async fn delete_task(&self, id: i64) -> Result<(), StoreError> {
        let mut s = self.inner.lock().await;
        let before = s.tasks.len();
        s.tasks.retain(|t| t.id != id);
        if s.tasks.len() == before {
            return Err(StoreError::not_found("task", id));
        }
        Ok(())
    }

    async fn task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.lock().await.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.inner.lock().await.tasks.clone())
    }
}

#[async_trait]
impl FinanceStore for MemoryStore {
    async fn insert_entry(&self, mut entry: FinanceEntry) -> Result<i64, StoreError> {
        let mut s = self.inner.lock().await;
        entry.id = s.allocate_id();
        let id = entry.id;
        s.finance.push(entry);
        Ok(id)
    }

    async fn entries(&self) -> Result<Vec<FinanceEntry>, StoreError> {
        Ok(self.inner.lock().await.finance.clone())
    }
}

#[async_trait]
impl Preferences for MemoryStore {
    async fn auto_disabled_ids(&self) -> Result<Vec<i64>, StoreError> {
        Ok(self.inner.lock().await.auto_disabled_ids.clone())
    }

    async fn set_auto_disabled_ids(&self, ids: &[i64]) -> Result<(), StoreError> {
        self.inner.lock().await.auto_disabled_ids = ids.to_vec();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub at: NaiveDateTime,
    pub exact: bool,
}

#[derive(Debug)]
pub struct RecordingScheduler {
    exact_allowed: AtomicBool,
    scheduled: Mutex<BTreeMap<AlarmKey, ScheduledAlarm>>,
}

impl Default for RecordingScheduler {
    fn default() -> Self {
        Self {
            exact_allowed: AtomicBool::new(true),
            scheduled: Mutex::new(BTreeMap::new()),
        }
    }
}

impl RecordingScheduler {
    pub fn set_exact_allowed(&self, allowed: bool) {
        self.exact_allowed.store(allowed, Ordering::SeqCst);
    }

    pub async fn scheduled(&self) -> BTreeMap<AlarmKey, ScheduledAlarm> {
        self.scheduled.lock().await.clone()
    }

    pub async fn get(&self, key: AlarmKey) -> Option<ScheduledAlarm> {
        self.scheduled.lock().await.get(&key).copied()
    }
}

#[async_trait]
impl AlarmScheduler for RecordingScheduler {
    async fn can_schedule_exact(&self) -> bool {
        self.exact_allowed.load(Ordering::SeqCst)
    }

    async fn schedule_exact(&self, key: AlarmKey, at: NaiveDateTime) -> Result<(), PlatformError> {
        if !self.can_schedule_exact().await {
            return Err(PlatformError::PermissionDenied);
        }
        self.scheduled.lock().await.insert(key, ScheduledAlarm { at, exact: true });
        Ok(())
    }

    async fn schedule_inexact(&self, key: AlarmKey, at: NaiveDateTime) -> Result<(), PlatformError> {
        self.scheduled.lock().await.insert(key, ScheduledAlarm { at, exact: false });
        Ok(())
    }

    async fn cancel(&self, key: AlarmKey) -> Result<(), PlatformError> {
        self.scheduled.lock().await.remove(&key);
        Ok(())
    }
}

/// Platform geofencing stand-in with failure injection.
#[derive(Debug, Default)]
pub struct RecordingGeofencing {
    registered: Mutex<BTreeMap<String, GeofenceRequest>>,
    transient_failures: AtomicU32,
    deny: AtomicBool,
    fail_removes: AtomicBool,
    add_calls: AtomicU32,
}

impl RecordingGeofencing {
    /// Fail the next `n` add calls with a retryable error.
    pub fn fail_next_adds(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_denied(&self, denied: bool) {
        self.deny.store(denied, Ordering::SeqCst);
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub fn add_calls(&self) -> u32 {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub async fn registered_ids(&self) -> BTreeSet<String> {
        self.registered.lock().await.keys().cloned().collect()
    }

    pub async fn registration(&self, id: &str) -> Option<GeofenceRequest> {
        self.registered.lock().await.get(id).cloned()
    }

    /// Drop a geofence behind the engine's back, as the OS does after a reboot.
    pub async fn evict(&self, id: &str) {
        self.registered.lock().await.remove(id);
    }
}

#[async_trait]
impl GeofencingClient for RecordingGeofencing {
    async fn add_geofences(&self, geofences: &[GeofenceRequest]) -> Result<(), PlatformError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied);
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(PlatformError::Unavailable("geofencing service busy".into()));
        }
        let mut registered = self.registered.lock().await;
        for g in geofences {
            registered.insert(g.id.clone(), g.clone());
        }
        Ok(())
    }

    async fn remove_geofences(&self, ids: &[String]) -> Result<(), PlatformError> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(PlatformError::Failed("remove rejected".into()));
        }
        let mut registered = self.registered.lock().await;
        for id in ids {
            registered.remove(id);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StaticLocation {
    current: Mutex<Option<Coordinates>>,
}

impl StaticLocation {
    pub fn new(current: Option<Coordinates>) -> Self {
        Self {
            current: Mutex::new(current),
        }
    }

    pub async fn set(&self, current: Option<Coordinates>) {
        *self.current.lock().await = current;
    }
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<Option<Coordinates>, PlatformError> {
        Ok(*self.current.lock().await)
    }
}

#[derive(Debug, Default)]
pub struct StaticPlaces {
    by_category: Mutex<BTreeMap<String, Vec<ResolvedPlace>>>,
}

impl StaticPlaces {
    pub async fn insert(&self, category: PlaceCategory, places: Vec<ResolvedPlace>) {
        self.by_category.lock().await.insert(category.label().to_string(), places);
    }
}

#[async_trait]
impl PlaceResolver for StaticPlaces {
    async fn nearby(&self, category: PlaceCategory, _near: Coordinates) -> Result<Vec<ResolvedPlace>, PlatformError> {
        Ok(self
            .by_category
            .lock()
            .await
            .get(category.label())
            .cloned()
            .unwrap_or_default())
    }
}

/// Saved places keyed by lower-cased name.
#[derive(Debug, Default)]
pub struct NamedPlaces {
    places: Mutex<BTreeMap<String, Coordinates>>,
}

impl NamedPlaces {
    pub fn new(places: impl IntoIterator<Item = (String, Coordinates)>) -> Self {
        Self {
            places: Mutex::new(places.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect()),
        }
    }

    pub async fn insert(&self, name: &str, at: Coordinates) {
        self.places.lock().await.insert(name.to_lowercase(), at);
    }
}

#[async_trait]
impl SavedPlaces for NamedPlaces {
    async fn lookup(&self, name: &str) -> Option<Coordinates> {
        self.places.lock().await.get(&name.trim().to_lowercase()).copied()
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), PlatformError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[derive(Debug)]
pub struct TogglePermission {
    location: AtomicBool,
    background: AtomicBool,
}

impl Default for TogglePermission {
    fn default() -> Self {
        Self {
            location: AtomicBool::new(true),
            background: AtomicBool::new(true),
        }
    }
}

impl TogglePermission {
    pub fn set(&self, location: bool, background: bool) {
        self.location.store(location, Ordering::SeqCst);
        self.background.store(background, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionState for TogglePermission {
    async fn has_location_permission(&self) -> bool {
        self.location.load(Ordering::SeqCst)
    }

    async fn has_background_location_permission(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }
}

/// Manually driven clock for tests and `vox --now`.
#[derive(Debug)]
pub struct FixedClock {
    now: StdMutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: StdMutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock(pub Tz);

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        vox_core::time::local_now(self.0)
    }
}

/// Concrete handles to every in-memory adapter plus the `Ports` view of them.
#[derive(Clone)]
pub struct InMemory {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub geofencing: Arc<RecordingGeofencing>,
    pub location: Arc<StaticLocation>,
    pub places: Arc<StaticPlaces>,
    pub saved_places: Arc<NamedPlaces>,
    pub notifier: Arc<RecordingNotifier>,
    pub permissions: Arc<TogglePermission>,
    pub clock: Arc<FixedClock>,
}

impl InMemory {
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_store(MemoryStore::new(), now)
    }

    pub fn with_store(store: MemoryStore, now: NaiveDateTime) -> Self {
        Self {
            store: Arc::new(store),
            scheduler: Arc::default(),
            geofencing: Arc::default(),
            location: Arc::default(),
            places: Arc::default(),
            saved_places: Arc::default(),
            notifier: Arc::default(),
            permissions: Arc::default(),
            clock: Arc::new(FixedClock::new(now)),
        }
    }

    pub fn ports(&self) -> Ports {
        self.ports_with_clock(self.clock.clone())
    }

    pub fn ports_with_clock(&self, clock: Arc<dyn Clock>) -> Ports {
        Ports {
            reminders: self.store.clone(),
            alarms: self.store.clone(),
            tasks: self.store.clone(),
            finance: self.store.clone(),
            scheduler: self.scheduler.clone(),
            geofencing: self.geofencing.clone(),
            location: self.location.clone(),
            places: self.places.clone(),
            saved_places: self.saved_places.clone(),
            notifier: self.notifier.clone(),
            permissions: self.permissions.clone(),
            preferences: self.store.clone(),
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_shared_across_entities() {
        let store = MemoryStore::new();
        let r = store.insert_reminder(Reminder::time_based("a", now(), now())).await.unwrap();
        let a = store.insert_alarm(Alarm::new("b", now(), now())).await.unwrap();
        assert_eq!((r, a), (1, 2));
        assert_eq!(store.reminder(1).await.unwrap().unwrap().message, "a");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        let mut ghost = Reminder::time_based("ghost", now(), now());
        ghost.id = 42;
        assert_eq!(
            store.update_reminder(&ghost).await,
            Err(StoreError::not_found("reminder", 42))
        );
        assert!(store.delete_task(7).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_survives_json() {
        let store = MemoryStore::new();
        store.insert_task(Task::new("file taxes", now())).await.unwrap();
        store.set_auto_disabled_ids(&[3, 4]).await.unwrap();

        let json = serde_json::to_string(&store.snapshot().await).unwrap();
        let back = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(back.tasks().await.unwrap().len(), 1);
        assert_eq!(back.auto_disabled_ids().await.unwrap(), vec![3, 4]);

        // ids keep counting from where the snapshot left off
        let id = back.insert_task(Task::new("next", now())).await.unwrap();
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn test_geofencing_failure_injection() {
        let geo = RecordingGeofencing::default();
        let fence = GeofenceRequest {
            id: "g".into(),
            center: Coordinates::new(9.0, 38.7),
            radius: 150.0,
            trigger: vox_core::TriggerType::Enter,
        };
        geo.fail_next_adds(1);
        assert!(geo.add_geofences(std::slice::from_ref(&fence)).await.is_err());
        assert!(geo.add_geofences(std::slice::from_ref(&fence)).await.is_ok());
        assert_eq!(geo.add_calls(), 2);
        assert!(geo.registered_ids().await.contains("g"));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(now());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), now() + Duration::minutes(90));
    }
}
