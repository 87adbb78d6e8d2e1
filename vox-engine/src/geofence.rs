//! Platform geofence registration and the cache of what we believe is registered.
//!
//! The tracked map is a cache, not the truth: it is empty after a restart and
//! the platform may drop geofences on its own (reboot, location toggled off).
//! `LocationReminderManager::restore_geofences` rebuilds it at start and
//! `detect_removed_geofences` finds groups that need re-registering.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vox_core::TriggerType;

use crate::error::PlatformError;
use crate::ports::{GeofenceRequest, GeofencingClient};
use crate::retry::{RetryPolicy, with_backoff};

const ID_PREFIX: &str = "location_reminder_";

/// Geofence id for a specific-place reminder.
pub fn geofence_id(reminder_id: i64) -> String {
    format!("{ID_PREFIX}{reminder_id}")
}

/// Geofence id for one place of a generic-category reminder.
pub fn fanout_id(reminder_id: i64, index: usize) -> String {
    format!("{ID_PREFIX}{reminder_id}_{index}")
}

/// Strip the `_<index>` fan-out suffix: `location_reminder_7_2` -> `location_reminder_7`.
pub fn base_geofence_id(id: &str) -> &str {
    let Some((head, tail)) = id.rsplit_once('_') else {
        return id;
    };
    let is_number = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let head_ends_in_id = head.rsplit_once('_').is_some_and(|(_, seg)| is_number(seg));
    if is_number(tail) && head_ends_in_id { head } else { id }
}

pub struct GeofenceManager {
    client: Arc<dyn GeofencingClient>,
    policy: RetryPolicy,
    max_geofences: usize,
    tracked: Mutex<BTreeMap<String, GeofenceRequest>>,
}

impl GeofenceManager {
    pub fn new(client: Arc<dyn GeofencingClient>, policy: RetryPolicy, max_geofences: usize) -> Self {
        Self {
            client,
            policy,
            max_geofences,
            tracked: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn register(&self, request: GeofenceRequest) -> Result<(), PlatformError> {
        self.register_all(vec![request]).await.map(|_| ())
    }

    /// Register as many requests as the platform limit allows, in order.
    /// Returns the ids actually registered.
    pub async fn register_all(&self, requests: Vec<GeofenceRequest>) -> Result<Vec<String>, PlatformError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let batch = {
            let tracked = self.tracked.lock().await;
            let mut free = self.max_geofences.saturating_sub(tracked.len());
            let mut batch = Vec::with_capacity(requests.len());
            let mut dropped = 0usize;
            for request in requests {
                if tracked.contains_key(&request.id) {
                    batch.push(request);
                } else if free > 0 {
                    free -= 1;
                    batch.push(request);
                } else {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                warn!(dropped, limit = self.max_geofences, "geofence limit reached, dropping registrations");
            }
            batch
        };

        if batch.is_empty() {
            return Err(PlatformError::LimitExceeded);
        }

        let client = self.client.clone();
        let to_send = batch.clone();
        with_backoff(self.policy, "add_geofences", || {
            let client = client.clone();
            let to_send = to_send.clone();
            async move { client.add_geofences(&to_send).await }
        })
        .await?;

        let mut tracked = self.tracked.lock().await;
        let ids: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();
        for request in batch {
            tracked.insert(request.id.clone(), request);
        }
        info!(count = ids.len(), "geofences registered");
        Ok(ids)
    }

    /// Forget the ids locally and ask the platform to drop them. Never fails;
    /// removing an unknown id is a no-op.
    pub async fn remove(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        {
            let mut tracked = self.tracked.lock().await;
            for id in ids {
                tracked.remove(id);
            }
        }
        if let Err(e) = self.client.remove_geofences(ids).await {
            warn!(?ids, error = %e, "platform geofence removal failed");
        }
    }

    /// Remove `base` and every fan-out id derived from it.
    pub async fn remove_group(&self, base: &str) {
        let mut ids = self.group_ids(base).await;
        if !ids.iter().any(|id| id == base) {
            ids.push(base.to_string());
        }
        self.remove(&ids).await;
    }

    /// Re-register every tracked geofence of a group with a new trigger.
    pub async fn reregister_group(&self, base: &str, trigger: TriggerType) -> Result<Vec<String>, PlatformError> {
        let requests: Vec<GeofenceRequest> = {
            let tracked = self.tracked.lock().await;
            tracked
                .values()
                .filter(|r| base_geofence_id(&r.id) == base)
                .map(|r| GeofenceRequest { trigger, ..r.clone() })
                .collect()
        };
        if requests.is_empty() {
            debug!(base, "nothing tracked to re-register");
            return Ok(Vec::new());
        }
        let ids: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();
        self.remove(&ids).await;
        self.register_all(requests).await
    }

    async fn group_ids(&self, base: &str) -> Vec<String> {
        self.tracked
            .lock()
            .await
            .keys()
            .filter(|id| base_geofence_id(id) == base)
            .cloned()
            .collect()
    }

    pub async fn tracked_ids(&self) -> BTreeSet<String> {
        self.tracked.lock().await.keys().cloned().collect()
    }

    pub async fn is_tracked(&self, id: &str) -> bool {
        self.tracked.lock().await.contains_key(id)
    }

    /// Base ids in `expected` with no tracked geofence in their group.
    pub async fn detect_removed_geofences(&self, expected: &BTreeSet<String>) -> BTreeSet<String> {
        let tracked_bases: BTreeSet<String> = self
            .tracked
            .lock()
            .await
            .keys()
            .map(|id| base_geofence_id(id).to_string())
            .collect();
        expected.difference(&tracked_bases).cloned().collect()
    }

    pub async fn clear(&self) {
        self.tracked.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingGeofencing;
    use vox_core::Coordinates;

    fn request(id: &str) -> GeofenceRequest {
        GeofenceRequest {
            id: id.to_string(),
            center: Coordinates::new(9.03, 38.74),
            radius: 150.0,
            trigger: TriggerType::Enter,
        }
    }

    fn manager(platform: Arc<RecordingGeofencing>, limit: usize) -> GeofenceManager {
        GeofenceManager::new(platform, RetryPolicy::new(3, 1_000), limit)
    }

    #[test]
    fn test_base_id_strips_fanout_suffix() {
        assert_eq!(base_geofence_id("location_reminder_7_2"), "location_reminder_7");
        assert_eq!(base_geofence_id("location_reminder_7"), "location_reminder_7");
        assert_eq!(base_geofence_id(&fanout_id(12, 0)), geofence_id(12));
        assert_eq!(base_geofence_id("custom"), "custom");
    }

    #[tokio::test]
    async fn test_register_all_keeps_first_n() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform.clone(), 2);
        let ids = geo
            .register_all(vec![request("a_1_0"), request("a_1_1"), request("a_1_2")])
            .await
            .unwrap();
        assert_eq!(ids, vec!["a_1_0".to_string(), "a_1_1".to_string()]);
        assert_eq!(platform.registered_ids().await.len(), 2);

        assert_eq!(geo.register(request("b")).await, Err(PlatformError::LimitExceeded));
    }

    #[tokio::test]
    async fn test_double_remove_is_harmless() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform.clone(), 10);
        geo.register(request("location_reminder_1")).await.unwrap();

        geo.remove(&["location_reminder_1".to_string()]).await;
        geo.remove(&["location_reminder_1".to_string()]).await;
        assert!(!geo.is_tracked("location_reminder_1").await);
        assert!(platform.registered_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_updates_cache_even_when_platform_fails() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform.clone(), 10);
        geo.register(request("location_reminder_1")).await.unwrap();
        platform.set_fail_removes(true);

        geo.remove_group("location_reminder_1").await;
        assert!(geo.tracked_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_group_takes_fanout() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform.clone(), 10);
        geo.register_all(vec![request(&fanout_id(3, 0)), request(&fanout_id(3, 1)), request(&geofence_id(4))])
            .await
            .unwrap();

        geo.remove_group(&geofence_id(3)).await;
        assert_eq!(geo.tracked_ids().await, [geofence_id(4)].into());
    }

    #[tokio::test]
    async fn test_detect_removed_compares_groups() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform, 10);
        geo.register_all(vec![request(&fanout_id(3, 0)), request(&geofence_id(4))])
            .await
            .unwrap();

        let expected: BTreeSet<String> = [geofence_id(3), geofence_id(4), geofence_id(5)].into();
        assert_eq!(geo.detect_removed_geofences(&expected).await, [geofence_id(5)].into());
    }

    #[tokio::test]
    async fn test_reregister_switches_trigger() {
        let platform = Arc::new(RecordingGeofencing::default());
        let geo = manager(platform.clone(), 10);
        geo.register(request(&geofence_id(9))).await.unwrap();

        geo.reregister_group(&geofence_id(9), TriggerType::Exit).await.unwrap();
        let fence = platform.registration(&geofence_id(9)).await.unwrap();
        assert_eq!(fence.trigger, TriggerType::Exit);
    }
}
