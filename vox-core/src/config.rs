//! Engine tuning knobs. Every field has a default so a partial config.toml works.

use serde::{Deserialize, Serialize};

use crate::location::DEFAULT_RADIUS_METERS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Platform cap on simultaneously registered geofences.
    pub max_geofences: usize,
    pub geofence_retry_attempts: u32,
    pub geofence_retry_base_ms: u64,
    pub location_retry_attempts: u32,
    pub location_retry_base_ms: u64,
    pub default_radius_meters: f32,
    /// Upper bound on places registered for one generic-category reminder.
    pub max_places_per_category: usize,
    pub location_snooze_minutes: i64,
    pub reminder_snooze_minutes: i64,
    pub alarm_snooze_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_geofences: 100,
            geofence_retry_attempts: 3,
            geofence_retry_base_ms: 1_000,
            location_retry_attempts: 3,
            location_retry_base_ms: 500,
            default_radius_meters: DEFAULT_RADIUS_METERS,
            max_places_per_category: 5,
            location_snooze_minutes: 60,
            reminder_snooze_minutes: 10,
            alarm_snooze_minutes: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"max_geofences": 20}"#).unwrap();
        assert_eq!(cfg.max_geofences, 20);
        assert_eq!(cfg.geofence_retry_attempts, 3);
    }
}
