//! Location trigger data embedded (as JSON) in a location-based reminder.

use anyhow::{Context, Result, bail};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_METERS: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    SpecificPlace,
    GenericCategory,
}

/// Generic place categories resolved to nearby places at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaceCategory {
    Grocery,
    Pharmacy,
    GasStation,
    Bank,
    Restaurant,
    Cafe,
    Gym,
    Hospital,
    Library,
    PostOffice,
    Store,
}

impl PlaceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PlaceCategory::Grocery => "grocery store",
            PlaceCategory::Pharmacy => "pharmacy",
            PlaceCategory::GasStation => "gas station",
            PlaceCategory::Bank => "bank",
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Gym => "gym",
            PlaceCategory::Hospital => "hospital",
            PlaceCategory::Library => "library",
            PlaceCategory::PostOffice => "post office",
            PlaceCategory::Store => "store",
        }
    }
}

/// Where a location reminder fires. Each variant carries exactly the data it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "locationType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationTarget {
    #[serde(rename_all = "camelCase")]
    SpecificPlace {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        place_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GenericCategory {
        place_category: PlaceCategory,
        #[serde(default)]
        place_name: Option<String>,
    },
}

impl LocationTarget {
    pub fn location_type(&self) -> LocationType {
        match self {
            LocationTarget::SpecificPlace { .. } => LocationType::SpecificPlace,
            LocationTarget::GenericCategory { .. } => LocationType::GenericCategory,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            LocationTarget::SpecificPlace { latitude, longitude, .. } => {
                Some(Coordinates::new(*latitude, *longitude))
            }
            LocationTarget::GenericCategory { .. } => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            LocationTarget::SpecificPlace { place_name: Some(n), .. }
            | LocationTarget::GenericCategory { place_name: Some(n), .. } => n.clone(),
            LocationTarget::SpecificPlace { latitude, longitude, .. } => {
                format!("{latitude:.4}, {longitude:.4}")
            }
            LocationTarget::GenericCategory { place_category, .. } => {
                format!("any {}", place_category.label())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Enter,
    Exit,
    Both,
}

/// Direction reported by a platform geofence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Enter,
    Exit,
}

impl TriggerType {
    pub fn accepts(&self, transition: Transition) -> bool {
        matches!(
            (self, transition),
            (TriggerType::Both, _)
                | (TriggerType::Enter, Transition::Enter)
                | (TriggerType::Exit, Transition::Exit)
        )
    }

    pub fn includes_enter(&self) -> bool {
        self.accepts(Transition::Enter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationRecurrence {
    #[default]
    Once,
    EveryTime,
    Daily,
    Weekdays,
    Weekends,
}

impl LocationRecurrence {
    pub fn is_recurring(&self) -> bool {
        *self != LocationRecurrence::Once
    }
}

/// Hour window in local time. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConstraint {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeConstraint {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let hour = now.hour();
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    #[serde(flatten)]
    pub target: LocationTarget,
    pub radius: f32,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub recurrence: LocationRecurrence,
    #[serde(default)]
    pub time_constraint: Option<TimeConstraint>,
    #[serde(default)]
    pub snoozed_until: Option<NaiveDateTime>,
    #[serde(default)]
    pub snooze_count: u32,
    #[serde(default)]
    pub last_triggered_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub trigger_count: u32,
    /// Configured trigger to restore after a "snooze until I leave" fires.
    #[serde(default)]
    pub restore_trigger_type: Option<TriggerType>,
}

impl LocationData {
    pub fn new(target: LocationTarget) -> Self {
        Self {
            target,
            radius: DEFAULT_RADIUS_METERS,
            trigger_type: TriggerType::Enter,
            recurrence: LocationRecurrence::Once,
            time_constraint: None,
            snoozed_until: None,
            snooze_count: 0,
            last_triggered_at: None,
            trigger_count: 0,
            restore_trigger_type: None,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_trigger(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = trigger_type;
        self
    }

    pub fn with_recurrence(mut self, recurrence: LocationRecurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_time_constraint(mut self, constraint: TimeConstraint) -> Self {
        self.time_constraint = Some(constraint);
        self
    }

    pub fn location_type(&self) -> LocationType {
        self.target.location_type()
    }

    pub fn is_snoozed(&self, now: NaiveDateTime) -> bool {
        self.snoozed_until.is_some_and(|until| now < until)
    }

    /// Copy with trigger metadata advanced after a fire.
    pub fn triggered(&self, now: NaiveDateTime) -> Self {
        let mut next = self.clone();
        next.last_triggered_at = Some(now);
        next.trigger_count += 1;
        next.snoozed_until = None;
        if let Some(original) = next.restore_trigger_type.take() {
            next.trigger_type = original;
        }
        next
    }

    pub fn snoozed(&self, until: NaiveDateTime) -> Self {
        let mut next = self.clone();
        next.snoozed_until = Some(until);
        next.snooze_count += 1;
        next
    }

    pub fn validate(&self) -> Result<()> {
        if let LocationTarget::SpecificPlace { latitude, longitude, .. } = &self.target {
            if !Coordinates::new(*latitude, *longitude).is_valid() {
                bail!("coordinates out of range: {latitude}, {longitude}");
            }
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            bail!("radius must be positive, got {}", self.radius);
        }
        if let Some(tc) = self.time_constraint {
            if tc.start_hour > 23 || tc.end_hour > 24 {
                bail!("time window hours out of range: {}-{}", tc.start_hour, tc.end_hour);
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize location data")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let data: Self = serde_json::from_str(s).context("parse location data")?;
        data.validate()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn json_blob_is_tagged_by_location_type() {
        let data = LocationData::new(LocationTarget::GenericCategory {
            place_category: PlaceCategory::Grocery,
            place_name: None,
        })
        .with_recurrence(LocationRecurrence::Daily);

        let json = data.to_json().unwrap();
        assert!(json.contains("\"locationType\":\"GENERIC_CATEGORY\""));
        assert!(json.contains("\"placeCategory\":\"GROCERY\""));
        assert!(json.contains("\"recurrence\":\"DAILY\""));

        let back = LocationData::from_json(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn specific_place_without_coordinates_does_not_parse() {
        let json = r#"{"locationType":"SPECIFIC_PLACE","placeName":"home","radius":100.0,"triggerType":"ENTER"}"#;
        assert!(LocationData::from_json(json).is_err());
    }

    #[test]
    fn generic_category_without_category_does_not_parse() {
        let json = r#"{"locationType":"GENERIC_CATEGORY","radius":100.0,"triggerType":"ENTER"}"#;
        assert!(LocationData::from_json(json).is_err());
    }

    #[test]
    fn trigger_type_matching() {
        assert!(TriggerType::Both.accepts(Transition::Exit));
        assert!(TriggerType::Enter.accepts(Transition::Enter));
        assert!(!TriggerType::Enter.accepts(Transition::Exit));
        assert!(!TriggerType::Exit.accepts(Transition::Enter));
    }

    #[test]
    fn time_window_wraps_midnight() {
        let night = TimeConstraint::new(22, 6);
        assert!(night.contains(at(23, 30)));
        assert!(night.contains(at(2, 0)));
        assert!(!night.contains(at(12, 0)));

        let office = TimeConstraint::new(9, 17);
        assert!(office.contains(at(9, 0)));
        assert!(!office.contains(at(17, 0)));
    }

    #[test]
    fn triggered_resets_snooze_and_restores_trigger() {
        let mut data = LocationData::new(LocationTarget::SpecificPlace {
            latitude: 9.03,
            longitude: 38.74,
            place_name: Some("home".into()),
        })
        .snoozed(at(9, 0));
        data.restore_trigger_type = Some(TriggerType::Enter);
        data.trigger_type = TriggerType::Exit;

        let fired = data.triggered(at(10, 0));
        assert_eq!(fired.trigger_count, 1);
        assert_eq!(fired.snoozed_until, None);
        assert_eq!(fired.snooze_count, 1);
        assert_eq!(fired.trigger_type, TriggerType::Enter);
        assert_eq!(fired.restore_trigger_type, None);
    }
}
