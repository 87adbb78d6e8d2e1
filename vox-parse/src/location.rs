//! Location-triggered reminders: "remind me to buy milk at the grocery store".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vox_core::{
    Coordinates, LocationData, LocationRecurrence, LocationTarget, LocationType, PlaceCategory,
    RecurrenceRule, TimeConstraint, TriggerType,
};

use crate::patterns::{PatternLibrary, category_for, is_named_place, normalize_spaces, weekday_from_name};
use crate::time_expr::hour_12_to_24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLocationCommand {
    pub message: String,
    pub location_type: LocationType,
    /// Named place ("home", "work") or the category keyword as spoken.
    pub place_name: Option<String>,
    pub place_category: Option<PlaceCategory>,
    pub coordinates: Option<Coordinates>,
    pub trigger_on_exit: bool,
    pub is_recurring: bool,
    pub time_constraint: Option<TimeConstraint>,
    pub days_of_week: Option<BTreeSet<u8>>,
    pub custom_radius: Option<f32>,
}

impl ParsedLocationCommand {
    pub fn trigger_type(&self) -> TriggerType {
        if self.trigger_on_exit { TriggerType::Exit } else { TriggerType::Enter }
    }

    pub fn location_recurrence(&self) -> LocationRecurrence {
        let weekdays: BTreeSet<u8> = (1..=5).collect();
        let weekend: BTreeSet<u8> = [6, 7].into();
        match &self.days_of_week {
            Some(days) if days.len() == 7 => LocationRecurrence::Daily,
            Some(days) if *days == weekdays => LocationRecurrence::Weekdays,
            Some(days) if *days == weekend => LocationRecurrence::Weekends,
            Some(_) => LocationRecurrence::EveryTime,
            None if self.is_recurring => LocationRecurrence::EveryTime,
            None => LocationRecurrence::Once,
        }
    }

    /// Rule for the owning reminder when the day set is not one of the
    /// built-in location recurrences.
    pub fn recurrence_rule(&self) -> Option<RecurrenceRule> {
        match (self.location_recurrence(), &self.days_of_week) {
            (LocationRecurrence::EveryTime, Some(days)) => {
                Some(RecurrenceRule::weekly_on(days.iter().copied()))
            }
            _ => None,
        }
    }

    /// Named places carry no coordinates until the caller resolves them.
    pub fn target(&self, resolved: Option<Coordinates>) -> Option<LocationTarget> {
        match self.location_type {
            LocationType::SpecificPlace => {
                let c = self.coordinates.or(resolved)?;
                Some(LocationTarget::SpecificPlace {
                    latitude: c.latitude,
                    longitude: c.longitude,
                    place_name: self.place_name.clone(),
                })
            }
            LocationType::GenericCategory => Some(LocationTarget::GenericCategory {
                place_category: self.place_category?,
                place_name: self.place_name.clone(),
            }),
        }
    }

    pub fn to_location_data(&self, resolved: Option<Coordinates>, default_radius: f32) -> Option<LocationData> {
        let mut data = LocationData::new(self.target(resolved)?)
            .with_radius(self.custom_radius.unwrap_or(default_radius))
            .with_trigger(self.trigger_type())
            .with_recurrence(self.location_recurrence());
        if let Some(tc) = self.time_constraint {
            data = data.with_time_constraint(tc);
        }
        Some(data)
    }
}

struct PlaceMatch {
    keyword: String,
    prep: String,
    category: Option<PlaceCategory>,
    coordinates: Option<Coordinates>,
}

fn find_place(p: &PatternLibrary, text: &str) -> Option<PlaceMatch> {
    let caps = p.place.captures(text)?;
    let place = caps.name("place")?.as_str();
    let prep = normalize_spaces(caps.name("prep")?.as_str());

    if let Some(c) = p.coordinates.captures(place) {
        let mut parts = c[1].split(',').map(|s| s.trim().parse::<f64>());
        let lat = parts.next()?.ok()?;
        let lon = parts.next()?.ok()?;
        let coords = Coordinates::new(lat, lon);
        return coords.is_valid().then(|| PlaceMatch {
            keyword: place.to_string(),
            prep,
            category: None,
            coordinates: Some(coords),
        });
    }

    Some(PlaceMatch {
        keyword: normalize_spaces(place),
        prep,
        category: category_for(place),
        coordinates: None,
    })
}

/// A place keyword introduced by a preposition AND an enter/exit trigger phrase.
pub fn is_location_command(p: &PatternLibrary, text: &str) -> bool {
    find_place(p, text).is_some() && (p.enter_trigger.is_match(text) || p.exit_trigger.is_match(text))
}

fn sanitize_message(p: &PatternLibrary, candidate: &str, keyword: &str) -> Option<String> {
    let mut msg = candidate.trim().to_string();
    msg = p.trigger_clause.replace(&msg, "").into_owned();
    loop {
        let stripped = p.location_msg_tail.replace(&msg, "").into_owned();
        if stripped == msg {
            break;
        }
        msg = stripped;
    }
    let msg = msg
        .trim()
        .trim_end_matches(['.', '!', ',', '?'])
        .trim()
        .to_string();

    if msg.is_empty() || p.trigger_start.is_match(&msg) || normalize_spaces(&msg) == keyword {
        return None;
    }
    Some(msg)
}

/// Four strategies in order; the first usable capture wins.
fn extract_message(p: &PatternLibrary, text: &str, keyword: &str) -> Option<String> {
    p.location_messages.iter().find_map(|re| {
        let caps = re.captures(text)?;
        sanitize_message(p, caps.name("msg")?.as_str(), keyword)
    })
}

fn window_hour(hour: &str, suffix: Option<&str>) -> Option<u32> {
    let h: u32 = hour.parse().ok()?;
    match suffix {
        Some(s) => (1..=12).contains(&h).then(|| hour_12_to_24(h, s.eq_ignore_ascii_case("p"))),
        None => (h <= 24).then_some(h),
    }
}

fn extract_time_constraint(p: &PatternLibrary, text: &str) -> Option<TimeConstraint> {
    if let Some(caps) = p.time_window.captures(text) {
        let start_suffix = caps.get(2).map(|m| m.as_str());
        let end_suffix = caps.get(4).map(|m| m.as_str());
        let end = window_hour(&caps[3], end_suffix)?;
        // "between 2 and 5pm" borrows the end's suffix when that keeps the window forward
        let start = match (start_suffix, end_suffix) {
            (None, Some(s)) => window_hour(&caps[1], Some(s))
                .filter(|h| *h <= end)
                .or_else(|| window_hour(&caps[1], None))?,
            _ => window_hour(&caps[1], start_suffix)?,
        };
        return Some(TimeConstraint::new(start, end));
    }

    let caps = p.day_part.captures(text)?;
    let part = caps.get(1).or_else(|| caps.get(2))?.as_str().to_lowercase();
    match part.as_str() {
        "morning" => Some(TimeConstraint::new(6, 12)),
        "afternoon" => Some(TimeConstraint::new(12, 17)),
        "evening" => Some(TimeConstraint::new(17, 21)),
        "night" => Some(TimeConstraint::new(20, 6)),
        _ => None,
    }
}

fn extract_radius(p: &PatternLibrary, text: &str) -> Option<f32> {
    let caps = p.radius.captures(text)?;
    let value: f32 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    let meters = if unit.starts_with("k") {
        value * 1000.0
    } else if unit.starts_with("mi") {
        value * 1609.34
    } else {
        value
    };
    (meters > 0.0).then_some(meters)
}

fn extract_days(p: &PatternLibrary, text: &str) -> Option<BTreeSet<u8>> {
    if p.location_every_day.is_match(text) {
        return Some((1..=7).collect());
    }
    if p.location_weekdays.is_match(text) {
        return Some((1..=5).collect());
    }
    if p.location_weekends.is_match(text) {
        return Some([6, 7].into());
    }
    let caps = p.location_named_days.captures(text)?;
    let days: BTreeSet<u8> = caps[1]
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|w| weekday_from_name(w.trim_end_matches('s')))
        .collect();
    (!days.is_empty()).then_some(days)
}

fn is_exit(p: &PatternLibrary, text: &str, place: &PlaceMatch) -> bool {
    if p.exit_trigger.is_match(&place.prep) {
        return true;
    }
    p.trigger_clause
        .find(text)
        .is_some_and(|clause| p.exit_trigger.is_match(clause.as_str()))
}

pub fn parse_location_command(p: &PatternLibrary, text: &str) -> Option<ParsedLocationCommand> {
    let text = text.trim();
    if !is_location_command(p, text) {
        return None;
    }
    let place = find_place(p, text)?;
    let message = extract_message(p, text, &place.keyword)?;

    let (location_type, place_name) = match (&place.coordinates, place.category) {
        (Some(_), _) => (LocationType::SpecificPlace, None),
        (None, Some(_)) => (LocationType::GenericCategory, Some(place.keyword.clone())),
        (None, None) if is_named_place(&place.keyword) => {
            (LocationType::SpecificPlace, Some(place.keyword.clone()))
        }
        (None, None) => return None,
    };

    let days_of_week = extract_days(p, text);
    let is_recurring = days_of_week.is_some() || p.location_recurring.is_match(text);

    Some(ParsedLocationCommand {
        message,
        location_type,
        place_name,
        place_category: place.category,
        coordinates: place.coordinates,
        trigger_on_exit: is_exit(p, text, &place),
        is_recurring,
        time_constraint: extract_time_constraint(p, text),
        days_of_week,
        custom_radius: extract_radius(p, text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib() -> PatternLibrary {
        PatternLibrary::new().unwrap()
    }

    #[test]
    fn test_grocery_store_is_generic_category() {
        let p = lib();
        let text = "remind me to buy milk at the grocery store";
        assert!(is_location_command(&p, text));
        let cmd = parse_location_command(&p, text).unwrap();
        assert_eq!(cmd.location_type, LocationType::GenericCategory);
        assert_eq!(cmd.place_category, Some(PlaceCategory::Grocery));
        assert_eq!(cmd.message, "buy milk");
        assert!(!cmd.trigger_on_exit);
        assert_eq!(cmd.location_recurrence(), LocationRecurrence::Once);
    }

    #[test]
    fn test_leaving_work_is_exit_trigger() {
        let p = lib();
        let cmd = parse_location_command(&p, "Remind me to call Mom when I leave work").unwrap();
        assert_eq!(cmd.message, "call Mom");
        assert_eq!(cmd.location_type, LocationType::SpecificPlace);
        assert_eq!(cmd.place_name.as_deref(), Some("work"));
        assert!(cmd.trigger_on_exit);
        assert_eq!(cmd.trigger_type(), TriggerType::Exit);
    }

    #[test]
    fn test_message_after_place() {
        let p = lib();
        let cmd = parse_location_command(&p, "remind me every time I get to the gym to stretch").unwrap();
        assert_eq!(cmd.message, "stretch");
        assert_eq!(cmd.place_category, Some(PlaceCategory::Gym));
        assert!(cmd.is_recurring);
        assert_eq!(cmd.location_recurrence(), LocationRecurrence::EveryTime);
    }

    #[test]
    fn test_message_never_echoes_the_place() {
        let p = lib();
        let cmd = parse_location_command(&p, "when I get home, remind me to water the plants").unwrap();
        assert_eq!(cmd.message, "water the plants");
        assert_eq!(cmd.place_name.as_deref(), Some("home"));
    }

    #[test]
    fn test_window_radius_and_days() {
        let p = lib();
        let cmd = parse_location_command(
            &p,
            "remind me to pick up medicine when I pass a pharmacy on weekdays between 9am and 5pm within 500 meters",
        )
        .unwrap();
        assert_eq!(cmd.message, "pick up medicine");
        assert_eq!(cmd.place_category, Some(PlaceCategory::Pharmacy));
        assert_eq!(cmd.time_constraint, Some(TimeConstraint::new(9, 17)));
        assert_eq!(cmd.custom_radius, Some(500.0));
        assert_eq!(cmd.location_recurrence(), LocationRecurrence::Weekdays);
    }

    #[test]
    fn test_night_window_wraps() {
        let p = lib();
        let cmd = parse_location_command(&p, "remind me to lock the car when I get home at night").unwrap();
        assert_eq!(cmd.message, "lock the car");
        assert_eq!(cmd.time_constraint, Some(TimeConstraint::new(20, 6)));
    }

    #[test]
    fn test_explicit_days_become_a_rule() {
        let p = lib();
        let cmd = parse_location_command(&p, "remind me to grab coffee at the cafe on mondays and fridays").unwrap();
        assert_eq!(cmd.days_of_week, Some([1, 5].into()));
        assert_eq!(cmd.location_recurrence(), LocationRecurrence::EveryTime);
        assert_eq!(cmd.recurrence_rule(), Some(RecurrenceRule::weekly_on([1, 5])));
    }

    #[test]
    fn test_coordinates() {
        let p = lib();
        let cmd = parse_location_command(&p, "remind me to take photos when I arrive at 9.0300, 38.7400").unwrap();
        assert_eq!(cmd.location_type, LocationType::SpecificPlace);
        assert_eq!(cmd.coordinates, Some(Coordinates::new(9.03, 38.74)));
        let data = cmd.to_location_data(None, 150.0).unwrap();
        assert_eq!(data.radius, 150.0);
    }

    #[test]
    fn test_time_reminder_is_not_location() {
        let p = lib();
        assert!(!is_location_command(&p, "remind me to call mom at 5pm"));
    }
}
