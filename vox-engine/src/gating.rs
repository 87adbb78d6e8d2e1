//! Decides whether a geofence transition may fire its reminder.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use vox_core::time::weekday_number;
use vox_core::{LocationRecurrence, RecurrenceRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    UnknownGeofence,
    NotPending,
    WrongDirection,
    Snoozed,
    OutsideTimeWindow,
    CoolingDown,
    AlreadyTriggeredToday,
    NotWeekday,
    NotWeekend,
    NotScheduledToday,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IgnoreReason::UnknownGeofence => "no reminder owns this geofence",
            IgnoreReason::NotPending => "reminder is not pending",
            IgnoreReason::WrongDirection => "transition does not match the trigger",
            IgnoreReason::Snoozed => "reminder is snoozed",
            IgnoreReason::OutsideTimeWindow => "outside the reminder's time window",
            IgnoreReason::CoolingDown => "fired too recently",
            IgnoreReason::AlreadyTriggeredToday => "already fired today",
            IgnoreReason::NotWeekday => "only fires on weekdays",
            IgnoreReason::NotWeekend => "only fires on weekends",
            IgnoreReason::NotScheduledToday => "not scheduled for today",
        };
        f.write_str(s)
    }
}

/// Minimum gap between two fires of the same reminder.
pub fn cooldown_for(recurrence: LocationRecurrence, has_rule: bool) -> Duration {
    match recurrence {
        LocationRecurrence::Daily | LocationRecurrence::Weekdays | LocationRecurrence::Weekends => Duration::hours(20),
        LocationRecurrence::Once | LocationRecurrence::EveryTime if has_rule => Duration::minutes(60),
        LocationRecurrence::Once | LocationRecurrence::EveryTime => Duration::minutes(30),
    }
}

pub fn cooldown_elapsed(last: Option<NaiveDateTime>, cooldown: Duration, now: NaiveDateTime) -> bool {
    last.is_none_or(|last| now - last >= cooldown)
}

/// Day-level constraint from the location recurrence, plus an explicit
/// weekday set carried by the reminder's recurrence rule.
pub fn recurrence_constraint(
    recurrence: LocationRecurrence,
    rule: Option<&RecurrenceRule>,
    last_triggered_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<(), IgnoreReason> {
    let weekday = weekday_number(now.date());
    match recurrence {
        LocationRecurrence::Daily => {
            if last_triggered_at.is_some_and(|last| last.date() == now.date()) {
                return Err(IgnoreReason::AlreadyTriggeredToday);
            }
        }
        LocationRecurrence::Weekdays if !(1..=5).contains(&weekday) => return Err(IgnoreReason::NotWeekday),
        LocationRecurrence::Weekends if !(6..=7).contains(&weekday) => return Err(IgnoreReason::NotWeekend),
        _ => {}
    }
    if let Some(days) = rule.and_then(|r| r.weekdays()) {
        if !days.contains(&weekday) {
            return Err(IgnoreReason::NotScheduledToday);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_cooldown_table() {
        assert_eq!(cooldown_for(LocationRecurrence::Once, false), Duration::minutes(30));
        assert_eq!(cooldown_for(LocationRecurrence::EveryTime, false), Duration::minutes(30));
        assert_eq!(cooldown_for(LocationRecurrence::EveryTime, true), Duration::minutes(60));
        assert_eq!(cooldown_for(LocationRecurrence::Daily, true), Duration::hours(20));
        assert_eq!(cooldown_for(LocationRecurrence::Weekends, false), Duration::hours(20));
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let cd = Duration::minutes(30);
        assert!(cooldown_elapsed(None, cd, at(19, 9, 0)));
        assert!(!cooldown_elapsed(Some(at(19, 9, 0)), cd, at(19, 9, 29)));
        assert!(cooldown_elapsed(Some(at(19, 9, 0)), cd, at(19, 9, 30)));
    }

    #[test]
    fn test_daily_once_per_date() {
        let last = Some(at(19, 0, 30));
        assert_eq!(
            recurrence_constraint(LocationRecurrence::Daily, None, last, at(19, 23, 0)),
            Err(IgnoreReason::AlreadyTriggeredToday)
        );
        assert_eq!(recurrence_constraint(LocationRecurrence::Daily, None, last, at(20, 0, 10)), Ok(()));
    }

    #[test]
    fn test_weekday_and_weekend_sets() {
        // 2026-10-24 is a Saturday
        assert_eq!(
            recurrence_constraint(LocationRecurrence::Weekdays, None, None, at(24, 9, 0)),
            Err(IgnoreReason::NotWeekday)
        );
        assert_eq!(recurrence_constraint(LocationRecurrence::Weekends, None, None, at(24, 9, 0)), Ok(()));
        assert_eq!(
            recurrence_constraint(LocationRecurrence::Weekends, None, None, at(23, 9, 0)),
            Err(IgnoreReason::NotWeekend)
        );
    }

    #[test]
    fn test_explicit_days_must_include_today() {
        let tue_thu = RecurrenceRule::weekly_on([2, 4]);
        assert_eq!(
            recurrence_constraint(LocationRecurrence::EveryTime, Some(&tue_thu), None, at(19, 9, 0)),
            Err(IgnoreReason::NotScheduledToday)
        );
        assert_eq!(
            recurrence_constraint(LocationRecurrence::EveryTime, Some(&tue_thu), None, at(20, 9, 0)),
            Ok(())
        );
    }
}
