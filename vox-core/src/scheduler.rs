//! Recurrence scheduler: next-occurrence math and calendar matching.
//!
//! Two independent views of a rule:
//! - forward advancement (`next_occurrence`) used when a reminder fires and
//!   must be re-armed,
//! - a pure date predicate (`matches_date`) used to paint calendar cells.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::recurrence::{RecurrenceRule, RecurrenceType};
use crate::time::{clamped_date, days_in_month, is_leap_year, months_between, shift_month, week_start, weekday_number};

/// Hard cap on iterations when enumerating a range.
pub const MAX_RANGE_ITERATIONS: usize = 366;

/// Compute the occurrence after `current`. `None` means the series ended.
pub fn next_occurrence(current: NaiveDateTime, rule: &RecurrenceRule) -> Option<NaiveDateTime> {
    if let Some(end) = rule.end_date {
        if current > end {
            return None;
        }
    }

    let interval = rule.interval.max(1);
    let next = match rule.kind {
        RecurrenceType::None => return None,
        RecurrenceType::Daily => Some(current + Duration::days(interval as i64)),
        RecurrenceType::Weekly => match rule.weekdays() {
            Some(days) => advance_weekly_by_days(current, interval, days),
            None => Some(current + Duration::weeks(interval as i64)),
        },
        RecurrenceType::Monthly => advance_monthly(current, interval, rule.day_of_month),
        RecurrenceType::Yearly => advance_yearly(current, interval),
        RecurrenceType::Custom => {
            if let Some(days) = rule.weekdays() {
                advance_weekly_by_days(current, interval, days)
            } else if rule.day_of_month.is_some() {
                advance_monthly(current, interval, rule.day_of_month)
            } else {
                Some(current + Duration::days(interval as i64))
            }
        }
    }?;

    match rule.end_date {
        Some(end) if next > end => None,
        _ => Some(next),
    }
}

/// Scan forward one day at a time; the `interval - 1` skipped weeks are
/// applied exactly once, the first time the scan leaves the starting week.
fn advance_weekly_by_days(
    current: NaiveDateTime,
    interval: u32,
    days: &BTreeSet<u8>,
) -> Option<NaiveDateTime> {
    let origin_week = week_start(current.date());
    let mut candidate = current + Duration::days(1);
    let mut skipped = interval <= 1;

    // Rest of the origin week plus one full target week is at most 14 steps.
    for _ in 0..21 {
        if !skipped && week_start(candidate.date()) != origin_week {
            candidate += Duration::weeks(interval as i64 - 1);
            skipped = true;
        }
        if days.contains(&weekday_number(candidate.date())) {
            return Some(candidate);
        }
        candidate += Duration::days(1);
    }

    None
}

fn advance_monthly(
    current: NaiveDateTime,
    interval: u32,
    day_of_month: Option<u32>,
) -> Option<NaiveDateTime> {
    let anchor = day_of_month.unwrap_or_else(|| current.day());
    let mut step = interval as i64;

    for _ in 0..2 {
        let (year, month) = shift_month(current.year(), current.month(), step);
        let candidate = clamped_date(year, month, anchor)?.and_time(current.time());
        if candidate > current {
            return Some(candidate);
        }
        step += interval as i64;
    }

    None
}

fn advance_yearly(current: NaiveDateTime, interval: u32) -> Option<NaiveDateTime> {
    let year = current.year() + interval as i32;
    // Feb 29 anchors land on Feb 28 in non-leap years.
    Some(clamped_date(year, current.month(), current.day())?.and_time(current.time()))
}

/// Enumerate occurrences of a series starting at `start_time` whose dates fall
/// within `[start_date, end_date]`.
pub fn occurrences_in_range(
    rule: &RecurrenceRule,
    start_time: NaiveDateTime,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let series_start = start_time.date();

    let mut current = start_time;
    for _ in 0..MAX_RANGE_ITERATIONS {
        let day = current.date();
        if day > end_date {
            break;
        }
        if day >= start_date && matches_date(rule, day, series_start) {
            out.push(current);
        }
        if !rule.is_recurring() {
            break;
        }
        match next_occurrence(current, rule) {
            Some(next) => current = next,
            None => break,
        }
    }

    out
}

/// Does the series that started on `series_start` have an occurrence on `date`?
pub fn matches_date(rule: &RecurrenceRule, date: NaiveDate, series_start: NaiveDate) -> bool {
    if date < series_start {
        return false;
    }
    if let Some(end) = rule.end_date {
        if date > end.date() {
            return false;
        }
    }

    let interval = rule.interval.max(1) as i64;
    match rule.kind {
        RecurrenceType::None => date == series_start,
        RecurrenceType::Daily => matches_daily(date, series_start, interval),
        RecurrenceType::Weekly => matches_weekly(rule.weekdays(), date, series_start, interval),
        RecurrenceType::Monthly => matches_monthly(rule.day_of_month, date, series_start, interval),
        RecurrenceType::Yearly => matches_yearly(date, series_start, interval),
        RecurrenceType::Custom => {
            if let Some(days) = rule.weekdays() {
                matches_weekly(Some(days), date, series_start, interval)
            } else if rule.day_of_month.is_some() {
                matches_monthly(rule.day_of_month, date, series_start, interval)
            } else {
                matches_daily(date, series_start, interval)
            }
        }
    }
}

fn matches_daily(date: NaiveDate, start: NaiveDate, interval: i64) -> bool {
    (date - start).num_days() % interval == 0
}

fn matches_weekly(days: Option<&BTreeSet<u8>>, date: NaiveDate, start: NaiveDate, interval: i64) -> bool {
    let weeks = (week_start(date) - week_start(start)).num_days() / 7;
    if weeks % interval != 0 {
        return false;
    }
    match days {
        Some(days) => days.contains(&weekday_number(date)),
        None => date.weekday() == start.weekday(),
    }
}

fn matches_monthly(day_of_month: Option<u32>, date: NaiveDate, start: NaiveDate, interval: i64) -> bool {
    if months_between(start, date) % interval != 0 {
        return false;
    }
    let target = day_of_month.unwrap_or_else(|| start.day());
    // Day 31 paints the last day of a 30-day month (and Feb 28/29).
    date.day() == target.min(days_in_month(date.year(), date.month()))
}

fn matches_yearly(date: NaiveDate, start: NaiveDate, interval: i64) -> bool {
    if (date.year() - start.year()) as i64 % interval != 0 || date.month() != start.month() {
        return false;
    }
    if date.day() == start.day() {
        return true;
    }
    start.month() == 2 && start.day() == 29 && date.day() == 28 && !is_leap_year(date.year())
}

/// First occurrence strictly after `now` at `time_of_day` that the rule allows.
/// Used to seed a freshly parsed recurring command.
pub fn first_occurrence_after(
    rule: &RecurrenceRule,
    time_of_day: NaiveTime,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let today = now.date();
    let first = match (rule.kind, rule.weekdays(), rule.day_of_month) {
        (_, Some(days), _) => (0..=7)
            .map(|offset| (today + Duration::days(offset)).and_time(time_of_day))
            .find(|c| *c > now && days.contains(&weekday_number(c.date()))),
        (RecurrenceType::Monthly | RecurrenceType::Custom, None, Some(dom)) => {
            let this_month = clamped_date(today.year(), today.month(), dom)?.and_time(time_of_day);
            if this_month > now {
                Some(this_month)
            } else {
                let (y, m) = shift_month(today.year(), today.month(), 1);
                Some(clamped_date(y, m, dom)?.and_time(time_of_day))
            }
        }
        _ => {
            let candidate = today.and_time(time_of_day);
            if candidate > now {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }
    }?;

    match rule.end_date {
        Some(end) if first > end => None,
        _ => Some(first),
    }
}

/// Advance `current` until it is strictly after `now`. Used when a recurring
/// item fires late (device asleep, app restarted) so missed slots are skipped.
pub fn next_occurrence_after(
    current: NaiveDateTime,
    rule: &RecurrenceRule,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let mut next = next_occurrence(current, rule)?;
    for _ in 0..MAX_RANGE_ITERATIONS * 4 {
        if next > now {
            return Some(next);
        }
        next = next_occurrence(next, rule)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_adds_interval_days() {
        let rule = RecurrenceRule::daily().with_interval(2);
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &rule), Some(at(2026, 10, 21, 8, 0)));
    }

    #[test]
    fn none_never_repeats() {
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &RecurrenceRule::none()), None);
    }

    #[test]
    fn weekly_mon_wed_fri_is_strictly_increasing_and_in_set() {
        let rule = RecurrenceRule::weekly_on([1, 3, 5]);
        // start from every day of one week, including off-set days
        for start_day in 19..=25 {
            let mut current = at(2026, 10, start_day, 7, 30);
            let mut seen = std::collections::HashSet::new();
            for _ in 0..40 {
                let next = next_occurrence(current, &rule).unwrap();
                assert!(next > current);
                assert!([1, 3, 5].contains(&weekday_number(next.date())));
                assert!(seen.insert(next.date()), "repeated date {}", next.date());
                current = next;
            }
        }
    }

    #[test]
    fn weekly_interval_skips_weeks_once() {
        // Monday 2026-10-19, biweekly on Wednesday
        let rule = RecurrenceRule::weekly_on([3]).with_interval(2);
        let first = next_occurrence(at(2026, 10, 19, 9, 0), &rule).unwrap();
        assert_eq!(first, at(2026, 10, 21, 9, 0));
        let second = next_occurrence(first, &rule).unwrap();
        assert_eq!(second, at(2026, 11, 4, 9, 0));
    }

    #[test]
    fn weekly_interval_with_sunday_only_lands_in_intended_week() {
        // Sunday 2026-10-25 -> every 3 weeks on Sunday -> 2026-11-15
        let rule = RecurrenceRule::weekly_on([7]).with_interval(3);
        assert_eq!(next_occurrence(at(2026, 10, 25, 18, 0), &rule), Some(at(2026, 11, 15, 18, 0)));
    }

    #[test]
    fn weekly_interval_sparse_days_within_and_across_weeks() {
        // Tue + Sat every 2 weeks starting Tue 2026-10-20
        let rule = RecurrenceRule::weekly_on([2, 6]).with_interval(2);
        let sat = next_occurrence(at(2026, 10, 20, 6, 0), &rule).unwrap();
        assert_eq!(sat, at(2026, 10, 24, 6, 0));
        let tue = next_occurrence(sat, &rule).unwrap();
        assert_eq!(tue, at(2026, 11, 3, 6, 0));
    }

    #[test]
    fn weekly_without_days_adds_weeks() {
        let rule = RecurrenceRule::weekly().with_interval(2);
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &rule), Some(at(2026, 11, 2, 8, 0)));
    }

    #[test]
    fn monthly_day_31_clamps_to_february() {
        let rule = RecurrenceRule::monthly_on(31);
        let feb = next_occurrence(at(2027, 1, 31, 9, 0), &rule).unwrap();
        assert_eq!(feb, at(2027, 2, 28, 9, 0));
        let mar = next_occurrence(feb, &rule).unwrap();
        assert_eq!(mar, at(2027, 3, 31, 9, 0));

        let leap = next_occurrence(at(2028, 1, 31, 9, 0), &rule).unwrap();
        assert_eq!(leap, at(2028, 2, 29, 9, 0));
    }

    #[test]
    fn monthly_without_anchor_uses_current_day() {
        let rule = RecurrenceRule::monthly().with_interval(3);
        assert_eq!(next_occurrence(at(2026, 11, 30, 9, 0), &rule), Some(at(2027, 2, 28, 9, 0)));
    }

    #[test]
    fn yearly_leap_day_clamps() {
        let rule = RecurrenceRule::yearly();
        assert_eq!(next_occurrence(at(2028, 2, 29, 12, 0), &rule), Some(at(2029, 2, 28, 12, 0)));
        let quad = RecurrenceRule::yearly().with_interval(4);
        assert_eq!(next_occurrence(at(2028, 2, 29, 12, 0), &quad), Some(at(2032, 2, 29, 12, 0)));
    }

    #[test]
    fn custom_prefers_most_specific_field() {
        let by_days = RecurrenceRule::custom().with_days([6]);
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &by_days), Some(at(2026, 10, 24, 8, 0)));

        let by_dom = RecurrenceRule::custom().with_day_of_month(5);
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &by_dom), Some(at(2026, 11, 5, 8, 0)));

        let plain = RecurrenceRule::custom().with_interval(3);
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &plain), Some(at(2026, 10, 22, 8, 0)));
    }

    #[test]
    fn end_date_ends_the_series() {
        let rule = RecurrenceRule::daily().with_end_date(at(2026, 10, 20, 23, 59));
        assert_eq!(next_occurrence(at(2026, 10, 19, 8, 0), &rule), Some(at(2026, 10, 20, 8, 0)));
        assert_eq!(next_occurrence(at(2026, 10, 20, 8, 0), &rule), None);
        assert_eq!(next_occurrence(at(2026, 10, 22, 8, 0), &rule), None);
    }

    #[test]
    fn range_enumeration_includes_start_and_respects_bounds() {
        let rule = RecurrenceRule::weekly_on([1, 3, 5]);
        let hits = occurrences_in_range(&rule, at(2026, 10, 19, 7, 0), day(2026, 10, 21), day(2026, 10, 31));
        let dates: Vec<_> = hits.iter().map(|d| d.date()).collect();
        assert_eq!(
            dates,
            vec![day(2026, 10, 21), day(2026, 10, 23), day(2026, 10, 26), day(2026, 10, 28), day(2026, 10, 30)]
        );
    }

    #[test]
    fn range_enumeration_is_capped() {
        let rule = RecurrenceRule::daily();
        let hits = occurrences_in_range(&rule, at(2026, 1, 1, 7, 0), day(2026, 1, 1), day(2030, 1, 1));
        assert_eq!(hits.len(), MAX_RANGE_ITERATIONS);
    }

    #[test]
    fn one_shot_range_yields_single_date() {
        let hits = occurrences_in_range(&RecurrenceRule::none(), at(2026, 10, 20, 7, 0), day(2026, 10, 1), day(2026, 10, 31));
        assert_eq!(hits, vec![at(2026, 10, 20, 7, 0)]);
    }

    #[test]
    fn matches_date_monthly_short_months() {
        let rule = RecurrenceRule::monthly_on(31);
        let start = day(2026, 1, 31);
        assert!(matches_date(&rule, day(2026, 4, 30), start));
        assert!(!matches_date(&rule, day(2026, 4, 29), start));
        assert!(matches_date(&rule, day(2026, 2, 28), start));
        assert!(matches_date(&rule, day(2028, 2, 29), start));
        assert!(!matches_date(&rule, day(2028, 2, 28), start));
        assert!(matches_date(&rule, day(2026, 5, 31), start));
    }

    #[test]
    fn matches_date_weekly_interval_and_start_bound() {
        let rule = RecurrenceRule::weekly_on([1]).with_interval(2);
        let start = day(2026, 10, 19);
        assert!(matches_date(&rule, day(2026, 10, 19), start));
        assert!(!matches_date(&rule, day(2026, 10, 26), start));
        assert!(matches_date(&rule, day(2026, 11, 2), start));
        assert!(!matches_date(&rule, day(2026, 10, 12), start));
    }

    #[test]
    fn matches_date_yearly_leap_anchor() {
        let rule = RecurrenceRule::yearly();
        let start = day(2028, 2, 29);
        assert!(matches_date(&rule, day(2029, 2, 28), start));
        assert!(matches_date(&rule, day(2032, 2, 29), start));
        assert!(!matches_date(&rule, day(2032, 2, 28), start));
    }

    #[test]
    fn first_occurrence_seeds_from_day_set() {
        // Monday 10:00, weekend-only rule at 9am -> Saturday
        let rule = RecurrenceRule::weekly_on([6, 7]);
        let t = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(first_occurrence_after(&rule, t, at(2026, 10, 19, 10, 0)), Some(at(2026, 10, 24, 9, 0)));

        let daily = RecurrenceRule::daily();
        assert_eq!(first_occurrence_after(&daily, t, at(2026, 10, 19, 10, 0)), Some(at(2026, 10, 20, 9, 0)));
        assert_eq!(first_occurrence_after(&daily, t, at(2026, 10, 19, 8, 0)), Some(at(2026, 10, 19, 9, 0)));
    }

    #[test]
    fn late_fire_skips_missed_slots() {
        let rule = RecurrenceRule::daily();
        // fired three days late: the next slot is tomorrow, not the day after the old one
        assert_eq!(
            next_occurrence_after(at(2026, 10, 16, 8, 0), &rule, at(2026, 10, 19, 9, 0)),
            Some(at(2026, 10, 20, 8, 0))
        );
        let ended = RecurrenceRule::daily().with_end_date(at(2026, 10, 18, 0, 0));
        assert_eq!(next_occurrence_after(at(2026, 10, 16, 8, 0), &ended, at(2026, 10, 19, 9, 0)), None);
    }
}
