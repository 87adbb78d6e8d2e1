//! Time and date phrase extraction.
//!
//! Each time pattern is tried on its own; a pattern whose match fails range
//! validation yields `None` and the next pattern gets its turn.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Captures;
use vox_core::time::weekday_number;

use crate::patterns::{PatternLibrary, weekday_from_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpr {
    /// Wall-clock time of day; the date comes from the date phrase.
    Clock(NaiveTime),
    /// Offset from now in minutes ("in 10 minutes"). Unbounded until resolved.
    Relative(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateHint {
    None,
    Today,
    Tomorrow,
    /// 1 = Monday .. 7 = Sunday.
    Weekday(u8),
}

/// Standard 12 to 24 hour conversion: 12am is 0, 12pm is 12.
pub fn hour_12_to_24(hour: u32, pm: bool) -> u32 {
    match (hour % 12, pm) {
        (h, true) => h + 12,
        (h, false) => h,
    }
}

fn clock_from_12h(caps: &Captures) -> Option<NaiveTime> {
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
    NaiveTime::from_hms_opt(hour_12_to_24(hour, pm), minute, 0)
}

pub fn parse_12h(p: &PatternLibrary, text: &str) -> Option<NaiveTime> {
    clock_from_12h(&p.time_12h.captures(text)?)
}

pub fn parse_24h(p: &PatternLibrary, text: &str) -> Option<NaiveTime> {
    let caps = p.time_24h.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// "a", "an", "one" or digits.
pub fn quantity(word: &str) -> Option<i64> {
    match word.to_lowercase().as_str() {
        "a" | "an" | "one" => Some(1),
        digits => digits.parse().ok(),
    }
}

/// Minutes for a `<quantity> <unit>` capture pair. Saturates, so an absurd
/// amount still reads as a duration and gets rejected where it is applied.
pub fn minutes_for(amount: &str, unit: &str) -> Option<i64> {
    let n = quantity(amount)?;
    let unit = unit.to_lowercase();
    if unit.starts_with('h') { Some(n.saturating_mul(60)) } else { Some(n) }
}

pub fn parse_relative(p: &PatternLibrary, text: &str) -> Option<i64> {
    let caps = p.time_relative.captures(text)?;
    minutes_for(&caps[1], &caps[2])
}

/// 12-hour, then 24-hour, then relative. First non-`None` wins.
pub fn extract_time(p: &PatternLibrary, text: &str) -> Option<TimeExpr> {
    parse_12h(p, text)
        .map(TimeExpr::Clock)
        .or_else(|| parse_24h(p, text).map(TimeExpr::Clock))
        .or_else(|| parse_relative(p, text).map(TimeExpr::Relative))
}

pub fn has_time_expression(p: &PatternLibrary, text: &str) -> bool {
    extract_time(p, text).is_some()
}

/// Time-of-day token from a recurring command: "7am", "7:30 pm", "19:00" or a bare hour.
pub fn parse_time_of_day(p: &PatternLibrary, token: &str) -> Option<NaiveTime> {
    let token = token.trim();
    if let Some(t) = parse_12h(p, token) {
        return Some(t);
    }
    if let Some(t) = parse_24h(p, token) {
        return Some(t);
    }
    let hour: u32 = token.parse().ok()?;
    NaiveTime::from_hms_opt(hour, 0, 0)
}

pub fn extract_date_hint(p: &PatternLibrary, text: &str) -> DateHint {
    if let Some(caps) = p.weekday.captures(text) {
        if let Some(n) = weekday_from_name(&caps[1]) {
            return DateHint::Weekday(n);
        }
    }
    if p.tomorrow.is_match(text) {
        DateHint::Tomorrow
    } else if p.today.is_match(text) {
        DateHint::Today
    } else {
        DateHint::None
    }
}

/// Days from `today` to the next `target` weekday; 0 when today is that day.
pub fn days_until_weekday(today: NaiveDate, target: u8) -> i64 {
    (target as i64 - weekday_number(today) as i64).rem_euclid(7)
}

/// Resolve an extracted time against `now`.
///
/// `roll_forward` moves an undated clock time that has already passed to
/// tomorrow (alarms and recurring commands). Plain reminders resolve without
/// it so a past time is reported rather than silently moved. `None` when a
/// relative offset lands outside the representable calendar.
pub fn resolve(expr: TimeExpr, hint: DateHint, now: NaiveDateTime, roll_forward: bool) -> Option<NaiveDateTime> {
    let time = match expr {
        TimeExpr::Relative(minutes) => {
            return TimeDelta::try_minutes(minutes).and_then(|offset| now.checked_add_signed(offset));
        }
        TimeExpr::Clock(t) => t,
    };
    let today = now.date();

    let resolved = match hint {
        DateHint::Weekday(target) => {
            let candidate = (today + Duration::days(days_until_weekday(today, target))).and_time(time);
            if candidate <= now { candidate + Duration::days(7) } else { candidate }
        }
        DateHint::Tomorrow => (today + Duration::days(1)).and_time(time),
        DateHint::Today => today.and_time(time),
        DateHint::None => {
            let candidate = today.and_time(time);
            if roll_forward && candidate <= now {
                candidate + Duration::days(1)
            } else {
                candidate
            }
        }
    };
    Some(resolved)
}

/// Remove time and date phrases so message extraction sees only the message.
pub fn strip_time_phrases(p: &PatternLibrary, text: &str) -> String {
    let mut out = text.to_string();
    for re in [&p.time_12h, &p.time_24h, &p.time_relative, &p.weekday, &p.tomorrow, &p.today] {
        out = re.replace_all(&out, " ").into_owned();
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
