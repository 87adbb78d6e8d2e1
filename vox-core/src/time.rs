//! Time utilities: local wall-clock helpers and timezone conversion.
//!
//! The engine reasons in local wall-clock time (`NaiveDateTime`) because
//! weekdays, "today" and time windows are all local notions. Conversion to and
//! from an IANA zone happens at the edges.

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA timezone name like "Africa/Addis_Ababa".
pub fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Current wall-clock time in `tz`.
pub fn local_now(tz: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&tz).naive_local()
}

/// Interpret a local wall-clock time in `tz` and return UTC.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    let local_dt = tz
        .from_local_datetime(&local)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// ISO weekday number: 1 = Monday .. 7 = Sunday.
pub fn weekday_number(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ if is_leap_year(year) => 29,
        _ => 28,
    }
}

/// Shift a (year, month) pair by `months`, month is 1-based.
pub fn shift_month(year: i32, month: u32, months: i64) -> (i32, u32) {
    let zero_based = year as i64 * 12 + (month as i64 - 1) + months;
    let y = zero_based.div_euclid(12) as i32;
    let m = zero_based.rem_euclid(12) as u32 + 1;
    (y, m)
}

/// Build a date, clamping `day` to the last day of the month.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Whole months from `from` to `to`, ignoring the day component.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// Human form used in confirmations, e.g. "Fri Oct 23 5:00 PM".
pub fn format_friendly(dt: NaiveDateTime) -> String {
    dt.format("%a %b %-d %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_to_utc_addis() {
        // EAT is UTC+3 year round
        let local = NaiveDate::from_ymd_opt(2026, 2, 20)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let utc = local_to_utc(local, parse_tz("Africa/Addis_Ababa").unwrap()).unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-20T20:59:00+00:00");
    }

    #[test]
    fn test_invalid_tz_rejected() {
        assert!(parse_tz("Mars/Olympus").is_err());
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(shift_month(2026, 11, 3), (2027, 2));
        assert_eq!(shift_month(2026, 1, -1), (2025, 12));
        assert_eq!(
            clamped_date(2026, 4, 31),
            NaiveDate::from_ymd_opt(2026, 4, 30)
        );
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2026-10-22 is a Thursday
        let thu = NaiveDate::from_ymd_opt(2026, 10, 22).unwrap();
        assert_eq!(weekday_number(thu), 4);
        assert_eq!(week_start(thu), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }
}
