use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use vox_core::time::days_in_month;
use vox_core::{Alarm, Reminder, occurrences_in_range};

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEntry {
    pub at: NaiveDateTime,
    pub label: String,
}

/// "2026-10" -> (2026, 10)
pub fn parse_month(s: &str) -> Result<(i32, u32)> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .with_context(|| format!("expected YYYY-MM, got {s:?}"))?;
    Ok((first.year(), first.month()))
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).with_context(|| format!("invalid month {year}-{month}"))?;
    let last = NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))
        .with_context(|| format!("invalid month {year}-{month}"))?;
    Ok((first, last))
}

fn expand(
    rule: Option<vox_core::RecurrenceRule>,
    start: NaiveDateTime,
    first: NaiveDate,
    last: NaiveDate,
) -> Vec<NaiveDateTime> {
    match rule {
        Some(rule) => occurrences_in_range(&rule, start, first, last),
        None if (first..=last).contains(&start.date()) => vec![start],
        None => Vec::new(),
    }
}

/// Every time a pending reminder or enabled alarm goes off during the month.
pub fn month_entries(reminders: &[Reminder], alarms: &[Alarm], year: i32, month: u32) -> Result<Vec<CalendarEntry>> {
    let (first, last) = month_bounds(year, month)?;
    let mut out = Vec::new();

    for r in reminders.iter().filter(|r| r.is_pending()) {
        let Some(start) = r.original_scheduled_time.or(r.scheduled_time) else {
            continue;
        };
        out.extend(expand(r.recurrence()?, start, first, last).into_iter().map(|at| CalendarEntry {
            at,
            label: r.message.clone(),
        }));
    }
    for a in alarms.iter().filter(|a| a.enabled) {
        out.extend(
            expand(a.recurrence()?, a.scheduled_time, first, last)
                .into_iter()
                .map(|at| CalendarEntry {
                    at,
                    label: format!("{} (alarm)", a.label),
                }),
        );
    }

    out.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.label.cmp(&b.label)));
    Ok(out)
}

pub fn render(entries: &[CalendarEntry]) -> String {
    if entries.is_empty() {
        return "(nothing scheduled)\n".to_string();
    }
    let mut s = String::new();
    let mut day = None;
    for e in entries {
        if day != Some(e.at.date()) {
            day = Some(e.at.date());
            s.push_str(&format!("{}\n", e.at.format("%a %b %-d")));
        }
        s.push_str(&format!("  {:>8}  {}\n", e.at.format("%-I:%M %p").to_string(), e.label));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::RecurrenceRule;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2026-10").unwrap(), (2026, 10));
        assert!(parse_month("October").is_err());
    }

    #[test]
    fn test_weekly_reminder_expands_within_month() {
        let created = at(19, 7);
        let mut standup = Reminder::time_based("stand-up", at(19, 8), created)
            .with_recurrence(&RecurrenceRule::weekly_on([1, 3, 5]))
            .unwrap();
        standup.id = 1;
        let mut alarm = Alarm::new("Alarm", at(20, 7), created);
        alarm.id = 2;
        let mut off = Alarm::new("Alarm", at(21, 7), created);
        off.enabled = false;

        let entries = month_entries(&[standup], &[alarm, off], 2026, 10).unwrap();
        let days: Vec<u32> = entries.iter().map(|e| e.at.day()).collect();
        assert_eq!(days, vec![19, 20, 21, 23, 26, 28, 30]);
        assert_eq!(entries[1].label, "Alarm (alarm)");

        assert!(month_entries(&[], &[], 2026, 11).unwrap().is_empty());
    }

    #[test]
    fn test_render_groups_by_day() {
        let out = render(&[
            CalendarEntry { at: at(19, 8), label: "stretch".into() },
            CalendarEntry { at: at(19, 17), label: "call mom".into() },
            CalendarEntry { at: at(20, 8), label: "stretch".into() },
        ]);
        assert_eq!(out.matches("Mon Oct 19").count(), 1);
        assert!(out.contains("Tue Oct 20"));
        assert!(out.contains(" 5:00 PM  call mom"));
    }
}
