//! Recurrence rules attached to reminders, alarms and tasks.
//!
//! Stored as a JSON string column next to the owning entity; the owner is the
//! only thing that ever rewrites it.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    pub interval: u32,
    /// ISO weekday numbers, 1 = Monday .. 7 = Sunday.
    #[serde(default)]
    pub days_of_week: Option<BTreeSet<u8>>,
    /// 1..=31; clamped to the month's last day when scheduling.
    #[serde(default)]
    pub day_of_month: Option<u32>,
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::none()
    }
}

impl RecurrenceRule {
    pub fn none() -> Self {
        Self {
            kind: RecurrenceType::None,
            interval: 1,
            days_of_week: None,
            day_of_month: None,
            end_date: None,
        }
    }

    pub fn daily() -> Self {
        Self {
            kind: RecurrenceType::Daily,
            ..Self::none()
        }
    }

    pub fn weekly() -> Self {
        Self {
            kind: RecurrenceType::Weekly,
            ..Self::none()
        }
    }

    pub fn weekly_on(days: impl IntoIterator<Item = u8>) -> Self {
        Self::weekly().with_days(days)
    }

    pub fn monthly() -> Self {
        Self {
            kind: RecurrenceType::Monthly,
            ..Self::none()
        }
    }

    pub fn monthly_on(day_of_month: u32) -> Self {
        Self {
            day_of_month: Some(day_of_month),
            ..Self::monthly()
        }
    }

    pub fn yearly() -> Self {
        Self {
            kind: RecurrenceType::Yearly,
            ..Self::none()
        }
    }

    pub fn custom() -> Self {
        Self {
            kind: RecurrenceType::Custom,
            ..Self::none()
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        let set: BTreeSet<u8> = days.into_iter().collect();
        self.days_of_week = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn with_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_end_date(mut self, end: NaiveDateTime) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.kind != RecurrenceType::None
    }

    /// Explicit weekday set, treating an empty set as absent.
    pub fn weekdays(&self) -> Option<&BTreeSet<u8>> {
        self.days_of_week.as_ref().filter(|d| !d.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            bail!("interval must be >= 1");
        }
        if let Some(days) = &self.days_of_week {
            if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
                bail!("day of week out of range: {bad}");
            }
        }
        if let Some(dom) = self.day_of_month {
            if !(1..=31).contains(&dom) {
                bail!("day of month out of range: {dom}");
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize recurrence rule")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let rule: Self = serde_json::from_str(s).context("parse recurrence rule")?;
        rule.validate()?;
        Ok(rule)
    }

    /// Short human summary, e.g. "every 2 weeks on Mon, Wed".
    pub fn describe(&self) -> String {
        let unit = |singular: &str| {
            if self.interval == 1 {
                format!("every {singular}")
            } else {
                format!("every {} {singular}s", self.interval)
            }
        };

        let days = self.weekdays().map(|d| {
            d.iter()
                .map(|n| weekday_abbrev(*n))
                .collect::<Vec<_>>()
                .join(", ")
        });

        let base = match self.kind {
            RecurrenceType::None => return "once".to_string(),
            RecurrenceType::Daily => unit("day"),
            RecurrenceType::Weekly => match &days {
                Some(d) => format!("{} on {d}", unit("week")),
                None => unit("week"),
            },
            RecurrenceType::Monthly => match self.day_of_month {
                Some(dom) => format!("{} on day {dom}", unit("month")),
                None => unit("month"),
            },
            RecurrenceType::Yearly => unit("year"),
            RecurrenceType::Custom => match (&days, self.day_of_month) {
                (Some(d), _) => format!("custom on {d}"),
                (None, Some(dom)) => format!("custom on day {dom}"),
                (None, None) => unit("day"),
            },
        };

        match self.end_date {
            Some(end) => format!("{base} until {}", end.format("%Y-%m-%d")),
            None => base,
        }
    }
}

pub fn weekday_abbrev(n: u8) -> &'static str {
    match n {
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        6 => "Sat",
        7 => "Sun",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn json_round_trip_keeps_every_field() {
        let end = NaiveDate::from_ymd_opt(2027, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let rule = RecurrenceRule::weekly_on([1, 3, 5])
            .with_interval(2)
            .with_day_of_month(15)
            .with_end_date(end);

        let json = rule.to_json().unwrap();
        assert!(json.contains("\"type\":\"WEEKLY\""));
        assert!(json.contains("\"daysOfWeek\":[1,3,5]"));

        let back = RecurrenceRule::from_json(&json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn is_recurring_tracks_type() {
        assert!(!RecurrenceRule::none().is_recurring());
        assert!(RecurrenceRule::daily().is_recurring());
        assert!(RecurrenceRule::custom().is_recurring());
    }

    #[test]
    fn from_json_rejects_bad_values() {
        assert!(RecurrenceRule::from_json(r#"{"type":"DAILY","interval":0}"#).is_err());
        assert!(RecurrenceRule::from_json(r#"{"type":"WEEKLY","interval":1,"daysOfWeek":[8]}"#).is_err());
        assert!(RecurrenceRule::from_json("not json").is_err());
    }

    #[test]
    fn from_json_defaults_missing_optionals() {
        let rule = RecurrenceRule::from_json(r#"{"type":"MONTHLY","interval":3}"#).unwrap();
        assert_eq!(rule.kind, RecurrenceType::Monthly);
        assert_eq!(rule.day_of_month, None);
        assert_eq!(rule.end_date, None);
    }

    #[test]
    fn describe_reads_naturally() {
        assert_eq!(RecurrenceRule::daily().describe(), "every day");
        assert_eq!(
            RecurrenceRule::weekly_on([1, 3]).with_interval(2).describe(),
            "every 2 weeks on Mon, Wed"
        );
        assert_eq!(RecurrenceRule::monthly_on(31).describe(), "every month on day 31");
    }
}
