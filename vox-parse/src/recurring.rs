//! Recurring reminders and alarms: "remind me every weekday at 8am to stretch".

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, NaiveTime};
use regex::Captures;
use serde::{Deserialize, Serialize};
use vox_core::{RecurrenceRule, first_occurrence_after};

use crate::command::{CommandKind, ParsedCommand};
use crate::patterns::{PatternLibrary, normalize_spaces, weekday_from_name};
use crate::time_expr::parse_time_of_day;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecurringCommand {
    pub message: String,
    /// `RecurringReminder` or `RecurringAlarm`.
    pub kind: CommandKind,
    pub first_time: NaiveDateTime,
    pub time_of_day: NaiveTime,
    pub days_of_week: BTreeSet<u8>,
    pub rule: RecurrenceRule,
}

impl ParsedRecurringCommand {
    pub fn to_parsed_command(&self) -> ParsedCommand {
        ParsedCommand {
            scheduled_time: self.first_time,
            message: self.message.clone(),
            kind: self.kind,
        }
    }
}

/// Day set and rule for a period phrase like "every weekday" or "on mondays".
pub fn period_days(period: &str) -> Option<(BTreeSet<u8>, RecurrenceRule)> {
    let period = normalize_spaces(period);
    let word = period
        .trim_start_matches("every ")
        .trim_start_matches("single ")
        .trim_start_matches("each ")
        .trim_start_matches("on ")
        .trim_end_matches('s');

    match word {
        "day" | "daily" | "morning" | "evening" | "night" => {
            Some(((1..=7).collect(), RecurrenceRule::daily()))
        }
        "weekday" => Some(((1..=5).collect(), RecurrenceRule::weekly_on(1..=5))),
        "weekend" => Some(([6, 7].into(), RecurrenceRule::weekly_on([6, 7]))),
        named => {
            let n = weekday_from_name(named)?;
            Some(([n].into(), RecurrenceRule::weekly_on([n])))
        }
    }
}

fn is_alarm_lead(lead: &str) -> bool {
    !normalize_spaces(lead).starts_with("remind")
}

fn from_captures(caps: &Captures, now: NaiveDateTime, p: &PatternLibrary) -> Option<ParsedRecurringCommand> {
    let alarm = is_alarm_lead(caps.name("lead")?.as_str());
    let message = caps
        .name("msg")
        .map(|m| m.as_str().trim().trim_end_matches(['.', '!']).trim().to_string())
        .filter(|m| !m.is_empty());

    let (kind, message) = match (alarm, message) {
        (true, msg) => (CommandKind::RecurringAlarm, msg.unwrap_or_else(|| "Alarm".to_string())),
        (false, Some(msg)) => (CommandKind::RecurringReminder, msg),
        (false, None) => return None,
    };

    let time_of_day = parse_time_of_day(p, caps.name("time")?.as_str())?;
    let (days_of_week, rule) = period_days(caps.name("period")?.as_str())?;
    let first_time = first_occurrence_after(&rule, time_of_day, now)?;

    Some(ParsedRecurringCommand {
        message,
        kind,
        first_time,
        time_of_day,
        days_of_week,
        rule,
    })
}

/// Period-first, then message-first, then time-first.
pub fn parse_recurring_command(
    p: &PatternLibrary,
    text: &str,
    now: NaiveDateTime,
) -> Option<ParsedRecurringCommand> {
    let text = text.trim();
    [&p.recurring_period_first, &p.recurring_message_first, &p.recurring_time_first]
        .into_iter()
        .find_map(|re| re.captures(text).and_then(|caps| from_captures(&caps, now, p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use vox_core::RecurrenceType;

    fn lib() -> PatternLibrary {
        PatternLibrary::new().unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_period_first_form() {
        let p = lib();
        // Monday 10:00
        let cmd = parse_recurring_command(&p, "remind me every weekday at 8am to stretch", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.message, "stretch");
        assert_eq!(cmd.kind, CommandKind::RecurringReminder);
        assert_eq!(cmd.days_of_week, (1..=5).collect());
        assert_eq!(cmd.first_time, at(20, 8, 0));
        assert_eq!(cmd.rule.kind, RecurrenceType::Weekly);
    }

    #[test]
    fn test_message_first_form() {
        let p = lib();
        let cmd = parse_recurring_command(&p, "Remind me to take pills every day at 9pm", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.message, "take pills");
        assert_eq!(cmd.rule, RecurrenceRule::daily());
        assert_eq!(cmd.days_of_week.len(), 7);
        assert_eq!(cmd.first_time, at(19, 21, 0));
    }

    #[test]
    fn test_time_first_form() {
        let p = lib();
        let cmd = parse_recurring_command(&p, "wake me up at 6:30 am every saturday", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.kind, CommandKind::RecurringAlarm);
        assert_eq!(cmd.message, "Alarm");
        assert_eq!(cmd.days_of_week, [6].into());
        assert_eq!(cmd.first_time, at(24, 6, 30));
    }

    #[test]
    fn test_weekend_alarm() {
        let p = lib();
        let cmd = parse_recurring_command(&p, "set an alarm every weekend at 9am", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.kind, CommandKind::RecurringAlarm);
        assert_eq!(cmd.days_of_week, [6, 7].into());
        assert_eq!(cmd.first_time, at(24, 9, 0));
    }

    #[test]
    fn test_reminder_without_message_is_rejected() {
        let p = lib();
        assert!(parse_recurring_command(&p, "remind me every day at 9am", at(19, 10, 0)).is_none());
    }

    #[test]
    fn test_period_words() {
        assert_eq!(period_days("daily").unwrap().0.len(), 7);
        assert_eq!(period_days("every Monday").unwrap().0, [1].into());
        assert_eq!(period_days("on weekends").unwrap().0, [6, 7].into());
        assert!(period_days("every fortnight").is_none());
    }
}
