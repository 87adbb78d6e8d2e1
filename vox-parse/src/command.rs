//! CommandParser: classify a transcript, then hand it to the matching extractor.

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::finance::{ParsedFinanceCommand, is_finance_command, parse_finance_command};
use crate::location::{ParsedLocationCommand, is_location_command, parse_location_command};
use crate::patterns::PatternLibrary;
use crate::recurring::{ParsedRecurringCommand, parse_recurring_command};
use crate::task::{ParsedTask, is_task_command, parse_complete_task, parse_snooze, parse_task};
use crate::time_expr::{extract_date_hint, extract_time, has_time_expression, resolve, strip_time_phrases};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Reminder,
    Alarm,
    Task,
    RecurringReminder,
    RecurringAlarm,
    Snooze,
    CompleteTask,
    Location,
    Finance,
    Unknown,
}

/// Classification rules, first match wins. Anything else is `Unknown`.
pub const CLASSIFICATION_ORDER: [CommandKind; 9] = [
    CommandKind::Snooze,
    CommandKind::CompleteTask,
    CommandKind::Location,
    CommandKind::RecurringAlarm,
    CommandKind::RecurringReminder,
    CommandKind::Alarm,
    CommandKind::Task,
    CommandKind::Finance,
    CommandKind::Reminder,
];

pub const DEFAULT_ALARM_LABEL: &str = "Alarm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub scheduled_time: NaiveDateTime,
    pub message: String,
    pub kind: CommandKind,
}

/// Typed result of [`CommandParser::parse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// One-shot reminder or alarm.
    Timed(ParsedCommand),
    Recurring(ParsedRecurringCommand),
    Task(ParsedTask),
    CompleteTask { query: String },
    Snooze { minutes: i64 },
    Location(ParsedLocationCommand),
    Finance(ParsedFinanceCommand),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Timed(c) => c.kind,
            Command::Recurring(r) => r.kind,
            Command::Task(_) => CommandKind::Task,
            Command::CompleteTask { .. } => CommandKind::CompleteTask,
            Command::Snooze { .. } => CommandKind::Snooze,
            Command::Location(_) => CommandKind::Location,
            Command::Finance(_) => CommandKind::Finance,
        }
    }
}

pub struct CommandParser {
    patterns: PatternLibrary,
}

impl CommandParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: PatternLibrary::new()?,
        })
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    /// Whether the rule for `kind` accepts `text`.
    pub fn matches(&self, kind: CommandKind, text: &str) -> bool {
        let p = &self.patterns;
        match kind {
            CommandKind::Snooze => p.snooze.is_match(text),
            CommandKind::CompleteTask => parse_complete_task(p, text).is_some(),
            // A bare place with a clock time ("leave work at 5pm") stays time based
            CommandKind::Location => {
                is_location_command(p, text)
                    && (p.trigger_clause.is_match(text)
                        || (p.remind_keyword.is_match(text) && !has_time_expression(p, text)))
            }
            CommandKind::RecurringAlarm => {
                p.recurring_hint.is_match(text) && p.alarm_keyword.is_match(text) && has_time_expression(p, text)
            }
            CommandKind::RecurringReminder => {
                p.recurring_hint.is_match(text) && p.remind_keyword.is_match(text) && has_time_expression(p, text)
            }
            CommandKind::Alarm => p.alarm_keyword.is_match(text),
            CommandKind::Task => is_task_command(p, text),
            CommandKind::Finance => is_finance_command(p, text),
            CommandKind::Reminder => p.remind_keyword.is_match(text) || has_time_expression(p, text),
            CommandKind::Unknown => false,
        }
    }

    pub fn classify(&self, text: &str) -> CommandKind {
        let text = text.trim();
        if text.is_empty() {
            return CommandKind::Unknown;
        }
        CLASSIFICATION_ORDER
            .into_iter()
            .find(|kind| self.matches(*kind, text))
            .unwrap_or(CommandKind::Unknown)
    }

    fn extract_message(&self, text: &str) -> Option<String> {
        let stripped = strip_time_phrases(&self.patterns, text);
        let caps = self.patterns.message.captures(&stripped)?;
        let message = caps[1].trim().trim_end_matches(['.', '!', '?', ',']).trim();
        (!message.is_empty()).then(|| message.to_string())
    }

    /// One-shot reminder or alarm.
    pub fn parse_command_with_error(&self, text: &str, now: NaiveDateTime) -> Result<ParsedCommand, CommandError> {
        let p = &self.patterns;
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::invalid_command());
        }

        if p.alarm_keyword.is_match(text) {
            let expr = extract_time(p, text).ok_or_else(CommandError::invalid_time_format)?;
            let scheduled_time =
                resolve(expr, extract_date_hint(p, text), now, true).ok_or_else(CommandError::invalid_time_format)?;
            if scheduled_time <= now {
                return Err(CommandError::past_time());
            }
            return Ok(ParsedCommand {
                scheduled_time,
                message: DEFAULT_ALARM_LABEL.to_string(),
                kind: CommandKind::Alarm,
            });
        }

        let expr = extract_time(p, text).ok_or_else(CommandError::invalid_time_format)?;
        let scheduled_time =
            resolve(expr, extract_date_hint(p, text), now, false).ok_or_else(CommandError::invalid_time_format)?;
        if scheduled_time <= now {
            return Err(CommandError::past_time());
        }
        let message = self.extract_message(text).ok_or_else(CommandError::no_message)?;

        Ok(ParsedCommand {
            scheduled_time,
            message,
            kind: CommandKind::Reminder,
        })
    }

    pub fn parse_command(&self, text: &str, now: NaiveDateTime) -> Option<ParsedCommand> {
        self.parse_command_with_error(text, now).ok()
    }

    pub fn parse_task(&self, text: &str, now: NaiveDateTime) -> Option<ParsedTask> {
        parse_task(&self.patterns, text, now.date())
    }

    pub fn parse_complete_task(&self, text: &str) -> Option<String> {
        parse_complete_task(&self.patterns, text)
    }

    pub fn parse_snooze(&self, text: &str) -> Option<i64> {
        parse_snooze(&self.patterns, text)
    }

    pub fn parse_recurring_command(&self, text: &str, now: NaiveDateTime) -> Option<ParsedRecurringCommand> {
        parse_recurring_command(&self.patterns, text, now)
    }

    pub fn is_location_command(&self, text: &str) -> bool {
        is_location_command(&self.patterns, text)
    }

    pub fn parse_location_command(&self, text: &str) -> Option<ParsedLocationCommand> {
        parse_location_command(&self.patterns, text)
    }

    pub fn is_finance_command(&self, text: &str) -> bool {
        is_finance_command(&self.patterns, text)
    }

    pub fn parse_finance_command(&self, text: &str) -> Option<ParsedFinanceCommand> {
        parse_finance_command(&self.patterns, text)
    }

    /// Classify then extract. Every failure comes back as a [`CommandError`].
    pub fn parse(&self, text: &str, now: NaiveDateTime) -> Result<Command, CommandError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::invalid_command());
        }

        match self.classify(text) {
            CommandKind::Snooze => self
                .parse_snooze(text)
                .map(|minutes| Command::Snooze { minutes })
                .ok_or_else(CommandError::invalid_command),
            CommandKind::CompleteTask => self
                .parse_complete_task(text)
                .map(|query| Command::CompleteTask { query })
                .ok_or_else(CommandError::invalid_command),
            CommandKind::Location => self
                .parse_location_command(text)
                .map(Command::Location)
                .ok_or_else(CommandError::no_message),
            CommandKind::RecurringAlarm | CommandKind::RecurringReminder => {
                match self.parse_recurring_command(text, now) {
                    Some(recurring) => Ok(Command::Recurring(recurring)),
                    None => self.parse_command_with_error(text, now).map(Command::Timed),
                }
            }
            CommandKind::Task => self
                .parse_task(text, now)
                .map(Command::Task)
                .ok_or_else(CommandError::invalid_command),
            CommandKind::Finance => self
                .parse_finance_command(text)
                .map(Command::Finance)
                .ok_or_else(CommandError::invalid_command),
            CommandKind::Alarm | CommandKind::Reminder => {
                self.parse_command_with_error(text, now).map(Command::Timed)
            }
            CommandKind::Unknown => Err(CommandError::invalid_command()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use chrono::NaiveDate;

    fn parser() -> CommandParser {
        CommandParser::new().unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_classification_order_is_stable() {
        assert_eq!(
            CLASSIFICATION_ORDER,
            [
                CommandKind::Snooze,
                CommandKind::CompleteTask,
                CommandKind::Location,
                CommandKind::RecurringAlarm,
                CommandKind::RecurringReminder,
                CommandKind::Alarm,
                CommandKind::Task,
                CommandKind::Finance,
                CommandKind::Reminder,
            ]
        );
    }

    #[test]
    fn test_classify() {
        let p = parser();
        let cases = [
            ("snooze for 5 minutes", CommandKind::Snooze),
            ("mark buy milk as done", CommandKind::CompleteTask),
            ("remind me to buy milk at the grocery store", CommandKind::Location),
            ("set alarm every weekday at 7am", CommandKind::RecurringAlarm),
            ("remind me every day at 9pm to take pills", CommandKind::RecurringReminder),
            ("set alarm at 7am", CommandKind::Alarm),
            ("add task submit report", CommandKind::Task),
            ("spent 250 birr on lunch", CommandKind::Finance),
            ("remind me to call mom at 5pm", CommandKind::Reminder),
            ("remind me to leave work at 5pm", CommandKind::Reminder),
            ("what's the weather like", CommandKind::Unknown),
            ("   ", CommandKind::Unknown),
        ];
        for (text, kind) in cases {
            assert_eq!(p.classify(text), kind, "{text}");
        }
    }

    #[test]
    fn test_reminder_today() {
        let p = parser();
        let cmd = p.parse_command_with_error("remind me to call mom at 5pm", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.scheduled_time, at(19, 17, 0));
        assert_eq!(cmd.message, "call mom");
        assert_eq!(cmd.kind, CommandKind::Reminder);
    }

    #[test]
    fn test_alarm_rolls_to_tomorrow_with_default_label() {
        let p = parser();
        let cmd = p.parse_command_with_error("set alarm at 7am", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.scheduled_time, at(20, 7, 0));
        assert_eq!(cmd.message, "Alarm");
        assert_eq!(cmd.kind, CommandKind::Alarm);
    }

    #[test]
    fn test_alarm_without_time() {
        let p = parser();
        let err = p.parse_command_with_error("set an alarm", at(19, 10, 0)).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidTimeFormat);
    }

    #[test]
    fn test_past_time_is_never_success() {
        let p = parser();
        let now = at(19, 15, 30);
        for text in [
            "remind me to call mom at 9am",
            "remind me to call mom at 3:30 pm",
            "remind me to stretch at 15:30",
            "remind me to call mom today at 8am",
            "remind me to check the oven in 0 minutes",
        ] {
            let err = p.parse_command_with_error(text, now).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::PastTime, "{text}");
            assert!(p.parse_command(text, now).is_none());
        }
    }

    #[test]
    fn test_error_taxonomy() {
        let p = parser();
        let now = at(19, 10, 0);
        assert_eq!(p.parse_command_with_error("", now).unwrap_err().kind, ParseErrorKind::InvalidCommand);
        assert_eq!(
            p.parse_command_with_error("remind me to call mom", now).unwrap_err().kind,
            ParseErrorKind::InvalidTimeFormat
        );
        let err = p.parse_command_with_error("remind me at 5pm", now).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NoMessage);
        assert_eq!(err.to_string(), ParseErrorKind::NoMessage.user_message());
    }

    #[test]
    fn test_message_keeps_case_and_skips_dates() {
        let p = parser();
        let cmd = p
            .parse_command_with_error("Remind me on Friday at 9:15 am to email Dr. Tadesse", at(19, 10, 0))
            .unwrap();
        assert_eq!(cmd.scheduled_time, at(23, 9, 15));
        assert_eq!(cmd.message, "email Dr. Tadesse");
    }

    #[test]
    fn test_relative_reminder() {
        let p = parser();
        let cmd = p.parse_command_with_error("remind me in 20 minutes to flip the laundry", at(19, 10, 0)).unwrap();
        assert_eq!(cmd.scheduled_time, at(19, 10, 20));
        assert_eq!(cmd.message, "flip the laundry");
    }

    #[test]
    fn test_parse_dispatches_by_kind() {
        let p = parser();
        let now = at(19, 10, 0);
        assert!(matches!(p.parse("snooze", now), Ok(Command::Snooze { minutes: 10 })));
        assert!(matches!(p.parse("add task pay rent", now), Ok(Command::Task(_))));
        assert!(matches!(p.parse("set alarm every weekday at 7am", now), Ok(Command::Recurring(_))));
        assert_eq!(p.parse("spent 40 birr on coffee", now).unwrap().kind(), CommandKind::Finance);
        assert_eq!(
            p.parse("tell me a joke", now).unwrap_err().kind,
            ParseErrorKind::InvalidCommand
        );
    }
}
