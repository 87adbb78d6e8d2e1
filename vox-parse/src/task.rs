//! Task, complete-task and snooze commands.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use vox_core::TaskPriority;

use crate::patterns::{PatternLibrary, weekday_from_name};
use crate::time_expr::{days_until_weekday, minutes_for};

pub const DEFAULT_SNOOZE_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTask {
    pub title: String,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
}

fn clean(s: &str) -> String {
    s.trim()
        .trim_end_matches(['.', '!', ',', '?'])
        .trim()
        .to_string()
}

fn without_priority<'a>(p: &PatternLibrary, text: &'a str) -> (&'a str, Option<TaskPriority>) {
    match p.priority.captures(text) {
        Some(caps) => {
            let priority = TaskPriority::from_word(&caps[1]);
            let start = caps.get(0).map_or(text.len(), |m| m.start());
            (&text[..start], priority)
        }
        None => (text, None),
    }
}

pub fn is_task_command(p: &PatternLibrary, text: &str) -> bool {
    let (body, _) = without_priority(p, text.trim());
    p.add_task.iter().any(|re| re.is_match(body))
}

/// "add task submit report by friday high priority"
pub fn parse_task(p: &PatternLibrary, text: &str, today: NaiveDate) -> Option<ParsedTask> {
    let (body, priority) = without_priority(p, text.trim());
    let priority = priority.unwrap_or_default();

    let raw = p
        .add_task
        .iter()
        .find_map(|re| re.captures(body).map(|c| c[1].to_string()))?;
    let mut title = clean(&raw);

    let mut due_date = None;
    if let Some(caps) = p.due_weekday.captures(&title) {
        if let Some(target) = weekday_from_name(&caps[1]) {
            let ahead = match days_until_weekday(today, target) {
                0 => 7,
                n => n,
            };
            due_date = Some(today + Duration::days(ahead));
        }
        title = clean(&p.due_weekday.replace(&title, ""));
    } else if let Some(caps) = p.due_relative.captures(&title) {
        due_date = match caps[1].to_lowercase().as_str() {
            "tomorrow" => Some(today + Duration::days(1)),
            _ => Some(today),
        };
        title = clean(&p.due_relative.replace(&title, ""));
    }

    if title.is_empty() {
        return None;
    }
    Some(ParsedTask { title, priority, due_date })
}

/// Title query of a "mark X as done" style command.
pub fn parse_complete_task(p: &PatternLibrary, text: &str) -> Option<String> {
    let title = p
        .complete_task
        .iter()
        .find_map(|re| re.captures(text.trim()).map(|c| clean(&c[1])))?;
    (!title.is_empty()).then_some(title)
}

/// Snooze minutes; `None` when the text is not a snooze command.
pub fn parse_snooze(p: &PatternLibrary, text: &str) -> Option<i64> {
    if !p.snooze.is_match(text) {
        return None;
    }
    let minutes = p
        .duration
        .captures(text)
        .and_then(|c| minutes_for(&c[1], &c[2]))
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_SNOOZE_MINUTES);
    Some(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib() -> PatternLibrary {
        PatternLibrary::new().unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_task_with_priority_and_weekday() {
        let p = lib();
        let t = parse_task(&p, "add task submit report by Friday high priority", monday()).unwrap();
        assert_eq!(t.title, "submit report");
        assert_eq!(t.priority, TaskPriority::High);
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2026, 10, 23));
    }

    #[test]
    fn test_task_due_tomorrow() {
        let p = lib();
        let t = parse_task(&p, "add a task to buy groceries tomorrow", monday()).unwrap();
        assert_eq!(t.title, "buy groceries");
        assert_eq!(t.priority, TaskPriority::Medium);
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2026, 10, 20));
    }

    #[test]
    fn test_task_same_weekday_means_next_week() {
        let p = lib();
        let t = parse_task(&p, "add task water plants due monday", monday()).unwrap();
        assert_eq!(t.title, "water plants");
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2026, 10, 26));
    }

    #[test]
    fn test_task_list_form() {
        let p = lib();
        let t = parse_task(&p, "add call the landlord to my to-do list, low priority", monday()).unwrap();
        assert_eq!(t.title, "call the landlord");
        assert_eq!(t.priority, TaskPriority::Low);
        assert_eq!(t.due_date, None);
    }

    #[test]
    fn test_not_a_task() {
        let p = lib();
        assert!(parse_task(&p, "remind me to call mom at 5pm", monday()).is_none());
    }

    #[test]
    fn test_complete_task_forms() {
        let p = lib();
        assert_eq!(parse_complete_task(&p, "mark buy milk as done").as_deref(), Some("buy milk"));
        assert_eq!(parse_complete_task(&p, "I finished the report").as_deref(), Some("report"));
        assert_eq!(parse_complete_task(&p, "done with laundry").as_deref(), Some("laundry"));
        assert_eq!(parse_complete_task(&p, "remind me to finish the report at 5pm"), None);
    }

    #[test]
    fn test_snooze_minutes() {
        let p = lib();
        assert_eq!(parse_snooze(&p, "snooze"), Some(10));
        assert_eq!(parse_snooze(&p, "snooze for 15 minutes"), Some(15));
        assert_eq!(parse_snooze(&p, "remind me again in an hour"), Some(60));
        assert_eq!(parse_snooze(&p, "set alarm at 7am"), None);
    }
}
