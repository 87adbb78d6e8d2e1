//! To-do tasks: create from speech, complete by a loosely matched title.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::info;
use vox_core::{Task, next_occurrence};
use vox_parse::ParsedTask;

use crate::error::{EngineError, EngineResult, StoreError};
use crate::ports::Ports;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskCompletion {
    Completed(Task),
    /// A recurring task moved to its next due date instead of completing.
    Advanced(Task),
}

impl TaskCompletion {
    pub fn task(&self) -> &Task {
        match self {
            TaskCompletion::Completed(t) | TaskCompletion::Advanced(t) => t,
        }
    }
}

pub struct TaskManager {
    ports: Ports,
}

fn words(s: &str) -> BTreeSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Higher is better; 0 means no match. Exact title, then substring either
/// way, then the number of shared words.
fn match_score(title: &str, query: &str) -> usize {
    let (title, query) = (title.trim().to_lowercase(), query.trim().to_lowercase());
    if query.is_empty() {
        return 0;
    }
    if title == query {
        return usize::MAX;
    }
    if title.contains(&query) || query.contains(&title) {
        return usize::MAX - 1;
    }
    words(&title).intersection(&words(&query)).count()
}

impl TaskManager {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn create(&self, parsed: &ParsedTask) -> EngineResult<Task> {
        let now = self.ports.clock.now();
        let mut task = Task::new(parsed.title.clone(), now).with_priority(parsed.priority);
        if let Some(due) = parsed.due_date {
            task = task.with_due_date(due);
        }
        task.id = self.ports.tasks.insert_task(task.clone()).await?;
        info!(task_id = task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Best open task for a spoken title, ties going to the earliest created.
    pub async fn find_open(&self, query: &str) -> EngineResult<Option<Task>> {
        let best = self
            .open_tasks()
            .await?
            .into_iter()
            .map(|t| (match_score(&t.title, query), t))
            .filter(|(score, _)| *score > 0)
            .max_by(|(a, ta), (b, tb)| a.cmp(b).then(tb.created_at.cmp(&ta.created_at)))
            .map(|(_, t)| t);
        Ok(best)
    }

    pub async fn complete_by_title(&self, query: &str) -> EngineResult<TaskCompletion> {
        let task = self
            .find_open(query)
            .await?
            .ok_or_else(|| EngineError::validation(format!("I couldn't find a task called \"{query}\".")))?;
        self.complete(task).await
    }

    async fn complete(&self, mut task: Task) -> EngineResult<TaskCompletion> {
        let now = self.ports.clock.now();
        if let Some(rule) = task.recurrence()? {
            let due = task.due_date.unwrap_or(now.date());
            let next = next_occurrence(due.and_time(NaiveTime::MIN), &rule).map(|n| n.date());
            if let Some(next) = next {
                task.due_date = Some(next);
                self.ports.tasks.update_task(&task).await?;
                info!(task_id = task.id, %next, "recurring task advanced");
                return Ok(TaskCompletion::Advanced(task));
            }
        }
        task.completed = true;
        task.completed_at = Some(now);
        self.ports.tasks.update_task(&task).await?;
        info!(task_id = task.id, "task completed");
        Ok(TaskCompletion::Completed(task))
    }

    /// Open tasks by priority, then due date (undated last), then age.
    pub async fn open_tasks(&self) -> EngineResult<Vec<Task>> {
        let mut open: Vec<Task> = self
            .ports
            .tasks
            .tasks()
            .await?
            .into_iter()
            .filter(|t| !t.completed)
            .collect();
        open.sort_by_key(|t| (t.priority, t.due_date.unwrap_or(NaiveDate::MAX), t.created_at));
        Ok(open)
    }

    /// Open tasks due on or before `today + days`.
    pub async fn due_within(&self, days: i64) -> EngineResult<Vec<Task>> {
        let horizon = self.ports.clock.now().date() + Duration::days(days);
        Ok(self
            .open_tasks()
            .await?
            .into_iter()
            .filter(|t| t.due_date.is_some_and(|d| d <= horizon))
            .collect())
    }

    pub async fn delete(&self, id: i64) -> EngineResult<()> {
        match self.ports.tasks.delete_task(id).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_score_prefers_exact() {
        assert_eq!(match_score("Buy milk", "buy milk"), usize::MAX);
        assert!(match_score("Buy milk and eggs", "milk") > match_score("Buy bread", "milk"));
        assert_eq!(match_score("Call the dentist", "dentist call"), 2);
        assert_eq!(match_score("Pay rent", "file taxes"), 0);
    }
}
