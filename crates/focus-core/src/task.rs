use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::iso_date_serde;

pub type TaskId = u64;
pub type ProjectId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Sort weight used for undated tasks: higher ranks list first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other} (expected low, medium or high)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }

    /// Human label, e.g. `in progress`.
    pub fn label(self) -> String {
        self.as_str().replace('-', " ")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in-progress" | "in_progress" | "inprogress" | "in progress" => Ok(Status::InProgress),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(anyhow!(
                "unknown status: {other} (expected pending, in-progress or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub priority: Priority,

    pub status: Status,

    #[serde(default, with = "iso_date_serde::option")]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub project: Option<ProjectId>,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn from_draft(id: TaskId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: draft.status,
            due_date: draft.due_date,
            project: draft.project,
            created_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }
}

/// Everything a new task needs except the fields the store assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub project: Option<ProjectId>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            status: Status::Pending,
            due_date: None,
            project: None,
        }
    }
}

/// Partial update. `None` keeps the current value; for nullable fields
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due_date: Option<Option<NaiveDate>>,
    pub project: Option<Option<ProjectId>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(project) = self.project {
            task.project = project;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub color: String,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Priority, Status, Task, TaskDraft, TaskPatch};

    fn sample() -> Task {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 2, 9, 30, 0)
            .single()
            .expect("valid now");
        let mut draft = TaskDraft::new("Write report");
        draft.description = Some("quarterly numbers".to_string());
        draft.priority = Priority::High;
        draft.due_date = NaiveDate::from_ymd_opt(2024, 1, 5);
        draft.project = Some("work".to_string());
        Task::from_draft(7, draft, now)
    }

    #[test]
    fn status_only_patch_keeps_other_fields() {
        let original = sample();
        let mut task = original.clone();

        TaskPatch::status(Status::Completed).apply(&mut task);

        assert_eq!(task.status, Status::Completed);
        assert_eq!(task.title, original.title);
        assert_eq!(task.description, original.description);
        assert_eq!(task.priority, original.priority);
        assert_eq!(task.due_date, original.due_date);
        assert_eq!(task.project, original.project);
        assert_eq!(task.created_at, original.created_at);
        assert_eq!(task.id, original.id);
    }

    #[test]
    fn patch_can_clear_nullable_fields() {
        let mut task = sample();
        let patch = TaskPatch {
            due_date: Some(None),
            project: Some(None),
            ..TaskPatch::default()
        };
        patch.apply(&mut task);

        assert_eq!(task.due_date, None);
        assert_eq!(task.project, None);
        assert_eq!(task.description.as_deref(), Some("quarterly numbers"));
    }

    #[test]
    fn serializes_with_camel_case_field_names() {
        let task = sample();
        let json = serde_json::to_value(&task).expect("serialize task");

        assert_eq!(json["dueDate"], "2024-01-05");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "high");
        assert!(json.get("createdAt").is_some());

        let mut in_progress = task.clone();
        in_progress.status = Status::InProgress;
        let json = serde_json::to_value(&in_progress).expect("serialize task");
        assert_eq!(json["status"], "in-progress");
    }

    #[test]
    fn reads_records_with_blank_due_dates() {
        let raw = r#"{
            "id": 1700000000000,
            "title": "Imported",
            "description": "",
            "priority": "low",
            "status": "in-progress",
            "dueDate": "",
            "project": null,
            "createdAt": "2023-11-14T22:13:20.000Z"
        }"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");

        assert_eq!(task.id, 1_700_000_000_000);
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.due_date, None);
        assert_eq!(task.description.as_deref(), Some(""));
    }

    #[test]
    fn parses_names_and_labels() {
        assert_eq!("High".parse::<Priority>().expect("priority"), Priority::High);
        assert_eq!(
            "in-progress".parse::<Status>().expect("status"),
            Status::InProgress
        );
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Status::InProgress.label(), "in progress");
        assert!(Priority::High.rank() > Priority::Low.rank());
    }
}
