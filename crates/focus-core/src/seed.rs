use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::task::{Priority, Project, Status, Task};

/// Tasks a fresh install starts with. Due dates are relative to `today`.
pub fn default_tasks(today: NaiveDate, now: DateTime<Utc>) -> Vec<Task> {
    vec![
        seed_task(
            1,
            "Complete project proposal",
            "Write and submit the Q1 project proposal for the new marketing campaign",
            Priority::High,
            Status::InProgress,
            today + Duration::days(2),
            "work",
            now,
        ),
        seed_task(
            2,
            "Review team feedback",
            "Go through all the feedback from the team meeting and create action items",
            Priority::Medium,
            Status::Pending,
            today + Duration::days(1),
            "work",
            now,
        ),
        seed_task(
            3,
            "Update portfolio website",
            "Add recent projects and update the design to match current trends",
            Priority::Low,
            Status::Pending,
            today + Duration::days(7),
            "personal",
            now,
        ),
    ]
}

pub fn default_projects() -> Vec<Project> {
    [
        ("work", "Work Projects", "#3b82f6"),
        ("personal", "Personal", "#10b981"),
        ("learning", "Learning", "#f59e0b"),
    ]
    .into_iter()
    .map(|(id, name, color)| Project {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

#[allow(clippy::too_many_arguments)]
fn seed_task(
    id: u64,
    title: &str,
    description: &str,
    priority: Priority,
    status: Status,
    due: NaiveDate,
    project: &str,
    now: DateTime<Utc>,
) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: Some(description.to_string()),
        priority,
        status,
        due_date: Some(due),
        project: Some(project.to_string()),
        created_at: now,
    }
}
