//! Typed render props handed to whatever draws the tracker.
//!
//! The core never produces markup; a [`Renderer`] receives a fully derived
//! [`ViewModel`] and decides how to present it.

use chrono::NaiveDate;

use crate::datetime::format_iso_date;
use crate::query::{TaskQuery, ViewMode};
use crate::stats::{DailyStats, PROGRESS_RING_RADIUS};
use crate::task::{Priority, Project, ProjectId, Status, Task, TaskId};

pub const NO_PROJECT_LABEL: &str = "No Project";
pub const NO_PROJECT_COLOR: &str = "#64748b";
pub const NO_DUE_DATE_LABEL: &str = "No due date";
pub const UNKNOWN_PROJECT_TITLE: &str = "Project";

pub trait Renderer {
    fn render(&mut self, model: &ViewModel) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub title: String,
    pub today: NaiveDate,
    pub query: TaskQuery,
    pub nav: Vec<NavEntry>,
    pub tasks: TaskListState,
    pub project_options: Vec<ProjectOption>,
    pub stats: DailyStats,
    /// Stroke-dash offset of the progress ring.
    pub progress_offset: f64,
}

/// An empty result is its own state so renderers show a placeholder
/// instead of an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskListState {
    Empty,
    Items(Vec<TaskCard>),
}

impl TaskListState {
    pub fn cards(&self) -> &[TaskCard] {
        match self {
            TaskListState::Empty => &[],
            TaskListState::Items(cards) => cards,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TaskListState::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: Status,
    pub status_label: String,
    pub completed: bool,
    /// Set whenever the task names a project, even one that no longer
    /// exists.
    pub project: Option<ProjectTag>,
    pub due_label: String,
    pub overdue: bool,
    pub toggle_hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTag {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub view: ViewMode,
    pub label: String,
    pub color: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOption {
    pub value: Option<ProjectId>,
    pub label: String,
}

impl ViewModel {
    #[tracing::instrument(skip(tasks, projects, query, today), fields(view = %query.view))]
    pub fn build(
        tasks: &[Task],
        projects: &[Project],
        query: &TaskQuery,
        today: NaiveDate,
    ) -> Self {
        let cards: Vec<TaskCard> = query
            .apply(tasks, today)
            .into_iter()
            .map(|task| TaskCard::build(task, projects, today))
            .collect();
        let list = if cards.is_empty() {
            TaskListState::Empty
        } else {
            TaskListState::Items(cards)
        };

        let stats = DailyStats::compute(tasks, today);

        Self {
            title: view_title(&query.view, projects),
            today,
            query: query.clone(),
            nav: nav_entries(&query.view, projects),
            tasks: list,
            project_options: project_options(projects),
            stats,
            progress_offset: stats.ring_offset(PROGRESS_RING_RADIUS),
        }
    }
}

impl TaskCard {
    pub fn build(task: &Task, projects: &[Project], today: NaiveDate) -> Self {
        let completed = task.is_completed();
        let project = task.project.as_deref().map(|id| {
            match projects.iter().find(|project| project.id == id) {
                Some(project) => ProjectTag {
                    name: project.name.clone(),
                    color: project.color.clone(),
                },
                None => ProjectTag {
                    name: NO_PROJECT_LABEL.to_string(),
                    color: NO_PROJECT_COLOR.to_string(),
                },
            }
        });

        Self {
            id: task.id,
            title: task.title.clone(),
            description: task
                .description
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .map(ToString::to_string),
            priority: task.priority,
            status: task.status,
            status_label: task.status.label(),
            completed,
            project,
            due_label: task
                .due_date
                .map(format_iso_date)
                .unwrap_or_else(|| NO_DUE_DATE_LABEL.to_string()),
            overdue: !completed && task.due_date.is_some_and(|due| due < today),
            toggle_hint: if completed {
                "Mark as pending"
            } else {
                "Mark as completed"
            },
        }
    }
}

pub fn view_title(view: &ViewMode, projects: &[Project]) -> String {
    match view {
        ViewMode::Project(id) => projects
            .iter()
            .find(|project| &project.id == id)
            .map(|project| project.name.clone())
            .unwrap_or_else(|| UNKNOWN_PROJECT_TITLE.to_string()),
        other => other.title().unwrap_or(UNKNOWN_PROJECT_TITLE).to_string(),
    }
}

fn nav_entries(current: &ViewMode, projects: &[Project]) -> Vec<NavEntry> {
    let fixed = [
        ViewMode::All,
        ViewMode::Today,
        ViewMode::Upcoming,
        ViewMode::Completed,
    ]
    .into_iter()
    .map(|view| NavEntry {
        label: view.title().unwrap_or_default().to_string(),
        color: None,
        active: &view == current,
        view,
    });

    let by_project = projects.iter().map(|project| {
        let view = ViewMode::Project(project.id.clone());
        NavEntry {
            label: project.name.clone(),
            color: Some(project.color.clone()),
            active: &view == current,
            view,
        }
    });

    fixed.chain(by_project).collect()
}

fn project_options(projects: &[Project]) -> Vec<ProjectOption> {
    std::iter::once(ProjectOption {
        value: None,
        label: NO_PROJECT_LABEL.to_string(),
    })
    .chain(projects.iter().map(|project| ProjectOption {
        value: Some(project.id.clone()),
        label: project.name.clone(),
    }))
    .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{NO_DUE_DATE_LABEL, NO_PROJECT_COLOR, NO_PROJECT_LABEL, TaskCard, ViewModel};
    use crate::query::{TaskQuery, ViewMode};
    use crate::seed;
    use crate::task::{Status, Task, TaskDraft};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date")
    }

    fn task(id: u64) -> Task {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        Task::from_draft(id, TaskDraft::new(format!("task {id}")), now)
    }

    #[test]
    fn dangling_project_uses_fallback_label() {
        let projects = seed::default_projects();
        let mut orphan = task(1);
        orphan.project = Some("deleted".to_string());
        let mut owned = task(2);
        owned.project = Some("work".to_string());

        let orphan_card = TaskCard::build(&orphan, &projects, today());
        let tag = orphan_card.project.expect("tag present");
        assert_eq!(tag.name, NO_PROJECT_LABEL);
        assert_eq!(tag.color, NO_PROJECT_COLOR);

        let owned_card = TaskCard::build(&owned, &projects, today());
        let tag = owned_card.project.expect("tag present");
        assert_eq!(tag.name, "Work Projects");

        assert!(TaskCard::build(&task(3), &projects, today()).project.is_none());
    }

    #[test]
    fn overdue_and_due_labels() {
        let projects = seed::default_projects();
        let mut late = task(1);
        late.due_date = Some(today() - Duration::days(1));
        let card = TaskCard::build(&late, &projects, today());
        assert!(card.overdue);
        assert_eq!(card.due_label, "2024-01-01");
        assert_eq!(card.toggle_hint, "Mark as completed");

        late.status = Status::Completed;
        let card = TaskCard::build(&late, &projects, today());
        assert!(!card.overdue);
        assert_eq!(card.toggle_hint, "Mark as pending");

        let mut due_today = task(2);
        due_today.due_date = Some(today());
        assert!(!TaskCard::build(&due_today, &projects, today()).overdue);

        let mut blank = task(3);
        blank.description = Some("   ".to_string());
        blank.status = Status::InProgress;
        let card = TaskCard::build(&blank, &projects, today());
        assert_eq!(card.due_label, NO_DUE_DATE_LABEL);
        assert_eq!(card.description, None);
        assert_eq!(card.status_label, "in progress");
    }

    #[test]
    fn model_titles_nav_and_empty_state() {
        let projects = seed::default_projects();
        let tasks = vec![task(1)];

        let model = ViewModel::build(&tasks, &projects, &TaskQuery::default(), today());
        assert_eq!(model.title, "All Tasks");
        assert_eq!(model.tasks.cards().len(), 1);
        assert_eq!(model.project_options.len(), 4);
        assert_eq!(model.project_options[0].value, None);
        let active: Vec<_> = model.nav.iter().filter(|entry| entry.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].view, ViewMode::All);

        let query = TaskQuery::new(ViewMode::Project("learning".to_string()));
        let model = ViewModel::build(&tasks, &projects, &query, today());
        assert_eq!(model.title, "Learning");
        assert!(model.tasks.is_empty());
        assert!(
            model
                .nav
                .iter()
                .any(|entry| entry.active && entry.label == "Learning")
        );

        let query = TaskQuery::new(ViewMode::Project("gone".to_string()));
        let model = ViewModel::build(&tasks, &projects, &query, today());
        assert_eq!(model.title, "Project");
        assert_eq!(model.stats.total, 1);
    }
}
