use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::trace;

use crate::task::{
  Priority,
  ProjectId,
  Status,
  Task
};

/// The lens applied to the task list.
/// A selected project only exists in
/// the `Project` view.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub enum ViewMode {
  #[default]
  All,
  Today,
  Upcoming,
  Completed,
  Project(ProjectId)
}

impl ViewMode {
  pub fn selected_project(
    &self
  ) -> Option<&str> {
    match self {
      | ViewMode::Project(id) => {
        Some(id.as_str())
      }
      | _ => None
    }
  }

  /// Heading for the non-project
  /// views.
  pub fn title(&self) -> Option<&'static str> {
    match self {
      | ViewMode::All => Some("All Tasks"),
      | ViewMode::Today => {
        Some("Today's Tasks")
      }
      | ViewMode::Upcoming => {
        Some("Upcoming Tasks")
      }
      | ViewMode::Completed => {
        Some("Completed Tasks")
      }
      | ViewMode::Project(_) => None
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | ViewMode::All => f.write_str("all"),
      | ViewMode::Today => {
        f.write_str("today")
      }
      | ViewMode::Upcoming => {
        f.write_str("upcoming")
      }
      | ViewMode::Completed => {
        f.write_str("completed")
      }
      | ViewMode::Project(id) => {
        write!(f, "project:{id}")
      }
    }
  }
}

impl FromStr for ViewMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if let Some(id) =
      trimmed.strip_prefix("project:")
    {
      let id = id.trim();
      if id.is_empty() {
        return Err(anyhow!(
          "project view needs an id, \
           e.g. project:work"
        ));
      }
      return Ok(ViewMode::Project(
        id.to_string()
      ));
    }

    match trimmed
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(ViewMode::All),
      | "today" => Ok(ViewMode::Today),
      | "upcoming" => {
        Ok(ViewMode::Upcoming)
      }
      | "completed" => {
        Ok(ViewMode::Completed)
      }
      | other => {
        Err(anyhow!(
          "unknown view: {other} \
           (expected all, today, \
           upcoming, completed or \
           project:<id>)"
        ))
      }
    }
  }
}

/// Current selection state the task
/// list is derived from.
#[derive(
  Debug, Clone, PartialEq, Eq, Default,
)]
pub struct TaskQuery {
  pub view:     ViewMode,
  pub priority: Option<Priority>,
  pub status:   Option<Status>
}

impl TaskQuery {
  pub fn new(view: ViewMode) -> Self {
    Self {
      view,
      ..Self::default()
    }
  }

  #[tracing::instrument(skip(
    self, task, today
  ))]
  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    let in_view = match &self.view {
      | ViewMode::Today => {
        task.due_date == Some(today)
      }
      | ViewMode::Upcoming => {
        task
          .due_date
          .is_some_and(|due| due > today)
      }
      | ViewMode::Completed => {
        task.status == Status::Completed
      }
      | ViewMode::All
      | ViewMode::Project(_) => true
    };
    if !in_view {
      return false;
    }

    if let Some(project) =
      self.view.selected_project()
      && task.project.as_deref()
        != Some(project)
    {
      return false;
    }

    if let Some(priority) = self.priority
      && task.priority != priority
    {
      return false;
    }

    if let Some(status) = self.status
      && task.status != status
    {
      return false;
    }

    true
  }

  /// Filters in view, project,
  /// priority, status order and sorts
  /// the survivors for display.
  #[tracing::instrument(skip(
    self, tasks, today
  ), fields(view = %self.view))]
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task],
    today: NaiveDate
  ) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks
      .iter()
      .filter(|task| {
        self.matches(task, today)
      })
      .collect();
    out.sort_by(|a, b| {
      compare_for_display(a, b)
    });

    trace!(
      total = tasks.len(),
      shown = out.len(),
      "applied task query"
    );
    out
  }
}

/// Dated tasks first, by ascending due
/// date; undated tasks after, highest
/// priority first. Equal keys compare
/// equal so a stable sort keeps
/// insertion order.
pub fn compare_for_display(
  a: &Task,
  b: &Task
) -> Ordering {
  match (a.due_date, b.due_date) {
    | (Some(left), Some(right)) => {
      left.cmp(&right)
    }
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => {
      b.priority
        .rank()
        .cmp(&a.priority.rank())
    }
  }
}
