use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::kv::{KeyValueStore, PROJECTS_KEY, TASKS_KEY};
use crate::seed;
use crate::task::{Project, ProjectDraft, Status, Task, TaskDraft, TaskId, TaskPatch};

/// Which collection a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Tasks,
    Projects,
}

/// Owns the task and project collections. The in-memory copy is
/// authoritative; every mutation is mirrored to the key-value store before
/// it returns.
#[derive(Debug)]
pub struct Store<K: KeyValueStore> {
    kv: K,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    changes: Vec<Change>,
}

impl<K: KeyValueStore> Store<K> {
    /// Loads both collections once. A missing, unreadable or corrupt
    /// collection is replaced by the seed fixture.
    #[tracing::instrument(skip(kv, now))]
    pub fn open(kv: K, today: NaiveDate, now: DateTime<Utc>) -> Self {
        let tasks = load_collection(&kv, TASKS_KEY, || seed::default_tasks(today, now));
        let projects = load_collection(&kv, PROJECTS_KEY, seed::default_projects);

        info!(
            tasks = tasks.len(),
            projects = projects.len(),
            "store initialized"
        );

        Self {
            kv,
            tasks,
            projects,
            changes: Vec::new(),
        }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    /// Change signals raised since the last call, oldest first.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    #[tracing::instrument(skip(self, draft, now), fields(title = %draft.title))]
    pub fn add_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> anyhow::Result<Task> {
        let id = self.next_task_id(now)?;
        let task = Task::from_draft(id, draft, now);
        let mut candidate = self.tasks.clone();
        candidate.push(task.clone());
        self.save_tasks(candidate)?;

        debug!(id, count = self.tasks.len(), "task added");
        Ok(task)
    }

    /// Merges `patch` into the task. Unknown ids are a no-op and return
    /// `None` without touching storage.
    #[tracing::instrument(skip(self, patch))]
    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> anyhow::Result<Option<Task>> {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(id, "update ignored; no such task");
            return Ok(None);
        };

        let mut candidate = self.tasks.clone();
        patch.apply(&mut candidate[idx]);
        let updated = candidate[idx].clone();
        self.save_tasks(candidate)?;
        Ok(Some(updated))
    }

    /// Removes every task carrying `id` and returns how many went. Storage
    /// is rewritten even when nothing matched.
    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: TaskId) -> anyhow::Result<usize> {
        let candidate: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| task.id != id)
            .cloned()
            .collect();
        let removed = self.tasks.len() - candidate.len();
        self.save_tasks(candidate)?;

        debug!(id, removed, "delete applied");
        Ok(removed)
    }

    /// `completed` becomes `pending`; any other status, `in-progress`
    /// included, becomes `completed`.
    #[tracing::instrument(skip(self))]
    pub fn toggle_task_status(&mut self, id: TaskId) -> anyhow::Result<Option<Task>> {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(id, "toggle ignored; no such task");
            return Ok(None);
        };

        let mut candidate = self.tasks.clone();
        let task = &mut candidate[idx];
        task.status = if task.status == Status::Completed {
            Status::Pending
        } else {
            Status::Completed
        };
        let updated = task.clone();
        self.save_tasks(candidate)?;

        debug!(id, status = %updated.status, "task toggled");
        Ok(Some(updated))
    }

    #[tracing::instrument(skip(self, draft, now), fields(name = %draft.name))]
    pub fn add_project(
        &mut self,
        draft: ProjectDraft,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Project> {
        let project = Project {
            id: self.next_project_id(now)?,
            name: draft.name,
            color: draft.color,
        };
        let mut candidate = self.projects.clone();
        candidate.push(project.clone());
        self.save_projects(candidate)?;

        debug!(id = %project.id, count = self.projects.len(), "project added");
        Ok(project)
    }

    /// Millisecond clock value, bumped past the largest existing id so ids
    /// stay strictly increasing.
    fn next_task_id(&self, now: DateTime<Utc>) -> anyhow::Result<TaskId> {
        let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match self.tasks.iter().map(|task| task.id).max() {
            Some(max) if candidate <= max => max
                .checked_add(1)
                .ok_or_else(|| anyhow!("task ids exhausted; largest id is {max}")),
            _ => Ok(candidate),
        }
    }

    fn next_project_id(&self, now: DateTime<Utc>) -> anyhow::Result<String> {
        let mut candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        if let Some(max) = self
            .projects
            .iter()
            .filter_map(|project| project.id.parse::<u64>().ok())
            .max()
            && candidate <= max
        {
            candidate = max
                .checked_add(1)
                .ok_or_else(|| anyhow!("project ids exhausted; largest id is {max}"))?;
        }
        Ok(candidate.to_string())
    }

    /// Writes `candidate` and only then adopts it, so a failed write leaves
    /// memory as it was.
    fn save_tasks(&mut self, candidate: Vec<Task>) -> anyhow::Result<()> {
        save_collection(&mut self.kv, TASKS_KEY, &candidate).context("failed to save tasks")?;
        self.tasks = candidate;
        self.changes.push(Change::Tasks);
        Ok(())
    }

    fn save_projects(&mut self, candidate: Vec<Project>) -> anyhow::Result<()> {
        save_collection(&mut self.kv, PROJECTS_KEY, &candidate)
            .context("failed to save projects")?;
        self.projects = candidate;
        self.changes.push(Change::Projects);
        Ok(())
    }
}

#[tracing::instrument(skip(kv, fallback))]
fn load_collection<K, T, F>(kv: &K, key: &str, fallback: F) -> Vec<T>
where
    K: KeyValueStore,
    T: DeserializeOwned,
    F: FnOnce() -> Vec<T>,
{
    match kv.read(key) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => {
                debug!(key, count = items.len(), "loaded collection");
                items
            }
            Err(err) => {
                warn!(key, error = %err, "stored collection is corrupt; using defaults");
                fallback()
            }
        },
        Ok(None) => {
            info!(key, "no stored collection; using defaults");
            fallback()
        }
        Err(err) => {
            warn!(key, error = %err, "failed reading collection; using defaults");
            fallback()
        }
    }
}

fn save_collection<K, T>(kv: &mut K, key: &str, items: &[T]) -> anyhow::Result<()>
where
    K: KeyValueStore,
    T: Serialize,
{
    let serialized = serde_json::to_string(items)?;
    kv.write(key, &serialized)
        .with_context(|| format!("failed writing key {key}"))
}
