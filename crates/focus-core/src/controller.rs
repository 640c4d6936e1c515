use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::datetime::today_in;
use crate::export::{ExportDocument, ExportSink};
use crate::kv::KeyValueStore;
use crate::query::{TaskQuery, ViewMode};
use crate::store::Store;
use crate::task::{
    Priority, Project, ProjectDraft, ProjectId, Status, Task, TaskDraft, TaskId, TaskPatch,
};
use crate::view::{Renderer, ViewModel};

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";

/// Blocking yes/no question asked before destructive changes.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        (self)(prompt)
    }
}

/// Editor contents. Nothing reaches the store until it is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub project: Option<ProjectId>,
}

impl TaskForm {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            status: Status::Pending,
            due_date: None,
            project: None,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority,
            status: task.status,
            due_date: task.due_date,
            project: task.project.clone(),
        }
    }

    fn description(&self) -> Option<String> {
        let trimmed = self.description.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.description.clone())
        }
    }

    pub fn into_draft(self) -> TaskDraft {
        TaskDraft {
            description: self.description(),
            title: self.title,
            priority: self.priority,
            status: self.status,
            due_date: self.due_date,
            project: self.project,
        }
    }

    /// Every form field overwrites the task, as a submitted editor does.
    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            description: Some(self.description()),
            title: Some(self.title),
            priority: Some(self.priority),
            status: Some(self.status),
            due_date: Some(self.due_date),
            project: Some(self.project),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted(usize),
}

/// Session-scoped controller: owns the store, the renderer and the
/// selection state, and re-renders after every change.
#[derive(Debug)]
pub struct Controller<K: KeyValueStore, R: Renderer> {
    store: Store<K>,
    renderer: R,
    tz: Tz,
    query: TaskQuery,
    editor: Option<EditorMode>,
}

impl<K: KeyValueStore, R: Renderer> Controller<K, R> {
    pub fn new(store: Store<K>, renderer: R, tz: Tz, initial_view: ViewMode) -> Self {
        Self {
            store,
            renderer,
            tz,
            query: TaskQuery::new(initial_view),
            editor: None,
        }
    }

    pub fn store(&self) -> &Store<K> {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }

    pub fn editor(&self) -> Option<EditorMode> {
        self.editor
    }

    /// Id of the task the open editor is bound to, if editing.
    pub fn editing_task(&self) -> Option<TaskId> {
        match self.editor {
            Some(EditorMode::Edit(id)) => Some(id),
            _ => None,
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        today_in(&self.tz, now)
    }

    pub fn view_model(&self, now: DateTime<Utc>) -> ViewModel {
        ViewModel::build(
            self.store.tasks(),
            self.store.projects(),
            &self.query,
            self.today(now),
        )
    }

    /// Initial draw.
    #[instrument(skip(self, now))]
    pub fn start(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.store.drain_changes();
        self.render(now)
    }

    #[instrument(skip(self, view, now), fields(view = %view))]
    pub fn set_view(&mut self, view: ViewMode, now: DateTime<Utc>) -> anyhow::Result<()> {
        info!("switching view");
        self.query.view = view;
        self.render(now)
    }

    /// Replaces view and filters at once and renders a single frame.
    #[instrument(skip(self, query, now), fields(view = %query.view))]
    pub fn set_query(&mut self, query: TaskQuery, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.query = query;
        self.render(now)
    }

    #[instrument(skip(self, now))]
    pub fn set_priority_filter(
        &mut self,
        priority: Option<Priority>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.query.priority = priority;
        self.render(now)
    }

    #[instrument(skip(self, now))]
    pub fn set_status_filter(
        &mut self,
        status: Option<Status>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.query.status = status;
        self.render(now)
    }

    /// Opens the editor, replacing any open session. `None` starts a new
    /// task; an unknown id opens nothing.
    #[instrument(skip(self))]
    pub fn open_editor(&mut self, id: Option<TaskId>) -> Option<TaskForm> {
        match id {
            None => {
                self.editor = Some(EditorMode::Create);
                Some(TaskForm::blank())
            }
            Some(id) => {
                let form = TaskForm::from_task(self.store.task(id)?);
                self.editor = Some(EditorMode::Edit(id));
                Some(form)
            }
        }
    }

    /// Discards the open session without touching the store.
    pub fn close_editor(&mut self) {
        if self.editor.take().is_some() {
            debug!("editor closed");
        }
    }

    /// Creates or updates depending on the open session, then closes it.
    /// A failed write keeps the session open.
    /// Returns `None` when the edited task disappeared meanwhile.
    #[instrument(skip(self, form, now))]
    pub fn submit_editor(
        &mut self,
        form: TaskForm,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        let mode = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("no task editor is open"))?;

        let result = match mode {
            EditorMode::Create => self.store.add_task(form.into_draft(), now).map(Some),
            EditorMode::Edit(id) => self.store.update_task(id, form.into_patch()),
        };
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                self.editor = Some(mode);
                return Err(err);
            }
        };

        self.refresh(now)?;
        Ok(saved)
    }

    #[instrument(skip(self, now))]
    pub fn toggle_task(&mut self, id: TaskId, now: DateTime<Utc>) -> anyhow::Result<Option<Task>> {
        let toggled = self.store.toggle_task_status(id)?;
        self.refresh(now)?;
        Ok(toggled)
    }

    /// Deletes only after `confirm` agrees; declining changes nothing.
    #[instrument(skip(self, confirm, now))]
    pub fn request_delete(
        &mut self,
        id: TaskId,
        confirm: &mut dyn Confirm,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DeleteOutcome> {
        if !confirm.confirm(DELETE_PROMPT) {
            info!(id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let removed = self.store.delete_task(id)?;
        self.refresh(now)?;
        Ok(DeleteOutcome::Deleted(removed))
    }

    #[instrument(skip(self, draft, now))]
    pub fn add_project(
        &mut self,
        draft: ProjectDraft,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Project> {
        let project = self.store.add_project(draft, now)?;
        self.refresh(now)?;
        Ok(project)
    }

    pub fn export(&self, now: DateTime<Utc>) -> ExportDocument {
        ExportDocument::new(self.store.tasks(), self.store.projects(), now)
    }

    /// Serializes the full store and hands it to `sink`. Returns the
    /// suggested file name.
    #[instrument(skip(self, sink, now))]
    pub fn export_to(
        &self,
        sink: &mut dyn ExportSink,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let doc = self.export(now);
        let file_name = doc.file_name();
        sink.save(&file_name, &doc.to_json_pretty()?)?;
        info!(
            file = %file_name,
            tasks = doc.tasks.len(),
            projects = doc.projects.len(),
            "exported data"
        );
        Ok(file_name)
    }

    /// Re-renders when the store signalled a change.
    fn refresh(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let changes = self.store.drain_changes();
        if changes.is_empty() {
            return Ok(());
        }
        debug!(?changes, "store changed; re-rendering");
        self.render(now)
    }

    fn render(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let model = self.view_model(now);
        self.renderer.render(&model)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::{Controller, DELETE_PROMPT, DeleteOutcome, EditorMode, TaskForm};
    use crate::export::WriterSink;
    use crate::kv::{KeyValueStore, MemoryKv, PROJECTS_KEY, TASKS_KEY};
    use crate::query::ViewMode;
    use crate::store::Store;
    use crate::task::{Priority, ProjectDraft, Status};
    use crate::view::{Renderer, ViewModel};

    #[derive(Debug, Default)]
    struct Recorder {
        frames: Vec<ViewModel>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, model: &ViewModel) -> anyhow::Result<()> {
            self.frames.push(model.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0)
            .single()
            .expect("valid now")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date")
    }

    fn controller() -> Controller<MemoryKv, Recorder> {
        let kv = MemoryKv::new()
            .with_entry(TASKS_KEY, "[]")
            .with_entry(PROJECTS_KEY, "[]");
        let store = Store::open(kv, today(), now());
        Controller::new(store, Recorder::default(), chrono_tz::UTC, ViewMode::All)
    }

    fn add(ctl: &mut Controller<MemoryKv, Recorder>, title: &str) -> u64 {
        let mut form = ctl.open_editor(None).expect("create form");
        form.title = title.to_string();
        ctl.submit_editor(form, now())
            .expect("submit")
            .expect("task created")
            .id
    }

    #[test]
    fn create_then_edit_through_the_editor() {
        let mut ctl = controller();
        ctl.start(now()).expect("start");
        assert_eq!(ctl.renderer().frames.len(), 1);
        assert!(ctl.renderer().frames[0].tasks.is_empty());

        let id = add(&mut ctl, "Draft agenda");
        assert_eq!(ctl.editor(), None);
        assert_eq!(ctl.renderer().frames.len(), 2);
        assert_eq!(ctl.renderer().frames[1].tasks.cards()[0].title, "Draft agenda");

        let mut form = ctl.open_editor(Some(id)).expect("edit form");
        assert_eq!(ctl.editing_task(), Some(id));
        assert_eq!(form.title, "Draft agenda");
        form.priority = Priority::High;
        form.due_date = Some(today());
        let updated = ctl
            .submit_editor(form, now())
            .expect("submit")
            .expect("task updated");

        assert_eq!(updated.id, id);
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(ctl.store().tasks().len(), 1);
        assert_eq!(ctl.editing_task(), None);
    }

    #[test]
    fn closing_the_editor_discards_input() {
        let mut ctl = controller();
        let mut form = ctl.open_editor(None).expect("form");
        form.title = "never saved".to_string();
        ctl.close_editor();

        assert!(ctl.store().tasks().is_empty());
        assert!(ctl.renderer().frames.is_empty());
        assert!(ctl.submit_editor(form, now()).is_err());
        assert!(ctl.open_editor(Some(404)).is_none());
        assert_eq!(ctl.editor(), None);
    }

    #[test]
    fn failed_submit_keeps_the_session_open() {
        struct ReadOnly;
        impl KeyValueStore for ReadOnly {
            fn read(&self, _key: &str) -> anyhow::Result<Option<String>> {
                Ok(Some("[]".to_string()))
            }
            fn write(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("read-only"))
            }
        }

        let store = Store::open(ReadOnly, today(), now());
        let mut ctl = Controller::new(store, Recorder::default(), chrono_tz::UTC, ViewMode::All);
        let mut form = ctl.open_editor(None).expect("form");
        form.title = "unsaved".to_string();

        assert!(ctl.submit_editor(form, now()).is_err());
        assert_eq!(ctl.editor(), Some(EditorMode::Create));
        assert!(ctl.store().tasks().is_empty());
        assert!(ctl.renderer().frames.is_empty());
    }

    #[test]
    fn opening_a_new_session_replaces_the_old_one() {
        let mut ctl = controller();
        let id = add(&mut ctl, "a");
        ctl.open_editor(Some(id)).expect("edit form");
        ctl.open_editor(None).expect("create form");
        assert_eq!(ctl.editor(), Some(EditorMode::Create));
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut ctl = controller();
        let id = add(&mut ctl, "doomed");

        let mut asked = Vec::new();
        let mut decline = |prompt: &str| {
            asked.push(prompt.to_string());
            false
        };
        let outcome = ctl.request_delete(id, &mut decline, now()).expect("delete");
        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(asked, vec![DELETE_PROMPT.to_string()]);
        assert_eq!(ctl.store().tasks().len(), 1);

        let mut accept = |_: &str| true;
        let outcome = ctl.request_delete(id, &mut accept, now()).expect("delete");
        assert_eq!(outcome, DeleteOutcome::Deleted(1));
        assert!(ctl.store().tasks().is_empty());
        assert!(ctl.renderer().frames.last().expect("frame").tasks.is_empty());
    }

    #[test]
    fn view_and_filters_rerender() {
        let mut ctl = controller();
        let id = add(&mut ctl, "finish");
        add(&mut ctl, "start");
        ctl.toggle_task(id, now()).expect("toggle");

        ctl.set_view(ViewMode::Completed, now()).expect("view");
        let frame = ctl.renderer().frames.last().expect("frame");
        assert_eq!(frame.title, "Completed Tasks");
        assert_eq!(frame.tasks.cards().len(), 1);
        assert_eq!(frame.stats.completed, 0);
        assert_eq!(frame.stats.total, 1);

        ctl.set_view(ViewMode::All, now()).expect("view");
        ctl.set_status_filter(Some(Status::Pending), now())
            .expect("status filter");
        let frame = ctl.renderer().frames.last().expect("frame");
        assert_eq!(frame.tasks.cards()[0].title, "start");

        ctl.set_priority_filter(Some(Priority::High), now())
            .expect("priority filter");
        assert!(ctl.renderer().frames.last().expect("frame").tasks.is_empty());

        let frames = ctl.renderer().frames.len();
        assert!(ctl.toggle_task(9, now()).expect("toggle missing").is_none());
        assert_eq!(ctl.renderer().frames.len(), frames);
    }

    #[test]
    fn projects_and_export() {
        let mut ctl = controller();
        let project = ctl
            .add_project(
                ProjectDraft {
                    name: "Garden".to_string(),
                    color: "#22c55e".to_string(),
                },
                now(),
            )
            .expect("add project");

        let mut form = ctl.open_editor(None).expect("form");
        form.title = "Plant tomatoes".to_string();
        form.project = Some(project.id.clone());
        ctl.submit_editor(form, now()).expect("submit");

        ctl.set_view(ViewMode::Project(project.id.clone()), now())
            .expect("view");
        let frame = ctl.renderer().frames.last().expect("frame");
        assert_eq!(frame.title, "Garden");
        assert_eq!(frame.tasks.cards().len(), 1);

        let mut sink = WriterSink::new(Vec::new());
        let name = ctl.export_to(&mut sink, now()).expect("export");
        assert_eq!(name, "productivity-data-2024-01-02.json");

        let raw = String::from_utf8(sink.into_inner()).expect("utf8");
        let doc = crate::export::ExportDocument::from_json(&raw).expect("parse");
        assert_eq!(doc.tasks, ctl.store().tasks());
        assert_eq!(doc.projects, ctl.store().projects());
    }

    #[test]
    fn form_conversion_drops_blank_description() {
        let mut form = TaskForm::blank();
        form.title = "t".to_string();
        form.description = "  ".to_string();
        let draft = form.clone().into_draft();
        assert_eq!(draft.description, None);

        let patch = form.into_patch();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.title.as_deref(), Some("t"));
    }
}
