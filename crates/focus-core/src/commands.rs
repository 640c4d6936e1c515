use std::io::{
  self,
  BufRead,
  Write
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use tracing::{
  debug,
  info,
  instrument
};

use crate::cli::{
  AddArgs,
  Command,
  EditArgs,
  ListArgs
};
use crate::config::Config;
use crate::controller::{
  Confirm,
  Controller,
  DeleteOutcome,
  TaskForm
};
use crate::datetime::parse_due_expr;
use crate::export::{
  DirSink,
  WriterSink
};
use crate::kv::KeyValueStore;
use crate::query::{
  TaskQuery,
  ViewMode
};
use crate::render::Sections;
use crate::task::{
  Priority,
  ProjectDraft,
  Status,
  TaskId
};
use crate::view::Renderer;

/// What the terminal prints after a
/// command runs.
pub fn sections_for(
  command: &Command
) -> Sections {
  match command {
    | Command::List(_)
    | Command::Add(_)
    | Command::Edit(_)
    | Command::Toggle { .. }
    | Command::Delete { .. } => {
      Sections::TASKS
    }
    | Command::Projects
    | Command::ProjectAdd { .. } => {
      Sections::PROJECTS
    }
    | Command::Stats { json } => {
      if *json {
        Sections::NONE
      } else {
        Sections::STATS
      }
    }
    | Command::Export { .. }
    | Command::Show => Sections::NONE
  }
}

#[instrument(skip(
  controller, cfg, command, now
))]
pub fn dispatch<K, R>(
  controller: &mut Controller<K, R>,
  cfg: &Config,
  command: Command,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  debug!(?command, "dispatching command");

  match command {
    | Command::List(args) => {
      cmd_list(controller, args, now)
    }
    | Command::Add(args) => {
      cmd_add(controller, args, now)
    }
    | Command::Edit(args) => {
      cmd_edit(controller, args, now)
    }
    | Command::Toggle { id } => {
      cmd_toggle(controller, id, now)
    }
    | Command::Delete { id, yes } => {
      cmd_delete(
        controller, cfg, id, yes, now
      )
    }
    | Command::Projects
    | Command::Stats { json: false } => {
      controller.start(now)
    }
    | Command::ProjectAdd {
      name,
      color
    } => {
      cmd_project_add(
        controller, name, color, now
      )
    }
    | Command::Stats { json: true } => {
      cmd_stats_json(controller, now)
    }
    | Command::Export { out } => {
      cmd_export(
        controller,
        out.as_deref(),
        now
      )
    }
    | Command::Show => cmd_show(cfg)
  }
}

#[instrument(skip(
  controller, args, now
))]
fn cmd_list<K, R>(
  controller: &mut Controller<K, R>,
  args: ListArgs,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command list");

  let view = match args.view.as_deref()
  {
    | Some(raw) => raw.parse()?,
    | None => {
      controller.query().view.clone()
    }
  };
  let query = TaskQuery {
    view,
    priority: args
      .priority
      .as_deref()
      .map(str::parse::<Priority>)
      .transpose()?,
    status: args
      .status
      .as_deref()
      .map(str::parse::<Status>)
      .transpose()?
  };

  controller.set_query(query, now)
}

#[instrument(skip(
  controller, args, now
))]
fn cmd_add<K, R>(
  controller: &mut Controller<K, R>,
  args: AddArgs,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command add");

  let title = args.title.join(" ");
  if title.trim().is_empty() {
    return Err(anyhow!(
      "task title cannot be empty"
    ));
  }
  let today = controller.today(now);
  let project = args
    .project
    .map(|id| {
      require_project(controller, id)
    })
    .transpose()?;

  let priority = args
    .priority
    .as_deref()
    .map(str::parse::<Priority>)
    .transpose()?;
  let status = args
    .status
    .as_deref()
    .map(str::parse::<Status>)
    .transpose()?;
  let due_date = args
    .due
    .as_deref()
    .map(|raw| parse_due_expr(raw, today))
    .transpose()?;

  let mut form = controller
    .open_editor(None)
    .ok_or_else(|| {
      anyhow!("failed to open editor")
    })?;
  form.title = title.trim().to_string();
  form.description =
    args.description.unwrap_or_default();
  form.project = project;
  form.due_date = due_date;
  if let Some(priority) = priority {
    form.priority = priority;
  }
  if let Some(status) = status {
    form.status = status;
  }

  let task = controller
    .submit_editor(form, now)?
    .ok_or_else(|| {
      anyhow!("task was not created")
    })?;
  println!("Created task {}.", task.id);
  Ok(())
}

#[instrument(skip(
  controller, args, now
), fields(id = args.id))]
fn cmd_edit<K, R>(
  controller: &mut Controller<K, R>,
  args: EditArgs,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command edit");

  let today = controller.today(now);
  let project = args
    .project
    .clone()
    .map(|id| {
      require_project(controller, id)
    })
    .transpose()?;

  let form = controller
    .open_editor(Some(args.id))
    .ok_or_else(|| no_such_task(args.id))?;

  let form = match apply_edits(
    form, args, project, today
  ) {
    | Ok(form) => form,
    | Err(err) => {
      controller.close_editor();
      return Err(err);
    }
  };

  let task = controller
    .submit_editor(form, now)?
    .ok_or_else(|| {
      anyhow!("task vanished while editing")
    })?;
  println!("Modified task {}.", task.id);
  Ok(())
}

fn apply_edits(
  mut form: TaskForm,
  args: EditArgs,
  project: Option<String>,
  today: NaiveDate
) -> anyhow::Result<TaskForm> {
  if let Some(title) = args.title {
    if title.trim().is_empty() {
      return Err(anyhow!(
        "task title cannot be empty"
      ));
    }
    form.title = title.trim().to_string();
  }

  if args.clear_description {
    form.description.clear();
  } else if let Some(description) =
    args.description
  {
    form.description = description;
  }

  if let Some(raw) = args.priority {
    form.priority = raw.parse()?;
  }
  if let Some(raw) = args.status {
    form.status = raw.parse()?;
  }

  if args.clear_due {
    form.due_date = None;
  } else if let Some(raw) = args.due {
    form.due_date =
      Some(parse_due_expr(&raw, today)?);
  }

  if args.clear_project {
    form.project = None;
  } else if project.is_some() {
    form.project = project;
  }

  Ok(form)
}

#[instrument(skip(controller, now))]
fn cmd_toggle<K, R>(
  controller: &mut Controller<K, R>,
  id: TaskId,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command toggle");

  let task = controller
    .toggle_task(id, now)?
    .ok_or_else(|| no_such_task(id))?;
  println!(
    "Task {} is now {}.",
    task.id, task.status
  );
  Ok(())
}

#[instrument(skip(
  controller, cfg, now
))]
fn cmd_delete<K, R>(
  controller: &mut Controller<K, R>,
  cfg: &Config,
  id: TaskId,
  yes: bool,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command delete");

  let Some(task) =
    controller.store().task(id)
  else {
    return Err(no_such_task(id));
  };
  let title = task.title.clone();

  let ask = !yes
    && cfg
      .get_bool("confirmation")
      .unwrap_or(true);
  let outcome = if ask {
    eprintln!("{id}: {title}");
    controller.request_delete(
      id,
      &mut StdinConfirm,
      now
    )?
  } else {
    controller.request_delete(
      id,
      &mut |_: &str| true,
      now
    )?
  };

  match outcome {
    | DeleteOutcome::Declined => {
      println!("Task not deleted.");
    }
    | DeleteOutcome::Deleted(_) => {
      println!("Deleted task {id}.");
    }
  }
  Ok(())
}

#[instrument(skip(
  controller, color, now
))]
fn cmd_project_add<K, R>(
  controller: &mut Controller<K, R>,
  name: String,
  color: String,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command project-add");

  let name = name.trim().to_string();
  if name.is_empty() {
    return Err(anyhow!(
      "project name cannot be empty"
    ));
  }

  let project = controller.add_project(
    ProjectDraft {
      name,
      color
    },
    now
  )?;
  println!(
    "Created project {} ({}).",
    project.name, project.id
  );
  Ok(())
}

fn cmd_stats_json<K, R>(
  controller: &Controller<K, R>,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  let stats = controller.view_model(now).stats;
  println!(
    "{}",
    serde_json::to_string(&stats)?
  );
  Ok(())
}

#[instrument(skip(controller, now))]
fn cmd_export<K, R>(
  controller: &mut Controller<K, R>,
  out: Option<&std::path::Path>,
  now: DateTime<Utc>
) -> anyhow::Result<()>
where
  K: KeyValueStore,
  R: Renderer
{
  info!("command export");

  match out {
    | Some(dir) => {
      let mut sink = DirSink::new(dir);
      controller
        .export_to(&mut sink, now)?;
      for path in sink.written() {
        println!(
          "Exported to {}.",
          path.display()
        );
      }
    }
    | None => {
      let mut sink =
        WriterSink::new(io::stdout());
      controller
        .export_to(&mut sink, now)?;
    }
  }
  Ok(())
}

fn cmd_show(
  cfg: &Config
) -> anyhow::Result<()> {
  let mut entries: Vec<_> =
    cfg.iter().collect();
  entries.sort();
  for (k, v) in entries {
    println!("{k}={v}");
  }
  for file in &cfg.loaded_files {
    println!("# loaded {}", file.display());
  }
  Ok(())
}

/// Resolves the configured startup view,
/// falling back to `all`.
pub fn initial_view(
  cfg: &Config
) -> ViewMode {
  match cfg.get("default.view") {
    | Some(raw) => {
      raw.parse().unwrap_or_else(|err| {
        tracing::warn!(
          view = %raw,
          error = %err,
          "ignoring invalid default.view"
        );
        ViewMode::All
      })
    }
    | None => ViewMode::All
  }
}

fn require_project<K, R>(
  controller: &Controller<K, R>,
  id: String
) -> anyhow::Result<String>
where
  K: KeyValueStore,
  R: Renderer
{
  if controller
    .store()
    .project(&id)
    .is_none()
  {
    return Err(anyhow!(
      "unknown project: {id} (see \
       `focus projects`)"
    ));
  }
  Ok(id)
}

fn no_such_task(
  id: TaskId
) -> anyhow::Error {
  anyhow!("no task with id {id}")
}

/// Asks on stderr and reads the answer
/// from stdin; only `y`/`yes` agree.
struct StdinConfirm;

impl Confirm for StdinConfirm {
  fn confirm(
    &mut self,
    prompt: &str
  ) -> bool {
    let mut stderr = io::stderr().lock();
    if write!(stderr, "{prompt} [y/N] ")
      .and_then(|()| stderr.flush())
      .is_err()
    {
      return false;
    }

    let mut answer = String::new();
    match io::stdin()
      .lock()
      .read_line(&mut answer)
      .context("failed reading answer")
    {
      | Ok(_) => {
        matches!(
          answer
            .trim()
            .to_ascii_lowercase()
            .as_str(),
          "y" | "yes"
        )
      }
      | Err(err) => {
        tracing::warn!(error = %err, "no confirmation; treating as no");
        false
      }
    }
  }
}
