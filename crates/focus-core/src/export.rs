use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::datetime::format_iso_date;
use crate::task::{Project, Task};

/// Full snapshot of both collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub export_date: DateTime<Utc>,
}

impl ExportDocument {
    pub fn new(tasks: &[Task], projects: &[Project], now: DateTime<Utc>) -> Self {
        Self {
            tasks: tasks.to_vec(),
            projects: projects.to_vec(),
            export_date: now,
        }
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize export")
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("failed to parse export document")
    }

    /// `productivity-data-YYYY-MM-DD.json`, dated by the UTC export day.
    pub fn file_name(&self) -> String {
        format!(
            "productivity-data-{}.json",
            format_iso_date(self.export_date.date_naive())
        )
    }
}

/// Destination for a finished export.
pub trait ExportSink {
    fn save(&mut self, file_name: &str, contents: &str) -> anyhow::Result<()>;
}

/// Writes the export into a directory, atomically.
#[derive(Debug, Clone)]
pub struct DirSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ExportSink for DirSink {
    #[tracing::instrument(skip(self, contents), fields(dir = %self.dir.display()))]
    fn save(&mut self, file_name: &str, contents: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(file_name);

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(contents.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        info!(file = %path.display(), bytes = contents.len(), "export written");
        self.written.push(path);
        Ok(())
    }
}

/// Streams the export to any writer, e.g. stdout.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ExportSink for WriterSink<W> {
    fn save(&mut self, _file_name: &str, contents: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{contents}")?;
        self.out.flush()?;
        Ok(())
    }
}
