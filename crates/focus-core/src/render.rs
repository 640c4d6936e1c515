use std::io::{self, IsTerminal, Stdout, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::Priority;
use crate::view::{Renderer, TaskListState, ViewModel};

const PROGRESS_BAR_WIDTH: usize = 20;

/// Which parts of the view model a terminal frame prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections {
    pub tasks: bool,
    pub projects: bool,
    pub stats: bool,
}

impl Sections {
    pub const TASKS: Sections = Sections {
        tasks: true,
        projects: false,
        stats: true,
    };
    pub const PROJECTS: Sections = Sections {
        tasks: false,
        projects: true,
        stats: false,
    };
    pub const STATS: Sections = Sections {
        tasks: false,
        projects: false,
        stats: true,
    };
    pub const NONE: Sections = Sections {
        tasks: false,
        projects: false,
        stats: false,
    };
}

#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    color: bool,
    sections: Sections,
}

impl TerminalRenderer<Stdout> {
    /// Stdout renderer; colors follow the `color` setting and are only
    /// emitted on a terminal.
    pub fn stdout(cfg: &Config, sections: Sections) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self::new(
            io::stdout(),
            color && io::stdout().is_terminal(),
            sections,
        ))
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, color: bool, sections: Sections) -> Self {
        Self {
            out,
            color,
            sections,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn write_tasks(&mut self, model: &ViewModel) -> anyhow::Result<()> {
        writeln!(self.out, "{}", self.paint(&model.title, "1"))?;
        writeln!(self.out)?;

        let cards = match &model.tasks {
            TaskListState::Empty => {
                writeln!(
                    self.out,
                    "No tasks found. Add a task with `focus add <title>`."
                )?;
                return Ok(());
            }
            TaskListState::Items(cards) => cards,
        };

        let headers = vec![
            "ID".to_string(),
            "Due".to_string(),
            "Priority".to_string(),
            "Status".to_string(),
            "Project".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(cards.len());
        for card in cards {
            let due = if card.overdue {
                self.paint(&format!("{} (Overdue)", card.due_label), "31")
            } else {
                card.due_label.clone()
            };
            let priority = match card.priority {
                Priority::High => self.paint(card.priority.as_str(), "31"),
                Priority::Medium => self.paint(card.priority.as_str(), "33"),
                Priority::Low => self.paint(card.priority.as_str(), "32"),
            };
            let project = card
                .project
                .as_ref()
                .map(|tag| tag.name.clone())
                .unwrap_or_default();
            let title = if card.completed {
                self.paint(&card.title, "9")
            } else {
                card.title.clone()
            };

            rows.push(vec![
                self.paint(&card.id.to_string(), "33"),
                due,
                priority,
                card.status_label.clone(),
                project,
                title,
            ]);
        }

        write_table(&mut self.out, headers, rows)?;
        Ok(())
    }

    fn write_projects(&mut self, model: &ViewModel) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Color".to_string(),
        ];
        let rows = model
            .project_options
            .iter()
            .filter_map(|option| {
                let id = option.value.clone()?;
                let color = model
                    .nav
                    .iter()
                    .find(|entry| entry.view.selected_project() == Some(id.as_str()))
                    .and_then(|entry| entry.color.clone())
                    .unwrap_or_default();
                Some(vec![id, option.label.clone(), color])
            })
            .collect::<Vec<_>>();

        if rows.is_empty() {
            writeln!(self.out, "No projects.")?;
            return Ok(());
        }
        write_table(&mut self.out, headers, rows)
    }

    fn write_stats(&mut self, model: &ViewModel) -> anyhow::Result<()> {
        let stats = model.stats;
        let filled = PROGRESS_BAR_WIDTH * usize::from(stats.percentage) / 100;
        let bar = format!(
            "{}{}",
            "#".repeat(filled),
            "-".repeat(PROGRESS_BAR_WIDTH - filled)
        );
        writeln!(
            self.out,
            "Today: {}/{} completed [{}] {}%",
            stats.completed,
            stats.total,
            self.paint(&bar, "32"),
            stats.percentage
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    #[tracing::instrument(skip(self, model), fields(title = %model.title))]
    fn render(&mut self, model: &ViewModel) -> anyhow::Result<()> {
        let sections = self.sections;
        if sections.tasks {
            self.write_tasks(model)?;
        }
        if sections.projects {
            if sections.tasks {
                writeln!(self.out)?;
            }
            self.write_projects(model)?;
        }
        if sections.stats {
            if sections.tasks || sections.projects {
                writeln!(self.out)?;
            }
            self.write_stats(model)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
