use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "focus",
    version,
    about = "Focus: personal task and project tracker",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the filtered, sorted task list and today's progress.
    List(ListArgs),
    /// Create a task.
    Add(AddArgs),
    /// Change fields of an existing task.
    Edit(EditArgs),
    /// Flip a task between completed and pending.
    Toggle { id: u64 },
    /// Delete a task after confirmation.
    Delete {
        id: u64,
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// List projects.
    Projects,
    /// Create a project.
    ProjectAdd {
        name: String,
        #[arg(long, default_value = "#6366f1")]
        color: String,
    },
    /// Today's completion figures.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Write every task and project as one JSON document.
    Export {
        /// Directory to write `productivity-data-<date>.json` into; stdout
        /// when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// all, today, upcoming, completed or project:<id>
    #[arg(long)]
    pub view: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(short = 'd', long)]
    pub description: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// YYYY-MM-DD, today, tomorrow, a weekday, or +Nd/+Nw
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: u64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short = 'd', long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(short = 's', long)]
    pub status: Option<String>,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    #[arg(long, conflicts_with = "clear_project")]
    pub project: Option<String>,

    #[arg(long)]
    pub clear_project: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                rest.split_once(':')
                    .map(|(k, v)| (format!("rc.{k}"), v.to_string()))
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&["focus", "rc.color=off", "list", "rc.timezone:UTC"]))
            .expect("preprocess");

        assert_eq!(pre.cleaned_args, args(&["focus", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.timezone".to_string(), "UTC".to_string()),
            ]
        );
    }

    #[test]
    fn parses_add_with_flags() {
        let cli = GlobalCli::parse_from(args(&[
            "focus",
            "--rc",
            "color=off",
            "add",
            "Buy",
            "milk",
            "--priority",
            "high",
            "--due",
            "tomorrow",
        ]));

        assert_eq!(cli.rc_overrides[0].key, "color");
        let Some(Command::Add(add)) = cli.command else {
            panic!("expected add command");
        };
        assert_eq!(add.title.join(" "), "Buy milk");
        assert_eq!(add.priority.as_deref(), Some("high"));
        assert_eq!(add.due.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn edit_rejects_conflicting_due_flags() {
        let result = GlobalCli::try_parse_from(args(&[
            "focus",
            "edit",
            "5",
            "--due",
            "today",
            "--clear-due",
        ]));
        assert!(result.is_err());
    }
}
