pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod datetime;
pub mod export;
pub mod kv;
pub mod query;
pub mod render;
pub mod seed;
pub mod stats;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting focus CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let kv = kv::FileKv::open(&data_dir)
    .with_context(|| {
      format!(
        "failed to open data directory \
         {}",
        data_dir.display()
      )
    })?;

  let tz = datetime::resolve_timezone(
    cfg.get("timezone").as_deref()
  );
  let now = Utc::now();
  let store = store::Store::open(
    kv,
    datetime::today_in(&tz, now),
    now
  );

  let command = cli.command.unwrap_or(
    cli::Command::List(
      cli::ListArgs::default()
    )
  );
  let renderer =
    render::TerminalRenderer::stdout(
      &cfg,
      commands::sections_for(&command)
    )?;

  let mut controller =
    controller::Controller::new(
      store,
      renderer,
      tz,
      commands::initial_view(&cfg)
    );

  commands::dispatch(
    &mut controller,
    &cfg,
    command,
    now
  )
}
