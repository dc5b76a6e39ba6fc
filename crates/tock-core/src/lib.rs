pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod notify;
pub mod render;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;
pub mod timefmt;

use std::ffi::OsString;

use anyhow::Context;
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
    "starting tock"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.tockrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  datetime::init_display_zone(
    cfg.get("timezone").as_deref()
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

  let storage =
    storage::JsonFileStorage::open(
      &data_dir
    )?;
  let mut store =
    store::TaskStore::open(storage)
      .with_context(|| {
        format!(
          "failed to open task store \
           at {}",
          data_dir.display()
        )
      })?;

  let renderer =
    render::Renderer::new(&cfg);
  let command = cli.command.unwrap_or(
    cli::Command::List {
      pending:   false,
      completed: false
    }
  );

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    command
  )?;

  info!("done");
  Ok(())
}
