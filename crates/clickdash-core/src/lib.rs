pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod proxy;
pub mod render;
pub mod settings;
pub mod task;
pub mod validate;

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
    "starting clickdash CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
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

  let store =
    settings::SettingsStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open settings store \
         at {}",
        data_dir.display()
      )
    })?;

  let renderer = render::Renderer::new(
    &cfg,
    *datetime::dashboard_timezone()
  )?;

  commands::dispatch(
    &store,
    &cfg,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
