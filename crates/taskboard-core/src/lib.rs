pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod edit_view;
pub mod list_view;
pub mod query;
pub mod render;
pub mod session;
pub mod task;

#[cfg(test)]
mod testing;

use std::ffi::OsString;
use std::io;

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
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskboard CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    base_url = %cfg.api.base_url,
    page_size = cfg.view.page_size,
    "effective config"
  );

  let session =
    session::Session::from_config(&cfg);
  let api = api::HttpTaskApi::new(
    &cfg.api.base_url,
    &session,
    cfg.timeout()
  )?;
  let renderer =
    render::Renderer::from_config(&cfg);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(
    commands::dispatch(
      &api,
      &session,
      &cfg,
      &renderer,
      cli.command,
      io::stdout().lock()
    )
  )?;

  info!("done");
  Ok(())
}
