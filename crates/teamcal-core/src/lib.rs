pub mod cli;
pub mod commands;
pub mod config;
pub mod datemath;
pub mod event;
pub mod filter;
pub mod render;
pub mod session;
pub mod storage;
pub mod store;
pub mod team;
pub mod validate;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::event::{
  Event,
  EventFields,
  SlotFields
};
pub use crate::filter::OwnerFilter;
pub use crate::session::{
  CalendarSession,
  SubmitOutcome
};
pub use crate::store::EventStore;
pub use crate::view::{
  CalendarView,
  build_view
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
    "starting teamcal"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  debug!(overrides = cli.rc_overrides.len(), "applying rc overrides");
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

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
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })?;
  let store = store::EventStore::open(
    storage,
    &cfg.storage.key
  );

  let renderer: Box<
    dyn session::Renderer
  > = if cli.json {
    Box::new(render::JsonRenderer::new(
      std::io::stdout()
    ))
  } else {
    Box::new(
      render::TerminalRenderer::stdout()
    )
  };
  let confirm: Box<
    dyn session::Confirm
  > = if cli.yes {
    Box::new(session::AssumeYes)
  } else {
    Box::new(commands::StdinConfirm)
  };

  let mut session =
    session::CalendarSession::new(
      store,
      cfg.team(),
      Box::new(session::SystemClock),
      confirm,
      renderer
    )
    .with_preview_limit(
      cfg.view.preview_limit
    );

  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::Show(
        cli::ShowArgs::default()
      )
    });

  commands::dispatch(
    &mut session,
    &cfg,
    command,
    commands::OutputOptions {
      json: cli.json
    }
  )?;

  info!("done");
  Ok(())
}
