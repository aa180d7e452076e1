use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{
  ArgAction,
  Args,
  Parser,
  Subcommand,
  ValueEnum
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::render::TaskView;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
  pub cleaned_args: Vec<OsString>,
  pub rc_overrides: Vec<(String, String)>
}

#[derive(Debug, Clone)]
pub struct KeyVal {
  pub key:   String,
  pub value: String
}

impl std::str::FromStr for KeyVal {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let (k, v) =
      s.split_once('=').ok_or_else(|| {
        anyhow!("expected KEY=VALUE, got: {s}")
      })?;
    Ok(Self {
      key:   k.trim().to_string(),
      value: v.trim().to_string()
    })
  }
}

#[derive(Parser, Debug, Clone)]
#[command(
  name = "clickdash",
  version,
  about = "ClickUp task dashboard and API proxy client",
  disable_help_subcommand = true
)]
pub struct GlobalCli {
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    global = true
  )]
  pub verbose: u8,

  #[arg(
    short = 'q',
    long = "quiet",
    action = ArgAction::Count,
    global = true
  )]
  pub quiet: u8,

  #[arg(
    long = "rc",
    value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
    action = ArgAction::Append,
    global = true
  )]
  pub rc_overrides: Vec<KeyVal>,

  #[arg(long = "rcfile", global = true)]
  pub rcfile: Option<PathBuf>,

  #[arg(long = "data", global = true)]
  pub data: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Show or change the saved ClickUp connection settings.
  #[command(subcommand)]
  Settings(SettingsCommand),

  /// List the predefined endpoint templates.
  Endpoints,

  /// Send the saved settings through the proxy logic and print the JSON
  /// response.
  Request(RequestArgs),

  /// Fetch every task of the saved list and print it grouped by status.
  Tasks {
    #[arg(
      long,
      value_enum,
      default_value_t = ViewArg::Table
    )]
    view: ViewArg
  },

  /// Fetch every task of the saved list and print the dashboard.
  Dashboard
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
  Show,
  Save(SaveArgs),
  Clear,
  Export {
    file: PathBuf
  },
  Import {
    file: PathBuf
  }
}

#[derive(Args, Debug, Clone, Default)]
pub struct SaveArgs {
  #[arg(long)]
  pub api_key: Option<String>,

  #[arg(long)]
  pub list_id: Option<String>,

  #[arg(long)]
  pub space_id: Option<String>,

  #[arg(long)]
  pub endpoint: Option<String>,

  #[arg(long, action = ArgAction::Set)]
  pub fetch_all_pages: Option<bool>
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
  /// Endpoint template; `{listId}` and `{spaceId}` are substituted.
  #[arg(long)]
  pub endpoint: Option<String>,

  #[arg(
    long,
    conflicts_with = "single_page"
  )]
  pub all_pages: bool,

  #[arg(long)]
  pub single_page: bool
}

impl RequestArgs {
  /// Explicit page mode, if one was asked for.
  pub fn fetch_all_pages(
    &self
  ) -> Option<bool> {
    if self.all_pages {
      Some(true)
    } else if self.single_page {
      Some(false)
    } else {
      None
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  ValueEnum
)]
pub enum ViewArg {
  Table,
  Cards
}

impl From<ViewArg> for TaskView {
  fn from(value: ViewArg) -> Self {
    match value {
      | ViewArg::Table => TaskView::Table,
      | ViewArg::Cards => TaskView::Cards
    }
  }
}

pub fn init_tracing(
  verbose: u8,
  quiet: u8
) -> anyhow::Result<()> {
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

  let env_filter =
    EnvFilter::try_from_default_env()
      .or_else(|_| {
        EnvFilter::try_new(default_level)
      })
      .map_err(|e| {
        anyhow!(
          "invalid RUST_LOG / log filter: {e}"
        )
      })?;

  let init_result = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .with_target(true)
    .with_level(true)
    .with_ansi(
      std::io::stderr().is_terminal()
    )
    .try_init();

  if let Err(err) = init_result {
    debug!(error = %err, "tracing subscriber already set, continuing");
  }

  Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(
  raw: &[OsString]
) -> anyhow::Result<PreprocessedArgs> {
  let mut cleaned =
    Vec::with_capacity(raw.len());
  let mut overrides: Vec<(String, String)> =
    Vec::new();

  let mut iter = raw.iter().cloned();
  if let Some(bin) = iter.next() {
    cleaned.push(bin);
  }

  for arg in iter {
    let s = arg.to_string_lossy();
    if let Some(rest) = s.strip_prefix("rc.")
    {
      let parsed = rest
        .split_once('=')
        .or_else(|| rest.split_once(':'))
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        });

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
    rc_overrides: overrides
  })
}
