use std::io::{
  self,
  Write
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Utc;
use clickdash_shared::TasksQuery;
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::cli::{
  Command,
  RequestArgs,
  SaveArgs,
  SettingsCommand
};
use crate::config::Config;
use crate::endpoint::PREDEFINED_ENDPOINTS;
use crate::fetch::{
  DEFAULT_REQUEST_TIMEOUT,
  PageFetcher
};
use crate::proxy::ProxyService;
use crate::render::{
  Renderer,
  TaskView
};
use crate::settings::{
  Settings,
  SettingsStore
};
use crate::task::{
  Task,
  tasks_from_values
};

#[instrument(skip(
  store, cfg, renderer, command
))]
pub fn dispatch(
  store: &SettingsStore,
  cfg: &Config,
  renderer: &Renderer,
  command: Command
) -> anyhow::Result<()> {
  debug!(?command, "dispatching command");

  match command {
    | Command::Settings(sub) => {
      cmd_settings(store, renderer, sub)
    }
    | Command::Endpoints => {
      cmd_endpoints(cfg, renderer)
    }
    | Command::Request(args) => {
      cmd_request(store, cfg, &args)
    }
    | Command::Tasks {
      view
    } => {
      cmd_tasks(
        store,
        cfg,
        renderer,
        view.into()
      )
    }
    | Command::Dashboard => {
      cmd_dashboard(store, cfg, renderer)
    }
  }
}

fn cmd_settings(
  store: &SettingsStore,
  renderer: &Renderer,
  sub: SettingsCommand
) -> anyhow::Result<()> {
  let mut out = io::stdout().lock();

  match sub {
    | SettingsCommand::Show => {
      let settings = match store.load()? {
        | Some(settings) => settings,
        | None => {
          writeln!(
            out,
            "No saved settings; showing \
             defaults."
          )?;
          Settings::default()
        }
      };
      renderer
        .write_settings(&mut out, &settings)?;
    }
    | SettingsCommand::Save(args) => {
      let settings = merge_settings(
        store.load()?.unwrap_or_default(),
        args
      );
      store.save(&settings)?;
      writeln!(
        out,
        "Settings saved to {}",
        store.slot_path.display()
      )?;
      if !settings.is_complete() {
        warn!(
          "saved settings lack an API key \
           or list id"
        );
        writeln!(
          out,
          "Note: an API key and a list id \
           are needed to fetch tasks."
        )?;
      }
    }
    | SettingsCommand::Clear => {
      if store.clear()? {
        writeln!(out, "Settings cleared.")?;
      } else {
        writeln!(out, "No saved settings.")?;
      }
    }
    | SettingsCommand::Export {
      file
    } => {
      store.export_to(&file)?;
      writeln!(
        out,
        "Settings exported to {}",
        file.display()
      )?;
    }
    | SettingsCommand::Import {
      file
    } => {
      let settings =
        store.import_from(&file)?;
      writeln!(
        out,
        "Settings imported from {}",
        file.display()
      )?;
      renderer
        .write_settings(&mut out, &settings)?;
    }
  }

  Ok(())
}

/// Applies the fields given on the command line over `base`.
fn merge_settings(
  mut base: Settings,
  args: SaveArgs
) -> Settings {
  if let Some(api_key) = args.api_key {
    base.api_key = api_key.trim().to_string();
  }
  if let Some(list_id) = args.list_id {
    base.list_id = list_id.trim().to_string();
  }
  if let Some(space_id) = args.space_id {
    base.space_id =
      space_id.trim().to_string();
  }
  if let Some(endpoint) = args.endpoint {
    base.endpoint =
      endpoint.trim().to_string();
  }
  if let Some(fetch_all_pages) =
    args.fetch_all_pages
  {
    base.fetch_all_pages = fetch_all_pages;
  }
  base
}

fn cmd_endpoints(
  cfg: &Config,
  renderer: &Renderer
) -> anyhow::Result<()> {
  let mut out = io::stdout().lock();
  renderer.write_endpoints(
    &mut out,
    PREDEFINED_ENDPOINTS,
    &cfg.api_base_url()
  )
}

fn cmd_request(
  store: &SettingsStore,
  cfg: &Config,
  args: &RequestArgs
) -> anyhow::Result<()> {
  let settings =
    store.load()?.unwrap_or_default();
  let mut req = settings.to_proxy_request();
  if let Some(endpoint) = &args.endpoint {
    req.endpoint = Some(endpoint.clone());
  }
  if let Some(all) = args.fetch_all_pages() {
    req.fetch_all_pages = Some(all);
  }

  let service = build_service(cfg)?;
  let runtime = build_runtime()?;
  let result =
    runtime.block_on(service.forward(&req));

  let mut out = io::stdout().lock();
  match result {
    | Ok(success) => {
      writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(
          &success
        )?
      )?;
      Ok(())
    }
    | Err(err) => {
      let status = err.status_code();
      writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(
          &err.to_failure()
        )?
      )?;
      Err(anyhow::Error::new(err).context(
        format!(
          "request failed with HTTP {status}"
        )
      ))
    }
  }
}

fn cmd_tasks(
  store: &SettingsStore,
  cfg: &Config,
  renderer: &Renderer,
  view: TaskView
) -> anyhow::Result<()> {
  let tasks = fetch_saved_list(store, cfg)?;
  let mut out = io::stdout().lock();
  renderer.write_tasks(&mut out, &tasks, view)
}

fn cmd_dashboard(
  store: &SettingsStore,
  cfg: &Config,
  renderer: &Renderer
) -> anyhow::Result<()> {
  let tasks = fetch_saved_list(store, cfg)?;
  let mut out = io::stdout().lock();
  renderer.write_dashboard(
    &mut out,
    &tasks,
    Utc::now()
  )
}

/// All tasks of the saved list, via the list route with pagination on.
#[instrument(skip(store, cfg))]
fn fetch_saved_list(
  store: &SettingsStore,
  cfg: &Config
) -> anyhow::Result<Vec<Task>> {
  let settings =
    store.load()?.ok_or_else(|| {
      anyhow!(
        "no saved settings; run `clickdash \
         settings save` first"
      )
    })?;
  if !settings.is_complete() {
    return Err(anyhow!(
      "saved settings need both an API key \
       and a list id"
    ));
  }

  let query = TasksQuery {
    api_key:         Some(
      settings.api_key.clone()
    ),
    space_id:        Some(
      settings.space_id.clone()
    ),
    list_id:         Some(
      settings.list_id.clone()
    ),
    fetch_all_pages: Some("true".to_string())
  };

  let service = build_service(cfg)?;
  let runtime = build_runtime()?;
  let response = runtime
    .block_on(service.list_tasks(&query))
    .context(
      "failed to fetch tasks from ClickUp"
    )?;

  info!(
    tasks = response.total_tasks,
    pages = response.pages_processed,
    "fetched task list"
  );
  Ok(tasks_from_values(&response.tasks))
}

fn build_service(
  cfg: &Config
) -> anyhow::Result<ProxyService> {
  let client = PageFetcher::build_client(
    DEFAULT_REQUEST_TIMEOUT
  )?;
  ProxyService::from_config(cfg, client)
}

fn build_runtime()
-> anyhow::Result<tokio::runtime::Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("failed to start async runtime")
}

#[cfg(test)]
mod tests {
  use super::merge_settings;
  use crate::cli::SaveArgs;
  use crate::settings::Settings;

  #[test]
  fn merge_keeps_unspecified_fields() {
    let base = Settings {
      api_key: "pk_old".to_string(),
      list_id: "1".to_string(),
      ..Settings::default()
    };
    let merged = merge_settings(
      base.clone(),
      SaveArgs {
        list_id: Some(" 901 ".to_string()),
        fetch_all_pages: Some(false),
        ..SaveArgs::default()
      }
    );
    assert_eq!(merged.api_key, "pk_old");
    assert_eq!(merged.list_id, "901");
    assert!(!merged.fetch_all_pages);
    assert_eq!(
      merged.endpoint,
      base.endpoint
    );
  }
}
