use std::fs;
use std::io::Write;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use clickdash_shared::ProxyRequest;
use serde::{
  Deserialize,
  Serialize
};
use tempfile::NamedTempFile;
use tracing::{
  debug,
  info
};

use crate::config::DEFAULT_API_BASE_URL;
use crate::endpoint::default_task_template;

/// Name of the settings slot inside the data directory.
pub const SETTINGS_SLOT: &str =
  "clickup_api_settings.json";

/// Saved connection settings.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq
)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
  pub api_key:         String,
  pub space_id:        String,
  pub list_id:         String,
  pub endpoint:        String,
  pub fetch_all_pages: bool
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      api_key:         String::new(),
      space_id:        String::new(),
      list_id:         String::new(),
      endpoint:        default_task_template(
        DEFAULT_API_BASE_URL
      ),
      fetch_all_pages: true
    }
  }
}

impl Settings {
  /// Enough to fetch a list's tasks.
  pub fn is_complete(&self) -> bool {
    !self.api_key.trim().is_empty()
      && !self.list_id.trim().is_empty()
  }

  pub fn to_proxy_request(
    &self
  ) -> ProxyRequest {
    ProxyRequest {
      space_id:        Some(
        self.space_id.clone()
      ),
      api_key:         self.api_key.clone(),
      list_id:         Some(
        self.list_id.clone()
      ),
      endpoint:        Some(
        self.endpoint.clone()
      ),
      fetch_all_pages: Some(
        self.fetch_all_pages
      )
    }
  }
}

/// Single-slot JSON store for [`Settings`].
#[derive(Debug)]
pub struct SettingsStore {
  pub data_dir:  PathBuf,
  pub slot_path: PathBuf
}

impl SettingsStore {
  #[tracing::instrument(skip(data_dir))]
  pub fn open(
    data_dir: &Path
  ) -> anyhow::Result<Self> {
    let data_dir = data_dir.to_path_buf();
    fs::create_dir_all(&data_dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          data_dir.display()
        )
      })?;

    let slot_path =
      data_dir.join(SETTINGS_SLOT);
    info!(
      data_dir = %data_dir.display(),
      slot = %slot_path.display(),
      "opened settings store"
    );

    Ok(Self {
      data_dir,
      slot_path
    })
  }

  pub fn has_saved(&self) -> bool {
    self.slot_path.exists()
  }

  #[tracing::instrument(skip(self))]
  pub fn load(
    &self
  ) -> anyhow::Result<Option<Settings>> {
    if !self.slot_path.exists() {
      debug!("no saved settings");
      return Ok(None);
    }
    read_settings(&self.slot_path)
      .map(Some)
      .with_context(|| {
        format!(
          "failed to load {SETTINGS_SLOT}"
        )
      })
  }

  #[tracing::instrument(skip(
    self, settings
  ))]
  pub fn save(
    &self,
    settings: &Settings
  ) -> anyhow::Result<()> {
    write_settings_atomic(
      &self.slot_path,
      settings
    )
    .with_context(|| {
      format!(
        "failed to save {SETTINGS_SLOT}"
      )
    })?;
    info!("settings saved");
    Ok(())
  }

  /// Removes the slot. Returns whether anything was stored.
  #[tracing::instrument(skip(self))]
  pub fn clear(
    &self
  ) -> anyhow::Result<bool> {
    if !self.slot_path.exists() {
      return Ok(false);
    }
    fs::remove_file(&self.slot_path)
      .with_context(|| {
        format!(
          "failed removing {}",
          self.slot_path.display()
        )
      })?;
    info!("settings cleared");
    Ok(true)
  }

  /// Writes the saved settings (or defaults) to `target` as pretty JSON.
  #[tracing::instrument(skip(self), fields(target = %target.display()))]
  pub fn export_to(
    &self,
    target: &Path
  ) -> anyhow::Result<Settings> {
    let settings =
      self.load()?.unwrap_or_default();
    write_settings_atomic(
      target, &settings
    )
    .with_context(|| {
      format!(
        "failed to export settings to {}",
        target.display()
      )
    })?;
    info!("settings exported");
    Ok(settings)
  }

  /// Reads `source` and stores it in the slot.
  #[tracing::instrument(skip(self), fields(source = %source.display()))]
  pub fn import_from(
    &self,
    source: &Path
  ) -> anyhow::Result<Settings> {
    let settings = read_settings(source)
      .with_context(|| {
        format!(
          "invalid settings file {}",
          source.display()
        )
      })?;
    self.save(&settings)?;
    info!("settings imported");
    Ok(settings)
  }
}

fn read_settings(
  path: &Path
) -> anyhow::Result<Settings> {
  debug!(file = %path.display(), "reading settings");
  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed reading {}",
        path.display()
      )
    })?;
  serde_json::from_str(&raw).with_context(
    || {
      format!(
        "failed parsing {}",
        path.display()
      )
    }
  )
}

fn write_settings_atomic(
  path: &Path,
  settings: &Settings
) -> anyhow::Result<()> {
  debug!(file = %path.display(), "writing settings atomically");

  let dir = match path.parent() {
    | Some(parent)
      if !parent.as_os_str().is_empty() =>
    {
      parent
    }
    | _ => Path::new(".")
  };
  let mut temp =
    NamedTempFile::new_in(dir)?;
  let serialized =
    serde_json::to_string_pretty(settings)?;
  writeln!(temp, "{serialized}")?;
  temp.flush()?;

  temp.persist(path).map_err(|err| {
    anyhow!(
      "failed to persist {}: {}",
      path.display(),
      err
    )
  })?;

  Ok(())
}
