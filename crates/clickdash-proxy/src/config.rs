use std::net::SocketAddr;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::Context;
use clickdash_core::config::DEFAULT_API_BASE_URL;
use clickdash_core::fetch::{
  DEFAULT_LIST_MAX_PAGES,
  DEFAULT_MAX_PAGES,
  DEFAULT_PAGE_DELAY,
  DEFAULT_PAGE_LIMIT,
  DEFAULT_REQUEST_TIMEOUT,
  FetchOptions
};
use serde::Deserialize;
use tracing::{
  debug,
  info
};

pub const CONFIG_FILE: &str =
  "clickdash-proxy.toml";
pub const CONFIG_ENV_VAR: &str =
  "CLICKDASH_PROXY_CONFIG";
const DEFAULT_LISTEN: &str =
  "127.0.0.1:3000";

/// Server settings read from `clickdash-proxy.toml`; every key is optional.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
  pub listen:               String,
  pub base_url:             String,
  pub page_limit:           usize,
  pub max_pages:            usize,
  pub list_max_pages:       usize,
  pub page_delay_ms:        u64,
  pub request_timeout_secs: u64,
  /// Directory for a daily rolling log file; stdout only when unset.
  pub log_dir:              Option<PathBuf>
}

impl Default for ProxyConfig {
  fn default() -> Self {
    Self {
      listen:               DEFAULT_LISTEN
        .to_string(),
      base_url:             DEFAULT_API_BASE_URL
        .to_string(),
      page_limit:           DEFAULT_PAGE_LIMIT,
      max_pages:            DEFAULT_MAX_PAGES,
      list_max_pages:
        DEFAULT_LIST_MAX_PAGES,
      page_delay_ms:        DEFAULT_PAGE_DELAY
        .as_millis()
        as u64,
      request_timeout_secs:
        DEFAULT_REQUEST_TIMEOUT.as_secs(),
      log_dir:              None
    }
  }
}

impl ProxyConfig {
  /// Loads the first config file found, or defaults when there is none.
  pub fn load() -> anyhow::Result<Self> {
    match candidate_config_paths(
      CONFIG_FILE
    )
    .into_iter()
    .find(|path| path.is_file())
    {
      | Some(path) => {
        Self::load_from(&path)
      }
      | None => {
        info!(
          file = CONFIG_FILE,
          "no proxy config found; using \
           defaults"
        );
        Ok(Self::default())
      }
    }
  }

  pub fn load_from(
    path: &Path
  ) -> anyhow::Result<Self> {
    debug!(path = %path.display(), "reading proxy config");
    let raw = std::fs::read_to_string(
      path
    )
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
    let cfg: Self = toml::from_str(&raw)
      .with_context(|| {
        format!(
          "failed to parse TOML {}",
          path.display()
        )
      })?;
    info!(path = %path.display(), listen = %cfg.listen, "loaded proxy config");
    Ok(cfg)
  }

  pub fn listen_addr(
    &self
  ) -> anyhow::Result<SocketAddr> {
    self.listen.parse().with_context(|| {
      format!(
        "invalid listen address {:?}",
        self.listen
      )
    })
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(
      self.request_timeout_secs.max(1)
    )
  }

  /// Options for `POST /api/clickup-test`.
  pub fn proxy_options(
    &self
  ) -> FetchOptions {
    self.options(self.max_pages)
  }

  /// Options for `GET /api/clickup-tasks`.
  pub fn list_options(&self) -> FetchOptions {
    self.options(self.list_max_pages)
  }

  fn options(
    &self,
    max_pages: usize
  ) -> FetchOptions {
    FetchOptions {
      page_limit: self.page_limit.max(1),
      max_pages,
      page_delay: Duration::from_millis(
        self.page_delay_ms
      )
    }
  }
}

/// `$CLICKDASH_PROXY_CONFIG`, then `rel_path` in the working directory and
/// each of its ancestors.
fn candidate_config_paths(
  rel_path: &str
) -> Vec<PathBuf> {
  let mut candidates =
    Vec::<PathBuf>::new();

  if let Ok(path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = path.trim();
    if !trimmed.is_empty() {
      candidates
        .push(PathBuf::from(trimmed));
    }
  }

  if let Ok(cwd) = std::env::current_dir()
  {
    let mut cursor =
      Some(cwd.as_path());
    while let Some(path) = cursor {
      candidates.push(path.join(rel_path));
      cursor = path.parent();
    }
  }

  candidates
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use tempfile::tempdir;

  use super::ProxyConfig;

  #[test]
  fn partial_file_keeps_defaults() {
    let temp = tempdir().expect("tempdir");
    let path =
      temp.path().join("clickdash-proxy.toml");
    std::fs::write(
      &path,
      "listen = \"0.0.0.0:8080\"\n\
       max_pages = 3\n\
       page_delay_ms = 0\n"
    )
    .expect("write config");

    let cfg = ProxyConfig::load_from(&path)
      .expect("load config");
    assert_eq!(cfg.listen, "0.0.0.0:8080");
    assert_eq!(cfg.list_max_pages, 50);
    assert_eq!(
      cfg.base_url,
      "https://api.clickup.com/api/v2"
    );

    let proxy = cfg.proxy_options();
    assert_eq!(proxy.max_pages, 3);
    assert_eq!(proxy.page_delay, Duration::ZERO);
    assert_eq!(cfg.list_options().max_pages, 50);
    assert_eq!(
      cfg.listen_addr().expect("addr").port(),
      8080
    );
  }

  #[test]
  fn unknown_types_are_rejected() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("bad.toml");
    std::fs::write(&path, "max_pages = \"many\"\n")
      .expect("write config");
    assert!(ProxyConfig::load_from(&path).is_err());
  }
}
