use std::time::Duration;

use anyhow::Context;
use reqwest::header::{
  AUTHORIZATION,
  CONTENT_TYPE
};
use serde_json::Value;
use tracing::{
  debug,
  info,
  instrument,
  warn
};
use url::Url;

use crate::config::Config;
use crate::endpoint::{
  ensure_pagination_params,
  redact,
  with_page
};
use crate::error::ProxyError;

pub const DEFAULT_PAGE_LIMIT: usize =
  100;
pub const DEFAULT_MAX_PAGES: usize = 10;
pub const DEFAULT_LIST_MAX_PAGES: usize =
  50;
pub const DEFAULT_PAGE_DELAY: Duration =
  Duration::from_millis(100);
pub const DEFAULT_REQUEST_TIMEOUT:
  Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
  /// Page size requested when the URL has no `limit`.
  pub page_limit: usize,
  /// Page ceiling; pagination never issues more requests than this.
  pub max_pages:  usize,
  pub page_delay: Duration
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      page_limit: DEFAULT_PAGE_LIMIT,
      max_pages:  DEFAULT_MAX_PAGES,
      page_delay: DEFAULT_PAGE_DELAY
    }
  }
}

impl FetchOptions {
  /// Options for the proxy endpoint (`fetch.max_pages`).
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    Self::with_ceiling_key(
      cfg,
      "fetch.max_pages",
      DEFAULT_MAX_PAGES
    )
  }

  /// Options for the task-list route (`fetch.list_max_pages`).
  pub fn list_route_from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    Self::with_ceiling_key(
      cfg,
      "fetch.list_max_pages",
      DEFAULT_LIST_MAX_PAGES
    )
  }

  #[must_use]
  pub fn with_max_pages(
    mut self,
    max_pages: usize
  ) -> Self {
    self.max_pages = max_pages;
    self
  }

  fn with_ceiling_key(
    cfg: &Config,
    ceiling_key: &str,
    ceiling_default: usize
  ) -> anyhow::Result<Self> {
    let page_limit = cfg
      .get_u64("fetch.page_limit")?
      .map(|v| v as usize)
      .unwrap_or(DEFAULT_PAGE_LIMIT)
      .max(1);
    let max_pages = cfg
      .get_u64(ceiling_key)?
      .map(|v| v as usize)
      .unwrap_or(ceiling_default);
    let page_delay = cfg
      .get_u64("fetch.page_delay_ms")?
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_PAGE_DELAY);

    Ok(Self {
      page_limit,
      max_pages,
      page_delay
    })
  }
}

/// Result of a paginated fetch.
#[derive(Debug, Clone, Default)]
pub struct Collected {
  pub tasks:           Vec<Value>,
  pub pages_collected: usize
}

#[derive(Debug)]
enum PageBody {
  Json(Value),
  Empty,
  NotJson { content_type: String }
}

/// Sequential GET client for ClickUp task pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
  client:  reqwest::Client,
  options: FetchOptions
}

impl PageFetcher {
  pub fn new(
    client: reqwest::Client,
    options: FetchOptions
  ) -> Self {
    Self { client, options }
  }

  pub fn build_client(
    timeout: Duration
  ) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!(
        "clickdash/",
        env!("CARGO_PKG_VERSION")
      ))
      .build()
      .context(
        "failed building HTTP client \
         for ClickUp"
      )
  }

  pub fn options(&self) -> &FetchOptions {
    &self.options
  }

  /// Same client, capped at a single page request.
  #[must_use]
  pub fn single_page(&self) -> Self {
    Self {
      client:  self.client.clone(),
      options: self
        .options
        .clone()
        .with_max_pages(1)
    }
  }

  /// Walks pages 0, 1, 2, ... until a short page, an empty or non-JSON
  /// body, a body without a `tasks` array, or the page ceiling.
  ///
  /// A failing page aborts the whole call; the error carries the number of
  /// tasks gathered so far but not the tasks.
  #[instrument(skip(self, url, authorization), fields(url = %url, max_pages = self.options.max_pages))]
  pub async fn fetch_all(
    &self,
    url: &Url,
    authorization: &str
  ) -> Result<Collected, ProxyError> {
    let (base, limit) =
      ensure_pagination_params(
        url,
        self.options.page_limit
      );

    let mut collected =
      Collected::default();

    for page in 0..self.options.max_pages
    {
      if page > 0
        && !self
          .options
          .page_delay
          .is_zero()
      {
        tokio::time::sleep(
          self.options.page_delay
        )
        .await;
      }

      let page_url =
        with_page(&base, page);
      debug!(page, url = %page_url, "fetching page");

      let body = self
        .get(&page_url, authorization)
        .await
        .map_err(|err| {
          warn!(
            page,
            collected = collected.tasks.len(),
            error = %err,
            "page request failed; \
             aborting pagination"
          );
          err.with_collected(
            collected.tasks.len()
          )
        })?;

      let value = match body {
        | PageBody::Json(value) => value,
        | PageBody::Empty => {
          info!(
            page,
            "empty response; no more \
             pages"
          );
          break;
        }
        | PageBody::NotJson {
          content_type
        } => {
          info!(
            page,
            content_type = %content_type,
            "non-JSON response; no more \
             pages"
          );
          break;
        }
      };

      let Some(items) =
        take_task_array(value)
      else {
        info!(
          page,
          "response has no tasks \
           array; stopping"
        );
        break;
      };

      let count = items.len();
      collected.tasks.extend(items);
      collected.pages_collected += 1;
      info!(
        page,
        count,
        total = collected.tasks.len(),
        "collected page"
      );

      if count < limit {
        debug!(
          page,
          count,
          limit,
          "short page; last page \
           reached"
        );
        break;
      }

      if page + 1
        == self.options.max_pages
      {
        warn!(
          max_pages = self
            .options
            .max_pages,
          "page ceiling reached; \
           stopping"
        );
      }
    }

    Ok(collected)
  }

  /// One GET of `url` exactly as given.
  #[instrument(skip(self, url, authorization), fields(url = %url))]
  pub async fn fetch_one(
    &self,
    url: &Url,
    authorization: &str
  ) -> Result<Value, ProxyError> {
    match self
      .get(url, authorization)
      .await?
    {
      | PageBody::Json(value) => {
        Ok(value)
      }
      | PageBody::Empty => {
        Err(ProxyError::ParseFailed {
          url:       url.to_string(),
          detail:    "empty response body"
            .to_string(),
          collected: None
        })
      }
      | PageBody::NotJson {
        content_type
      } => {
        Err(ProxyError::ParseFailed {
          url:       url.to_string(),
          detail:    format!(
            "unexpected content type: \
             {content_type}"
          ),
          collected: None
        })
      }
    }
  }

  async fn get(
    &self,
    url: &Url,
    authorization: &str
  ) -> Result<PageBody, ProxyError> {
    debug!(
      url = %url,
      authorization = %redact(authorization, 20),
      "sending ClickUp request"
    );

    let response = self
      .client
      .get(url.clone())
      .header(
        AUTHORIZATION,
        authorization
      )
      .header(
        CONTENT_TYPE,
        "application/json"
      )
      .send()
      .await
      .map_err(|source| {
        ProxyError::Transport {
          url: url.to_string(),
          source,
          collected: None
        }
      })?;

    let status = response.status();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    let text =
      response.text().await.map_err(
        |source| ProxyError::Transport {
          url: url.to_string(),
          source,
          collected: None
        }
      )?;

    if !status.is_success() {
      let body = error_body(
        content_type.as_deref(),
        &text
      );
      warn!(
        status = status.as_u16(),
        url = %url,
        body = %body,
        "ClickUp API returned an error"
      );
      return Err(ProxyError::Upstream {
        status: status.as_u16(),
        reason: status
          .canonical_reason()
          .unwrap_or("")
          .to_string(),
        body,
        url: url.to_string(),
        collected: None
      });
    }

    if text.trim().is_empty() {
      return Ok(PageBody::Empty);
    }

    if let Some(ct) =
      content_type.as_deref()
      && !ct
        .to_ascii_lowercase()
        .contains("json")
    {
      return Ok(PageBody::NotJson {
        content_type: ct.to_string()
      });
    }

    serde_json::from_str(&text)
      .map(PageBody::Json)
      .map_err(|err| {
        warn!(
          error = %err,
          preview = %preview(&text, 200),
          "failed parsing ClickUp JSON"
        );
        ProxyError::ParseFailed {
          url:       url.to_string(),
          detail:    err.to_string(),
          collected: None
        }
      })
  }
}

fn take_task_array(
  value: Value
) -> Option<Vec<Value>> {
  match value {
    | Value::Object(mut map) => {
      match map.remove("tasks") {
        | Some(Value::Array(items)) => {
          Some(items)
        }
        | _ => None
      }
    }
    | _ => None
  }
}

/// Error bodies are decoded as JSON when labelled so, otherwise kept as text.
fn error_body(
  content_type: Option<&str>,
  text: &str
) -> Value {
  let is_json = content_type
    .map(|ct| {
      ct.to_ascii_lowercase()
        .contains("application/json")
    })
    .unwrap_or(false);
  if is_json
    && let Ok(value) =
      serde_json::from_str::<Value>(text)
  {
    return value;
  }
  Value::String(text.to_string())
}

fn preview(
  text: &str,
  max_chars: usize
) -> String {
  let mut out: String =
    text.chars().take(max_chars).collect();
  if text.chars().count() > max_chars {
    out.push_str("...");
  }
  out
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::{
    FetchOptions,
    error_body,
    take_task_array
  };
  use crate::config::Config;

  #[test]
  fn options_follow_config() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "fetch.page_delay_ms".to_string(),
        "0".to_string()
      ),
      (
        "fetch.max_pages".to_string(),
        "4".to_string()
      )
    ]);

    let opts = FetchOptions::from_config(&cfg)
      .expect("options");
    assert_eq!(opts.max_pages, 4);
    assert_eq!(opts.page_limit, 100);
    assert!(opts.page_delay.is_zero());

    let list = FetchOptions::list_route_from_config(&cfg)
      .expect("list options");
    assert_eq!(list.max_pages, 50);
  }

  #[test]
  fn task_array_extraction() {
    assert_eq!(
      take_task_array(json!({ "tasks": [1, 2] }))
        .map(|t| t.len()),
      Some(2)
    );
    assert!(
      take_task_array(json!({ "tasks": "nope" }))
        .is_none()
    );
    assert!(take_task_array(json!([1])).is_none());
  }

  #[test]
  fn error_body_prefers_json() {
    assert_eq!(
      error_body(
        Some("application/json; charset=utf-8"),
        r#"{"err":"Token invalid","ECODE":"OAUTH_025"}"#
      )["ECODE"],
      json!("OAUTH_025")
    );
    assert_eq!(
      error_body(Some("text/html"), "<h1>oops</h1>"),
      json!("<h1>oops</h1>")
    );
  }
}
