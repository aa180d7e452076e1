use chrono::{
  SecondsFormat,
  Utc
};
use clickdash_shared::{
  ProxyData,
  ProxyRequest,
  ProxySuccess,
  RequestInfo,
  TaskPage,
  TasksListResponse,
  TasksQuery
};
use serde_json::Value;
use tracing::{
  info,
  instrument
};
use uuid::Uuid;

use crate::config::Config;
use crate::endpoint::{
  authorization_value,
  default_task_template,
  parse_url,
  redact,
  substitute,
  task_list_url
};
use crate::error::ProxyError;
use crate::fetch::{
  FetchOptions,
  PageFetcher
};
use crate::validate::{
  require_api_key,
  validate_for_template,
  validate_list_id
};

/// Validates proxy requests and forwards them to ClickUp.
#[derive(Debug, Clone)]
pub struct ProxyService {
  base_url:     String,
  fetcher:      PageFetcher,
  list_fetcher: PageFetcher
}

impl ProxyService {
  pub fn new(
    client: reqwest::Client,
    base_url: impl Into<String>,
    proxy_options: FetchOptions,
    list_options: FetchOptions
  ) -> Self {
    Self {
      base_url:     base_url
        .into()
        .trim_end_matches('/')
        .to_string(),
      fetcher:      PageFetcher::new(
        client.clone(),
        proxy_options
      ),
      list_fetcher: PageFetcher::new(
        client,
        list_options
      )
    }
  }

  pub fn from_config(
    cfg: &Config,
    client: reqwest::Client
  ) -> anyhow::Result<Self> {
    Ok(Self::new(
      client,
      cfg.api_base_url(),
      FetchOptions::from_config(cfg)?,
      FetchOptions::list_route_from_config(
        cfg
      )?
    ))
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// `POST /api/clickup-test`: validate, resolve the endpoint template and
  /// forward, optionally across pages.
  #[instrument(skip(self, req), fields(list_id = ?req.list_id(), space_id = ?req.space_id(), fetch_all_pages = req.fetch_all_pages()))]
  pub async fn forward(
    &self,
    req: &ProxyRequest
  ) -> Result<ProxySuccess, ProxyError> {
    let api_key =
      require_api_key(&req.api_key)?;
    let template = req
      .endpoint()
      .map(str::to_string)
      .unwrap_or_else(|| {
        default_task_template(
          &self.base_url
        )
      });

    validate_for_template(
      &template,
      req.list_id(),
      req.space_id()
    )?;

    let resolved = substitute(
      &template,
      req.list_id(),
      req.space_id()
    );
    let url = parse_url(&resolved)?;
    let authorization =
      authorization_value(api_key);
    let request_id = Uuid::new_v4();

    info!(
      %request_id,
      url = %url,
      api_key = %redact(api_key, 10),
      "forwarding ClickUp request"
    );

    let data = if req.fetch_all_pages() {
      let collected = self
        .fetcher
        .fetch_all(&url, &authorization)
        .await?;
      ProxyData::Tasks(TaskPage::new(
        collected.tasks,
        collected.pages_collected
      ))
    } else {
      let value = self
        .fetcher
        .fetch_one(&url, &authorization)
        .await?;
      single_page_data(value)
    };

    Ok(ProxySuccess {
      success: true,
      data,
      request_info: RequestInfo {
        space_id: req
          .space_id()
          .map(str::to_string),
        list_id: req
          .list_id()
          .map(str::to_string),
        endpoint: resolved,
        timestamp: Utc::now()
          .to_rfc3339_opts(
            SecondsFormat::Millis,
            true
          ),
        request_id
      }
    })
  }

  /// `GET /api/clickup-tasks`: the list-scoped route with the higher page
  /// ceiling.
  #[instrument(skip(self, query), fields(list_id = ?query.list_id(), fetch_all_pages = query.fetch_all_pages()))]
  pub async fn list_tasks(
    &self,
    query: &TasksQuery
  ) -> Result<TasksListResponse, ProxyError>
  {
    let api_key = query
      .api_key()
      .ok_or(ProxyError::MissingApiKey)?;
    let list_id = query
      .list_id()
      .ok_or(ProxyError::MissingListId)?;
    validate_list_id(list_id)?;

    let url = parse_url(&task_list_url(
      &self.base_url,
      list_id
    ))?;
    let authorization =
      authorization_value(api_key);
    let fetch_all_pages =
      query.fetch_all_pages();

    info!(
      url = %url,
      api_key = %redact(api_key, 10),
      fetch_all_pages,
      "listing ClickUp tasks"
    );

    let collected = if fetch_all_pages {
      self
        .list_fetcher
        .fetch_all(&url, &authorization)
        .await?
    } else {
      self
        .list_fetcher
        .single_page()
        .fetch_all(&url, &authorization)
        .await?
    };

    Ok(TasksListResponse {
      total_tasks: collected.tasks.len(),
      tasks: collected.tasks,
      pages_processed: collected
        .pages_collected
        .max(1),
      fetch_all_pages
    })
  }
}

/// Task endpoints become a one-page [`TaskPage`]; other payloads pass through.
fn single_page_data(
  value: Value
) -> ProxyData {
  match value {
    | Value::Object(mut map)
      if matches!(
        map.get("tasks"),
        Some(Value::Array(_))
      ) =>
    {
      let tasks = match map.remove("tasks")
      {
        | Some(Value::Array(items)) => {
          items
        }
        | _ => Vec::new()
      };
      ProxyData::Tasks(TaskPage::new(
        tasks, 1
      ))
    }
    | other => ProxyData::Raw(other)
  }
}
