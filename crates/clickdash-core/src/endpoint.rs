//! Endpoint templates, placeholder substitution and request decoration.

use url::Url;

use crate::error::ProxyError;
use crate::validate::{
  LIST_PLACEHOLDER,
  SPACE_PLACEHOLDER
};

/// Prefix of ClickUp personal tokens; these go into `Authorization` as-is.
pub const PERSONAL_TOKEN_PREFIX: &str =
  "pk_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredefinedEndpoint {
  pub name:            &'static str,
  /// Path and query appended to the API base URL; empty for a custom URL.
  pub path:            &'static str,
  pub description:     &'static str,
  pub fetch_all_pages: bool
}

impl PredefinedEndpoint {
  pub fn template(
    &self,
    base_url: &str
  ) -> Option<String> {
    if self.path.is_empty() {
      None
    } else {
      Some(format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        self.path
      ))
    }
  }
}

pub const PREDEFINED_ENDPOINTS: &[PredefinedEndpoint] = &[
  PredefinedEndpoint {
    name:            "Get All Tasks (All Pages)",
    path:            "/list/{listId}/task?include_closed=true&limit=100",
    description:     "Every task in the list, following pages past the first 100",
    fetch_all_pages: true
  },
  PredefinedEndpoint {
    name:            "Get Tasks from List (All Status)",
    path:            "/list/{listId}/task?include_closed=true&limit=100",
    description:     "Tasks in every status, first page only (up to 100)",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Get Tasks from List (Open Only)",
    path:            "/list/{listId}/task",
    description:     "Open tasks in the list",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Get Tasks from List (More Results)",
    path:            "/list/{listId}/task?include_closed=true&limit=100&page=0",
    description:     "A single page; adjust the page parameter by hand",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Get Space Details",
    path:            "/space/{spaceId}",
    description:     "Space metadata",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Get Lists in Space",
    path:            "/space/{spaceId}/list",
    description:     "All lists in the space",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Get List Details",
    path:            "/list/{listId}",
    description:     "List metadata",
    fetch_all_pages: false
  },
  PredefinedEndpoint {
    name:            "Custom Endpoint",
    path:            "",
    description:     "Any URL; {listId} and {spaceId} are substituted",
    fetch_all_pages: false
  }
];

/// Template used when a request names no endpoint.
pub fn default_task_template(
  base_url: &str
) -> String {
  format!(
    "{}/list/{LIST_PLACEHOLDER}/task?include_closed=true&limit=100",
    base_url.trim_end_matches('/')
  )
}

/// Task-list URL for an already validated list id.
pub fn task_list_url(
  base_url: &str,
  list_id: &str
) -> String {
  format!(
    "{}/list/{list_id}/task?include_closed=true&limit=100",
    base_url.trim_end_matches('/')
  )
}

/// Fills `{listId}` / `{spaceId}`. Ids must be validated beforehand.
pub fn substitute(
  template: &str,
  list_id: Option<&str>,
  space_id: Option<&str>
) -> String {
  let mut out = template.to_string();
  if let Some(space_id) = space_id {
    out =
      out.replace(SPACE_PLACEHOLDER, space_id);
  }
  if let Some(list_id) = list_id {
    out = out.replace(LIST_PLACEHOLDER, list_id);
  }
  out
}

pub fn parse_url(
  raw: &str
) -> Result<Url, ProxyError> {
  Url::parse(raw).map_err(|source| {
    ProxyError::InvalidEndpoint {
      url: raw.to_string(),
      source
    }
  })
}

/// `Authorization` value: personal tokens raw, anything else as Bearer.
pub fn authorization_value(
  api_key: &str
) -> String {
  let key = api_key.trim();
  if key.starts_with(PERSONAL_TOKEN_PREFIX) {
    key.to_string()
  } else {
    format!("Bearer {key}")
  }
}

/// Prefix of a secret that is safe to log.
pub fn redact(
  secret: &str,
  keep: usize
) -> String {
  let prefix: String =
    secret.chars().take(keep).collect();
  format!("{prefix}...")
}

fn parse_limit(raw: &str) -> Option<usize> {
  raw
    .trim()
    .parse::<usize>()
    .ok()
    .filter(|limit| *limit > 0)
}

/// Adds `limit` and `include_closed` when absent and returns the limit the
/// URL ends up with. A `limit` that is not a positive integer is replaced by
/// `default_limit` so the page size sent upstream matches the one used to
/// detect a short page.
pub fn ensure_pagination_params(
  url: &Url,
  default_limit: usize
) -> (Url, usize) {
  let mut limit = None;
  let mut bad_limit = false;
  let mut has_include_closed = false;

  for (key, value) in url.query_pairs() {
    match key.as_ref() {
      | "limit" => {
        match parse_limit(&value) {
          | Some(parsed) => {
            limit.get_or_insert(parsed);
          }
          | None => bad_limit = true
        }
      }
      | "include_closed" => {
        has_include_closed = true
      }
      | _ => {}
    }
  }

  let mut out = if bad_limit {
    tracing::warn!(
      default_limit,
      "replacing invalid limit parameter"
    );
    without_param(url, "limit")
  } else {
    url.clone()
  };

  let limit = match limit {
    | Some(limit) if !bad_limit => limit,
    | _ => {
      out.query_pairs_mut().append_pair(
        "limit",
        &default_limit.to_string()
      );
      default_limit.max(1)
    }
  };
  if !has_include_closed {
    out
      .query_pairs_mut()
      .append_pair("include_closed", "true");
  }

  (out, limit)
}

fn kept_pairs(
  url: &Url,
  drop: &str
) -> Vec<(String, String)> {
  url
    .query_pairs()
    .filter(|(key, _)| key != drop)
    .map(|(key, value)| {
      (key.into_owned(), value.into_owned())
    })
    .collect()
}

fn without_param(url: &Url, drop: &str) -> Url {
  let kept = kept_pairs(url, drop);
  let mut out = url.clone();
  out.set_query(None);
  if !kept.is_empty() {
    out.query_pairs_mut().extend_pairs(&kept);
  }
  out
}

/// Same URL with `page=<n>` replacing any existing page parameter.
pub fn with_page(
  url: &Url,
  page: usize
) -> Url {
  let mut out = without_param(url, "page");
  out
    .query_pairs_mut()
    .append_pair("page", &page.to_string());
  out
}
