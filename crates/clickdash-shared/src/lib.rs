//! Wire types shared by the proxy server and the in-process CLI client.
//!
//! Field names follow the dashboard's JSON contract (camelCase), so a
//! browser front end and the `clickdash` CLI read the same payloads.

use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;
use uuid::Uuid;

/// Body of `POST /api/clickup-test`.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
  #[serde(default)]
  pub space_id:        Option<String>,
  #[serde(default)]
  pub api_key:         String,
  #[serde(default)]
  pub list_id:         Option<String>,
  #[serde(default)]
  pub endpoint:        Option<String>,
  #[serde(default)]
  pub fetch_all_pages: Option<bool>
}

impl ProxyRequest {
  pub fn space_id(&self) -> Option<&str> {
    non_empty(self.space_id.as_deref())
  }

  pub fn list_id(&self) -> Option<&str> {
    non_empty(self.list_id.as_deref())
  }

  pub fn endpoint(&self) -> Option<&str> {
    non_empty(self.endpoint.as_deref())
  }

  pub fn fetch_all_pages(&self) -> bool {
    self.fetch_all_pages.unwrap_or(false)
  }
}

/// Query string of `GET /api/clickup-tasks`.
#[derive(
  Debug, Clone, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TasksQuery {
  pub api_key:         Option<String>,
  pub space_id:        Option<String>,
  pub list_id:         Option<String>,
  pub fetch_all_pages: Option<String>
}

impl TasksQuery {
  pub fn api_key(&self) -> Option<&str> {
    non_empty(self.api_key.as_deref())
  }

  pub fn list_id(&self) -> Option<&str> {
    non_empty(self.list_id.as_deref())
  }

  /// Only the literal `true` enables pagination.
  pub fn fetch_all_pages(&self) -> bool {
    self.fetch_all_pages.as_deref()
      == Some("true")
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
  pub tasks:           Vec<Value>,
  pub total_tasks:     usize,
  pub pages_collected: usize
}

impl TaskPage {
  pub fn new(
    tasks: Vec<Value>,
    pages_collected: usize
  ) -> Self {
    Self {
      total_tasks: tasks.len(),
      tasks,
      pages_collected
    }
  }
}

/// Task endpoints come back as a [`TaskPage`]; anything else (space or
/// list details) is passed through untouched.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(untagged)]
pub enum ProxyData {
  Tasks(TaskPage),
  Raw(Value)
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
  pub space_id:   Option<String>,
  pub list_id:    Option<String>,
  pub endpoint:   String,
  pub timestamp:  String,
  pub request_id: Uuid
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct ProxySuccess {
  pub success:      bool,
  pub data:         ProxyData,
  pub request_info: RequestInfo
}

/// Error body shared by every route.
#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct ProxyFailure {
  pub error:             String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub details:           Option<Value>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub request_url:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub provided_list_id:  Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub provided_space_id: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub collected_tasks:   Option<usize>
}

/// Success body of `GET /api/clickup-tasks`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TasksListResponse {
  pub tasks:           Vec<Value>,
  pub total_tasks:     usize,
  pub pages_processed: usize,
  pub fetch_all_pages: bool
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct HealthResponse {
  pub status:  String,
  pub version: String
}

fn non_empty(
  value: Option<&str>
) -> Option<&str> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::{
    ProxyData,
    ProxyFailure,
    ProxyRequest,
    TaskPage,
    TasksQuery
  };

  #[test]
  fn proxy_request_reads_camel_case_and_defaults() {
    let req: ProxyRequest =
      serde_json::from_value(json!({
        "apiKey": "pk_123",
        "listId": "901",
        "spaceId": ""
      }))
      .expect("deserialize request");

    assert_eq!(req.api_key, "pk_123");
    assert_eq!(req.list_id(), Some("901"));
    assert_eq!(req.space_id(), None);
    assert_eq!(req.endpoint(), None);
    assert!(!req.fetch_all_pages());
  }

  #[test]
  fn missing_api_key_deserializes_as_empty() {
    let req: ProxyRequest =
      serde_json::from_value(
        json!({ "listId": "1" })
      )
      .expect("deserialize request");
    assert!(req.api_key.is_empty());
  }

  #[test]
  fn tasks_query_only_accepts_literal_true() {
    let mut query = TasksQuery {
      fetch_all_pages: Some(
        "true".to_string()
      ),
      ..TasksQuery::default()
    };
    assert!(query.fetch_all_pages());

    query.fetch_all_pages =
      Some("1".to_string());
    assert!(!query.fetch_all_pages());
  }

  #[test]
  fn task_page_serializes_with_counts() {
    let page = TaskPage::new(
      vec![json!({"id": "a"}), json!({"id": "b"})],
      1
    );
    let value = serde_json::to_value(
      ProxyData::Tasks(page)
    )
    .expect("serialize");
    assert_eq!(value["totalTasks"], 2);
    assert_eq!(value["pagesCollected"], 1);
  }

  #[test]
  fn failure_omits_absent_fields() {
    let failure = ProxyFailure {
      error: "apiKey is required"
        .to_string(),
      ..ProxyFailure::default()
    };
    let value =
      serde_json::to_value(&failure)
        .expect("serialize");
    assert_eq!(
      value,
      json!({ "error": "apiKey is required" })
    );
  }
}
