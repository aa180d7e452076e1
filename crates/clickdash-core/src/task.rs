use std::collections::BTreeMap;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::epoch_millis_serde;

/// Status label that marks a task as finished on the dashboard.
pub const COMPLETED_STATUS: &str = "완료";

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq
)]
pub struct Status {
  pub status: String,

  #[serde(default)]
  pub color: String,

  #[serde(default, rename = "type")]
  pub kind: Option<String>,

  #[serde(default)]
  pub id: Option<String>
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq
)]
pub struct Assignee {
  #[serde(default)]
  pub id: Option<u64>,

  #[serde(default)]
  pub username: Option<String>,

  #[serde(default)]
  pub email: Option<String>,

  #[serde(default)]
  pub color: Option<String>
}

impl Assignee {
  pub fn display_name(&self) -> &str {
    self
      .username
      .as_deref()
      .unwrap_or("Assignee")
  }

  pub fn initial(&self) -> char {
    self
      .username
      .as_deref()
      .and_then(|name| name.chars().next())
      .map(|ch| {
        ch.to_uppercase().next().unwrap_or(ch)
      })
      .unwrap_or('A')
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq
)]
pub struct Tag {
  pub name: String,

  #[serde(default)]
  pub tag_fg: Option<String>,

  #[serde(default)]
  pub tag_bg: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq
)]
pub struct Priority {
  pub priority: String,

  #[serde(default)]
  pub color: Option<String>,

  #[serde(default)]
  pub id: Option<String>
}

impl Priority {
  pub fn level(&self) -> PriorityLevel {
    match self
      .priority
      .to_ascii_lowercase()
      .as_str()
    {
      | "urgent" => PriorityLevel::Urgent,
      | "high" => PriorityLevel::High,
      | "normal" => PriorityLevel::Normal,
      | "low" => PriorityLevel::Low,
      | _ => PriorityLevel::Other
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityLevel {
  Urgent,
  High,
  Normal,
  Low,
  Other
}

/// One ClickUp task as returned by `GET /list/{id}/task`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq
)]
pub struct Task {
  pub id: String,

  #[serde(default)]
  pub custom_id: Option<String>,

  pub name: String,

  #[serde(default)]
  pub description: Option<String>,

  pub status: Status,

  #[serde(default)]
  pub assignees: Vec<Assignee>,

  #[serde(default)]
  pub tags: Vec<Tag>,

  #[serde(default)]
  pub priority: Option<Priority>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub date_created: Option<DateTime<Utc>>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub date_updated: Option<DateTime<Utc>>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub date_closed: Option<DateTime<Utc>>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub date_done: Option<DateTime<Utc>>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub due_date: Option<DateTime<Utc>>,

  #[serde(
    default,
    with = "epoch_millis_serde"
  )]
  pub start_date: Option<DateTime<Utc>>,

  #[serde(default)]
  pub url: Option<String>,

  #[serde(flatten)]
  pub extra:
    BTreeMap<String, serde_json::Value>
}

impl Task {
  pub fn status_label(&self) -> &str {
    &self.status.status
  }

  pub fn is_completed(&self) -> bool {
    self.status.status == COMPLETED_STATUS
  }

  pub fn has_status(
    &self,
    label: &str
  ) -> bool {
    self.status.status == label
  }

  /// Last update, falling back to creation.
  pub fn touched_at(
    &self
  ) -> Option<DateTime<Utc>> {
    self.date_updated.or(self.date_created)
  }

  /// Trailing `n` characters of the id, used as a short reference.
  pub fn short_id(&self, n: usize) -> &str {
    let count = self.id.chars().count();
    if count <= n {
      return &self.id;
    }
    let skip = count - n;
    let start = self
      .id
      .char_indices()
      .nth(skip)
      .map(|(idx, _)| idx)
      .unwrap_or(0);
    &self.id[start..]
  }
}

/// Decodes upstream task objects, skipping entries that do not look like
/// tasks.
#[tracing::instrument(skip_all, fields(count = values.len()))]
pub fn tasks_from_values(
  values: &[serde_json::Value]
) -> Vec<Task> {
  values
    .iter()
    .filter_map(|value| {
      match serde_json::from_value::<Task>(
        value.clone()
      ) {
        | Ok(task) => Some(task),
        | Err(err) => {
          tracing::warn!(
            id = ?value.get("id"),
            error = %err,
            "skipping malformed task object"
          );
          None
        }
      }
    })
    .collect()
}
