use clickdash_shared::ProxyFailure;
use serde_json::Value;
use thiserror::Error;

/// Failures of the proxy path, from input validation to upstream I/O.
///
/// `collected` is the number of tasks gathered before a paginated call
/// failed; it is `None` for single requests.
#[derive(Debug, Error)]
pub enum ProxyError {
  #[error("apiKey is required")]
  MissingApiKey,

  #[error("listId is required")]
  MissingListId,

  #[error("spaceId is required")]
  MissingSpaceId,

  #[error("Invalid List ID format")]
  InvalidListId {
    provided: String
  },

  #[error("Invalid Space ID format")]
  InvalidSpaceId {
    provided: String
  },

  #[error("Invalid endpoint URL: {url}")]
  InvalidEndpoint {
    url:    String,
    #[source]
    source: url::ParseError
  },

  #[error(
    "ClickUp API Error: {status} {reason}"
  )]
  Upstream {
    status:    u16,
    reason:    String,
    body:      Value,
    url:       String,
    collected: Option<usize>
  },

  #[error("Failed to parse JSON response")]
  ParseFailed {
    url:       String,
    detail:    String,
    collected: Option<usize>
  },

  #[error("Request to ClickUp failed")]
  Transport {
    url:       String,
    #[source]
    source:    reqwest::Error,
    collected: Option<usize>
  }
}

impl ProxyError {
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::MissingApiKey
        | Self::MissingListId
        | Self::MissingSpaceId
        | Self::InvalidListId { .. }
        | Self::InvalidSpaceId { .. }
        | Self::InvalidEndpoint { .. }
    )
  }

  /// HTTP status the proxy answers with.
  pub fn status_code(&self) -> u16 {
    match self {
      | Self::Upstream {
        status, ..
      } => *status,
      | Self::ParseFailed { .. } => 502,
      | Self::Transport {
        source, ..
      } if source.is_timeout() => 504,
      | Self::Transport { .. } => 502,
      | _ => 400
    }
  }

  pub fn collected(&self) -> Option<usize> {
    match self {
      | Self::Upstream {
        collected, ..
      }
      | Self::ParseFailed {
        collected, ..
      }
      | Self::Transport {
        collected, ..
      } => *collected,
      | _ => None
    }
  }

  pub fn request_url(&self) -> Option<&str> {
    match self {
      | Self::Upstream { url, .. }
      | Self::ParseFailed { url, .. }
      | Self::Transport { url, .. }
      | Self::InvalidEndpoint {
        url, ..
      } => Some(url),
      | _ => None
    }
  }

  pub(crate) fn with_collected(
    mut self,
    count: usize
  ) -> Self {
    match &mut self {
      | Self::Upstream {
        collected, ..
      }
      | Self::ParseFailed {
        collected, ..
      }
      | Self::Transport {
        collected, ..
      } => *collected = Some(count),
      | _ => {}
    }
    self
  }

  pub fn to_failure(&self) -> ProxyFailure {
    let mut failure = ProxyFailure {
      error: self.to_string(),
      request_url: self
        .request_url()
        .map(str::to_string),
      collected_tasks: self.collected(),
      ..ProxyFailure::default()
    };

    match self {
      | Self::InvalidListId {
        provided
      } => {
        failure.details =
          Some(Value::String(
            "List ID should contain only \
             numbers (e.g., '123456789')"
              .to_string()
          ));
        failure.provided_list_id =
          Some(provided.clone());
      }
      | Self::InvalidSpaceId {
        provided
      } => {
        failure.details =
          Some(Value::String(
            "Space ID should contain only \
             numbers (e.g., '123456')"
              .to_string()
          ));
        failure.provided_space_id =
          Some(provided.clone());
      }
      | Self::InvalidEndpoint {
        source, ..
      } => {
        failure.details = Some(
          Value::String(source.to_string())
        );
      }
      | Self::Upstream { body, .. } => {
        failure.details = Some(body.clone());
      }
      | Self::ParseFailed {
        detail, ..
      } => {
        failure.details =
          Some(Value::String(detail.clone()));
      }
      | Self::Transport {
        source, ..
      } => {
        failure.details = Some(
          Value::String(format!("{source:#}"))
        );
      }
      | Self::MissingApiKey
      | Self::MissingListId
      | Self::MissingSpaceId => {}
    }

    failure
  }
}
