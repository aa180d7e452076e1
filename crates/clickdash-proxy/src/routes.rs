use axum::Json;
use axum::extract::rejection::{
  JsonRejection,
  QueryRejection
};
use axum::extract::{
  Query,
  State
};
use axum::http::StatusCode;
use axum::response::{
  IntoResponse,
  Response
};
use clickdash_core::error::ProxyError;
use clickdash_shared::{
  HealthResponse,
  ProxyFailure,
  ProxyRequest,
  TasksQuery
};
use serde_json::Value;
use tracing::{
  info,
  instrument,
  warn
};

use crate::state::AppState;

/// JSON error body with the status the failure maps to.
fn failure_response(
  err: &ProxyError
) -> Response {
  let status =
    StatusCode::from_u16(err.status_code())
      .unwrap_or(StatusCode::BAD_GATEWAY);
  if err.is_validation() {
    info!(status = status.as_u16(), error = %err, "rejected request");
  } else {
    warn!(
      status = status.as_u16(),
      error = %err,
      collected = ?err.collected(),
      "upstream request failed"
    );
  }
  (status, Json(err.to_failure()))
    .into_response()
}

fn bad_input(
  error: &str,
  detail: String
) -> Response {
  info!(error, detail = %detail, "malformed request");
  let failure = ProxyFailure {
    error: error.to_string(),
    details: Some(Value::String(detail)),
    ..ProxyFailure::default()
  };
  (StatusCode::BAD_REQUEST, Json(failure))
    .into_response()
}

/// `POST /api/clickup-test`
#[instrument(skip_all)]
pub async fn clickup_test(
  State(state): State<AppState>,
  body: Result<Json<ProxyRequest>, JsonRejection>
) -> Response {
  let Json(req) = match body {
    | Ok(body) => body,
    | Err(rejection) => {
      return bad_input(
        "Invalid request body",
        rejection.body_text()
      );
    }
  };

  match state.service.forward(&req).await {
    | Ok(success) => {
      (StatusCode::OK, Json(success))
        .into_response()
    }
    | Err(err) => failure_response(&err)
  }
}

/// `GET /api/clickup-tasks`
#[instrument(skip_all)]
pub async fn clickup_tasks(
  State(state): State<AppState>,
  query: Result<
    Query<TasksQuery>,
    QueryRejection
  >
) -> Response {
  let Query(query) = match query {
    | Ok(query) => query,
    | Err(rejection) => {
      return bad_input(
        "Invalid query string",
        rejection.body_text()
      );
    }
  };

  match state.service.list_tasks(&query).await
  {
    | Ok(listing) => {
      (StatusCode::OK, Json(listing))
        .into_response()
    }
    | Err(err) => failure_response(&err)
  }
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status:  "ok".to_string(),
    version: env!("CARGO_PKG_VERSION")
      .to_string()
  })
}
