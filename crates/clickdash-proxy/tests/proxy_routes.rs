use std::time::Duration;

use axum::Router;
use axum::body::{
  Body,
  to_bytes
};
use axum::http::{
  Request,
  StatusCode
};
use clickdash_core::fetch::PageFetcher;
use clickdash_proxy::{
  AppState,
  ProxyConfig,
  router
};
use serde_json::{
  Value,
  json
};
use tower::ServiceExt;
use wiremock::matchers::{
  method,
  path,
  query_param
};
use wiremock::{
  Mock,
  MockServer,
  ResponseTemplate
};

const MAX_SIZE: usize = 4 * 1024 * 1024;

fn app(upstream: &MockServer) -> Router {
  let cfg = ProxyConfig {
    base_url: upstream.uri(),
    page_delay_ms: 0,
    ..ProxyConfig::default()
  };
  let client = PageFetcher::build_client(
    Duration::from_secs(5)
  )
  .expect("client");
  router(AppState::with_client(&cfg, client))
}

fn tasks(count: usize) -> Value {
  let items: Vec<Value> = (0..count)
    .map(|i| {
      json!({
        "id": format!("t{i}"),
        "name": "x",
        "status": { "status": "완료" }
      })
    })
    .collect();
  json!({ "tasks": items })
}

async fn send(
  app: Router,
  request: Request<Body>
) -> (StatusCode, Value) {
  let response = app
    .oneshot(request)
    .await
    .expect("response");
  let status = response.status();
  let bytes =
    to_bytes(response.into_body(), MAX_SIZE)
      .await
      .expect("body");
  let body = serde_json::from_slice(&bytes)
    .unwrap_or(Value::Null);
  (status, body)
}

fn post_json(
  uri: &str,
  body: Value
) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .expect("request")
}

fn get(uri: &str) -> Request<Body> {
  Request::builder()
    .uri(uri)
    .body(Body::empty())
    .expect("request")
}

#[tokio::test]
async fn proxy_paginates_and_reports_request_info()
{
  let upstream = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/list/901/task"))
    .and(query_param("page", "0"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(tasks(100))
    )
    .mount(&upstream)
    .await;
  Mock::given(method("GET"))
    .and(path("/list/901/task"))
    .and(query_param("page", "1"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(tasks(5))
    )
    .mount(&upstream)
    .await;

  let (status, body) = send(
    app(&upstream),
    post_json(
      "/api/clickup-test",
      json!({
        "apiKey": "pk_1",
        "listId": "901",
        "spaceId": "7",
        "fetchAllPages": true
      })
    )
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], json!(true));
  assert_eq!(
    body["data"]["totalTasks"],
    json!(105)
  );
  assert_eq!(
    body["data"]["pagesCollected"],
    json!(2)
  );
  assert_eq!(
    body["requestInfo"]["listId"],
    json!("901")
  );
  assert_eq!(
    body["requestInfo"]["spaceId"],
    json!("7")
  );
  assert!(
    body["requestInfo"]["requestId"].is_string()
  );
  assert!(
    body["requestInfo"]["timestamp"].is_string()
  );
}

#[tokio::test]
async fn proxy_rejects_bad_ids_with_400() {
  let upstream = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(tasks(1))
    )
    .expect(0)
    .mount(&upstream)
    .await;

  let (status, body) = send(
    app(&upstream),
    post_json(
      "/api/clickup-test",
      json!({ "apiKey": "pk_1", "listId": "8crb1jk-29098" })
    )
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["error"],
    json!("Invalid List ID format")
  );
  assert_eq!(
    body["details"],
    json!(
      "List ID should contain only numbers (e.g., '123456789')"
    )
  );
  assert_eq!(
    body["providedListId"],
    json!("8crb1jk-29098")
  );

  let (status, body) = send(
    app(&upstream),
    post_json(
      "/api/clickup-test",
      json!({ "listId": "901" })
    )
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["error"],
    json!("apiKey is required")
  );
}

#[tokio::test]
async fn proxy_mirrors_upstream_status() {
  let upstream = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/list/901/task"))
    .respond_with(
      ResponseTemplate::new(401).set_body_json(
        json!({ "err": "Token invalid", "ECODE": "OAUTH_025" })
      )
    )
    .mount(&upstream)
    .await;

  let (status, body) = send(
    app(&upstream),
    post_json(
      "/api/clickup-test",
      json!({ "apiKey": "pk_bad", "listId": "901" })
    )
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(
    body["error"],
    json!("ClickUp API Error: 401 Unauthorized")
  );
  assert_eq!(
    body["details"]["ECODE"],
    json!("OAUTH_025")
  );
  assert!(
    body["requestUrl"].as_str().is_some_and(
      |url| url.contains("/list/901/task")
    )
  );
}

#[tokio::test]
async fn malformed_body_is_a_400() {
  let upstream = MockServer::start().await;
  let request = Request::builder()
    .method("POST")
    .uri("/api/clickup-test")
    .header("content-type", "application/json")
    .body(Body::from("{ nope"))
    .expect("request");

  let (status, body) =
    send(app(&upstream), request).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["error"],
    json!("Invalid request body")
  );
}

#[tokio::test]
async fn task_list_route_returns_listing() {
  let upstream = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/list/901/task"))
    .and(query_param("page", "0"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(tasks(3))
    )
    .expect(1)
    .mount(&upstream)
    .await;

  let (status, body) = send(
    app(&upstream),
    get(
      "/api/clickup-tasks?apiKey=pk_1&listId=901&fetchAllPages=true"
    )
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["totalTasks"], json!(3));
  assert_eq!(body["pagesProcessed"], json!(1));
  assert_eq!(
    body["fetchAllPages"],
    json!(true)
  );
  assert_eq!(
    body["tasks"][2]["id"],
    json!("t2")
  );
}

#[tokio::test]
async fn task_list_route_validates_query() {
  let upstream = MockServer::start().await;

  let (status, body) = send(
    app(&upstream),
    get("/api/clickup-tasks?listId=901")
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["error"],
    json!("apiKey is required")
  );

  let (status, body) = send(
    app(&upstream),
    get(
      "/api/clickup-tasks?apiKey=pk_1&listId=abc"
    )
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(
    body["error"],
    json!("Invalid List ID format")
  );
}

#[tokio::test]
async fn health_reports_version() {
  let upstream = MockServer::start().await;
  let (status, body) =
    send(app(&upstream), get("/health")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], json!("ok"));
  assert_eq!(
    body["version"],
    json!(env!("CARGO_PKG_VERSION"))
  );
}
