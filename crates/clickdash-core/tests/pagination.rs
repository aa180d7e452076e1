use std::time::{
  Duration,
  Instant
};

use clickdash_core::error::ProxyError;
use clickdash_core::fetch::{
  FetchOptions,
  PageFetcher
};
use clickdash_core::proxy::ProxyService;
use clickdash_shared::{
  ProxyData,
  ProxyRequest,
  TasksQuery
};
use serde_json::{
  Value,
  json
};
use wiremock::matchers::{
  header,
  method,
  path,
  query_param
};
use wiremock::{
  Mock,
  MockServer,
  ResponseTemplate
};

const LIST_PATH: &str = "/list/901/task";

fn page_of(
  count: usize,
  offset: usize
) -> Value {
  let tasks: Vec<Value> = (0..count)
    .map(|i| {
      json!({
        "id": format!("t{}", offset + i),
        "name": format!("task {}", offset + i),
        "status": { "status": "미확인", "color": "#FF6B6B" }
      })
    })
    .collect();
  json!({ "tasks": tasks, "last_page": false })
}

fn options(
  max_pages: usize,
  page_delay: Duration
) -> FetchOptions {
  FetchOptions {
    page_delay,
    ..FetchOptions::default()
  }
  .with_max_pages(max_pages)
}

fn service_with_delay(
  server: &MockServer,
  max_pages: usize,
  page_delay: Duration
) -> ProxyService {
  let client = PageFetcher::build_client(
    Duration::from_secs(5)
  )
  .expect("client");
  ProxyService::new(
    client,
    server.uri(),
    options(max_pages, page_delay),
    options(50, page_delay)
  )
}

fn service(
  server: &MockServer,
  max_pages: usize
) -> ProxyService {
  service_with_delay(
    server,
    max_pages,
    Duration::ZERO
  )
}

fn request(list_id: &str) -> ProxyRequest {
  ProxyRequest {
    api_key: "pk_test_token".to_string(),
    list_id: Some(list_id.to_string()),
    fetch_all_pages: Some(true),
    ..ProxyRequest::default()
  }
}

async fn mount_page(
  server: &MockServer,
  page: usize,
  response: ResponseTemplate
) {
  Mock::given(method("GET"))
    .and(path(LIST_PATH))
    .and(query_param("page", page.to_string()))
    .respond_with(response)
    .mount(server)
    .await;
}

async fn request_count(
  server: &MockServer
) -> usize {
  server
    .received_requests()
    .await
    .map(|reqs| reqs.len())
    .unwrap_or(0)
}

#[tokio::test]
async fn collects_full_pages_then_the_short_tail()
{
  let server = MockServer::start().await;
  for page in 0..3 {
    Mock::given(method("GET"))
      .and(path(LIST_PATH))
      .and(query_param("page", page.to_string()))
      .and(query_param("limit", "100"))
      .and(query_param("include_closed", "true"))
      .and(header(
        "authorization",
        "pk_test_token"
      ))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(page_of(100, page * 100))
      )
      .mount(&server)
      .await;
  }
  mount_page(
    &server,
    3,
    ResponseTemplate::new(200)
      .set_body_json(page_of(37, 300))
  )
  .await;

  let success = service(&server, 10)
    .forward(&request("901"))
    .await
    .expect("forward");

  match success.data {
    | ProxyData::Tasks(page) => {
      assert_eq!(page.total_tasks, 337);
      assert_eq!(page.pages_collected, 4);
      assert_eq!(
        page.tasks[336]["id"],
        json!("t336")
      );
    }
    | other => {
      panic!("expected tasks, got {other:?}")
    }
  }
  assert!(success.success);
  assert_eq!(
    success.request_info.list_id.as_deref(),
    Some("901")
  );
  assert!(success.request_info.endpoint.ends_with(
    "/list/901/task?include_closed=true&limit=100"
  ));
  assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn page_delay_applies_between_pages_only()
{
  let delay = Duration::from_millis(200);

  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  mount_page(
    &server,
    1,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 100))
  )
  .await;
  mount_page(
    &server,
    2,
    ResponseTemplate::new(200)
      .set_body_json(page_of(37, 200))
  )
  .await;

  let started = Instant::now();
  let success =
    service_with_delay(&server, 10, delay)
      .forward(&request("901"))
      .await
      .expect("forward");
  let elapsed = started.elapsed();

  assert!(matches!(
    success.data,
    ProxyData::Tasks(ref page)
      if page.total_tasks == 237
        && page.pages_collected == 3
  ));
  assert!(
    elapsed >= delay * 2,
    "three pages should wait twice, took \
     {elapsed:?}"
  );

  let single = MockServer::start().await;
  mount_page(
    &single,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(12, 0))
  )
  .await;

  let slow = Duration::from_secs(2);
  let started = Instant::now();
  service_with_delay(&single, 10, slow)
    .forward(&request("901"))
    .await
    .expect("forward");
  let elapsed = started.elapsed();
  assert!(
    elapsed < slow,
    "first page must not wait, took \
     {elapsed:?}"
  );
}

#[tokio::test]
async fn failing_page_reports_collected_count_only()
{
  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  mount_page(
    &server,
    1,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 100))
  )
  .await;
  mount_page(
    &server,
    2,
    ResponseTemplate::new(401).set_body_json(
      json!({ "err": "Token invalid", "ECODE": "OAUTH_025" })
    )
  )
  .await;

  let err = service(&server, 10)
    .forward(&request("901"))
    .await
    .expect_err("page 2 fails");

  assert!(matches!(
    err,
    ProxyError::Upstream { status: 401, .. }
  ));
  assert_eq!(err.status_code(), 401);
  assert_eq!(err.collected(), Some(200));

  let failure = err.to_failure();
  assert_eq!(
    failure.error,
    "ClickUp API Error: 401 Unauthorized"
  );
  assert_eq!(failure.collected_tasks, Some(200));
  assert_eq!(
    failure
      .details
      .as_ref()
      .map(|d| &d["ECODE"]),
    Some(&json!("OAUTH_025"))
  );
}

#[tokio::test]
async fn short_page_ends_pagination() {
  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(40, 0))
  )
  .await;
  Mock::given(method("GET"))
    .and(path(LIST_PATH))
    .and(query_param("page", "1"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(page_of(100, 40))
    )
    .expect(0)
    .mount(&server)
    .await;

  let success = service(&server, 10)
    .forward(&request("901"))
    .await
    .expect("forward");
  match success.data {
    | ProxyData::Tasks(page) => {
      assert_eq!(page.total_tasks, 40)
    }
    | other => {
      panic!("expected tasks, got {other:?}")
    }
  }
}

#[tokio::test]
async fn page_ceiling_is_never_exceeded() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path(LIST_PATH))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(page_of(100, 0))
    )
    .mount(&server)
    .await;

  let success = service(&server, 3)
    .forward(&request("901"))
    .await
    .expect("forward");
  match success.data {
    | ProxyData::Tasks(page) => {
      assert_eq!(page.total_tasks, 300);
      assert_eq!(page.pages_collected, 3);
    }
    | other => {
      panic!("expected tasks, got {other:?}")
    }
  }
  assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn invalid_limit_is_sent_as_default() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path(LIST_PATH))
    .and(query_param("page", "0"))
    .and(query_param("limit", "100"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(page_of(100, 0))
    )
    .expect(1)
    .mount(&server)
    .await;
  mount_page(
    &server,
    1,
    ResponseTemplate::new(200)
      .set_body_json(page_of(3, 100))
  )
  .await;

  let req = ProxyRequest {
    endpoint: Some(format!(
      "{}/list/{{listId}}/task?limit=abc",
      server.uri()
    )),
    ..request("901")
  };
  let success = service(&server, 10)
    .forward(&req)
    .await
    .expect("forward");
  assert!(matches!(
    success.data,
    ProxyData::Tasks(ref page)
      if page.total_tasks == 103
  ));

  let received = server
    .received_requests()
    .await
    .expect("recording on");
  assert!(received.iter().all(|r| {
    !r.url
      .query_pairs()
      .any(|(k, v)| k == "limit" && v == "abc")
  }));
}

#[tokio::test]
async fn malformed_list_id_never_reaches_upstream()
{
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(page_of(1, 0))
    )
    .expect(0)
    .mount(&server)
    .await;

  let err = service(&server, 10)
    .forward(&request("8crb1jk-29098"))
    .await
    .expect_err("invalid list id");

  assert!(err.is_validation());
  assert_eq!(err.status_code(), 400);
  let failure = err.to_failure();
  assert_eq!(
    failure.error,
    "Invalid List ID format"
  );
  assert_eq!(
    failure.provided_list_id.as_deref(),
    Some("8crb1jk-29098")
  );
  assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn empty_or_non_json_bodies_stop_quietly()
{
  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  mount_page(
    &server,
    1,
    ResponseTemplate::new(200)
  )
  .await;

  let success = service(&server, 10)
    .forward(&request("901"))
    .await
    .expect("forward");
  match success.data {
    | ProxyData::Tasks(page) => {
      assert_eq!(page.total_tasks, 100);
      assert_eq!(page.pages_collected, 1);
    }
    | other => {
      panic!("expected tasks, got {other:?}")
    }
  }

  let html = MockServer::start().await;
  mount_page(
    &html,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  mount_page(
    &html,
    1,
    ResponseTemplate::new(200).set_body_raw(
      "<html>maintenance</html>",
      "text/html"
    )
  )
  .await;

  let success = service(&html, 10)
    .forward(&request("901"))
    .await
    .expect("forward");
  assert!(matches!(
    success.data,
    ProxyData::Tasks(ref page)
      if page.total_tasks == 100
  ));
}

#[tokio::test]
async fn invalid_json_is_a_parse_failure() {
  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  mount_page(
    &server,
    1,
    ResponseTemplate::new(200).set_body_raw(
      "{\"tasks\": [",
      "application/json"
    )
  )
  .await;

  let err = service(&server, 10)
    .forward(&request("901"))
    .await
    .expect_err("parse failure");
  assert!(matches!(
    err,
    ProxyError::ParseFailed { .. }
  ));
  assert_eq!(err.status_code(), 502);
  assert_eq!(err.collected(), Some(100));
}

#[tokio::test]
async fn single_page_mode_passes_other_payloads_through()
{
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/space/55"))
    .respond_with(
      ResponseTemplate::new(200).set_body_json(
        json!({ "id": "55", "name": "QA" })
      )
    )
    .expect(1)
    .mount(&server)
    .await;

  let req = ProxyRequest {
    api_key: "oauth-token".to_string(),
    space_id: Some("55".to_string()),
    endpoint: Some(format!(
      "{}/space/{{spaceId}}",
      server.uri()
    )),
    fetch_all_pages: Some(false),
    ..ProxyRequest::default()
  };
  let success = service(&server, 10)
    .forward(&req)
    .await
    .expect("forward");
  assert_eq!(
    success.data,
    ProxyData::Raw(
      json!({ "id": "55", "name": "QA" })
    )
  );
  assert!(
    success
      .request_info
      .endpoint
      .ends_with("/space/55")
  );

  let received = server
    .received_requests()
    .await
    .expect("recording on");
  assert_eq!(
    received[0]
      .headers
      .get("authorization")
      .and_then(|v| v.to_str().ok()),
    Some("Bearer oauth-token")
  );
}

#[tokio::test]
async fn list_route_single_page_requests_once() {
  let server = MockServer::start().await;
  mount_page(
    &server,
    0,
    ResponseTemplate::new(200)
      .set_body_json(page_of(100, 0))
  )
  .await;
  Mock::given(method("GET"))
    .and(path(LIST_PATH))
    .and(query_param("page", "1"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_json(page_of(100, 100))
    )
    .expect(0)
    .mount(&server)
    .await;

  let query = TasksQuery {
    api_key:         Some(
      "pk_test_token".to_string()
    ),
    space_id:        None,
    list_id:         Some("901".to_string()),
    fetch_all_pages: Some("false".to_string())
  };
  let response = service(&server, 10)
    .list_tasks(&query)
    .await
    .expect("list");
  assert_eq!(response.total_tasks, 100);
  assert_eq!(response.pages_processed, 1);
  assert!(!response.fetch_all_pages);
}
