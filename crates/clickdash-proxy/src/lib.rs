//! HTTP front for the ClickUp proxy.

pub mod config;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{
  get,
  post
};
use tower_http::trace::TraceLayer;

pub use crate::config::ProxyConfig;
pub use crate::state::AppState;

pub fn router(state: AppState) -> Router {
  Router::new()
    .route(
      "/api/clickup-test",
      post(routes::clickup_test)
    )
    .route(
      "/api/clickup-tasks",
      get(routes::clickup_tasks)
    )
    .route("/health", get(routes::health))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
