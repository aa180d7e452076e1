use std::sync::Arc;

use clickdash_core::fetch::PageFetcher;
use clickdash_core::proxy::ProxyService;

use crate::config::ProxyConfig;

/// Shared, read-only handler state.
#[derive(Debug, Clone)]
pub struct AppState {
  pub service: Arc<ProxyService>
}

impl AppState {
  pub fn new(
    config: &ProxyConfig
  ) -> anyhow::Result<Self> {
    let client = PageFetcher::build_client(
      config.request_timeout()
    )?;
    Ok(Self::with_client(config, client))
  }

  pub fn with_client(
    config: &ProxyConfig,
    client: reqwest::Client
  ) -> Self {
    let service = ProxyService::new(
      client,
      config.base_url.clone(),
      config.proxy_options(),
      config.list_options()
    );
    Self {
      service: Arc::new(service)
    }
  }
}
