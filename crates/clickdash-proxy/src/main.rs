use std::io::IsTerminal;

use anyhow::Context;
use clickdash_proxy::{
  AppState,
  ProxyConfig,
  router
};
use tracing::{
  error,
  info,
  warn
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{
  EnvFilter,
  fmt
};

const LOG_FILE_PREFIX: &str =
  "clickdash-proxy.log";

/// Console logging plus, with `log_dir`, a daily rolling file. The guard
/// must live until exit so buffered lines are flushed.
fn init_tracing(
  cfg: &ProxyConfig
) -> Option<WorkerGuard> {
  let filter =
    EnvFilter::try_from_default_env()
      .or_else(|_| {
        EnvFilter::try_new(
          "info,clickdash_proxy=debug,\
           clickdash_core=debug,\
           tower_http=debug"
        )
      })
      .unwrap_or_else(|_| {
        EnvFilter::new("info")
      });

  let console = fmt::layer()
    .with_target(true)
    .with_line_number(true)
    .with_ansi(
      std::io::stdout().is_terminal()
    );

  let (file_layer, guard) =
    match cfg.log_dir.as_deref() {
      | Some(dir) => {
        let appender =
          tracing_appender::rolling::daily(
            dir,
            LOG_FILE_PREFIX
          );
        let (writer, guard) =
          tracing_appender::non_blocking(
            appender
          );
        (
          Some(
            fmt::layer()
              .with_ansi(false)
              .with_target(true)
              .with_writer(writer)
          ),
          Some(guard)
        )
      }
      | None => (None, None)
    };

  let _ =
    tracing_subscriber::registry()
      .with(filter)
      .with(console)
      .with(file_layer)
      .try_init();

  guard
}

#[tokio::main]
async fn main() {
  if let Err(err) = run().await {
    error!(error = %format!("{err:#}"), "proxy failed");
    eprintln!("error: {err:#}");
    std::process::exit(1);
  }
}

async fn run() -> anyhow::Result<()> {
  let cfg = ProxyConfig::load()?;
  let _log_guard = init_tracing(&cfg);

  let addr = cfg.listen_addr()?;
  info!(
    %addr,
    base_url = %cfg.base_url,
    max_pages = cfg.max_pages,
    list_max_pages = cfg.list_max_pages,
    "starting clickdash proxy"
  );

  let state = AppState::new(&cfg)
    .context(
      "failed to initialize proxy state"
    )?;
  let app = router(state);

  let listener =
    tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| {
        format!("failed to bind {addr}")
      })?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      wait_for_shutdown_signal().await;
      warn!(
        "received shutdown signal; \
         draining connections"
      );
    })
    .await
    .context("server error")?;

  info!("proxy stopped");
  Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
  use tokio::signal::unix::{
    SignalKind,
    signal
  };

  let mut sigint = match signal(
    SignalKind::interrupt()
  ) {
    | Ok(stream) => stream,
    | Err(error) => {
      error!(
        %error,
        "failed to register SIGINT \
         handler; falling back to \
         ctrl_c"
      );
      let _ =
        tokio::signal::ctrl_c().await;
      return;
    }
  };

  let mut sigterm = match signal(
    SignalKind::terminate()
  ) {
    | Ok(stream) => stream,
    | Err(error) => {
      error!(
        %error,
        "failed to register SIGTERM \
         handler; falling back to \
         ctrl_c"
      );
      let _ =
        tokio::signal::ctrl_c().await;
      return;
    }
  };

  tokio::select! {
    _ = sigint.recv() => {}
    _ = sigterm.recv() => {}
  }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
  if let Err(error) =
    tokio::signal::ctrl_c().await
  {
    error!(
      %error,
      "failed waiting for ctrl_c \
       signal"
    );
  }
}
