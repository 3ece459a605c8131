//! LogHunter API server entrypoint
//!
//! Wires configuration, the Postgres store, the Redis cache, the Loki
//! client and the selected AI provider into the HTTP router, then serves
//! until SIGINT/SIGTERM with a bounded drain window.

use loghunter::cache::{Cache, RedisCache};
use loghunter::loki::{HttpLokiClient, LokiClient};
use loghunter::providers::new_provider;
use loghunter::service::AnalysisService;
use loghunter::store::{self, SqlStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use loghunter_server::config::Config;
use loghunter_server::error::ServerError;
use loghunter_server::router::build_router;
use loghunter_server::state::AppState;

/// How long in-flight work may drain after a shutdown signal
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  dotenvy::dotenv().ok();

  if let Err(e) = run().await {
    tracing::error!(error = %e, "server failed");
    std::process::exit(1);
  }
}

async fn run() -> Result<(), ServerError> {
  // Fail fast on invalid config
  let cfg = Config::load()?;
  tracing::info!(
    ai_provider = %cfg.ai.provider,
    env = %cfg.server.env,
    "config loaded"
  );

  let db = store::connect(
    &cfg.database.url,
    cfg.database.max_open_conns,
    cfg.database.max_idle_conns,
    cfg.database.conn_max_lifetime,
  )
  .await?;
  tracing::info!("database connected");

  let cache = RedisCache::connect(&cfg.redis.url).await?;
  cache.ping().await?;
  tracing::info!("redis connected");

  let loki: Arc<dyn LokiClient> = Arc::new(HttpLokiClient::new(
    cfg.loki.base_url.clone(),
    cfg.loki.username.clone(),
    cfg.loki.password.clone(),
    cfg.loki.org_id.clone(),
    cfg.loki.timeout,
  )?);

  let provider = new_provider(&cfg.ai.provider_settings())?;
  tracing::info!(provider = provider.name(), model = provider.model(), "AI provider initialized");

  let store: Arc<dyn Store> = Arc::new(SqlStore::new(db));
  let cache: Arc<dyn Cache> = Arc::new(cache);

  // Background analysis tasks hang off this token, not off any request
  let shutdown = CancellationToken::new();

  let service = Arc::new(AnalysisService::new(
    store.clone(),
    cache.clone(),
    loki,
    provider,
    cfg.ai.inference_timeout,
    shutdown.clone(),
  ));

  let state = AppState {
    store,
    cache,
    service,
    rate_limit_per_minute: cfg.server.rate_limit_per_minute,
  };
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
  let listener = tokio::net::TcpListener::bind(addr).await?;
  tracing::info!(addr = %addr, "server listening");

  {
    let token = shutdown.clone();
    tokio::spawn(async move {
      shutdown_signal().await;
      tracing::info!("shutdown signal received, draining connections");
      token.cancel();
    });
  }

  let server = axum::serve(listener, app).with_graceful_shutdown({
    let token = shutdown.clone();
    async move { token.cancelled().await }
  });
  let graceful = async move { server.await };

  tokio::select! {
    res = graceful => res?,
    _ = async {
      shutdown.cancelled().await;
      tokio::time::sleep(SHUTDOWN_DRAIN).await;
    } => {
      tracing::warn!("drain window elapsed, forcing shutdown");
    }
  }

  tracing::info!("server stopped gracefully");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::warn!(error = %e, "failed to install SIGINT handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::warn!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}
