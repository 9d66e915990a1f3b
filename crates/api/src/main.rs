use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use relation_api::app::{AppState, build_app};
use relation_api::config::AppConfig;
use relation_infra::{AuditSink, InMemoryAuditSink, PostgresAuditSink};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    relation_observability::init(&config.logging);

    let sink: Arc<dyn AuditSink> = match &config.database_url {
        Some(url) => {
            let sink = PostgresAuditSink::connect(url)
                .await
                .context("failed to connect audit database")?;
            sink.ensure_schema()
                .await
                .context("failed to prepare audit schema")?;
            Arc::new(sink)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; audit records are kept in memory");
            Arc::new(InMemoryAuditSink::new())
        }
    };

    let (state, _audit_workers) =
        AppState::from_config(&config, sink).context("failed to build auth services")?;
    if !config.auth.api_key.is_empty() {
        tracing::info!("API key authentication enabled");
    }
    let _sweeper = state.rate_limiter.spawn_sweeper(SWEEP_INTERVAL);

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}
