use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use watchspin_api::{
    api::{create_router, AppState},
    cache::{create_redis_client, Cache, CacheWriterHandle, RedisStore},
    config::Config,
    services::{providers::TmdbProvider, PipelineSettings},
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Redis when configured, otherwise an in-process store
fn build_cache(config: &Config) -> Result<(Cache, Option<CacheWriterHandle>)> {
    match &config.redis_url {
        Some(url) => {
            let client = create_redis_client(url)?;
            let (store, writer) = RedisStore::new(client);
            tracing::info!("Using Redis response cache");
            Ok((Cache::new(Arc::new(store)), Some(writer)))
        }
        None => {
            tracing::info!("REDIS_URL not set, using in-memory response cache");
            Ok((Cache::in_memory(), None))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let (cache, cache_writer) = build_cache(&config)?;

    let provider = TmdbProvider::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.watch_region.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let state = AppState::new(
        Arc::new(provider),
        PipelineSettings::default(),
        config.spin_budget,
    );
    let session_ttl = Duration::from_secs(config.session_ttl_secs);
    let sweep_every = (session_ttl / 4).max(Duration::from_secs(1));
    let sweeper = state.spawn_session_sweeper(session_ttl, sweep_every);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        region = %config.watch_region,
        spin_budget = config.spin_budget,
        session_ttl_secs = config.session_ttl_secs,
        "Server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();

    if let Some(writer) = cache_writer {
        let flushed = writer.shutdown().await;
        tracing::info!(flushed, "Response cache flushed");
    }

    Ok(())
}
