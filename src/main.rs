/// vlr-vod-feed: HTTP API s VOD feedy z vlr.gg
///
/// Co dělá:
///   1. GET /api/{team,player,tournament}-matches → listing + detaily zápasů + VOD embed URL
///   2. GET /api/team-map-stats → statistiky map týmu
///   3. Výsledky drží v cache (SQLite, TTL 1h), `nocache=1` / `debug=1` ji obchází
///
/// Spuštění:
///   VOD_FEED_BIND=0.0.0.0:8787 cargo run --bin vod-feed

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use vlr_vod_feed::config::ServerConfig;
use vlr_vod_feed::{build_state, http};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::from_env()?;
    info!("=== vod-feed ===");
    info!(
        "cache: {:?} {} (ttl {}s), fetch timeout {}s, concurrency {}, interval {}ms",
        cfg.cache_backend,
        cfg.cache_path.display(),
        cfg.cache_ttl.as_secs(),
        cfg.fetch_timeout.as_secs(),
        cfg.fetch_concurrency,
        cfg.request_interval.as_millis()
    );
    info!("Logs: {}/", cfg.log_dir.display());

    let state = Arc::new(build_state(&cfg)?);

    // Úklid prošlých záznamů
    {
        let state = Arc::clone(&state);
        let every = cfg.purge_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                match state.cache.purge_expired().await {
                    Ok(0) => {}
                    Ok(n) => debug!("purged {} expired cache entries", n),
                    Err(e) => warn!("cache purge failed: {}", e),
                }
            }
        });
    }

    let listener = TcpListener::bind(cfg.bind).await.context("http bind")?;
    http::serve(listener, state).await
}
