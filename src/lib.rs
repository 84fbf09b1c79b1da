//! vlr-vod-feed: HTTP JSON API nad vlr_scraper + match_cache.

pub mod config;
pub mod http;
pub mod routes;

use anyhow::{Context, Result};
use logger::EventLogger;
use match_cache::{Cache, CacheStore, MemoryStore, SqliteStore};
use std::sync::Arc;
use vlr_scraper::{Aggregator, AggregatorConfig, FetcherConfig, HttpFetcher};

use config::{CacheBackend, ServerConfig};
use routes::AppState;

pub fn build_aggregator(cfg: &ServerConfig, events: Option<Arc<EventLogger>>) -> Aggregator {
    let mut fetcher = HttpFetcher::new(FetcherConfig {
        timeout: cfg.fetch_timeout,
        request_interval: cfg.request_interval,
    });
    if let Some(events) = events {
        fetcher = fetcher.with_event_log(events);
    }
    Aggregator::with_config(
        Arc::new(fetcher),
        AggregatorConfig {
            concurrency: cfg.fetch_concurrency,
            ..AggregatorConfig::default()
        },
    )
}

pub fn open_cache_store(cfg: &ServerConfig) -> Result<Arc<dyn CacheStore>> {
    Ok(match cfg.cache_backend {
        CacheBackend::Sqlite => Arc::new(
            SqliteStore::open(&cfg.cache_path)
                .with_context(|| format!("open cache store {}", cfg.cache_path.display()))?,
        ),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

/// Sdílený stav serveru; vlastní ho `main`, routy ho dostávají referencí.
pub fn build_state(cfg: &ServerConfig) -> Result<AppState> {
    let events = Arc::new(EventLogger::new(&cfg.log_dir));
    let store = open_cache_store(cfg)?;

    Ok(AppState {
        aggregator: build_aggregator(cfg, Some(events.clone())),
        cache: Cache::new(store).with_event_log(events.clone()),
        cache_ttl: cfg.cache_ttl,
        public_origin: cfg.public_origin.clone(),
        events: Some(events),
    })
}
