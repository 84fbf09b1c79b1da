//! Konfigurace serveru z env (volitelně z `.env` přes dotenv).

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Sqlite,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(CacheBackend::Sqlite),
            "memory" => Ok(CacheBackend::Memory),
            other => bail!("unknown cache backend '{other}' (expected sqlite|memory)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub cache_backend: CacheBackend,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    pub purge_interval: Duration,
    pub fetch_timeout: Duration,
    /// 1 = detaily se stahují sekvenčně
    pub fetch_concurrency: usize,
    pub request_interval: Duration,
    /// Origin pro YouTube embed; jinak se odvodí z Host hlavičky
    pub public_origin: Option<String>,
    pub log_dir: PathBuf,
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {name}='{raw}'")),
        None => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ttl_secs: u64 = parsed(&lookup, "VOD_FEED_CACHE_TTL_SECS", 3600)?;
        if ttl_secs == 0 {
            bail!("VOD_FEED_CACHE_TTL_SECS must be positive");
        }
        let concurrency: usize = parsed(&lookup, "VOD_FEED_FETCH_CONCURRENCY", 1)?;

        Ok(Self {
            bind: parsed(&lookup, "VOD_FEED_BIND", SocketAddr::from(([0, 0, 0, 0], 8787)))?,
            cache_backend: parsed(&lookup, "VOD_FEED_CACHE", CacheBackend::Sqlite)?,
            cache_path: lookup("VOD_FEED_CACHE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/vod_cache.db")),
            cache_ttl: Duration::from_secs(ttl_secs),
            purge_interval: Duration::from_secs(parsed(&lookup, "VOD_FEED_PURGE_INTERVAL_SECS", 600u64)?.max(1)),
            fetch_timeout: Duration::from_secs(parsed(&lookup, "VOD_FEED_FETCH_TIMEOUT_SECS", 10u64)?.max(1)),
            fetch_concurrency: concurrency.max(1),
            request_interval: Duration::from_millis(parsed(&lookup, "VOD_FEED_REQUEST_INTERVAL_MS", 250u64)?),
            public_origin: lookup("VOD_FEED_PUBLIC_ORIGIN")
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty()),
            log_dir: lookup("VOD_FEED_LOG_DIR")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = from_map(&[]).unwrap();
        assert_eq!(cfg.bind.to_string(), "0.0.0.0:8787");
        assert_eq!(cfg.cache_backend, CacheBackend::Sqlite);
        assert_eq!(cfg.cache_path, PathBuf::from("data/vod_cache.db"));
        assert_eq!(cfg.cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.fetch_concurrency, 1);
        assert!(cfg.public_origin.is_none());
    }

    #[test]
    fn overrides_and_validation() {
        let cfg = from_map(&[
            ("VOD_FEED_CACHE", "Memory"),
            ("VOD_FEED_FETCH_CONCURRENCY", "0"),
            ("VOD_FEED_PUBLIC_ORIGIN", "https://vods.example.com/"),
        ])
        .unwrap();
        assert_eq!(cfg.cache_backend, CacheBackend::Memory);
        assert_eq!(cfg.fetch_concurrency, 1);
        assert_eq!(cfg.public_origin.as_deref(), Some("https://vods.example.com"));

        assert!(from_map(&[("VOD_FEED_CACHE_TTL_SECS", "0")]).is_err());
        assert!(from_map(&[("VOD_FEED_CACHE", "redis")]).is_err());
        let err = from_map(&[("VOD_FEED_BIND", "nope")]).unwrap_err();
        assert!(format!("{err:#}").contains("VOD_FEED_BIND"));
    }
}
