//! `Cache` handle: memoizace výsledku produceru pod složeným klíčem.
//!
//! - hit: uložená hodnota bez volání produceru
//! - miss: producer → uložit s `expires_at = now + ttl`
//! - bypass: producer napřímo, cache se nečte ani nezapisuje
//! - store chyba: fail open, producer napřímo
//!
//! Souběžné missy na jednom klíči čekají na jeden běh produceru
//! (per-key async mutex, po získání se store kontroluje znovu).

use chrono::{DateTime, Utc};
use logger::{now_iso, CacheStatusEvent, EventLogger};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::store::{CacheEntry, CacheStore};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Zdroj času pro expiraci.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Ručně posouvaný čas pro testy expirace.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
    FailOpen,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Bypass => "bypass",
            CacheStatus::FailOpen => "fail_open",
        }
    }
}

/// Složený klíč: `namespace:part1:part2...`, lowercase, pořadí částí se zachovává.
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    std::iter::once(namespace)
        .chain(parts.iter().copied())
        .map(|p| p.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(":")
}

type FlightMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

pub struct Cache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    inflight: Arc<FlightMap>,
    events: Option<Arc<EventLogger>>,
}

/// Registrace v inflight mapě; při dropu ji uklidí poslední držitel.
/// Vlastní vše, co drží, takže future `get_cached` zůstává `Send`.
struct Flight {
    map: Arc<FlightMap>,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl Flight {
    async fn turn(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        // mapa + tento handle
        if Arc::strong_count(&self.lock) <= 2 {
            map.remove(&self.key);
        }
    }
}

enum Lookup<T> {
    Hit(T),
    Miss,
    Broken(CacheError),
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            events: None,
        }
    }

    pub fn with_event_log(mut self, events: Arc<EventLogger>) -> Self {
        self.events = Some(events);
        self
    }

    fn record(&self, key: &str, status: &str, message: String) {
        if let Some(events) = &self.events {
            let ev = CacheStatusEvent {
                ts: now_iso(),
                event: "CACHE_STATUS",
                key: key.to_string(),
                status: status.to_string(),
                message,
            };
            if let Err(e) = events.log(&ev) {
                warn!("cache event log write failed: {}", e);
            }
        }
    }

    fn fail_open(&self, key: &str, err: &CacheError) {
        warn!("cache store unavailable for {}, calling producer directly: {}", key, err);
        self.record(key, CacheStatus::FailOpen.as_str(), err.to_string());
    }

    fn join_flight(&self, key: &str) -> Flight {
        let lock = {
            let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        Flight {
            map: Arc::clone(&self.inflight),
            key: key.to_string(),
            lock,
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        match self.store.get(key).await {
            Ok(Some(entry)) if entry.is_fresh(self.clock.now()) => match serde_json::from_value(entry.value) {
                Ok(value) => Lookup::Hit(value),
                Err(e) => {
                    warn!("cached value for {} does not decode, treating as miss: {}", key, e);
                    Lookup::Miss
                }
            },
            Ok(_) => Lookup::Miss,
            Err(e) => Lookup::Broken(e),
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let entry = match serde_json::to_value(value) {
            Ok(json) => CacheEntry {
                key: key.to_string(),
                value: json,
                expires_at: self.clock.now() + ttl,
            },
            Err(e) => {
                warn!("value for {} is not serializable, not cached: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.put(entry).await {
            self.fail_open(key, &e);
        }
    }

    /// Vrátí hodnotu z cache, nebo ji vyrobí produceru a uloží na `ttl`.
    /// Chyba produceru se propaguje a nic se neukládá.
    pub async fn get_cached<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        bypass: bool,
        producer: F,
    ) -> std::result::Result<(T, CacheStatus), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if bypass {
            debug!(key, "cache bypass");
            return producer().await.map(|v| (v, CacheStatus::Bypass));
        }

        match self.lookup(key).await {
            Lookup::Hit(value) => {
                debug!(key, "cache hit");
                return Ok((value, CacheStatus::Hit));
            }
            Lookup::Broken(e) => {
                self.fail_open(key, &e);
                return producer().await.map(|v| (v, CacheStatus::FailOpen));
            }
            Lookup::Miss => {}
        }

        let flight = self.join_flight(key);
        let _turn = flight.turn().await;

        // mezitím mohl hodnotu vyrobit jiný request
        match self.lookup(key).await {
            Lookup::Hit(value) => {
                debug!(key, "cache hit after waiting for in-flight producer");
                return Ok((value, CacheStatus::Hit));
            }
            Lookup::Broken(e) => {
                self.fail_open(key, &e);
                return producer().await.map(|v| (v, CacheStatus::FailOpen));
            }
            Lookup::Miss => {}
        }

        debug!(key, "cache miss");
        let value = producer().await?;
        self.store_value(key, &value, ttl).await;
        Ok((value, CacheStatus::Miss))
    }

    /// Smaže záznam dřív než vyprší. Chyba store se jen zaloguje.
    pub async fn invalidate(&self, key: &str) -> bool {
        match self.store.remove(key).await {
            Ok(removed) => {
                debug!(key, removed, "cache invalidated");
                self.record(key, "invalidated", String::new());
                removed
            }
            Err(e) => {
                warn!("cache invalidate failed for {}: {}", key, e);
                false
            }
        }
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_lowercased_and_order_sensitive() {
        assert_eq!(cache_key("team-matches", &["2", "Sentinels", "90"]), "team-matches:2:sentinels:90");
        assert_ne!(cache_key("ns", &["a", "b"]), cache_key("ns", &["b", "a"]));
        assert_eq!(cache_key("NS", &[" X "]), "ns:x");
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(3600));
        assert_eq!(clock.now() - start, chrono::Duration::hours(1));
    }
}
