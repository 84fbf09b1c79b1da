//! Upstream fetch. Každý request má timeout a prochází rate limiterem,
//! vlr.gg nemá oficiální API a toleruje jen rozumné tempo.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use logger::{now_iso, EventLogger, UpstreamFetchEvent};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{FetchError, Result};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, vrací HTML body pro 2xx odpověď.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    /// Minimální rozestup mezi requesty
    pub request_interval: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            request_interval: Duration::from_millis(250),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
    timeout: Duration,
    events: Option<Arc<EventLogger>>,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let quota = Quota::with_period(config.request_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            client: reqwest::Client::builder()
                // Imitujeme prohlížeč kvůli anti-bot ochraně
                .user_agent(USER_AGENT)
                .default_headers(headers)
                .timeout(config.timeout)
                .gzip(true)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            limiter: RateLimiter::direct(quota),
            timeout: config.timeout,
            events: None,
        }
    }

    pub fn with_event_log(mut self, events: Arc<EventLogger>) -> Self {
        self.events = Some(events);
        self
    }

    async fn get(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await.map_err(|e| self.classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| self.classify(url, e))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }

    fn record(&self, url: &str, started: Instant, outcome: &Result<String>) {
        let Some(events) = &self.events else { return };
        let (ok, status_code, message) = match outcome {
            Ok(body) => (true, Some(200), format!("{} bytes", body.len())),
            Err(e) => (false, e.status_code(), e.to_string()),
        };
        let _ = events.log(&UpstreamFetchEvent {
            ts: now_iso(),
            event: "UPSTREAM_FETCH",
            url: url.to_string(),
            ok,
            status_code,
            elapsed_ms: started.elapsed().as_millis() as u64,
            message,
        });
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(FetcherConfig::default())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.limiter.until_ready().await;

        let started = Instant::now();
        let outcome = self.get(url).await;
        match &outcome {
            Ok(body) => debug!(url, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "upstream ok"),
            Err(e) => warn!("upstream fetch failed: {}", e),
        }
        self.record(url, started, &outcome);
        outcome
    }
}

/// Fetcher nad pevnou mapou URL → HTML pro testy agregátoru a API;
/// počítá requesty, aby šlo ověřit kolik detailů se stáhlo.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// URL odpoví HTTP 503.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }

        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Missing(url.to_string()))
    }
}
