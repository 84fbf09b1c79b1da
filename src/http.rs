//! Minimální HTTP/1.1 nad tokio TcpListener: jeden request na spojení,
//! odpověď s `Connection: close`. Stačí na GET JSON API.

use anyhow::{Context, Result};
use logger::{now_iso, ApiRequestEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::routes::{self, AppState};

const MAX_REQUEST_BYTES: usize = 16 * 1024;
/// Klient, který do té doby nepošle hlavičky, dostane zavřené spojení.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: QueryParams,
    pub host: Option<String>,
}

/// Query string; u opakovaného parametru platí první výskyt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(raw: &str) -> Self {
        let mut params = HashMap::new();
        for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
            params.entry(k.into_owned()).or_insert_with(|| v.trim().to_string());
        }
        Self(params)
    }

    /// Hodnota parametru, prázdná hodnota = chybí.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Příznak: `?debug`, `?debug=1`, `?debug=true`. `0`/`false` vypíná.
    pub fn flag(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"),
            None => false,
        }
    }
}

/// Request line + hlavičky. Tělo GET requestu nás nezajímá.
pub fn parse_request(raw: &str) -> Option<Request> {
    let mut lines = raw.lines();
    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_ascii_uppercase();
    let target = parts.next()?;

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let host = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("host"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|h| !h.is_empty());

    Some(Request {
        method,
        path: path.to_string(),
        query: QueryParams::parse(query),
        host,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

impl Response {
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_string(body) {
            Ok(json) => Self {
                status,
                content_type: "application/json; charset=utf-8",
                headers: Vec::new(),
                body: json,
            },
            Err(e) => Self::error(500, &format!("response serialization failed: {e}")),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json; charset=utf-8",
            headers: Vec::new(),
            body: serde_json::json!({ "error": message }).to_string(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn to_http(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("Connection: close\r\n\r\n");
        head + &self.body
    }
}

async fn read_until_blank_line<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.context("http read")?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn read_head<R: AsyncRead + Unpin>(stream: &mut R, deadline: Duration) -> Result<String> {
    tokio::time::timeout(deadline, read_until_blank_line(stream))
        .await
        .with_context(|| format!("http read timed out after {}s", deadline.as_secs()))?
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) -> Result<()> {
    let started = Instant::now();
    let raw = read_head(&mut stream, READ_TIMEOUT).await?;
    if raw.is_empty() {
        return Ok(());
    }

    let (method, path, resp) = match parse_request(&raw) {
        Some(req) => {
            let resp = routes::handle(&state, &req).await;
            (req.method, req.path, resp)
        }
        None => (String::new(), String::new(), Response::error(400, "malformed request")),
    };

    stream.write_all(resp.to_http().as_bytes()).await.context("http write")?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    debug!("{} {} -> {} ({} ms)", method, path, resp.status, elapsed_ms);
    if let Some(events) = &state.events {
        let _ = events.log(&ApiRequestEvent {
            ts: now_iso(),
            event: "API_REQUEST",
            method,
            path,
            status_code: resp.status,
            elapsed_ms,
        });
    }
    Ok(())
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("vod-feed listening on http://{} (GET /api/team-matches, /api/player-matches, /api/tournament-matches, /api/team-map-stats, /health)", addr);
    }

    loop {
        let (stream, peer) = listener.accept().await.context("http accept")?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                debug!("http handler err {}: {}", peer, e);
            }
        });
    }
}
