/// vlr-vod-feed: Logger
/// JSONL event stream (logs/<date>.jsonl) vedle tracing výstupu

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct EventLogger {
    log_dir: PathBuf,
    // souběžné requesty píšou do stejného souboru, řádky se nesmí proplést
    write_lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir, write_lock: Mutex::new(()) }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event typy ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct UpstreamFetchEvent {
    pub ts:          String,
    pub event:       &'static str,   // "UPSTREAM_FETCH"
    pub url:         String,
    pub ok:          bool,
    pub status_code: Option<u16>,
    pub elapsed_ms:  u64,
    pub message:     String,
}

#[derive(Serialize, Debug)]
pub struct FeedBuiltEvent {
    pub ts:                String,
    pub event:             &'static str,   // "FEED_BUILT"
    pub namespace:         String,         // "team-matches" | "player-matches" | ...
    pub entity_id:         String,
    pub total_matches:     usize,
    pub fetched_matches:   usize,
    pub matches_with_vods: usize,
    pub requested_limit:   usize,
}

#[derive(Serialize, Debug)]
pub struct CacheStatusEvent {
    pub ts:      String,
    pub event:   &'static str,   // "CACHE_STATUS"
    pub key:     String,
    pub status:  String,         // "hit" | "miss" | "bypass" | "fail_open" | "invalidated"
    pub message: String,
}

#[derive(Serialize, Debug)]
pub struct ApiRequestEvent {
    pub ts:          String,
    pub event:       &'static str,   // "API_REQUEST"
    pub method:      String,
    pub path:        String,
    pub status_code: u16,
    pub elapsed_ms:  u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(dir.path());

        for code in [200u16, 500] {
            logger
                .log(&ApiRequestEvent {
                    ts: now_iso(),
                    event: "API_REQUEST",
                    method: "GET".to_string(),
                    path: "/api/team-matches".to_string(),
                    status_code: code,
                    elapsed_ms: 12,
                })
                .unwrap();
        }

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let raw = fs::read_to_string(dir.path().join(format!("{date}.jsonl"))).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "API_REQUEST");
        assert_eq!(second["status_code"], 500);
    }
}
