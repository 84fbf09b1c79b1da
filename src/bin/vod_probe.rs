//! Ruční ověření selektorů proti živému vlr.gg (bez cache).
//! Spustit:
//!   cargo run --bin vod-probe -- team 2 Sentinels 30
//!   cargo run --bin vod-probe -- maps 2 Sentinels

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use vlr_scraper::{EmbedContext, EntityKind, FeedQuery};
use vlr_vod_feed::build_aggregator;
use vlr_vod_feed::config::ServerConfig;

const USAGE: &str = "usage: vod-probe <team|player|event|maps> <id> <name> [limit]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [mode, id, name, rest @ ..] = args.as_slice() else {
        bail!(USAGE);
    };
    let limit = rest
        .first()
        .map(|raw| raw.parse::<usize>().with_context(|| format!("invalid limit '{raw}'")))
        .transpose()?;

    let cfg = ServerConfig::from_env()?;
    let aggregator = build_aggregator(&cfg, None);
    let embed = match &cfg.public_origin {
        Some(origin) => EmbedContext::default().with_origin(origin.clone()),
        None => EmbedContext::default(),
    };

    let kind = match mode.as_str() {
        "team" => EntityKind::Team,
        "player" => EntityKind::Player,
        "event" => EntityKind::Tournament,
        "maps" => {
            let started = Instant::now();
            let stats = aggregator.map_stats(id, name).await?;
            info!("{} maps in {} ms", stats.map_stats.len(), started.elapsed().as_millis());
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }
        other => bail!("unknown mode '{other}'\n{USAGE}"),
    };

    let mut query = FeedQuery::new(kind, id.as_str(), name.as_str());
    query.limit = limit;

    info!("🔍 {} {} ({}), limit {}", kind.namespace(), id, name, query.effective_limit());
    let started = Instant::now();
    let feed = aggregator.build_feed(&query, &embed).await?;
    info!(
        "{} matches, {} fetched, {} with VODs in {} ms",
        feed.total_matches,
        feed.fetched_matches,
        feed.matches_with_vods,
        started.elapsed().as_millis()
    );

    for m in feed.matches.iter().filter(|m| m.match_info.is_none()) {
        warn!("no match info parsed for {}", m.href);
    }

    println!("{}", serde_json::to_string_pretty(&feed)?);
    Ok(())
}
