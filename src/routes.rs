//! API endpointy: validace parametrů → cache → agregátor → JSON.

use chrono::NaiveDate;
use logger::{now_iso, EventLogger, FeedBuiltEvent};
use match_cache::{cache_key, Cache, CacheStatus};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};
use vlr_scraper::{Aggregator, EmbedContext, EntityKind, FeedQuery, FetchError, MatchFeed, SortOrder};

use crate::http::{QueryParams, Request, Response};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] FetchError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::NotFound => 404,
            ApiError::MethodNotAllowed => 405,
            ApiError::Upstream(_) => 500,
        }
    }

    /// Zpráva pro klienta, bez URL a detailů upstreamu.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Upstream(e) => match e.status_code() {
                Some(code) => format!("failed to load data from vlr.gg (HTTP {code})"),
                None => "failed to load data from vlr.gg".to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn into_response(self) -> Response {
        let resp = Response::error(self.status(), &self.public_message());
        match self {
            ApiError::MethodNotAllowed => resp.with_header("Allow", "GET"),
            _ => resp,
        }
    }
}

pub struct AppState {
    pub aggregator: Aggregator,
    pub cache: Cache,
    pub cache_ttl: Duration,
    /// Pevný origin pro YouTube embed, jinak z Host hlavičky
    pub public_origin: Option<String>,
    pub events: Option<Arc<EventLogger>>,
}

/// Parametry feed endpointu po validaci.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub query: FeedQuery,
    pub vods_only: bool,
    pub bypass_cache: bool,
}

fn required(params: &QueryParams, name: &str) -> Result<String, ApiError> {
    params
        .get(name)
        .map(str::to_string)
        .ok_or_else(|| ApiError::InvalidRequest(format!("missing required parameter '{name}'")))
}

fn team_filters(params: &QueryParams) -> Vec<String> {
    ["opponent", "opponents"]
        .iter()
        .filter_map(|name| params.get(name))
        .flat_map(|raw| raw.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn entity_params(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Team => ("teamId", "teamName"),
        EntityKind::Player => ("playerId", "playerName"),
        EntityKind::Tournament => ("eventId", "eventName"),
    }
}

pub fn parse_feed_request(kind: EntityKind, params: &QueryParams) -> Result<FeedRequest, ApiError> {
    let (id_param, name_param) = entity_params(kind);
    let entity_id = required(params, id_param)?;
    let entity_name = required(params, name_param)?;

    // celé číslo mimo rozsah (i záporné) se ořízne v `effective_limit`
    let limit = params
        .get("limit")
        .map(|raw| {
            raw.parse::<i64>()
                .map(|n| usize::try_from(n.max(0)).unwrap_or(usize::MAX))
                .map_err(|_| ApiError::InvalidRequest(format!("invalid limit '{raw}'")))
        })
        .transpose()?;
    let since = params
        .get("since")
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::InvalidRequest(format!("invalid since '{raw}' (expected YYYY-MM-DD)")))
        })
        .transpose()?;

    let mut query = FeedQuery::new(kind, entity_id, entity_name);
    query.team_filters = team_filters(params);
    query.limit = limit;
    query.since = since;
    query.all_dates = params.flag("allDates");
    query.sort = match params.get("sort") {
        Some(s) if s.eq_ignore_ascii_case("newest") => SortOrder::NewestFirst,
        _ => SortOrder::Listing,
    };

    Ok(FeedRequest {
        query,
        vods_only: params.flag("vodsOnly"),
        bypass_cache: params.flag("nocache") || params.flag("debug"),
    })
}

fn embed_context(state: &AppState, req: &Request) -> EmbedContext {
    let embed = EmbedContext::for_host(req.host.as_deref().unwrap_or("localhost"));
    match &state.public_origin {
        Some(origin) => embed.with_origin(origin.clone()),
        None => embed,
    }
}

/// Klíč pokrývá vše, co mění obsah feedu; `vodsOnly` je jen pohled.
fn feed_cache_key(request: &FeedRequest, embed: &EmbedContext) -> String {
    let q = &request.query;
    let limit = q.effective_limit().to_string();
    let since = q.since.map(|d| d.to_string()).unwrap_or_default();
    let filters = q.team_filters.join(",");
    let sort = match q.sort {
        SortOrder::NewestFirst => "newest",
        SortOrder::Listing => "listing",
    };
    cache_key(
        q.kind.namespace(),
        &[
            &q.entity_id,
            &q.entity_name,
            &filters,
            &limit,
            &since,
            if q.all_dates { "all" } else { "" },
            sort,
            &embed.parent_host,
            &embed.origin,
        ],
    )
}

fn log_feed_built(state: &AppState, query: &FeedQuery, feed: &MatchFeed) {
    if let Some(events) = &state.events {
        let ev = FeedBuiltEvent {
            ts: now_iso(),
            event: "FEED_BUILT",
            namespace: query.kind.namespace().to_string(),
            entity_id: query.entity_id.clone(),
            total_matches: feed.total_matches,
            fetched_matches: feed.fetched_matches,
            matches_with_vods: feed.matches_with_vods,
            requested_limit: feed.requested_limit,
        };
        if let Err(e) = events.log(&ev) {
            warn!("feed event log write failed: {}", e);
        }
    }
}

async fn match_feed(state: &Arc<AppState>, req: &Request, kind: EntityKind) -> Result<(MatchFeed, CacheStatus), ApiError> {
    let request = parse_feed_request(kind, &req.query)?;
    let embed = embed_context(state, req);
    let key = feed_cache_key(&request, &embed);

    let producer_state = Arc::clone(state);
    let query = request.query.clone();
    let (feed, status) = state
        .cache
        .get_cached(&key, state.cache_ttl, request.bypass_cache, move || async move {
            let feed = producer_state.aggregator.build_feed(&query, &embed).await?;
            log_feed_built(&producer_state, &query, &feed);
            Ok::<_, FetchError>(feed)
        })
        .await?;

    let feed = if request.vods_only { feed.vod_only() } else { feed };
    Ok((feed, status))
}

async fn map_stats(state: &Arc<AppState>, req: &Request) -> Result<Response, ApiError> {
    let team_id = required(&req.query, "teamId")?;
    let team_name = required(&req.query, "teamName")?;
    let bypass = req.query.flag("nocache") || req.query.flag("debug");
    let key = cache_key("team-map-stats", &[&team_id, &team_name]);

    let producer_state = Arc::clone(state);
    let (stats, status) = state
        .cache
        .get_cached(&key, state.cache_ttl, bypass, move || async move {
            producer_state.aggregator.map_stats(&team_id, &team_name).await
        })
        .await?;
    Ok(Response::json(200, &stats).with_header("X-Cache", status.as_str()))
}

async fn route(state: &Arc<AppState>, req: &Request) -> Result<Response, ApiError> {
    if req.method != "GET" {
        return Err(ApiError::MethodNotAllowed);
    }

    let kind = match req.path.trim_end_matches('/') {
        "/health" => return Ok(Response::json(200, &serde_json::json!({ "status": "ok" }))),
        "/api/team-map-stats" => return map_stats(state, req).await,
        "/api/team-matches" => EntityKind::Team,
        "/api/player-matches" => EntityKind::Player,
        "/api/tournament-matches" => EntityKind::Tournament,
        _ => return Err(ApiError::NotFound),
    };

    let (feed, status) = match_feed(state, req, kind).await?;
    Ok(Response::json(200, &feed).with_header("X-Cache", status.as_str()))
}

pub async fn handle(state: &Arc<AppState>, req: &Request) -> Response {
    match route(state, req).await {
        Ok(resp) => resp,
        Err(e) => {
            match &e {
                ApiError::Upstream(inner) => error!("{} {} failed: {}", req.method, req.path, inner),
                other => warn!("{} {} rejected: {}", req.method, req.path, other),
            }
            e.into_response()
        }
    }
}
