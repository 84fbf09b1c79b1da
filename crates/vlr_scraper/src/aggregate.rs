//! Agregátor: listing → odkazy → filtr → limit → detaily → feed.
//!
//! Selhání první listing stránky ukončí celý dotaz. Selhání detailu
//! (HTTP, timeout) jen degraduje daný zápas na záznam bez VOD.
//! Pořadí výstupu = pořadí z listingu, i při paralelním stahování.

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::detail::{extract_match_detail, MatchDetail};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::html::SITE_ORIGIN;
use crate::links::extract_match_links;
use crate::listing::{matches_team_filter, salvage_listing_hints, slugify, ListingHint};
use crate::map_stats::extract_map_stats;
use crate::model::{MapStatsFeed, Match, MatchFeed, MatchReference};
use crate::vod::{collect_vods, EmbedContext};

/// Kolik zápasů vlr ukazuje na jedné listing stránce.
pub const LISTING_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBounds {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl LimitBounds {
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Team,
    Player,
    Tournament,
}

impl EntityKind {
    /// Namespace cache klíče a jméno endpointu.
    pub fn namespace(&self) -> &'static str {
        match self {
            EntityKind::Team => "team-matches",
            EntityKind::Player => "player-matches",
            EntityKind::Tournament => "tournament-matches",
        }
    }

    pub fn limit_bounds(&self) -> LimitBounds {
        match self {
            EntityKind::Team => LimitBounds { min: 30, max: 150, default: 90 },
            EntityKind::Player => LimitBounds { min: 10, max: 100, default: 50 },
            EntityKind::Tournament => LimitBounds { min: 30, max: 200, default: 100 },
        }
    }

    /// Event listing vrací celou sérii najednou, ostatní se stránkují.
    pub fn paginated(&self) -> bool {
        !matches!(self, EntityKind::Tournament)
    }

    pub fn listing_url(&self, id: &str, slug: &str, page: usize) -> String {
        match self {
            EntityKind::Team => format!("{SITE_ORIGIN}/team/matches/{id}/{slug}/?page={page}"),
            EntityKind::Player => format!("{SITE_ORIGIN}/player/matches/{id}/{slug}/?page={page}"),
            EntityKind::Tournament => format!("{SITE_ORIGIN}/event/matches/{id}/{slug}/?series_id=all"),
        }
    }
}

pub fn team_stats_url(id: &str, slug: &str) -> String {
    format!("{SITE_ORIGIN}/team/stats/{id}/{slug}/")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Pořadí z listingu (vlr: od nejnovějšího)
    #[default]
    Listing,
    NewestFirst,
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub kind: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    pub team_filters: Vec<String>,
    pub limit: Option<usize>,
    pub since: Option<NaiveDate>,
    /// Ignoruj `since`
    pub all_dates: bool,
    pub sort: SortOrder,
}

impl FeedQuery {
    pub fn new(kind: EntityKind, entity_id: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            entity_name: entity_name.into(),
            team_filters: Vec::new(),
            limit: None,
            since: None,
            all_dates: false,
            sort: SortOrder::Listing,
        }
    }

    pub fn effective_limit(&self) -> usize {
        self.kind.limit_bounds().clamp(self.limit)
    }

    pub fn entity_slug(&self) -> String {
        slugify(&self.entity_name)
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// 1 = sekvenčně
    pub concurrency: usize,
    pub page_size: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            page_size: LISTING_PAGE_SIZE,
        }
    }
}

pub struct Aggregator {
    fetcher: Arc<dyn Fetcher>,
    config: AggregatorConfig,
}

/// Zápas z detail stránky: VOD klasifikace a párování map.
pub fn build_match(reference: &MatchReference, detail: MatchDetail, embed: &EmbedContext) -> Match {
    Match {
        href: reference.href.clone(),
        match_id: reference.match_id.clone(),
        date: detail.date,
        vod_links: collect_vods(&detail.vod_hrefs, &detail.maps_played, embed),
        match_info: detail.info,
    }
}

/// Zápas, jehož detail se nepodařilo stáhnout.
pub fn degraded_match(reference: &MatchReference, hint: Option<&ListingHint>) -> Match {
    Match {
        href: reference.href.clone(),
        match_id: reference.match_id.clone(),
        date: hint.and_then(|h| h.date.clone()),
        vod_links: Vec::new(),
        match_info: hint.and_then(|h| h.info.clone()),
    }
}

fn match_time(m: &Match) -> Option<DateTime<Utc>> {
    m.date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Zápasy před `since` vypadnou, zápasy bez data zůstávají.
pub fn apply_date_filter(matches: &mut Vec<Match>, since: NaiveDate) {
    matches.retain(|m| match_time(m).map_or(true, |t| t.date_naive() >= since));
}

/// Stabilní řazení od nejnovějšího, zápasy bez data na konci v původním pořadí.
pub fn sort_newest_first(matches: &mut [Match]) {
    matches.sort_by(|a, b| match_time(b).cmp(&match_time(a)));
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_config(fetcher, AggregatorConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn Fetcher>, config: AggregatorConfig) -> Self {
        Self { fetcher, config }
    }

    /// Listing stránky dokud není limit plný. Vrací odkazy po filtru
    /// a kartové info pro případ, že detail selže.
    async fn collect_references(
        &self,
        query: &FeedQuery,
        limit: usize,
    ) -> Result<(Vec<MatchReference>, HashMap<String, ListingHint>)> {
        let slug = query.entity_slug();
        let page_size = self.config.page_size.max(1);
        let max_pages = if query.kind.paginated() { limit.div_ceil(page_size).max(1) } else { 1 };

        let mut seen: HashSet<String> = HashSet::new();
        let mut references = Vec::new();
        let mut hints = HashMap::new();

        for page in 1..=max_pages {
            let url = query.kind.listing_url(&query.entity_id, &slug, page);
            let html = match self.fetcher.fetch_html(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!("listing page {} failed, stopping pagination: {}", page, e);
                    break;
                }
            };

            let page_refs = extract_match_links(&html, &seen);
            if page_refs.is_empty() {
                debug!(page, "listing page has no new matches");
                break;
            }
            for (href, hint) in salvage_listing_hints(&html) {
                hints.entry(href).or_insert(hint);
            }

            let found = page_refs.len();
            for reference in page_refs {
                seen.insert(reference.dedup_key().to_string());
                if matches_team_filter(&reference, &query.team_filters) {
                    references.push(reference);
                }
            }
            debug!(page, found, kept = references.len(), "listing page processed");

            if references.len() >= limit {
                break;
            }
        }

        references.truncate(limit);
        Ok((references, hints))
    }

    async fn fetch_match(&self, reference: &MatchReference, hint: Option<&ListingHint>, embed: &EmbedContext) -> (Match, bool) {
        match self.fetcher.fetch_html(&reference.full_url).await {
            Ok(html) => {
                let detail = extract_match_detail(&html);
                (build_match(reference, detail, embed), true)
            }
            Err(e) => {
                warn!("match {} degraded to listing data: {}", reference.dedup_key(), e);
                (degraded_match(reference, hint), false)
            }
        }
    }

    pub async fn build_feed(&self, query: &FeedQuery, embed: &EmbedContext) -> Result<MatchFeed> {
        let limit = query.effective_limit();
        let (references, hints) = self.collect_references(query, limit).await?;

        let outcomes: Vec<(Match, bool)> = stream::iter(
            references
                .iter()
                .map(|r| self.fetch_match(r, hints.get(&r.href), embed))
                .collect::<Vec<_>>(),
        )
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;

        let fetched = outcomes.iter().filter(|(_, ok)| *ok).count();
        let mut matches: Vec<Match> = outcomes.into_iter().map(|(m, _)| m).collect();

        if let (Some(since), false) = (query.since, query.all_dates) {
            apply_date_filter(&mut matches, since);
        }
        if query.sort == SortOrder::NewestFirst {
            sort_newest_first(&mut matches);
        }

        let feed = MatchFeed::from_matches(matches, fetched, limit);
        info!(
            "{} {} ({}): {} matches, {} fetched, {} with VODs",
            query.kind.namespace(),
            query.entity_id,
            query.entity_name,
            feed.total_matches,
            feed.fetched_matches,
            feed.matches_with_vods
        );
        Ok(feed)
    }

    pub async fn map_stats(&self, team_id: &str, team_name: &str) -> Result<MapStatsFeed> {
        let url = team_stats_url(team_id, &slugify(team_name));
        let html = self.fetcher.fetch_html(&url).await?;
        Ok(MapStatsFeed {
            map_stats: extract_map_stats(&html),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(href: &str, date: Option<&str>) -> Match {
        Match {
            href: href.to_string(),
            match_id: None,
            date: date.map(str::to_string),
            vod_links: Vec::new(),
            match_info: None,
        }
    }

    fn hrefs(matches: &[Match]) -> Vec<&str> {
        matches.iter().map(|m| m.href.as_str()).collect()
    }

    #[test]
    fn limits_are_clamped_per_entry_point() {
        let team = EntityKind::Team.limit_bounds();
        assert_eq!(team.clamp(Some(5)), 30);
        assert_eq!(team.clamp(Some(9999)), 150);
        assert_eq!(team.clamp(None), 90);
        assert_eq!(team.clamp(Some(42)), 42);
        assert_eq!(EntityKind::Player.limit_bounds().clamp(Some(1)), 10);
        assert_eq!(EntityKind::Tournament.limit_bounds().clamp(Some(1000)), 200);
    }

    #[test]
    fn listing_urls_per_entity() {
        assert_eq!(
            EntityKind::Team.listing_url("500", "sentinels", 2),
            "https://www.vlr.gg/team/matches/500/sentinels/?page=2"
        );
        assert_eq!(
            EntityKind::Tournament.listing_url("2097", "champions-2024", 3),
            "https://www.vlr.gg/event/matches/2097/champions-2024/?series_id=all"
        );
        assert_eq!(team_stats_url("500", "sentinels"), "https://www.vlr.gg/team/stats/500/sentinels/");
    }

    #[test]
    fn date_filter_keeps_undated_matches() {
        let mut matches = vec![
            dated("/1/a", Some("2024-08-25T10:00:00Z")),
            dated("/2/b", None),
            dated("/3/c", Some("2024-01-02T00:00:00Z")),
        ];
        apply_date_filter(&mut matches, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(hrefs(&matches), vec!["/1/a", "/2/b"]);
    }

    #[test]
    fn newest_first_is_stable_and_puts_undated_last() {
        let mut matches = vec![
            dated("/1/a", None),
            dated("/2/b", Some("2024-01-02T00:00:00Z")),
            dated("/3/c", Some("2024-08-25T10:00:00Z")),
            dated("/4/d", None),
            dated("/5/e", Some("2024-01-02T00:00:00Z")),
        ];
        sort_newest_first(&mut matches);
        assert_eq!(hrefs(&matches), vec!["/3/c", "/2/b", "/5/e", "/1/a", "/4/d"]);
    }

    #[test]
    fn degraded_match_uses_listing_hint() {
        let reference = crate::links::reference("/9/a-vs-b", Some("9".to_string()));
        let bare = degraded_match(&reference, None);
        assert!(bare.vod_links.is_empty() && bare.match_info.is_none());

        let hint = ListingHint { info: None, date: Some("2024-08-25T10:00:00Z".to_string()) };
        assert_eq!(degraded_match(&reference, Some(&hint)).date.as_deref(), Some("2024-08-25T10:00:00Z"));
    }
}
