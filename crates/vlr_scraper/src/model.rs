//! Datové typy feedu. JSON tvar (camelCase) konzumuje prezentační vrstva,
//! `href` slouží jako join key pro session/notes subsystémy.

use serde::{Deserialize, Serialize};

/// Odkaz na detail zápasu nalezený na listing stránce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReference {
    /// Site-relative path, e.g. `/353177/sentinels-vs-fnatic-champions-tour-2024`
    pub href: String,
    pub full_url: String,
    pub match_id: Option<String>,
}

impl MatchReference {
    /// Dedup key: match id, jinak href.
    pub fn dedup_key(&self) -> &str {
        self.match_id.as_deref().unwrap_or(&self.href)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub team1: u32,
    pub team2: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub team1: TeamInfo,
    pub team2: TeamInfo,
    pub score: Score,
    /// 1 | 2 | null (remíza nebo bez skóre)
    pub winner: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitch,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VodLink {
    pub url: String,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub map_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub href: String,
    pub match_id: Option<String>,
    /// RFC 3339 UTC
    pub date: Option<String>,
    pub vod_links: Vec<VodLink>,
    pub match_info: Option<MatchInfo>,
}

impl Match {
    pub fn has_vods(&self) -> bool {
        !self.vod_links.is_empty()
    }
}

/// Výstup agregátoru pro team/player/tournament endpointy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFeed {
    pub matches: Vec<Match>,
    pub total_matches: usize,
    pub fetched_matches: usize,
    #[serde(rename = "matchesWithVODs")]
    pub matches_with_vods: usize,
    pub latest_match: Option<Match>,
    pub requested_limit: usize,
}

impl MatchFeed {
    /// Sestaví feed a dopočítá souhrnné počty.
    pub fn from_matches(matches: Vec<Match>, fetched_matches: usize, requested_limit: usize) -> Self {
        let matches_with_vods = matches.iter().filter(|m| m.has_vods()).count();
        Self {
            total_matches: matches.len(),
            latest_match: matches.first().cloned(),
            matches,
            fetched_matches,
            matches_with_vods,
            requested_limit,
        }
    }

    /// VOD-only pohled: zápasy bez VOD zmizí ze seznamu, počty zůstávají.
    pub fn vod_only(mut self) -> Self {
        self.matches.retain(Match::has_vods);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStat {
    pub map_name: String,
    pub win_percent: f64,
    pub wins: u32,
    pub losses: u32,
    pub most_played_comp: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStatsFeed {
    pub map_stats: Vec<MapStat>,
}
