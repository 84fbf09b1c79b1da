//! Link extractor pro listing stránky.
//!
//! Tři vrstvy, každá se spustí jen když předchozí nenašla nic:
//!   strict     `/<digits>/<slug>`
//!   relaxed    anchor s card/match třídou, numerický prefix nebo `-vs-`
//!   aggressive `/<4+ digits>/` kdekoliv v href, jen prvních N anchorů
//!
//! Pořadí výstupu = pořadí prvního výskytu (vlr řadí od nejnovějšího).

use regex::Regex;
use scraper::ElementRef;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::html::{attr, has_class, parse_document, select_all, site_path, SITE_ORIGIN};
use crate::model::MatchReference;

static STRICT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(\d+)/[^/?#]+").expect("valid strict href regex"));
static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4,})/").expect("valid numeric segment regex"));

/// Třídy, které vlr dává kartám zápasů na listing stránkách.
pub const MATCH_CARD_CLASSES: &[&str] = &["wf-card", "m-item", "match-item", "wf-module-item", "mod-match"];

/// Kolik anchorů projde aggressive vrstva.
pub const AGGRESSIVE_SCAN_LIMIT: usize = 500;

pub trait LinkTier {
    fn name(&self) -> &'static str;

    /// Kandidáti v pořadí dokumentu, duplicity řeší volající.
    fn scan(&self, root: ElementRef<'_>) -> Vec<MatchReference>;
}

pub struct StrictTier;
pub struct RelaxedTier;
pub struct AggressiveTier {
    pub scan_limit: usize,
}

impl Default for AggressiveTier {
    fn default() -> Self {
        Self { scan_limit: AGGRESSIVE_SCAN_LIMIT }
    }
}

fn anchors(root: ElementRef<'_>) -> impl Iterator<Item = (ElementRef<'_>, &str)> {
    select_all(root, "a[href]")
        .into_iter()
        .filter_map(|a| attr(a, "href").map(|href| (a, site_path(href))))
}

fn strict_match_id(href: &str) -> Option<String> {
    STRICT_HREF.captures(href).map(|caps| caps[1].to_string())
}

pub fn reference(href: &str, match_id: Option<String>) -> MatchReference {
    let full_url = if href.starts_with('/') {
        format!("{SITE_ORIGIN}{href}")
    } else {
        href.to_string()
    };
    MatchReference {
        href: href.to_string(),
        full_url,
        match_id,
    }
}

impl LinkTier for StrictTier {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn scan(&self, root: ElementRef<'_>) -> Vec<MatchReference> {
        anchors(root)
            .filter_map(|(_, href)| strict_match_id(href).map(|id| reference(href, Some(id))))
            .collect()
    }
}

impl LinkTier for RelaxedTier {
    fn name(&self) -> &'static str {
        "relaxed"
    }

    fn scan(&self, root: ElementRef<'_>) -> Vec<MatchReference> {
        anchors(root)
            .filter(|(a, _)| MATCH_CARD_CLASSES.iter().any(|class| has_class(*a, class)))
            .filter(|(_, href)| href.starts_with('/'))
            .filter_map(|(_, href)| match strict_match_id(href) {
                Some(id) => Some(reference(href, Some(id))),
                None if href.contains("-vs-") => Some(reference(href, None)),
                None => None,
            })
            .collect()
    }
}

impl LinkTier for AggressiveTier {
    fn name(&self) -> &'static str {
        "aggressive"
    }

    fn scan(&self, root: ElementRef<'_>) -> Vec<MatchReference> {
        anchors(root)
            .take(self.scan_limit)
            .filter_map(|(_, href)| {
                NUMERIC_SEGMENT
                    .captures(href)
                    .map(|caps| reference(href, Some(caps[1].to_string())))
            })
            .collect()
    }
}

/// Unikátní reference z listing HTML, výchozí vrstvy.
pub fn extract_match_links(html: &str, exclude: &HashSet<String>) -> Vec<MatchReference> {
    extract_with_tiers(html, exclude, &[&StrictTier, &RelaxedTier, &AggressiveTier::default()])
}

/// Vrstvy se zkouší v pořadí; končí se na první vrstvě, která našla
/// aspoň jednoho kandidáta (i kdyby je `exclude` všechny vyřadil).
pub fn extract_with_tiers(html: &str, exclude: &HashSet<String>, tiers: &[&dyn LinkTier]) -> Vec<MatchReference> {
    let document = parse_document(html);
    let root = document.root_element();

    for tier in tiers {
        let candidates = tier.scan(root);
        if candidates.is_empty() {
            continue;
        }

        let found = candidates.len();
        let unique = dedup_references(candidates, exclude);
        debug!(tier = tier.name(), found, unique = unique.len(), "match links extracted");
        return unique;
    }

    debug!("no match links found on listing page");
    Vec::new()
}

/// Nechá první výskyt každého klíče (match id, jinak href).
pub fn dedup_references(candidates: Vec<MatchReference>, exclude: &HashSet<String>) -> Vec<MatchReference> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|r| {
            let key = r.dedup_key();
            !exclude.contains(key) && seen.insert(key.to_string())
        })
        .collect()
}
