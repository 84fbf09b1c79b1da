//! Co se dá vyčíst z listing stránky bez stahování detailů:
//! jména týmů ze slugu odkazu (filtr soupeře) a karta zápasu
//! (náhradní info, když detail stránka selže).

use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use scraper::ElementRef;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

use crate::detail::derive_winner;
use crate::html::{attr, has_class, parse_document, select_all, select_first, site_path, text_of};
use crate::model::{MatchInfo, MatchReference, Score, TeamInfo};

/// Jméno týmu do slug tvaru: bez diakritiky, lowercase, pomlčky.
/// "Leviatán Esports" → "leviatan-esports"
pub fn slugify(name: &str) -> String {
    let ascii: String = name.nfkd().filter(|c| c.is_ascii()).collect();
    ascii
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// `/353177/sentinels-vs-fnatic-champions-tour-2024` → ("sentinels", "fnatic-champions-tour-2024").
/// Druhá strana obsahuje i název turnaje, slug hranici nijak neznačí.
pub fn slug_teams(href: &str) -> Option<(String, String)> {
    let path = site_path(href).split(['?', '#']).next().unwrap_or_default();
    let slug = path.split('/').filter(|s| !s.is_empty()).last()?.to_lowercase();
    let (left, right) = slug.split_once("-vs-")?;
    Some((left.to_string(), right.to_string()))
}

/// Odpovídá odkaz některému z filtrů soupeře? Prázdný filtr pustí vše.
/// Odkaz bez `-vs-` ve slugu filtr nesplní.
pub fn matches_team_filter(reference: &MatchReference, filters: &[String]) -> bool {
    let wanted: Vec<String> = filters.iter().map(|f| slugify(f)).filter(|f| !f.is_empty()).collect();
    if wanted.is_empty() {
        return true;
    }
    let Some((team1, team2)) = slug_teams(&reference.href) else {
        return false;
    };
    wanted
        .iter()
        .any(|f| team1 == *f || team2 == *f || team1.contains(f.as_str()) || team2.contains(f.as_str()))
}

// ── Karta zápasu na listingu ─────────────────────────────────────────────────

/// Náhradní data z karty zápasu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingHint {
    pub info: Option<MatchInfo>,
    pub date: Option<String>,
}

fn card_team_names(card: ElementRef<'_>) -> Vec<String> {
    let mut names: Vec<String> = select_all(card, ".m-item-team-name")
        .into_iter()
        .chain(select_all(card, ".match-item-vs-team-name .text-of"))
        .map(text_of)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        names = select_all(card, ".match-item-vs-team-name").into_iter().map(text_of).collect();
    }
    names
}

fn card_scores(card: ElementRef<'_>) -> Vec<(u32, bool)> {
    let cells = {
        let result = select_all(card, ".m-item-result span");
        if result.is_empty() {
            select_all(card, ".match-item-vs-team-score")
        } else {
            result
        }
    };
    cells
        .into_iter()
        .filter_map(|c| {
            let score = text_of(c).parse::<u32>().ok()?;
            let marked = has_class(c, "mod-win") || select_first(c, ".mod-win").is_some();
            Some((score, marked))
        })
        .collect()
}

fn card_info(card: ElementRef<'_>) -> Option<MatchInfo> {
    let names = card_team_names(card);
    if names.len() < 2 {
        return None;
    }
    let scores = card_scores(card);
    let (score, winner) = match scores.as_slice() {
        [(s1, m1), (s2, m2), ..] => {
            let score = Score { team1: *s1, team2: *s2 };
            (score, derive_winner(score, *m1, *m2))
        }
        _ => (Score::default(), None),
    };
    Some(MatchInfo {
        team1: TeamInfo { name: names[0].clone(), logo: None },
        team2: TeamInfo { name: names[1].clone(), logo: None },
        score,
        winner,
    })
}

/// "2024/08/25" + "10:00 am" → RFC 3339 UTC.
fn card_date(card: ElementRef<'_>) -> Option<String> {
    let block = select_first(card, ".m-item-date")?;
    let text = text_of(block);
    let mut parts = text.split_whitespace();
    let date = NaiveDate::parse_from_str(parts.next()?, "%Y/%m/%d").ok()?;
    let rest = parts.collect::<Vec<_>>().join(" ").to_uppercase();
    let time = NaiveTime::parse_from_str(&rest, "%I:%M %p")
        .ok()
        .or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
    Some(date.and_time(time).and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// href (site path) → info z karty zápasu.
pub fn salvage_listing_hints(html: &str) -> HashMap<String, ListingHint> {
    let document = parse_document(html);
    let mut hints = HashMap::new();

    for card in select_all(document.root_element(), "a.m-item[href], a.match-item[href], a.wf-card[href]") {
        let Some(href) = attr(card, "href") else { continue };
        let hint = ListingHint {
            info: card_info(card),
            date: card_date(card),
        };
        if hint.info.is_some() || hint.date.is_some() {
            hints.entry(site_path(href).to_string()).or_insert(hint);
        }
    }
    hints
}
