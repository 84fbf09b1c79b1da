//! Detail stránka zápasu → týmy, skóre, vítěz, datum, veto mapy, VOD odkazy.
//!
//! Struktura vlr.gg match page (zkráceně):
//! <div class="match-header-date"><div class="moment-tz-convert" data-utc-ts="...">Sunday, August 25th</div>...
//! <a class="match-header-link mod-1"><img src="//owcdn.net/..."><div class="wf-title-med">Sentinels</div></a>
//! <div class="match-header-vs-score"><span class="match-header-vs-score-winner">2</span>...
//! <div class="match-header-note">SEN ban Haven; FNC ban Icebox; SEN pick Bind; ...; Sunset remains</div>
//! <div class="match-vods"><a href="https://youtu.be/...">Map 1</a>...
//!
//! Každé pole má vlastní funkci vracející Option, rozbitý selektor
//! nepoloží extrakci zbytku stránky.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::html::{absolute_url, attr, has_class, parse_document, select_all, select_first, select_first_of, text_of};
use crate::model::{MatchInfo, Score, TeamInfo};

pub const TEAM_PLACEHOLDER: &str = "TBD";

static PICK_MAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpick(?:ed)?\s+([A-Za-z][A-Za-z']*)").expect("valid pick regex"));
static REMAINS_MAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-Za-z][A-Za-z']*)\s+remains\b").expect("valid remains regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"));
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b")
        .expect("valid month regex")
});
static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*([ap])\.?m\.?").expect("valid clock regex"));

const TEAM_HEADER_SELECTORS: &[&str] = &[
    "div.match-header-vs a.match-header-link",
    "a.match-header-link",
    "div.match-header-link",
];
const VOD_SELECTORS: &[&str] = &["div.match-vods a[href]", "div.match-streams-container a.match-vod[href]"];

/// Co jde vytáhnout z jedné detail stránky.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchDetail {
    pub info: Option<MatchInfo>,
    pub date: Option<String>,
    pub maps_played: Vec<String>,
    pub vod_hrefs: Vec<String>,
}

pub fn extract_match_detail(html: &str) -> MatchDetail {
    let document = parse_document(html);
    let root = document.root_element();

    let detail = MatchDetail {
        info: extract_match_info(root),
        date: extract_match_date(root),
        maps_played: select_first(root, "div.match-header-note")
            .map(|note| maps_from_note(&text_of(note)))
            .unwrap_or_default(),
        vod_hrefs: extract_vod_hrefs(root),
    };

    debug!(
        has_info = detail.info.is_some(),
        date = detail.date.as_deref().unwrap_or("-"),
        maps = detail.maps_played.len(),
        vods = detail.vod_hrefs.len(),
        "match detail parsed"
    );
    detail
}

// ── Týmy a skóre ────────────────────────────────────────────────────────────

fn team_name(header: ElementRef<'_>) -> String {
    select_first(header, ".wf-title-med")
        .map(text_of)
        .filter(|n| !n.is_empty())
        .or_else(|| {
            select_first(header, "img[alt]")
                .and_then(|img| attr(img, "alt"))
                .map(|alt| strip_logo_suffix(alt).to_string())
                .filter(|n| !n.is_empty())
        })
        .unwrap_or_else(|| TEAM_PLACEHOLDER.to_string())
}

const LOGO_ALT_SUFFIX: &str = " team logo";

fn strip_logo_suffix(alt: &str) -> &str {
    let alt = alt.trim();
    let cut = alt.len().saturating_sub(LOGO_ALT_SUFFIX.len());
    match alt.get(cut..) {
        Some(tail) if tail.eq_ignore_ascii_case(LOGO_ALT_SUFFIX) => alt[..cut].trim(),
        _ => alt,
    }
}

fn team_logo(header: ElementRef<'_>) -> Option<String> {
    select_first(header, "img")
        .and_then(|img| attr(img, "src"))
        .map(absolute_url)
}

fn team_info(header: Option<ElementRef<'_>>) -> TeamInfo {
    match header {
        Some(h) => TeamInfo { name: team_name(h), logo: team_logo(h) },
        None => TeamInfo { name: TEAM_PLACEHOLDER.to_string(), logo: None },
    }
}

fn is_winner_marked(el: ElementRef<'_>) -> bool {
    el.value().classes().any(|c| c == "mod-winner" || c.ends_with("-winner"))
}

/// Dvě score buňky v pořadí team1, team2 (dvojtečka se přeskočí).
fn score_cells(root: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    select_first_of(root, &["div.match-header-vs-score .js-spoiler span", "div.match-header-vs-score span"])
        .into_iter()
        .filter(|span| !has_class(*span, "match-header-vs-score-colon"))
        .filter(|span| {
            let text = text_of(*span);
            !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
        })
        .take(2)
        .collect()
}

/// Vítěz podle skóre; explicitní winner marker má přednost.
pub fn derive_winner(score: Score, team1_marked: bool, team2_marked: bool) -> Option<u8> {
    let numeric = match score.team1.cmp(&score.team2) {
        std::cmp::Ordering::Greater => Some(1),
        std::cmp::Ordering::Less => Some(2),
        std::cmp::Ordering::Equal => None,
    };

    let marked = match (team1_marked, team2_marked) {
        (true, false) => Some(1),
        (false, true) => Some(2),
        _ => None,
    };

    match (numeric, marked) {
        (Some(n), Some(m)) if n != m => {
            warn!(
                score1 = score.team1,
                score2 = score.team2,
                marker = m,
                "winner marker disagrees with score, using marker"
            );
            Some(m)
        }
        (_, Some(m)) => Some(m),
        (n, None) => n,
    }
}

pub fn extract_match_info(root: ElementRef<'_>) -> Option<MatchInfo> {
    let headers = select_first_of(root, TEAM_HEADER_SELECTORS);
    if headers.is_empty() {
        debug!("no team headers on match page");
        return None;
    }

    let cells = score_cells(root);
    let cell_score = |idx: usize| {
        cells
            .get(idx)
            .and_then(|c| text_of(*c).parse::<u32>().ok())
            .unwrap_or(0)
    };
    let score = Score { team1: cell_score(0), team2: cell_score(1) };

    let marked = |idx: usize| {
        cells.get(idx).is_some_and(|c| is_winner_marked(*c))
            || headers.get(idx).is_some_and(|h| is_winner_marked(*h))
    };
    let winner = derive_winner(score, marked(0), marked(1));

    Some(MatchInfo {
        team1: team_info(headers.first().copied()),
        team2: team_info(headers.get(1).copied()),
        score,
        winner,
    })
}

// ── Veto mapy ────────────────────────────────────────────────────────────────

/// "SEN ban Haven; SEN pick Bind; FNC picked Split; Sunset remains" → [Bind, Split, Sunset]
pub fn maps_from_note(note: &str) -> Vec<String> {
    let mut maps: Vec<String> = Vec::new();
    for segment in note.split(';') {
        let found = PICK_MAP
            .captures(segment)
            .or_else(|| REMAINS_MAP.captures(segment))
            .map(|caps| caps[1].to_string());

        if let Some(map) = found {
            if !maps.iter().any(|m| m.eq_ignore_ascii_case(&map)) {
                maps.push(map);
            }
        }
    }
    maps
}

// ── Datum ────────────────────────────────────────────────────────────────────

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn month_number(prefix: &str) -> Option<u32> {
    let months = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let prefix = prefix.to_lowercase();
    months.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

/// Řádky hlavičky: rok, "August 25th", "12:00 PM". Časová zóna se ignoruje,
/// čas se bere jako UTC.
pub fn date_from_header_lines(lines: &[String]) -> Option<String> {
    let year: i32 = lines
        .iter()
        .find_map(|l| YEAR.captures(l))
        .and_then(|caps| caps[1].parse().ok())?;

    let (month, day) = lines.iter().find_map(|l| {
        let caps = MONTH_DAY.captures(l)?;
        Some((month_number(&caps[1])?, caps[2].parse::<u32>().ok()?))
    })?;

    let (hour, minute) = lines
        .iter()
        .find_map(|l| {
            let caps = CLOCK.captures(l)?;
            let hour12: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            if !(1..=12).contains(&hour12) {
                return None;
            }
            let pm = caps[3].eq_ignore_ascii_case("p");
            let hour = match (hour12, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            Some((hour, minute))
        })
        .unwrap_or((0, 0));

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(iso(naive.and_utc()))
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` nebo holé datum.
pub fn parse_date_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(iso(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(iso(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| iso(naive.and_utc()))
}

fn header_lines(block: ElementRef<'_>) -> Vec<String> {
    block
        .text()
        .flat_map(str::lines)
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect()
}

fn date_from_metadata(root: ElementRef<'_>) -> Option<String> {
    let candidates = [
        ("meta[property='article:published_time']", "content"),
        ("meta[name='date']", "content"),
        ("time[datetime]", "datetime"),
    ];
    candidates.iter().find_map(|(css, attr_name)| {
        select_first(root, css)
            .and_then(|el| attr(el, attr_name))
            .and_then(parse_date_value)
    })
}

pub fn extract_match_date(root: ElementRef<'_>) -> Option<String> {
    let header = select_first(root, "div.match-header-date");

    header
        .and_then(|block| date_from_header_lines(&header_lines(block)))
        .or_else(|| {
            header
                .and_then(|block| select_first(block, "[data-utc-ts]"))
                .and_then(|el| attr(el, "data-utc-ts"))
                .and_then(parse_date_value)
        })
        .or_else(|| date_from_metadata(root))
}

// ── VOD odkazy ───────────────────────────────────────────────────────────────

fn looks_like_video_host(href: &str) -> bool {
    let lower = href.to_lowercase();
    lower.contains("youtube.com/") || lower.contains("youtu.be/") || lower.contains("twitch.tv/")
}

/// Anchory VOD bloku; bez bloku jakýkoliv YouTube/Twitch odkaz na stránce.
pub fn extract_vod_hrefs(root: ElementRef<'_>) -> Vec<String> {
    let mut anchors = select_first_of(root, VOD_SELECTORS);
    if anchors.is_empty() {
        anchors = select_all(root, "a[href]")
            .into_iter()
            .filter(|a| attr(*a, "href").is_some_and(looks_like_video_host))
            .collect();
    }

    anchors
        .into_iter()
        .filter_map(|a| attr(a, "href"))
        .filter(|href| !href.starts_with('#') && !href.starts_with("javascript:"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(score: &str, header_extra: &str) -> String {
        format!(
            r#"<html><head><meta property="article:published_time" content="2024-03-01T18:00:00+00:00"></head><body>
            <div class="match-header">
              <div class="match-header-date">
                <div class="moment-tz-convert" data-utc-ts="2024-08-25 10:00:00">Sunday, August 25th</div>
                <div class="moment-tz-convert">12:00 PM CEST</div>
                <div>Patch 9.03</div>
              </div>
              <div class="match-header-vs">
                <a class="match-header-link mod-1 {header_extra}" href="/team/2/sentinels">
                  <img src="//owcdn.net/img/sen.png" alt="Sentinels team logo">
                  <div class="wf-title-med">Sentinels</div>
                </a>
                <div class="match-header-vs-score">{score}</div>
                <a class="match-header-link mod-2" href="/team/2593/fnatic">
                  <img src="/img/vlr/tmp/vlr.png" alt="FNATIC team logo">
                </a>
              </div>
              <div class="match-header-note">SEN ban Haven; FNC ban Icebox; SEN pick Bind; FNC pick Split; SEN ban Ascent; FNC ban Lotus; Sunset remains</div>
            </div>
            <div class="match-vods"><div class="match-streams-container">
              <a href="https://youtu.be/map1">Map 1</a>
              <a href="https://youtu.be/map2?t=30">Map 2</a>
            </div></div>
            <a href="https://twitch.tv/valorant">stream</a>
            </body></html>"#
        )
    }

    fn spoiler(left: (&str, &str), right: (&str, &str)) -> String {
        format!(
            r#"<div class="js-spoiler"><span class="{}">{}</span><span class="match-header-vs-score-colon">:</span><span class="{}">{}</span></div>"#,
            left.0, left.1, right.0, right.1
        )
    }

    #[test]
    fn extracts_teams_logos_and_score() {
        let html = page(&spoiler(("match-header-vs-score-winner", "13"), ("match-header-vs-score-loser", "7")), "");
        let info = extract_match_detail(&html).info.unwrap();

        assert_eq!(info.team1.name, "Sentinels");
        assert_eq!(info.team1.logo.as_deref(), Some("https://owcdn.net/img/sen.png"));
        assert_eq!(info.team2.name, "FNATIC");
        assert_eq!(info.team2.logo.as_deref(), Some("https://www.vlr.gg/img/vlr/tmp/vlr.png"));
        assert_eq!(info.score, Score { team1: 13, team2: 7 });
        assert_eq!(info.winner, Some(1));
    }

    #[test]
    fn tie_has_no_winner() {
        let html = page(&spoiler(("match-header-vs-score-loser", "10"), ("match-header-vs-score-loser", "10")), "");
        assert_eq!(extract_match_detail(&html).info.unwrap().winner, None);
    }

    #[test]
    fn winner_marker_overrides_numeric_comparison() {
        let html = page(&spoiler(("match-header-vs-score-winner", "7"), ("match-header-vs-score-loser", "13")), "");
        let info = extract_match_detail(&html).info.unwrap();
        assert_eq!(info.score, Score { team1: 7, team2: 13 });
        assert_eq!(info.winner, Some(1));

        let unmarked = page(&spoiler(("a", "7"), ("b", "13")), "mod-winner");
        assert_eq!(extract_match_detail(&unmarked).info.unwrap().winner, Some(1));
    }

    #[test]
    fn derive_winner_table() {
        assert_eq!(derive_winner(Score { team1: 13, team2: 7 }, false, false), Some(1));
        assert_eq!(derive_winner(Score { team1: 10, team2: 10 }, false, false), None);
        assert_eq!(derive_winner(Score { team1: 7, team2: 13 }, true, false), Some(1));
        assert_eq!(derive_winner(Score { team1: 0, team2: 0 }, false, true), Some(2));
        assert_eq!(derive_winner(Score { team1: 2, team2: 1 }, true, true), Some(1));
    }

    #[test]
    fn unscored_match_defaults_to_zero() {
        let info = extract_match_detail(&page("<div>vs.</div>", "")).info.unwrap();
        assert_eq!(info.score, Score::default());
        assert_eq!(info.winner, None);
    }

    #[test]
    fn missing_headers_mean_no_info_but_rest_still_parses() {
        let html = r#"<div class="match-header-note">A pick Lotus; Abyss remains</div>
                      <a href="https://www.youtube.com/watch?v=x1">vod</a>"#;
        let detail = extract_match_detail(html);
        assert!(detail.info.is_none());
        assert_eq!(detail.maps_played, vec!["Lotus", "Abyss"]);
        assert_eq!(detail.vod_hrefs, vec!["https://www.youtube.com/watch?v=x1"]);
    }

    #[test]
    fn team_name_falls_back_to_placeholder() {
        let html = r#"<div class="match-header-vs"><a class="match-header-link"><span></span></a></div>"#;
        let info = extract_match_detail(html).info.unwrap();
        assert_eq!(info.team1.name, TEAM_PLACEHOLDER);
        assert_eq!(info.team2.name, TEAM_PLACEHOLDER);
        assert_eq!(info.team1.logo, None);
    }

    #[test]
    fn veto_note_yields_picks_and_decider_in_order() {
        assert_eq!(
            maps_from_note("SEN ban Haven; FNC ban Icebox; SEN pick Bind; FNC picked split; bind remains"),
            vec!["Bind", "split"]
        );
        assert_eq!(maps_from_note("SEN ban Haven; Sunset remains"), vec!["Sunset"]);
        assert!(maps_from_note("").is_empty());
    }

    #[test]
    fn vod_block_wins_over_loose_anchors() {
        let html = page(&spoiler(("x", "2"), ("y", "0")), "");
        let detail = extract_match_detail(&html);
        assert_eq!(detail.vod_hrefs, vec!["https://youtu.be/map1", "https://youtu.be/map2?t=30"]);
        assert_eq!(detail.maps_played, vec!["Bind", "Split", "Sunset"]);
    }

    #[test]
    fn header_lines_with_year_build_timestamp() {
        let lines: Vec<String> = ["Sunday, August 25th, 2024", "9:05 PM PDT"].iter().map(|s| s.to_string()).collect();
        assert_eq!(date_from_header_lines(&lines).as_deref(), Some("2024-08-25T21:05:00Z"));

        let midnight: Vec<String> = ["2025", "Jan 3rd", "12:30 AM"].iter().map(|s| s.to_string()).collect();
        assert_eq!(date_from_header_lines(&midnight).as_deref(), Some("2025-01-03T00:30:00Z"));

        let invalid: Vec<String> = ["2024", "February 31st"].iter().map(|s| s.to_string()).collect();
        assert_eq!(date_from_header_lines(&invalid), None);
    }

    #[test]
    fn date_falls_back_to_utc_attribute_then_metadata() {
        let html = page(&spoiler(("x", "2"), ("y", "0")), "");
        assert_eq!(extract_match_detail(&html).date.as_deref(), Some("2024-08-25T10:00:00Z"));

        let meta_only = r#"<html><head><meta name="date" content="2023-11-02"></head><body></body></html>"#;
        assert_eq!(extract_match_detail(meta_only).date.as_deref(), Some("2023-11-02T00:00:00Z"));

        let time_tag = r#"<time datetime="2023-11-02T15:04:05+02:00">Nov 2</time>"#;
        assert_eq!(extract_match_detail(time_tag).date.as_deref(), Some("2023-11-02T13:04:05Z"));

        assert_eq!(extract_match_detail("<p>no date here</p>").date, None);
    }
}
