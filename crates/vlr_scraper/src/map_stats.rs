//! Team stats stránka (`/team/stats/<id>/<slug>/`) → statistiky map.
//!
//! Řádek tabulky mod-team-maps:
//! | Ascent (23) | | 61% | 14 | 9 | ... | <div class="agent-comp-agg"><img title="jett">... |

use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;
use tracing::debug;

use crate::html::{attr, parse_document, select_all, select_first, select_first_of, text_of};
use crate::model::MapStat;

static PLAYED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\)\s*$").expect("valid played suffix regex"));

const ROW_SELECTORS: &[&str] = &["table.mod-team-maps tbody tr", "table.wf-table tbody tr"];

fn map_name(cell: ElementRef<'_>) -> String {
    PLAYED_SUFFIX.replace(&text_of(cell), "").trim().to_string()
}

fn percent(text: &str) -> Option<f64> {
    text.trim().strip_suffix('%')?.trim().parse().ok()
}

fn agent_name(img: ElementRef<'_>) -> Option<String> {
    attr(img, "title")
        .or_else(|| attr(img, "alt"))
        .map(str::to_string)
        .or_else(|| {
            // /img/vlr/game/agents/jett.png → jett
            let src = attr(img, "src")?;
            let file = src.rsplit('/').next()?;
            file.split('.').next().filter(|s| !s.is_empty()).map(str::to_string)
        })
}

/// Nejhranější kompozice = první skupina agentů v řádku.
fn most_played_comp(row: ElementRef<'_>) -> Vec<String> {
    select_first(row, ".agent-comp-agg")
        .map(|group| select_all(group, "img").into_iter().filter_map(agent_name).collect())
        .unwrap_or_default()
}

fn parse_row(row: ElementRef<'_>) -> Option<MapStat> {
    let cells = select_all(row, "td");
    let name = map_name(*cells.first()?);
    if name.is_empty() {
        return None;
    }

    let (pct_idx, win_percent) = cells
        .iter()
        .enumerate()
        .skip(1)
        .find_map(|(i, c)| percent(&text_of(*c)).map(|p| (i, p)))?;

    let mut counts = cells[pct_idx + 1..]
        .iter()
        .filter_map(|c| text_of(*c).parse::<u32>().ok());
    let wins = counts.next().unwrap_or(0);
    let losses = counts.next().unwrap_or(0);

    Some(MapStat {
        map_name: name,
        win_percent,
        wins,
        losses,
        most_played_comp: most_played_comp(row),
    })
}

/// Nerozpoznané řádky se přeskočí, každá mapa jen jednou.
pub fn extract_map_stats(html: &str) -> Vec<MapStat> {
    let document = parse_document(html);
    let mut stats: Vec<MapStat> = Vec::new();

    for row in select_first_of(document.root_element(), ROW_SELECTORS) {
        if let Some(stat) = parse_row(row) {
            if !stats.iter().any(|s| s.map_name.eq_ignore_ascii_case(&stat.map_name)) {
                stats.push(stat);
            }
        }
    }

    debug!(maps = stats.len(), "map stats parsed");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATS_PAGE: &str = r#"
      <table class="wf-table mod-team-maps"><tbody>
        <tr>
          <td><div>Ascent (23)</div></td><td></td><td>61%</td><td>14</td><td>9</td>
          <td><div class="agent-comp-agg"><img title="jett"><img alt="sova"><img src="/img/vlr/game/agents/omen.png"></div>
              <div class="agent-comp-agg"><img title="raze"></div></td>
        </tr>
        <tr class="mod-toggle"><td><div>Ascent (23)</div></td><td>n/a</td><td>50%</td><td>1</td><td>1</td></tr>
        <tr><td>Lotus (4)</td><td></td><td>25 %</td><td>1</td><td>3</td><td></td></tr>
        <tr><td></td><td>junk</td></tr>
        <tr><td>Sunset</td><td>no percent here</td></tr>
      </tbody></table>
    "#;

    #[test]
    fn parses_rows_and_first_composition() {
        let stats = extract_map_stats(STATS_PAGE);
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].map_name, "Ascent");
        assert_eq!(stats[0].win_percent, 61.0);
        assert_eq!((stats[0].wins, stats[0].losses), (14, 9));
        assert_eq!(stats[0].most_played_comp, vec!["jett", "sova", "omen"]);

        assert_eq!(stats[1].map_name, "Lotus");
        assert_eq!(stats[1].win_percent, 25.0);
        assert!(stats[1].most_played_comp.is_empty());
    }

    #[test]
    fn page_without_table_is_empty() {
        assert!(extract_map_stats("<p>Team not found</p>").is_empty());
    }
}
