//! VOD klasifikace: YouTube / Twitch / other, video id, embed URL.
//!
//! Přiřazení mapy je samostatný krok (`pair_maps`) nad dvěma nezávisle
//! vyrobenými seznamy: N-té YouTube VOD ↔ N-tá mapa z veto poznámky.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::model::{Platform, VodLink};

static TWITCH_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)twitch\.tv/(?:[A-Za-z0-9_]+/)?videos?/(\d+)").expect("valid twitch video regex"));
static TWITCH_LOGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{2,25}$").expect("valid twitch login regex"));
static DURATION_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([hms])").expect("valid duration regex"));

/// Twitch cesty, které nejsou kanál.
const TWITCH_RESERVED: &[&str] = &["directory", "downloads", "p", "settings", "search", "subscriptions", "videos"];

/// Odkud se embed přehrává: YouTube chce `origin`, Twitch `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedContext {
    pub origin: String,
    pub parent_host: String,
}

impl EmbedContext {
    /// Z hodnoty Host hlavičky requestu (port se zahodí, IPv6 `[::1]` zůstane celé).
    pub fn for_host(host: &str) -> Self {
        let parent_host = match strip_port(host.trim()).trim() {
            "" => "localhost".to_string(),
            h => h.to_lowercase(),
        };
        Self {
            origin: format!("https://{parent_host}"),
            parent_host,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

/// Uřízne jen koncové `:port`; dvojtečky uvnitř `[...]` patří adrese.
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && !port.contains(']') && port.chars().all(|c| c.is_ascii_digit()) => {
            if name.starts_with('[') == name.ends_with(']') {
                name
            } else {
                host
            }
        }
        _ => host,
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl Default for EmbedContext {
    fn default() -> Self {
        Self::for_host("localhost")
    }
}

/// Běžící počty podle platformy v rámci jednoho zápasu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VodCounters {
    pub youtube: usize,
    pub twitch: usize,
    pub other: usize,
}

fn parse_loose(href: &str) -> Option<Url> {
    let href = href.trim();
    if let Some(rest) = href.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    Url::parse(href)
        .ok()
        .or_else(|| Url::parse(&format!("https://{href}")).ok())
        .filter(|u| u.host_str().is_some_and(|h| h.contains('.')))
}

fn host_of(url: &Url) -> String {
    url.host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .trim_start_matches("m.")
        .to_lowercase()
}

fn is_youtube_host(host: &str) -> bool {
    matches!(host, "youtube.com" | "youtu.be" | "youtube-nocookie.com" | "music.youtube.com")
}

fn is_twitch_host(host: &str) -> bool {
    host == "twitch.tv" || host.ends_with(".twitch.tv")
}

fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn valid_video_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// YouTube video id: short link, `watch?v=`, `embed/`, v tomto pořadí.
pub fn youtube_video_id(href: &str) -> Option<String> {
    let url = parse_loose(href)?;
    let host = host_of(&url);
    if !is_youtube_host(&host) {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if url.path() == "/watch" {
        query_value(&url, "v")
    } else if segments.next() == Some("embed") {
        segments.next().map(str::to_string)
    } else {
        None
    };

    id.filter(|id| valid_video_id(id))
}

/// `90`, `90s`, `1h2m3s`, `2m` → sekundy.
pub fn parse_timestamp(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(secs);
    }

    // hodnota z cizího HTML, přetečení = neplatný čas
    let mut total = 0u64;
    let mut consumed = 0usize;
    for caps in DURATION_PART.captures_iter(raw) {
        let value: u64 = caps[1].parse().ok()?;
        consumed += caps[0].len();
        let secs = match &caps[2] {
            "h" => value.checked_mul(3600)?,
            "m" => value.checked_mul(60)?,
            _ => value,
        };
        total = total.checked_add(secs)?;
    }
    (consumed == raw.len()).then_some(total)
}

fn youtube_start(url: &Url) -> Option<u64> {
    query_value(url, "t")
        .or_else(|| query_value(url, "start"))
        .and_then(|t| parse_timestamp(&t))
}

pub fn youtube_embed_url(video_id: &str, start: Option<u64>, embed: &EmbedContext) -> String {
    let mut url = format!("https://www.youtube.com/embed/{video_id}?enablejsapi=1");
    if !embed.origin.is_empty() {
        url.push_str("&origin=");
        url.push_str(&encode(&embed.origin));
    }
    if let Some(start) = start {
        url.push_str(&format!("&start={start}"));
    }
    url
}

fn twitch_embed(url: &Url, href: &str, embed: &EmbedContext) -> Option<String> {
    let mut player = if let Some(caps) = TWITCH_VIDEO.captures(href) {
        format!("https://player.twitch.tv/?video=v{}", &caps[1])
    } else {
        let login = url.path_segments()?.find(|s| !s.is_empty())?;
        if !TWITCH_LOGIN.is_match(login) || TWITCH_RESERVED.contains(&login.to_lowercase().as_str()) {
            return None;
        }
        format!("https://player.twitch.tv/?channel={}", login.to_lowercase())
    };

    player.push_str(&format!("&parent={}", encode(&embed.parent_host)));
    if let Some(time) = query_value(url, "t") {
        if parse_timestamp(&time).is_some() {
            player.push_str(&format!("&time={time}"));
        }
    }
    Some(player)
}

/// Klasifikuje jeden odkaz a posune počítadlo jeho platformy.
pub fn classify(href: &str, embed: &EmbedContext, counters: &mut VodCounters) -> VodLink {
    let href = href.trim();
    let url = parse_loose(href);
    let host = url.as_ref().map(host_of).unwrap_or_default();

    let (platform, embed_url) = match url {
        Some(url) if is_youtube_host(&host) => {
            counters.youtube += 1;
            let embed_url = youtube_video_id(href).map(|id| youtube_embed_url(&id, youtube_start(&url), embed));
            (Platform::Youtube, embed_url)
        }
        Some(url) if is_twitch_host(&host) => {
            counters.twitch += 1;
            (Platform::Twitch, twitch_embed(&url, href, embed))
        }
        _ => {
            counters.other += 1;
            (Platform::Other, None)
        }
    };

    VodLink {
        url: href.to_string(),
        platform,
        embed_url,
        map_name: None,
    }
}

/// N-té YouTube VOD dostane N-tou mapu, přebytky zůstanou bez mapy.
pub fn pair_maps(vods: &mut [VodLink], maps: &[String]) {
    if maps.is_empty() {
        return;
    }
    vods.iter_mut()
        .filter(|v| v.platform == Platform::Youtube)
        .zip(maps)
        .for_each(|(vod, map)| vod.map_name = Some(map.clone()));
}

/// Deduplikace podle URL (první vyhrává), klasifikace, pak párování map.
pub fn collect_vods(hrefs: &[String], maps: &[String], embed: &EmbedContext) -> Vec<VodLink> {
    let mut seen = HashSet::new();
    let mut counters = VodCounters::default();
    let mut vods: Vec<VodLink> = hrefs
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && seen.insert(h.to_string()))
        .map(|h| classify(h, embed, &mut counters))
        .collect();

    pair_maps(&mut vods, maps);
    debug!(
        youtube = counters.youtube,
        twitch = counters.twitch,
        other = counters.other,
        maps = maps.len(),
        "vods classified"
    );
    vods
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EmbedContext {
        EmbedContext::for_host("vods.example.com:8787")
    }

    #[test]
    fn youtube_watch_link_carries_start_time() {
        let mut counters = VodCounters::default();
        let vod = classify("https://www.youtube.com/watch?v=XYZ&t=90", &ctx(), &mut counters);

        assert_eq!(vod.platform, Platform::Youtube);
        let embed = vod.embed_url.unwrap();
        assert!(embed.starts_with("https://www.youtube.com/embed/XYZ?"));
        assert!(embed.contains("enablejsapi=1"));
        assert!(embed.contains("start=90"));
        assert!(embed.contains("origin=https%3A%2F%2Fvods.example.com"));
        assert_eq!(counters.youtube, 1);
    }

    #[test]
    fn youtube_id_forms_in_priority_order() {
        assert_eq!(youtube_video_id("https://youtu.be/abc_123?t=5").as_deref(), Some("abc_123"));
        assert_eq!(youtube_video_id("youtu.be/abc-123").as_deref(), Some("abc-123"));
        assert_eq!(youtube_video_id("https://m.youtube.com/watch?feature=share&v=def").as_deref(), Some("def"));
        assert_eq!(youtube_video_id("//www.youtube.com/embed/ghi?rel=0").as_deref(), Some("ghi"));
        assert_eq!(youtube_video_id("https://www.youtube.com/@valorantesports"), None);
        assert_eq!(youtube_video_id("https://vimeo.com/123"), None);
    }

    #[test]
    fn youtube_channel_link_stays_youtube_without_embed() {
        let vod = classify("https://www.youtube.com/@valorantesports", &ctx(), &mut VodCounters::default());
        assert_eq!(vod.platform, Platform::Youtube);
        assert_eq!(vod.embed_url, None);
    }

    #[test]
    fn timestamps_in_all_supported_forms() {
        assert_eq!(parse_timestamp("90"), Some(90));
        assert_eq!(parse_timestamp("90s"), Some(90));
        assert_eq!(parse_timestamp("1h2m3s"), Some(3723));
        assert_eq!(parse_timestamp("2m"), Some(120));
        assert_eq!(parse_timestamp("soon"), None);
        assert_eq!(parse_timestamp("5x"), None);
    }

    #[test]
    fn oversized_timestamp_is_dropped_not_wrapped() {
        assert_eq!(parse_timestamp("9999999999999999h"), None);
        assert_eq!(parse_timestamp("5124095576030431h5124095576030431h"), None);

        let hrefs = vec!["https://www.youtube.com/watch?v=abc&t=9999999999999999h".to_string()];
        let vods = collect_vods(&hrefs, &[], &EmbedContext::default());
        let embed = vods[0].embed_url.as_deref().unwrap();
        assert!(embed.starts_with("https://www.youtube.com/embed/abc?"));
        assert!(!embed.contains("start="));
    }

    #[test]
    fn twitch_video_and_channel_embeds_use_request_host_as_parent() {
        let mut counters = VodCounters::default();
        let video = classify("https://www.twitch.tv/videos/2081234567?t=1h5m", &ctx(), &mut counters);
        assert_eq!(video.platform, Platform::Twitch);
        assert_eq!(
            video.embed_url.as_deref(),
            Some("https://player.twitch.tv/?video=v2081234567&parent=vods.example.com&time=1h5m")
        );

        let channel = classify("https://twitch.tv/ValorantEsports", &ctx(), &mut counters);
        assert_eq!(
            channel.embed_url.as_deref(),
            Some("https://player.twitch.tv/?channel=valorantesports&parent=vods.example.com")
        );

        let directory = classify("https://www.twitch.tv/directory", &ctx(), &mut counters);
        assert_eq!(directory.platform, Platform::Twitch);
        assert_eq!(directory.embed_url, None);
        assert_eq!(counters.twitch, 3);
    }

    #[test]
    fn unknown_hosts_are_other() {
        let mut counters = VodCounters::default();
        let vod = classify("https://www.bilibili.com/video/BV1xx", &ctx(), &mut counters);
        assert_eq!(vod.platform, Platform::Other);
        assert_eq!(vod.embed_url, None);
        assert_eq!(counters.other, 1);
    }

    #[test]
    fn maps_pair_with_youtube_vods_positionally() {
        let hrefs: Vec<String> = [
            "https://youtu.be/map1",
            "https://www.twitch.tv/videos/1111",
            "https://youtu.be/map2",
            "https://youtu.be/map1",
            "https://youtu.be/extra",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let maps = vec!["Bind".to_string(), "Split".to_string()];

        let vods = collect_vods(&hrefs, &maps, &ctx());

        assert_eq!(vods.len(), 4);
        let named: Vec<Option<&str>> = vods.iter().map(|v| v.map_name.as_deref()).collect();
        assert_eq!(named, vec![Some("Bind"), None, Some("Split"), None]);
    }

    #[test]
    fn no_maps_means_no_names() {
        let mut vods = vec![classify("https://youtu.be/a", &ctx(), &mut VodCounters::default())];
        pair_maps(&mut vods, &[]);
        assert_eq!(vods[0].map_name, None);
    }

    #[test]
    fn embed_context_defaults() {
        assert_eq!(EmbedContext::for_host("").parent_host, "localhost");
        let custom = EmbedContext::for_host("Feed.Example:443").with_origin("https://app.example");
        assert_eq!(custom.parent_host, "feed.example");
        assert_eq!(custom.origin, "https://app.example");
    }

    #[test]
    fn ipv6_host_keeps_address_and_parent_is_encoded() {
        let v6 = EmbedContext::for_host("[::1]:8787");
        assert_eq!(v6.parent_host, "[::1]");
        assert_eq!(EmbedContext::for_host("[::1]").parent_host, "[::1]");
        assert_eq!(EmbedContext::for_host("localhost").parent_host, "localhost");

        let vod = classify("https://twitch.tv/ValorantEsports", &v6, &mut VodCounters::default());
        assert_eq!(
            vod.embed_url.as_deref(),
            Some("https://player.twitch.tv/?channel=valorantesports&parent=%5B%3A%3A1%5D")
        );
    }
}
