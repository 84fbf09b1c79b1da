//! Tenká vrstva nad `scraper`. Žádný helper nepanikaří: neplatný selektor
//! nebo chybějící element = prázdný výsledek a extrakce pokračuje dál.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub const SITE_ORIGIN: &str = "https://www.vlr.gg";

pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            debug!("invalid selector {:?}: {:?}", css, e);
            None
        }
    }
}

pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => scope.select(&sel).collect(),
        None => Vec::new(),
    }
}

pub fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    let found = scope.select(&sel).next();
    found
}

/// Zkusí selektory postupně, vrátí první neprázdný výsledek.
pub fn select_first_of<'a>(scope: ElementRef<'a>, candidates: &[&str]) -> Vec<ElementRef<'a>> {
    candidates
        .iter()
        .map(|css| select_all(scope, css))
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

/// Text elementu se sloučenými whitespace.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).map(str::trim).filter(|v| !v.is_empty())
}

pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// `//owcdn.net/x.png` → `https://owcdn.net/x.png`, `/img/x.png` → absolutní na vlr.gg.
pub fn absolute_url(src: &str) -> String {
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("//") {
        format!("https://{rest}")
    } else if src.starts_with('/') {
        format!("{SITE_ORIGIN}{src}")
    } else {
        src.to_string()
    }
}

/// Absolutní odkaz na vlr.gg zkrátí na path; cizí hosty nechá být.
pub fn site_path(href: &str) -> &str {
    let href = href.trim();
    for prefix in ["https://www.vlr.gg", "http://www.vlr.gg", "https://vlr.gg", "http://vlr.gg"] {
        if let Some(rest) = href.strip_prefix(prefix) {
            if rest.starts_with('/') {
                return rest;
            }
        }
    }
    href
}
