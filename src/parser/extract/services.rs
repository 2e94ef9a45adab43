use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::text_of;
use crate::model::ServiceOffering;

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

static SERVICE_ITEMS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-test-id='service-item'], li.service-item, [itemprop='availableService']")
        .unwrap()
});
static SERVICE_NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-test-id='service-name'], .service-name, [itemprop='name']").unwrap()
});
static SERVICE_HEADINGS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".services h3, .services h4, h3.service-title, h4.service-title").unwrap()
});

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"S/\.?\s*(\d{1,5}(?:[.,]\d{1,2})?)").unwrap());
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2,3})\s*min").unwrap());

/// Services listed on the profile, deduplicated case-insensitively by name in
/// first-seen order. Falls back to heading-based markup when the structured
/// list yields nothing.
pub fn extract(doc: &Html, currency: &str) -> Vec<ServiceOffering> {
    let listed = dedup(
        doc.select(&SERVICE_ITEMS)
            .filter_map(|item| from_item(item, currency)),
    );
    if !listed.is_empty() {
        return listed;
    }
    dedup(
        doc.select(&SERVICE_HEADINGS)
            .filter_map(|heading| from_heading(heading, currency)),
    )
}

fn from_item(item: ElementRef, currency: &str) -> Option<ServiceOffering> {
    let text = text_of(item);
    let name = item
        .select(&SERVICE_NAME)
        .map(text_of)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| strip_price(&text));
    offering(name, &text, currency)
}

fn from_heading(heading: ElementRef, currency: &str) -> Option<ServiceOffering> {
    let adjoining = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .map(text_of)
        .unwrap_or_default();
    let title = text_of(heading);
    offering(strip_price(&title), &format!("{} {}", title, adjoining), currency)
}

fn offering(name: String, context: &str, currency: &str) -> Option<ServiceOffering> {
    let name = name.trim().trim_end_matches([':', '-', '·']).trim().to_string();
    if !name.chars().any(char::is_alphabetic) {
        return None;
    }
    let price = PRICE_RE
        .captures(context)
        .and_then(|c| c[1].replace(',', ".").parse::<f64>().ok());
    let duration_minutes = DURATION_RE
        .captures(context)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    Some(ServiceOffering {
        name,
        currency: price.map(|_| currency.to_string()),
        price,
        duration_minutes,
    })
}

fn strip_price(text: &str) -> String {
    let without = PRICE_RE.replace_all(text, "");
    let without = DURATION_RE.replace_all(&without, "");
    without.trim().trim_end_matches([':', '-', '·', '(', ')']).trim().to_string()
}

/// Keeps the first occurrence of each name, compared case-insensitively.
pub fn dedup(services: impl IntoIterator<Item = ServiceOffering>) -> Vec<ServiceOffering> {
    let mut seen = HashSet::new();
    services
        .into_iter()
        .filter(|s| seen.insert(s.name.to_lowercase()))
        .collect()
}
