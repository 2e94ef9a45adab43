use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{first_accepted, first_attr, select_texts, text_of, Strategy};
use crate::parser::normalize::{has_title_prefix, normalize_address};
use crate::validate::looks_like_organization;

static ADDRESS_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='address']").unwrap());
static TRUNCATED_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.text-truncate").unwrap());
static STREET_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='streetAddress']").unwrap());
static STREET_ATTR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-street-address], meta[itemprop='streetAddress'][content]").unwrap()
});
static LAYOUT_SPANS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.media-body span, div.card-body span, div.address-details span, section span")
        .unwrap()
});
static PARAGRAPHS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

static LOCALITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:calle|av\.|avenida|jr\.|jir[oó]n|urb\.|urbanizaci[oó]n|psje\.|pasaje|online|en l[ií]nea)",
    )
    .unwrap()
});

const STRATEGIES: &[(&str, Strategy)] = &[
    ("address_block", from_address_block),
    ("street_label", from_street_label),
    ("street_attribute", from_street_attribute),
    ("layout_spans", from_layout_spans),
    ("paragraphs", from_paragraphs),
];

/// Normalized postal address, or `None` when every strategy comes up empty.
pub fn extract(doc: &Html) -> Option<String> {
    first_accepted(doc, STRATEGIES, normalize_address, |a| a.chars().count() >= 5)
}

fn from_address_block(doc: &Html) -> Option<String> {
    doc.select(&ADDRESS_BLOCK)
        .flat_map(|block| block.select(&TRUNCATED_SPAN).map(text_of).collect::<Vec<_>>())
        .find(|t| t.chars().count() > 10)
}

fn from_street_label(doc: &Html) -> Option<String> {
    doc.select(&STREET_LABEL)
        .filter_map(|label| {
            label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "span")
        })
        .map(text_of)
        .find(|t| !t.is_empty())
}

fn from_street_attribute(doc: &Html) -> Option<String> {
    first_attr(doc, &STREET_ATTR, "data-street-address")
        .or_else(|| first_attr(doc, &STREET_ATTR, "content"))
}

fn from_layout_spans(doc: &Html) -> Option<String> {
    select_texts(doc, &LAYOUT_SPANS).find(|t| is_address_like(t))
}

fn from_paragraphs(doc: &Html) -> Option<String> {
    select_texts(doc, &PARAGRAPHS).find(|t| is_address_like(t))
}

fn is_address_like(text: &str) -> bool {
    LOCALITY_RE.is_match(text) && !looks_like_organization(text) && !has_title_prefix(text)
}
