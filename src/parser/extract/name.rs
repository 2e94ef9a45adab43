use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{first_accepted, first_attr, select_texts, text_of, Strategy};
use crate::parser::normalize::{has_title_prefix, strip_titles};

static NAME_PROP: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[itemprop='name']").unwrap());
/// Blocks whose own `itemprop="name"` belongs to a place or a service.
static NESTED_SCOPES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "[itemprop='address'], [itemprop='availableService'], .service-item, [data-test-id='service-item']",
    )
    .unwrap()
});
static NAME_ATTR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[data-doctor-name]").unwrap());
static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());

static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\p{Lu}[\p{Ll}'’-]+(?:\s+\p{Lu}[\p{Ll}'’-]+)+$").unwrap()
});

const STRATEGIES: &[(&str, Strategy)] = &[
    ("name_itemprop", from_name_itemprop),
    ("name_data_attribute", from_data_attribute),
    ("titled_anchor", from_anchor),
    ("titled_heading", from_heading),
];

/// Person name with professional titles stripped. `None` means the listing
/// cannot become a record.
pub fn extract(doc: &Html) -> Option<String> {
    first_accepted(doc, STRATEGIES, strip_titles, is_acceptable)
}

fn from_name_itemprop(doc: &Html) -> Option<String> {
    doc.select(&NAME_PROP)
        .filter(|el| !inside_nested_scope(el))
        .map(text_of)
        .find(|t| !t.is_empty())
}

fn inside_nested_scope(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| NESTED_SCOPES.matches(&a))
}

fn from_data_attribute(doc: &Html) -> Option<String> {
    first_attr(doc, &NAME_ATTR, "data-doctor-name")
}

fn from_anchor(doc: &Html) -> Option<String> {
    select_texts(doc, &ANCHORS).find(|t| has_title_prefix(t) || PERSON_RE.is_match(t))
}

fn from_heading(doc: &Html) -> Option<String> {
    select_texts(doc, &HEADINGS).find(|t| has_title_prefix(t))
}

fn is_acceptable(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= 80 && name.chars().any(char::is_alphabetic)
}
