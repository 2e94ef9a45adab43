use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{first_attr, text_of};
use crate::parser::normalize::clean_phone;

static TEL_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href^='tel:']").unwrap());
static TEL_PROP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='telephone']").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static SEPARATORS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s.\-()]").unwrap());
/// Nine-digit mobile number, optionally preceded by a dialing prefix glued
/// to it. Group 1 is the prefix, group 2 the number.
static BODY_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(?:\+?(\d{1,3})[\s.-]?)?(9\d{2}[\s.-]?\d{3}[\s.-]?\d{3})(?:[^\d]|$)").unwrap()
});

/// Local number (country code removed), from markup attributes first and a
/// free-text scan second.
pub fn extract(doc: &Html, country_code: &str) -> Option<String> {
    from_tel_attribute(doc, country_code).or_else(|| from_body_text(doc, country_code))
}

fn from_tel_attribute(doc: &Html, country_code: &str) -> Option<String> {
    let raw = first_attr(doc, &TEL_LINK, "href")
        .map(|href| href.trim_start_matches("tel:").to_string())
        .or_else(|| first_attr(doc, &TEL_PROP, "content"))
        .or_else(|| doc.select(&TEL_PROP).map(text_of).find(|t| !t.is_empty()))?;
    let local = clean_phone(&raw, country_code);
    is_local_number(&local).then_some(local)
}

/// Prefixed numbers are only taken when the prefix is the configured
/// country code.
fn from_body_text(doc: &Html, country_code: &str) -> Option<String> {
    let text = doc
        .select(&BODY)
        .next()
        .map(text_of)
        .unwrap_or_else(|| text_of(doc.root_element()));
    BODY_PHONE_RE
        .captures_iter(&text)
        .find(|caps| caps.get(1).map_or(true, |p| p.as_str() == country_code))
        .map(|caps| SEPARATORS_RE.replace_all(&caps[2], "").to_string())
}

fn is_local_number(s: &str) -> bool {
    (7..=9).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}
