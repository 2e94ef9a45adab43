//! Per-field strategy cascades.
//!
//! Each field module exposes an ordered list of strategies, plain functions from a
//! parsed document to an optional raw value. `first_accepted` runs them left to
//! right and stops at the first value that survives the field's sanity check.

pub mod address;
pub mod availability;
pub mod name;
pub mod phone;
pub mod services;

use scraper::{ElementRef, Html, Selector};

use super::normalize::collapse_whitespace;

pub type Strategy = fn(&Html) -> Option<String>;

/// Runs `strategies` in order; each raw value is passed through `clean` and
/// then `accept`. Later strategies are not attempted once one is accepted.
pub fn first_accepted(
    doc: &Html,
    strategies: &[(&'static str, Strategy)],
    clean: impl Fn(&str) -> String,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    strategies.iter().find_map(|(label, strategy)| {
        let value = clean(&strategy(doc)?);
        if accept(&value) {
            tracing::debug!(strategy = label, value = %value, "strategy accepted");
            Some(value)
        } else {
            None
        }
    })
}

/// Visible text of an element, child text nodes joined with single spaces.
pub fn text_of(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn select_texts<'a>(doc: &'a Html, sel: &'a Selector) -> impl Iterator<Item = String> + 'a {
    doc.select(sel).map(text_of).filter(|t| !t.is_empty())
}

/// Value of `attr` on the first matching element that carries it.
pub fn first_attr(doc: &Html, sel: &Selector, attr: &str) -> Option<String> {
    doc.select(sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
