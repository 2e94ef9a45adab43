//! Search-results pages to `CandidateListing`s.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::extract::text_of;
use super::normalize::{canonical_url, parse_count, parse_rating, strip_titles};
use crate::model::CandidateListing;

static RESULT_CARDS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-doctor-id], [data-result-id]").unwrap());
static BROAD_CARDS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-doctor-id], [data-result-id], div.card, article, li.search-result, div.media")
        .unwrap()
});
static PROFILE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[itemprop='url'], a[data-id='doctor-profile-link'], h2 a[href], h3 a[href]")
        .unwrap()
});
static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static NAME_PROP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='name']").unwrap());
static SPECIALTY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-test-id='doctor-specializations'], [itemprop='medicalSpecialty'], .specializations")
        .unwrap()
});
static RATING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-score], [itemprop='ratingValue']").unwrap());
static REVIEWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-reviews-count], [itemprop='reviewCount']").unwrap());
static ADDRESS_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-address-id]").unwrap());

/// The search scope a page belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ScopeLabels<'a> {
    pub locality: &'a str,
    pub category: Option<&'a str>,
}

/// Cards from a regular results page.
pub fn parse_results(html: &str, base_url: &str, scope: ScopeLabels) -> Vec<CandidateListing> {
    parse_cards(html, base_url, scope, &RESULT_CARDS, false)
}

/// Looser card detection for pages that are not a results listing (site root).
pub fn parse_broad(html: &str, base_url: &str, scope: ScopeLabels) -> Vec<CandidateListing> {
    parse_cards(html, base_url, scope, &BROAD_CARDS, true)
}

fn parse_cards(
    html: &str,
    base_url: &str,
    scope: ScopeLabels,
    cards: &Selector,
    any_link: bool,
) -> Vec<CandidateListing> {
    let doc = Html::parse_document(html);
    let root = canonical_url(base_url, "/");
    let mut seen = HashSet::new();

    doc.select(cards)
        .filter_map(|card| card_listing(card, base_url, scope, any_link))
        .filter(|l| root.as_deref() != Some(l.profile_url.as_str()))
        .filter(|l| seen.insert(l.profile_url.clone()))
        .collect()
}

fn card_listing(
    card: ElementRef,
    base_url: &str,
    scope: ScopeLabels,
    any_link: bool,
) -> Option<CandidateListing> {
    let link = card
        .select(&PROFILE_LINK)
        .next()
        .or_else(|| any_link.then(|| card.select(&ANY_LINK).next()).flatten())?;
    let profile_url = canonical_url(base_url, link.value().attr("href")?)?;

    let attr = |name: &str| {
        card.value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let display_name = attr("data-doctor-name")
        .or_else(|| card.select(&NAME_PROP).map(text_of).find(|t| !t.is_empty()))
        .unwrap_or_else(|| text_of(link));
    let category = card
        .select(&SPECIALTY)
        .map(text_of)
        .find(|t| !t.is_empty())
        .or_else(|| scope.category.map(str::to_string))
        .unwrap_or_default();
    let rating = card.select(&RATING).find_map(|el| {
        let v = el.value();
        v.attr("data-score")
            .or_else(|| v.attr("content"))
            .and_then(parse_rating)
            .or_else(|| parse_rating(&text_of(el)))
    });
    let review_count = card.select(&REVIEWS).find_map(|el| {
        let v = el.value();
        v.attr("data-reviews-count")
            .or_else(|| v.attr("content"))
            .and_then(parse_count)
            .or_else(|| parse_count(&text_of(el)))
    });
    let address_id = attr("data-address-id").or_else(|| {
        card.select(&ADDRESS_ID)
            .find_map(|el| el.value().attr("data-address-id").map(str::to_string))
    });

    Some(CandidateListing {
        entity_id: attr("data-doctor-id")
            .or_else(|| attr("data-result-id"))
            .or_else(|| attr("data-id")),
        address_id,
        display_name: strip_titles(&display_name),
        category,
        locality: scope.locality.to_string(),
        profile_url,
        rating,
        review_count,
        card_html: card.html(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.doctoralia.pe";

    fn scope() -> ScopeLabels<'static> {
        ScopeLabels {
            locality: "Lima",
            category: Some("Psicólogo"),
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn results_page_cards() {
        let listings = parse_results(&fixture("results_page"), BASE, scope());
        assert_eq!(listings.len(), 3);

        let first = &listings[0];
        assert_eq!(first.display_name, "María Fernández Soto");
        assert_eq!(first.entity_id.as_deref(), Some("1001"));
        assert_eq!(first.address_id.as_deref(), Some("5001"));
        assert_eq!(first.category, "Psicólogo");
        assert_eq!(first.locality, "Lima");
        assert_eq!(
            first.profile_url,
            "https://www.doctoralia.pe/maria-fernandez-soto/psicologo/lima"
        );
        assert_eq!(first.rating, Some(4.9));
        assert_eq!(first.review_count, Some(87));
        assert!(first.card_html.contains("data-doctor-id"));

        // the clinic card is still a candidate; rejecting it is the validator's job
        assert!(listings.iter().any(|l| l.display_name.contains("Clínica")));
    }

    #[test]
    fn card_without_specialty_uses_scope_category() {
        let listings = parse_results(&fixture("results_page"), BASE, scope());
        let third = &listings[2];
        assert_eq!(third.category, "Psicólogo");
        assert_eq!(third.rating, None);
    }

    #[test]
    fn empty_results_page() {
        let html = "<html><body><p>No encontramos resultados</p></body></html>";
        assert!(parse_results(html, BASE, scope()).is_empty());
    }

    #[test]
    fn broad_selectors_on_site_root() {
        let listings = parse_broad(&fixture("site_root"), BASE, scope());
        let urls: Vec<&str> = listings.iter().map(|l| l.profile_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.doctoralia.pe/jorge-ramirez/psicologo/lima",
                "https://www.doctoralia.pe/rosa-huaman/psicologo/lima",
            ]
        );
        assert_eq!(listings[0].display_name, "Jorge Ramírez");
        // nothing on the root page matches the strict card selectors
        assert!(parse_results(&fixture("site_root"), BASE, scope()).is_empty());
    }
}
