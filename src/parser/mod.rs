pub mod extract;
pub mod listing;
pub mod normalize;

use std::sync::LazyLock;

use rand::Rng;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::CrawlMode;
use crate::model::{CandidateListing, CanonicalRecord, Extracted};
use crate::synth;
use crate::validate::{rejection, Rejection};
use extract::availability::{parse_slots, AvailabilityWindow};
use extract::{address, name, phone, services};
use normalize::{parse_count, parse_rating};

static RATING_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='ratingValue']").unwrap());
static REVIEW_COUNT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemprop='reviewCount']").unwrap());

pub struct BuildOptions<'a> {
    pub mode: CrawlMode,
    pub country_code: &'a str,
    pub currency: &'a str,
    pub synthesize_availability: bool,
    pub window: AvailabilityWindow,
}

/// Why a profile produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skipped {
    NoName,
    Rejected { name: String, reason: Rejection },
}

/// Extraction and gap-filling for one profile: document → extractors →
/// validator → synthesis. Nothing is synthesized for a rejected name.
pub fn build_record<R: Rng + ?Sized>(
    doc: &Html,
    listing: &CandidateListing,
    slots_payload: Option<&str>,
    opts: &BuildOptions,
    rng: &mut R,
) -> Result<CanonicalRecord, Skipped> {
    let full_name = name::extract(doc)
        .or_else(|| listing_name(listing))
        .ok_or(Skipped::NoName)?;
    if let Some(reason) = rejection(&full_name, &listing.category, opts.mode) {
        return Err(Skipped::Rejected { name: full_name, reason });
    }

    let address = Extracted::from_option(address::extract(doc))
        .or_synthesize(|| synth::address(&listing.locality));
    let phone = Extracted::from_option(phone::extract(doc, opts.country_code))
        .or_synthesize(|| synth::phone(&mut *rng));

    let found_services = services::extract(doc, opts.currency);
    let services = if found_services.is_empty() {
        Extracted::Synthesized(synth::services(&listing.category, opts.currency, &mut *rng))
    } else {
        Extracted::Found(found_services)
    };

    let mut synthesized = Vec::new();
    if address.is_synthesized() {
        synthesized.push("address");
    }
    if phone.is_synthesized() {
        synthesized.push("phone");
    }
    if services.is_synthesized() {
        synthesized.push("services");
    }

    let address = address.into_option().unwrap_or_default();
    let modality = synth::modality_for(&address);
    let live_slots = slots_payload
        .map(|p| parse_slots(p, &opts.window, modality))
        .unwrap_or_default();
    let slots = if !live_slots.is_empty() {
        live_slots
    } else if opts.synthesize_availability {
        synthesized.push("slots");
        synth::availability(&opts.window, &address)
    } else {
        Vec::new()
    };

    let rating = listing.rating.or_else(|| {
        doc.select(&RATING_VALUE)
            .find_map(|el| el.value().attr("content").and_then(parse_rating))
    });
    let review_count = listing
        .review_count
        .or_else(|| {
            doc.select(&REVIEW_COUNT)
                .find_map(|el| el.value().attr("content").and_then(parse_count))
        })
        .unwrap_or(0);

    if !synthesized.is_empty() {
        debug!(name = %full_name, fields = ?synthesized, "synthesized missing fields");
    }

    Ok(CanonicalRecord {
        full_name,
        category: listing.category.clone(),
        locality: listing.locality.clone(),
        address,
        country_code: opts.country_code.to_string(),
        phone: phone.into_option().unwrap_or_default(),
        rating,
        review_count,
        source_url: listing.profile_url.clone(),
        services: services::dedup(services.into_option().unwrap_or_default()),
        slots,
        synthesized,
    })
}

/// Card label from the results page, used when the document names nobody.
fn listing_name(listing: &CandidateListing) -> Option<String> {
    let name = listing.display_name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
