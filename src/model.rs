use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// One card from a search-results page. Lives only for the duration of a crawl pass.
#[derive(Debug, Clone, Default)]
pub struct CandidateListing {
    pub entity_id: Option<String>,
    pub address_id: Option<String>,
    pub display_name: String,
    pub category: String,
    pub locality: String,
    pub profile_url: String,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    /// Raw card markup, kept so extraction can fall back to it.
    pub card_html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    InPerson,
    Remote,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::InPerson => "in_person",
            Modality::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOffering {
    pub name: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub modality: Modality,
}

impl TimeSlot {
    /// Returns `None` unless `end > start`.
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        modality: Modality,
    ) -> Option<Self> {
        (end > start).then_some(TimeSlot {
            start,
            end,
            modality,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalRecord {
    pub full_name: String,
    pub category: String,
    pub locality: String,
    pub address: String,
    pub country_code: String,
    pub phone: String,
    pub rating: Option<f32>,
    pub review_count: u32,
    pub source_url: String,
    pub services: Vec<ServiceOffering>,
    pub slots: Vec<TimeSlot>,
    /// Fields filled by synthesis rather than extraction.
    #[serde(skip)]
    pub synthesized: Vec<&'static str>,
}

/// Per-field extraction result.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Found(T),
    Synthesized(T),
    Missing,
}

impl<T> Extracted<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Extracted::Found(v),
            None => Extracted::Missing,
        }
    }

    /// Keeps a real value; only fills the gap when nothing was found.
    pub fn or_synthesize<F: FnOnce() -> T>(self, f: F) -> Self {
        match self {
            Extracted::Missing => Extracted::Synthesized(f()),
            other => other,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, Extracted::Synthesized(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extracted::Found(v) | Extracted::Synthesized(v) => Some(v),
            Extracted::Missing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_requires_positive_duration() {
        let start = DateTime::parse_from_rfc3339("2026-10-20T09:00:00-05:00").unwrap();
        assert!(TimeSlot::new(start, start, Modality::InPerson).is_none());
        let end = start + chrono::Duration::hours(1);
        assert!(TimeSlot::new(start, end, Modality::Remote).is_some());
    }

    #[test]
    fn synthesis_never_overrides_found_value() {
        let found = Extracted::Found("real").or_synthesize(|| "fake");
        assert_eq!(found, Extracted::Found("real"));
        let filled = Extracted::<&str>::Missing.or_synthesize(|| "fake");
        assert!(filled.is_synthesized());
        assert_eq!(filled.into_option(), Some("fake"));
    }
}
