use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::Deserialize;

use crate::model::{Modality, TimeSlot};

pub const WINDOW_DAYS: i64 = 14;

/// Forward booking window, starting at midnight of the day after `today`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilityWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl AvailabilityWindow {
    pub fn after(today: NaiveDate, offset: FixedOffset) -> Self {
        let first = today.succ_opt().unwrap_or(today);
        let midnight = first.and_time(NaiveTime::default());
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .unwrap_or_else(|| offset.from_utc_datetime(&midnight));
        AvailabilityWindow {
            start,
            end: start + Duration::days(WINDOW_DAYS),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.start.date_naive();
        (0..WINDOW_DAYS).map(move |i| first + Duration::days(i))
    }

    pub fn contains(&self, slot: &TimeSlot) -> bool {
        slot.start >= self.start && slot.end <= self.end
    }
}

#[derive(Debug, Deserialize)]
struct SlotPayload {
    #[serde(rename = "_items", alias = "items", default)]
    items: Vec<RawSlot>,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    start: String,
    #[serde(default)]
    booked: bool,
    #[serde(default, alias = "url")]
    booking_url: Option<String>,
}

/// Bookable one-hour slots from a slot-listing payload. Any malformed input
/// yields an empty set.
pub fn parse_slots(payload: &str, window: &AvailabilityWindow, modality: Modality) -> Vec<TimeSlot> {
    let parsed: SlotPayload = match serde_json::from_str(payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable slot payload");
            return Vec::new();
        }
    };

    let mut slots: Vec<TimeSlot> = parsed
        .items
        .into_iter()
        .filter(|s| !s.booked && s.booking_url.as_deref().is_some_and(|u| !u.trim().is_empty()))
        .filter_map(|s| DateTime::parse_from_rfc3339(&s.start).ok())
        .filter_map(|start| TimeSlot::new(start, start + Duration::hours(1), modality))
        .filter(|slot| window.contains(slot))
        .collect();
    slots.sort_by_key(|s| s.start);
    slots.dedup_by_key(|s| s.start);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> AvailabilityWindow {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        AvailabilityWindow::after(today, FixedOffset::west_opt(5 * 3600).unwrap())
    }

    #[test]
    fn window_spans_fourteen_days_from_tomorrow() {
        let w = window();
        assert_eq!(w.start.to_rfc3339(), "2026-10-20T00:00:00-05:00");
        assert_eq!(w.end.to_rfc3339(), "2026-11-03T00:00:00-05:00");
        assert_eq!(w.days().count(), 14);
    }

    #[test]
    fn only_open_bookable_slots_survive() {
        let payload = r#"{"_items": [
            {"start": "2026-10-21T10:00:00-05:00", "booked": false, "booking_url": "/book/1"},
            {"start": "2026-10-21T11:00:00-05:00", "booked": true, "booking_url": "/book/2"},
            {"start": "2026-10-21T12:00:00-05:00", "booked": false},
            {"start": "2026-10-21T10:00:00-05:00", "booked": false, "booking_url": "/book/1b"},
            {"start": "not a date", "booked": false, "booking_url": "/book/3"},
            {"start": "2026-11-02T23:30:00-05:00", "booked": false, "booking_url": "/book/4"}
        ]}"#;
        let slots = parse_slots(payload, &window(), Modality::InPerson);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start.to_rfc3339(), "2026-10-21T10:00:00-05:00");
        assert_eq!(slots[0].end - slots[0].start, Duration::hours(1));
    }

    #[test]
    fn alternate_field_names() {
        let payload = r#"{"items": [{"start": "2026-10-22T09:00:00-05:00", "url": "/b"}]}"#;
        let slots = parse_slots(payload, &window(), Modality::Remote);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].modality, Modality::Remote);
    }

    #[test]
    fn malformed_payload_is_empty() {
        assert!(parse_slots("<html>", &window(), Modality::InPerson).is_empty());
        assert!(parse_slots("{}", &window(), Modality::InPerson).is_empty());
    }
}
