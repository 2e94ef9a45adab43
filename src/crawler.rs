//! Per-scope crawl: paginate results, then turn candidates into records.
//!
//! Requests are strictly sequential with a fixed pause between them. A failed
//! page or profile is logged and skipped; nothing here aborts a scope.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::config::{CrawlMode, Settings};
use crate::error::FetchError;
use crate::failures::{FailureLog, Stage};
use crate::fetch::Fetcher;
use crate::model::{CandidateListing, CanonicalRecord};
use crate::parser::extract::availability::AvailabilityWindow;
use crate::parser::listing::{parse_broad, parse_results, ScopeLabels};
use crate::parser::normalize::slugify;
use crate::parser::{build_record, BuildOptions, Skipped};
use crate::validate::DedupSet;

/// One unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub locality: String,
    pub category: Option<String>,
}

impl Scope {
    /// Locality mode: one scope per locality. Specialty mode: category × locality.
    pub fn plan(settings: &Settings) -> Vec<Scope> {
        let localities = settings.localities.iter().filter(|l| !l.trim().is_empty());
        match settings.mode {
            CrawlMode::Locality => localities
                .map(|l| Scope {
                    locality: l.trim().to_string(),
                    category: None,
                })
                .collect(),
            CrawlMode::Specialty => settings
                .categories
                .iter()
                .filter(|c| !c.trim().is_empty())
                .flat_map(|c| {
                    localities.clone().map(move |l| Scope {
                        locality: l.trim().to_string(),
                        category: Some(c.trim().to_string()),
                    })
                })
                .collect(),
        }
    }

    pub fn page_url(&self, base_url: &str, page: usize) -> String {
        let base = base_url.trim_end_matches('/');
        match &self.category {
            Some(category) => {
                let mut url = format!("{}/{}/{}", base, slugify(category), slugify(&self.locality));
                if page > 1 {
                    url.push_str(&format!("/{}", page));
                }
                url
            }
            None => match Url::parse(&format!("{}/buscar", base)) {
                Ok(mut url) => {
                    url.query_pairs_mut()
                        .append_pair("loc", &self.locality)
                        .append_pair("page", &page.to_string());
                    url.to_string()
                }
                Err(_) => format!("{}/buscar?loc={}&page={}", base, self.locality, page),
            },
        }
    }

    pub fn labels(&self) -> ScopeLabels<'_> {
        ScopeLabels {
            locality: &self.locality,
            category: self.category.as_deref(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(c) => write!(f, "{} / {}", c, self.locality),
            None => f.write_str(&self.locality),
        }
    }
}

/// Slot-listing endpoint for one practitioner address over the booking window.
pub fn slots_url(
    base_url: &str,
    entity_id: &str,
    address_id: &str,
    window: &AvailabilityWindow,
) -> Option<String> {
    let mut url = Url::parse(base_url)
        .ok()?
        .join(&format!("/api/v3/doctors/{}/addresses/{}/slots", entity_id, address_id))
        .ok()?;
    url.query_pairs_mut()
        .append_pair("start", &window.start.to_rfc3339())
        .append_pair("end", &window.end.to_rfc3339());
    Some(url.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub page: usize,
    pub url: String,
    pub listings: usize,
    /// Listings came from the site root after a 404.
    pub fallback: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScopeSummary {
    pub scope: String,
    pub pages: Vec<PageSummary>,
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    /// Candidates dropped unfetched once the per-scope cap was reached.
    pub discarded: usize,
}

pub struct Crawler<'a, F> {
    fetcher: &'a F,
    settings: &'a Settings,
    window: AvailabilityWindow,
    delay: Duration,
    issued: usize,
}

impl<'a, F: Fetcher> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, settings: &'a Settings, window: AvailabilityWindow) -> Self {
        Crawler {
            fetcher,
            settings,
            window,
            delay: Duration::from_millis(settings.request_delay_ms),
            issued: 0,
        }
    }

    /// Number of requests sent so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    async fn get(&mut self, url: &str) -> Result<String, FetchError> {
        if self.issued > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.issued += 1;
        self.fetcher.fetch(url).await
    }

    /// FETCH_PAGE → PARSE_RESULTS, looping until a page has no results or the
    /// page limit is hit. Failed pages are logged and skipped.
    pub async fn collect_candidates(
        &mut self,
        scope: &Scope,
        failures: &mut FailureLog,
    ) -> (Vec<CandidateListing>, Vec<PageSummary>) {
        let base = self.settings.base_url.clone();
        let mut candidates = Vec::new();
        let mut pages = Vec::new();

        for page in 1..=self.settings.pages_per_scope {
            let url = scope.page_url(&base, page);
            match self.get(&url).await {
                Ok(html) => {
                    let found = parse_results(&html, &base, scope.labels());
                    debug!(scope = %scope, page, listings = found.len(), "parsed results page");
                    pages.push(PageSummary {
                        page,
                        url,
                        listings: found.len(),
                        fallback: false,
                        error: None,
                    });
                    if found.is_empty() {
                        break;
                    }
                    candidates.extend(found);
                }
                Err(FetchError::NotFound { .. }) if page == 1 => {
                    let (found, summary) = self.root_fallback(scope, failures).await;
                    pages.push(PageSummary { url, ..summary });
                    candidates.extend(found);
                    break;
                }
                Err(e) => {
                    failures.record(
                        Stage::Listing,
                        format!("page {} of {} failed", page, scope),
                        Some(e.to_string()),
                    );
                    pages.push(PageSummary {
                        page,
                        url,
                        listings: 0,
                        fallback: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        (candidates, pages)
    }

    async fn root_fallback(
        &mut self,
        scope: &Scope,
        failures: &mut FailureLog,
    ) -> (Vec<CandidateListing>, PageSummary) {
        let base = self.settings.base_url.clone();
        info!(scope = %scope, "results URL not found, trying site root");
        let mut summary = PageSummary {
            page: 1,
            url: String::new(),
            listings: 0,
            fallback: true,
            error: None,
        };
        match self.get(&base).await {
            Ok(html) => {
                let found = parse_broad(&html, &base, scope.labels());
                summary.listings = found.len();
                (found, summary)
            }
            Err(e) => {
                failures.record(
                    Stage::Listing,
                    format!("no results URL or site root for {}", scope),
                    Some(e.to_string()),
                );
                summary.error = Some(e.to_string());
                (Vec::new(), summary)
            }
        }
    }

    /// Candidates → profiles → records, honoring the per-scope cap and the
    /// run-wide dedup set.
    pub async fn crawl_scope<R: Rng + ?Sized>(
        &mut self,
        scope: &Scope,
        seen: &mut DedupSet,
        failures: &mut FailureLog,
        rng: &mut R,
    ) -> (Vec<CanonicalRecord>, ScopeSummary) {
        let (candidates, pages) = self.collect_candidates(scope, failures).await;
        let mut summary = ScopeSummary {
            scope: scope.to_string(),
            pages,
            candidates: candidates.len(),
            ..Default::default()
        };

        let settings = self.settings;
        let cap = settings.results_per_scope;
        let opts = BuildOptions {
            mode: settings.mode,
            country_code: &settings.country_code,
            currency: &settings.currency,
            synthesize_availability: settings.availability.synthesize,
            window: self.window,
        };
        let mut records: Vec<CanonicalRecord> = Vec::new();

        for (i, listing) in candidates.iter().enumerate() {
            if records.len() >= cap {
                summary.discarded = candidates.len() - i;
                debug!(scope = %scope, discarded = summary.discarded, "result cap reached");
                break;
            }
            if seen.contains(&listing.profile_url) {
                summary.duplicates += 1;
                debug!(url = %listing.profile_url, "already collected");
                continue;
            }

            let profile = match self.get(&listing.profile_url).await {
                Ok(html) => Some(html),
                Err(e) => {
                    failures.record(
                        Stage::Profile,
                        format!("profile {} unavailable, using listing card", listing.profile_url),
                        Some(e.to_string()),
                    );
                    None
                }
            };
            let slots = self.live_slots(listing).await;

            let doc = match &profile {
                Some(html) => Html::parse_document(html),
                None => Html::parse_fragment(&listing.card_html),
            };
            let record = match build_record(&doc, listing, slots.as_deref(), &opts, &mut *rng) {
                Ok(record) => record,
                Err(Skipped::NoName) => {
                    failures.record(
                        Stage::Extraction,
                        format!("no person name found at {}", listing.profile_url),
                        None,
                    );
                    summary.rejected += 1;
                    continue;
                }
                Err(Skipped::Rejected { name, reason }) => {
                    failures.record(
                        Stage::Validation,
                        format!("rejected \"{}\"", name),
                        Some(reason.to_string()),
                    );
                    summary.rejected += 1;
                    continue;
                }
            };

            seen.insert(&record.source_url);
            records.push(record);
        }

        summary.accepted = records.len();
        info!(
            scope = %scope,
            accepted = summary.accepted,
            rejected = summary.rejected,
            duplicates = summary.duplicates,
            "scope done"
        );
        (records, summary)
    }

    /// Slot payload for a listing, when live lookups are enabled. Failures
    /// only mean the record falls back to synthesized availability.
    async fn live_slots(&mut self, listing: &CandidateListing) -> Option<String> {
        if !self.settings.availability.live {
            return None;
        }
        let (entity, address) = (listing.entity_id.as_deref()?, listing.address_id.as_deref()?);
        let url = slots_url(&self.settings.base_url, entity, address, &self.window)?;
        match self.get(&url).await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(url = %url, error = %e, "slot lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{Reply, ScriptedFetcher};
    use chrono::{FixedOffset, NaiveDate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BASE: &str = "https://www.doctoralia.pe";

    fn settings() -> Settings {
        Settings {
            request_delay_ms: 0,
            ..Settings::default()
        }
    }

    fn window() -> AvailabilityWindow {
        AvailabilityWindow::after(
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap(),
        )
    }

    fn scope() -> Scope {
        Scope {
            locality: "Lima".into(),
            category: Some("Psicólogo".into()),
        }
    }

    fn results(slugs: &[&str]) -> String {
        let cards: String = slugs
            .iter()
            .map(|s| {
                format!(
                    r#"<div class="card" data-doctor-id="{s}"><h3><a href="/{s}/psicologo/lima">{s}</a></h3></div>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    fn profile(name: &str) -> String {
        format!(r#"<html><body><h1 itemprop="name">{}</h1></body></html>"#, name)
    }

    fn profile_url(slug: &str) -> String {
        format!("{}/{}/psicologo/lima", BASE, slug)
    }

    #[test]
    fn plans_scopes_per_mode() {
        let mut s = settings();
        s.localities = vec!["Lima".into(), "Cusco".into()];
        s.categories = vec!["Psicólogo".into(), "Nutricionista".into()];
        assert_eq!(Scope::plan(&s).len(), 4);

        s.mode = CrawlMode::Locality;
        let scopes = Scope::plan(&s);
        assert_eq!(scopes.len(), 2);
        assert!(scopes.iter().all(|sc| sc.category.is_none()));
    }

    #[test]
    fn page_urls() {
        let sc = scope();
        assert_eq!(sc.page_url(BASE, 1), "https://www.doctoralia.pe/psicologo/lima");
        assert_eq!(sc.page_url(BASE, 3), "https://www.doctoralia.pe/psicologo/lima/3");

        let loc = Scope {
            locality: "San Isidro".into(),
            category: None,
        };
        assert_eq!(
            loc.page_url(BASE, 2),
            "https://www.doctoralia.pe/buscar?loc=San+Isidro&page=2"
        );
    }

    #[test]
    fn slot_endpoint_carries_window() {
        let url = slots_url(BASE, "1001", "5001", &window()).unwrap();
        assert!(url.starts_with("https://www.doctoralia.pe/api/v3/doctors/1001/addresses/5001/slots?start=2026-10-20"));
        assert!(url.contains("end=2026-11-03"));
    }

    #[tokio::test]
    async fn empty_second_page_stops_pagination() {
        let sc = scope();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), results(&["ana-rojas", "luis-soto"]))
            .page(&sc.page_url(BASE, 2), results(&[]))
            .page(&sc.page_url(BASE, 3), results(&["eva-paz"]))
            .page(&profile_url("ana-rojas"), profile("Ana Rojas"))
            .page(&profile_url("luis-soto"), profile("Luis Soto"));
        let s = settings();
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let (mut seen, mut failures) = (DedupSet::default(), FailureLog::new());
        let mut rng = StdRng::seed_from_u64(1);

        let (records, summary) = crawler.crawl_scope(&sc, &mut seen, &mut failures, &mut rng).await;

        assert_eq!(summary.pages.len(), 2);
        assert!(!fetcher.was_requested(&sc.page_url(BASE, 3)));
        let names: Vec<&str> = records.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["Ana Rojas", "Luis Soto"]);
        assert!(!failures.has_failures());
    }

    #[tokio::test]
    async fn stops_at_page_limit() {
        let sc = scope();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), results(&["ana-rojas"]))
            .page(&sc.page_url(BASE, 2), results(&["luis-soto"]));
        let s = Settings {
            pages_per_scope: 1,
            ..settings()
        };
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let (candidates, pages) = crawler.collect_candidates(&sc, &mut FailureLog::new()).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(pages.len(), 1);
        assert!(!fetcher.was_requested(&sc.page_url(BASE, 2)));
    }

    #[tokio::test]
    async fn cap_discards_remaining_candidates_unfetched() {
        let sc = scope();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), results(&["ana-rojas", "luis-soto", "eva-paz"]))
            .page(&profile_url("ana-rojas"), profile("Ana Rojas"))
            .page(&profile_url("luis-soto"), profile("Luis Soto"))
            .page(&profile_url("eva-paz"), profile("Eva Paz"));
        let s = Settings {
            results_per_scope: 2,
            pages_per_scope: 1,
            ..settings()
        };
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let mut rng = StdRng::seed_from_u64(2);
        let (records, summary) = crawler
            .crawl_scope(&sc, &mut DedupSet::default(), &mut FailureLog::new(), &mut rng)
            .await;

        assert_eq!(records.len(), 2);
        assert_eq!(summary.discarded, 1);
        assert!(!fetcher.was_requested(&profile_url("eva-paz")));
    }

    #[tokio::test]
    async fn not_found_falls_back_to_site_root() {
        let sc = scope();
        let root = std::fs::read_to_string("tests/fixtures/site_root.html").unwrap();
        let fetcher = ScriptedFetcher::new()
            .reply(&sc.page_url(BASE, 1), Reply::NotFound)
            .page(BASE, root);
        let s = settings();
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let mut failures = FailureLog::new();

        let (candidates, pages) = crawler.collect_candidates(&sc, &mut failures).await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].fallback);
        assert!(fetcher.was_requested(&sc.page_url(BASE, 1)));
        assert!(!fetcher.was_requested(&sc.page_url(BASE, 2)));
        assert!(!failures.has_failures());
    }

    #[tokio::test]
    async fn failed_page_is_logged_and_skipped() {
        let sc = scope();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), results(&["ana-rojas"]))
            .reply(&sc.page_url(BASE, 2), Reply::Status(503))
            .page(&sc.page_url(BASE, 3), results(&["luis-soto"]))
            .page(&sc.page_url(BASE, 4), results(&[]));
        let s = settings();
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let mut failures = FailureLog::new();

        let (candidates, pages) = crawler.collect_candidates(&sc, &mut failures).await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(pages.len(), 4);
        assert!(pages[1].error.is_some());
        assert_eq!(failures.by_stage(Stage::Listing).len(), 1);
    }

    #[tokio::test]
    async fn duplicate_urls_yield_one_record() {
        let sc = scope();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), results(&["ana-rojas"]))
            .page(&sc.page_url(BASE, 2), results(&["ana-rojas"]))
            .page(&sc.page_url(BASE, 3), results(&[]))
            .page(&profile_url("ana-rojas"), profile("Ana Rojas"));
        let s = settings();
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let mut seen = DedupSet::default();
        let mut rng = StdRng::seed_from_u64(3);

        let (records, summary) = crawler
            .crawl_scope(&sc, &mut seen, &mut FailureLog::new(), &mut rng)
            .await;

        assert_eq!(records.len(), 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_profile_falls_back_to_card() {
        let sc = scope();
        let page = std::fs::read_to_string("tests/fixtures/results_page.html").unwrap();
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), page)
            .page(&sc.page_url(BASE, 2), results(&[]));
        let s = settings();
        let mut crawler = Crawler::new(&fetcher, &s, window());
        let mut failures = FailureLog::new();
        let mut rng = StdRng::seed_from_u64(4);

        let (records, summary) = crawler
            .crawl_scope(&sc, &mut DedupSet::default(), &mut failures, &mut rng)
            .await;

        let maria = records
            .iter()
            .find(|r| r.full_name == "María Fernández Soto")
            .unwrap();
        assert_eq!(maria.address, "Av. José Larco 345, Miraflores");
        assert_eq!(failures.by_stage(Stage::Profile).len(), 3);
        // the clinic card is turned away by validation
        assert_eq!(summary.rejected, 1);
        assert_eq!(failures.by_stage(Stage::Validation).len(), 1);
    }

    #[tokio::test]
    async fn live_slots_are_requested_when_enabled() {
        let sc = scope();
        let w = window();
        let slots = slots_url(BASE, "1001", "5001", &w).unwrap();
        let payload = r#"{"_items":[{"start":"2026-10-22T16:00:00-05:00","booked":false,"booking_url":"/b/9"}]}"#;
        let page = r#"<html><body><div data-doctor-id="1001" data-address-id="5001"><h3><a href="/ana-rojas/psicologo/lima">Ana Rojas</a></h3></div></body></html>"#;
        let fetcher = ScriptedFetcher::new()
            .page(&sc.page_url(BASE, 1), page)
            .page(&profile_url("ana-rojas"), profile("Ana Rojas"))
            .page(&slots, payload);
        let mut s = Settings {
            pages_per_scope: 1,
            ..settings()
        };
        s.availability.live = true;
        let mut crawler = Crawler::new(&fetcher, &s, w);
        let mut rng = StdRng::seed_from_u64(5);

        let (records, _) = crawler
            .crawl_scope(&sc, &mut DedupSet::default(), &mut FailureLog::new(), &mut rng)
            .await;

        assert!(fetcher.was_requested(&slots));
        assert_eq!(records[0].slots.len(), 1);
        assert_eq!(crawler.issued(), 3);
    }
}
