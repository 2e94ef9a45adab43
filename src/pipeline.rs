use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::crawler::{Crawler, Scope, ScopeSummary};
use crate::error::HarvestError;
use crate::failures::FailureLog;
use crate::fetch::Fetcher;
use crate::model::CanonicalRecord;
use crate::parser::extract::availability::AvailabilityWindow;
use crate::validate::DedupSet;

/// State shared by every scope of one run. Reset at the start of each run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub seen: DedupSet,
    pub failures: FailureLog,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            seen: DedupSet::default(),
            failures: FailureLog::new(),
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.failures.clear();
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub records: Vec<CanonicalRecord>,
    pub scopes: Vec<ScopeSummary>,
}

/// Crawl every planned scope. Page, profile and record failures land in
/// `ctx.failures`; the run only fails when it produced nothing at all.
pub async fn run<F: Fetcher, R: Rng + ?Sized>(
    fetcher: &F,
    settings: &Settings,
    ctx: &mut RunContext,
    rng: &mut R,
    today: NaiveDate,
) -> Result<RunReport, HarvestError> {
    settings.validate()?;
    ctx.reset();

    let window = AvailabilityWindow::after(today, settings.offset());
    let scopes = Scope::plan(settings);
    info!(scopes = scopes.len(), mode = ?settings.mode, "starting run");

    let mut crawler = Crawler::new(fetcher, settings, window);
    let mut records = Vec::new();
    let mut summaries = Vec::with_capacity(scopes.len());

    for scope in &scopes {
        let (found, summary) = crawler
            .crawl_scope(scope, &mut ctx.seen, &mut ctx.failures, &mut *rng)
            .await;
        records.extend(found);
        summaries.push(summary);
    }

    info!(
        records = records.len(),
        unique_urls = ctx.seen.len(),
        failures = ctx.failures.count(),
        requests = crawler.issued(),
        "run finished"
    );

    if records.is_empty() {
        return Err(HarvestError::NoRecords {
            scopes: scopes.len(),
            failures: ctx.failures.count(),
        });
    }
    Ok(RunReport {
        records,
        scopes: summaries,
    })
}
