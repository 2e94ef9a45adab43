use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Pipeline stage a failure is attributed to. Ordering follows the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Listing,
    Profile,
    Extraction,
    Validation,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Listing => "listing",
            Stage::Profile => "profile",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub stage: Stage,
    pub message: String,
    pub cause: Option<String>,
    pub at: DateTime<Utc>,
}

/// Append-only log of per-record, per-page and per-scope failures for one run.
/// Nothing in the pipeline reads it to make decisions.
#[derive(Debug, Default)]
pub struct FailureLog {
    records: Vec<FailureRecord>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn record(&mut self, stage: Stage, message: impl Into<String>, cause: Option<String>) {
        let message = message.into();
        match &cause {
            Some(c) => warn!(stage = %stage, cause = %c, "{}", message),
            None => warn!(stage = %stage, "{}", message),
        }
        self.records.push(FailureRecord {
            stage,
            message,
            cause,
            at: Utc::now(),
        });
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn by_stage(&self, stage: Stage) -> Vec<&FailureRecord> {
        self.records.iter().filter(|r| r.stage == stage).collect()
    }

    pub fn grouped(&self) -> BTreeMap<Stage, Vec<&FailureRecord>> {
        let mut groups: BTreeMap<Stage, Vec<&FailureRecord>> = BTreeMap::new();
        for r in &self.records {
            groups.entry(r.stage).or_default().push(r);
        }
        groups
    }

    /// End-of-run report, grouped by stage in pipeline order.
    pub fn summarize(&self) -> String {
        if self.records.is_empty() {
            return "No failures.".to_string();
        }
        let mut out = format!("{} failure(s)\n", self.records.len());
        for (stage, records) in self.grouped() {
            out.push_str(&format!("[{}] {}\n", stage, records.len()));
            for r in records {
                let at = r.at.format("%H:%M:%S");
                match &r.cause {
                    Some(cause) => out.push_str(&format!("  - {} {} ({})\n", at, r.message, cause)),
                    None => out.push_str(&format!("  - {} {}\n", at, r.message)),
                }
            }
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_log() {
        let log = FailureLog::new();
        assert_eq!(log.count(), 0);
        assert!(!log.has_failures());
        assert_eq!(log.summarize(), "No failures.");
    }

    #[test]
    fn filter_and_group_by_stage() {
        let mut log = FailureLog::new();
        log.record(Stage::Persistence, "insert failed", Some("disk full".into()));
        log.record(Stage::Listing, "page 2 of Psicólogo/Lima", Some("HTTP 500".into()));
        log.record(Stage::Listing, "page 3 of Psicólogo/Lima", None);

        assert_eq!(log.count(), 3);
        assert_eq!(log.by_stage(Stage::Listing).len(), 2);
        assert!(log.by_stage(Stage::Validation).is_empty());

        let stages: Vec<Stage> = log.grouped().keys().copied().collect();
        assert_eq!(stages, vec![Stage::Listing, Stage::Persistence]);
    }

    #[test]
    fn summary_is_ordered_by_stage() {
        let mut log = FailureLog::new();
        log.record(Stage::Validation, "rejected Clínica Sur", None);
        log.record(Stage::Profile, "profile fetch", Some("timeout".into()));
        let summary = log.summarize();
        let profile = summary.find("[profile] 1").unwrap();
        let validation = summary.find("[validation] 1").unwrap();
        assert!(profile < validation);
        assert!(summary.contains(" profile fetch (timeout)"));
        assert!(summary.starts_with("2 failure(s)"));
    }

    #[test]
    fn summary_lines_carry_the_failure_time() {
        let mut log = FailureLog::new();
        log.record(Stage::Listing, "page 2 of Psicólogo/Lima", Some("HTTP 503".into()));
        let at = log.by_stage(Stage::Listing)[0].at.format("%H:%M:%S").to_string();
        let summary = log.summarize();
        assert!(summary.contains(&format!("  - {} page 2 of Psicólogo/Lima (HTTP 503)", at)));
    }

    #[test]
    fn clear_resets() {
        let mut log = FailureLog::new();
        log.record(Stage::Extraction, "no name", None);
        log.clear();
        assert!(!log.has_failures());
    }
}
