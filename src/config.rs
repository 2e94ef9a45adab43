use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::HarvestError;

const DEFAULT_BASE_URL: &str = "https://www.doctoralia.pe";

/// One scope per locality, or one per category × locality pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    Locality,
    Specialty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilitySettings {
    /// Query the slot endpoint for each profile.
    pub live: bool,
    /// Fill empty availability with synthetic weekday blocks.
    pub synthesize: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub mode: CrawlMode,
    pub localities: Vec<String>,
    pub categories: Vec<String>,
    pub results_per_scope: usize,
    pub pages_per_scope: usize,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    pub country_code: String,
    pub currency: String,
    pub utc_offset_hours: i32,
    pub availability: AvailabilitySettings,
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: CrawlMode::Specialty,
            localities: vec!["Lima".to_string()],
            categories: vec!["Psicólogo".to_string()],
            results_per_scope: 20,
            pages_per_scope: 5,
            request_delay_ms: 800,
            timeout_secs: 20,
            country_code: "51".to_string(),
            currency: "PEN".to_string(),
            utc_offset_hours: -5,
            availability: AvailabilitySettings {
                live: false,
                synthesize: true,
            },
            db_path: PathBuf::from("data/directory.sqlite"),
        }
    }
}

impl Settings {
    /// Defaults, then `harvest.toml` (or `path`), then `HARVEST_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let d = Settings::default();
        let mut builder = Config::builder()
            .set_default("base_url", d.base_url)?
            .set_default("mode", "specialty")?
            .set_default("localities", d.localities)?
            .set_default("categories", d.categories)?
            .set_default("results_per_scope", d.results_per_scope as i64)?
            .set_default("pages_per_scope", d.pages_per_scope as i64)?
            .set_default("request_delay_ms", d.request_delay_ms as i64)?
            .set_default("timeout_secs", d.timeout_secs as i64)?
            .set_default("country_code", d.country_code)?
            .set_default("currency", d.currency)?
            .set_default("utc_offset_hours", d.utc_offset_hours as i64)?
            .set_default("availability.live", d.availability.live)?
            .set_default("availability.synthesize", d.availability.synthesize)?
            .set_default("db_path", d.db_path.to_string_lossy().to_string())?;

        builder = match path {
            Some(p) => builder.add_source(File::from(p)),
            None => builder.add_source(File::with_name("harvest").required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("HARVEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("localities")
                    .with_list_parse_key("categories"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        Ok(settings)
    }

    pub fn validate(&self) -> std::result::Result<(), HarvestError> {
        if self.localities.iter().all(|l| l.trim().is_empty()) {
            return Err(HarvestError::Config("at least one locality is required".into()));
        }
        if self.mode == CrawlMode::Specialty && self.categories.iter().all(|c| c.trim().is_empty()) {
            return Err(HarvestError::Config(
                "specialty mode needs at least one category".into(),
            ));
        }
        if self.results_per_scope == 0 || self.pages_per_scope == 0 {
            return Err(HarvestError::Config(
                "results_per_scope and pages_per_scope must be at least 1".into(),
            ));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(HarvestError::Config(format!("bad base_url: {}", self.base_url)));
        }
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.offset(), FixedOffset::west_opt(5 * 3600).unwrap());
    }

    #[test]
    fn specialty_mode_requires_categories() {
        let s = Settings {
            categories: vec![],
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(HarvestError::Config(_))));

        let s = Settings {
            categories: vec![],
            mode: CrawlMode::Locality,
            ..Settings::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn caps_must_be_positive() {
        let s = Settings {
            results_per_scope: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = std::env::temp_dir().join(format!("harvest-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("harvest.toml");
        std::fs::write(
            &path,
            "mode = \"locality\"\nlocalities = [\"Arequipa\", \"Cusco\"]\nresults_per_scope = 5\n\n[availability]\nlive = true\n",
        )
        .unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.mode, CrawlMode::Locality);
        assert_eq!(s.localities, vec!["Arequipa", "Cusco"]);
        assert_eq!(s.results_per_scope, 5);
        assert!(s.availability.live);
        assert!(s.availability.synthesize);
        assert_eq!(s.pages_per_scope, 5);

        std::fs::remove_dir_all(&dir).ok();
    }
}
