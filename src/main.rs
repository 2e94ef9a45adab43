mod config;
mod crawler;
mod db;
mod error;
mod failures;
mod fetch;
mod model;
mod parser;
mod pipeline;
mod synth;
mod validate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use scraper::Html;

use crate::config::{CrawlMode, Settings};
use crate::db::{persist_all, SqliteStore};
use crate::error::HarvestError;
use crate::failures::Stage;
use crate::fetch::HttpFetcher;
use crate::model::CandidateListing;
use crate::parser::extract::availability::AvailabilityWindow;
use crate::parser::{build_record, BuildOptions, Skipped};
use crate::pipeline::RunContext;

#[derive(Parser)]
#[command(name = "directory_harvester", about = "Health-professional directory harvester")]
struct Cli {
    /// Settings file (default: ./harvest.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every configured scope and store the records
    Run {
        #[arg(long, value_enum)]
        mode: Option<CrawlMode>,
        /// Locality to crawl (repeatable, replaces configured list)
        #[arg(short, long)]
        locality: Vec<String>,
        /// Category to crawl (repeatable, replaces configured list)
        #[arg(short = 'k', long)]
        category: Vec<String>,
        /// Max records per scope
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Max result pages per scope
        #[arg(short, long)]
        pages: Option<usize>,
        /// Skip the database
        #[arg(long)]
        no_db: bool,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract one saved profile page and print the record as JSON
    Parse {
        file: PathBuf,
        #[arg(short, long, default_value = "Lima")]
        locality: String,
        #[arg(short = 'k', long, default_value = "")]
        category: String,
        /// Source URL to record (default: the file path)
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show stored row counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let code = match cli.command {
        Commands::Run {
            mode,
            locality,
            category,
            limit,
            pages,
            no_db,
            json,
        } => {
            if let Some(m) = mode {
                settings.mode = m;
            }
            if !locality.is_empty() {
                settings.localities = locality;
            }
            if !category.is_empty() {
                settings.categories = category;
            }
            if let Some(n) = limit {
                settings.results_per_scope = n;
            }
            if let Some(p) = pages {
                settings.pages_per_scope = p;
            }
            run(&settings, no_db, json).await?
        }
        Commands::Parse {
            file,
            locality,
            category,
            url,
        } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let listing = CandidateListing {
                category,
                locality,
                profile_url: url.unwrap_or_else(|| file.display().to_string()),
                ..Default::default()
            };
            let today = Utc::now().with_timezone(&settings.offset()).date_naive();
            let opts = BuildOptions {
                mode: settings.mode,
                country_code: &settings.country_code,
                currency: &settings.currency,
                synthesize_availability: settings.availability.synthesize,
                window: AvailabilityWindow::after(today, settings.offset()),
            };
            let doc = Html::parse_document(&html);
            let record = match build_record(&doc, &listing, None, &opts, &mut rand::rng()) {
                Ok(record) => record,
                Err(Skipped::NoName) => bail!("no person name found in {}", file.display()),
                Err(Skipped::Rejected { name, reason }) => {
                    bail!("\"{}\" in {} was rejected: {}", name, file.display(), reason)
                }
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            if !record.synthesized.is_empty() {
                eprintln!("synthesized: {}", record.synthesized.join(", "));
            }
            ExitCode::SUCCESS
        }
        Commands::Stats => {
            let store = SqliteStore::open(&settings.db_path)?;
            let s = store.stats()?;
            println!("Professionals: {}", s.professionals);
            println!("Services:      {}", s.services);
            println!("Time slots:    {}", s.time_slots);
            println!("Localities:    {}", s.localities);
            ExitCode::SUCCESS
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(code)
}

async fn run(settings: &Settings, no_db: bool, json: bool) -> anyhow::Result<ExitCode> {
    let fetcher = HttpFetcher::new(settings)?;
    let mut ctx = RunContext::new();
    let today = Utc::now().with_timezone(&settings.offset()).date_naive();

    let report = match pipeline::run(&fetcher, settings, &mut ctx, &mut rand::rng(), today).await {
        Ok(report) => report,
        Err(e @ HarvestError::NoRecords { .. }) => {
            eprintln!("FATAL: {}", e);
            eprintln!("{}", ctx.failures.summarize());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    for s in &report.scopes {
        println!(
            "{:<32} | pages {:>2} | candidates {:>3} | accepted {:>3} | rejected {:>3} | dup {:>3} | discarded {:>3}",
            s.scope,
            s.pages.len(),
            s.candidates,
            s.accepted,
            s.rejected,
            s.duplicates,
            s.discarded
        );
    }

    if !no_db {
        let mut store = SqliteStore::open(&settings.db_path)?;
        let stored = persist_all(&mut store, &report.records, &mut ctx.failures);
        println!(
            "Stored {} records in {} ({} partial writes)",
            stored,
            settings.db_path.display(),
            ctx.failures.by_stage(Stage::Persistence).len()
        );
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report.records)?);
    }

    println!(
        "success with {} failures ({} records)",
        ctx.failures.count(),
        report.records.len()
    );
    if ctx.failures.has_failures() {
        println!("{}", ctx.failures.summarize());
    }
    Ok(ExitCode::SUCCESS)
}
