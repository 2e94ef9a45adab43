use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::failures::{FailureLog, Stage};
use crate::model::CanonicalRecord;

/// Result of persisting one record: its durable id plus any child rows that
/// could not be written.
#[derive(Debug)]
pub struct InsertOutcome {
    pub id: i64,
    pub field_errors: Vec<String>,
}

pub trait RecordSink {
    fn insert(&mut self, record: &CanonicalRecord) -> Result<InsertOutcome, StoreError>;
}

pub struct StoreStats {
    pub professionals: i64,
    pub services: i64,
    pub time_slots: i64,
    pub localities: i64,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = SqliteStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS professionals (
                id            INTEGER PRIMARY KEY,
                source_url    TEXT UNIQUE NOT NULL,
                full_name     TEXT NOT NULL,
                category      TEXT NOT NULL,
                locality      TEXT NOT NULL,
                address       TEXT NOT NULL,
                country_code  TEXT NOT NULL,
                phone         TEXT NOT NULL,
                rating        REAL CHECK(rating IS NULL OR (rating >= 0 AND rating <= 5)),
                review_count  INTEGER NOT NULL DEFAULT 0 CHECK(review_count >= 0),
                synthesized   TEXT,
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_professionals_locality ON professionals(locality);

            CREATE TABLE IF NOT EXISTS services (
                id               INTEGER PRIMARY KEY,
                professional_id  INTEGER NOT NULL REFERENCES professionals(id) ON DELETE CASCADE,
                name             TEXT NOT NULL,
                price            REAL,
                currency         TEXT,
                duration_minutes INTEGER NOT NULL CHECK(duration_minutes > 0),
                UNIQUE(professional_id, name COLLATE NOCASE)
            );

            CREATE TABLE IF NOT EXISTS time_slots (
                id               INTEGER PRIMARY KEY,
                professional_id  INTEGER NOT NULL REFERENCES professionals(id) ON DELETE CASCADE,
                start_at         TEXT NOT NULL,
                end_at           TEXT NOT NULL,
                modality         TEXT NOT NULL CHECK(modality IN ('in_person','remote')),
                CHECK(end_at > start_at),
                UNIQUE(professional_id, start_at)
            );
            CREATE INDEX IF NOT EXISTS idx_slots_professional ON time_slots(professional_id);
            ",
        )?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let count = |sql: &str| -> Result<i64, StoreError> {
            Ok(self.conn.query_row(sql, [], |r| r.get(0))?)
        };
        Ok(StoreStats {
            professionals: count("SELECT COUNT(*) FROM professionals")?,
            services: count("SELECT COUNT(*) FROM services")?,
            time_slots: count("SELECT COUNT(*) FROM time_slots")?,
            localities: count("SELECT COUNT(DISTINCT locality) FROM professionals")?,
        })
    }
}

impl RecordSink for SqliteStore {
    /// Upserts on `source_url`; child rows are replaced wholesale.
    fn insert(&mut self, record: &CanonicalRecord) -> Result<InsertOutcome, StoreError> {
        let tx = self.conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO professionals
                (source_url, full_name, category, locality, address, country_code, phone,
                 rating, review_count, synthesized)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(source_url) DO UPDATE SET
                full_name = excluded.full_name,
                category = excluded.category,
                locality = excluded.locality,
                address = excluded.address,
                country_code = excluded.country_code,
                phone = excluded.phone,
                rating = excluded.rating,
                review_count = excluded.review_count,
                synthesized = excluded.synthesized,
                updated_at = datetime('now')
             RETURNING id",
            params![
                record.source_url,
                record.full_name,
                record.category,
                record.locality,
                record.address,
                record.country_code,
                record.phone,
                record.rating.map(f64::from),
                record.review_count,
                record.synthesized.join(","),
            ],
            |r| r.get(0),
        )?;

        tx.execute("DELETE FROM services WHERE professional_id = ?1", params![id])?;
        tx.execute("DELETE FROM time_slots WHERE professional_id = ?1", params![id])?;

        let mut field_errors = Vec::new();
        {
            let mut s_stmt = tx.prepare(
                "INSERT INTO services (professional_id, name, price, currency, duration_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in &record.services {
                if let Err(e) = s_stmt.execute(params![id, s.name, s.price, s.currency, s.duration_minutes]) {
                    field_errors.push(format!("service \"{}\": {}", s.name, e));
                }
            }

            let mut t_stmt = tx.prepare(
                "INSERT INTO time_slots (professional_id, start_at, end_at, modality)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for t in &record.slots {
                if let Err(e) = t_stmt.execute(params![
                    id,
                    t.start.to_rfc3339(),
                    t.end.to_rfc3339(),
                    t.modality.as_str()
                ]) {
                    field_errors.push(format!("slot {}: {}", t.start.to_rfc3339(), e));
                }
            }
        }
        tx.commit()?;

        debug!(id, url = %record.source_url, errors = field_errors.len(), "stored record");
        Ok(InsertOutcome { id, field_errors })
    }
}

/// Hands every record to the sink exactly once. Rejected records and
/// partially written ones are logged; the batch always runs to the end.
pub fn persist_all<S: RecordSink>(
    sink: &mut S,
    records: &[CanonicalRecord],
    failures: &mut FailureLog,
) -> usize {
    let pb = ProgressBar::new(records.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut stored = 0usize;
    for record in records {
        match sink.insert(record) {
            Ok(outcome) => {
                stored += 1;
                pb.set_message(format!("#{}", outcome.id));
                for err in outcome.field_errors {
                    failures.record(
                        Stage::Persistence,
                        format!("partial write for {}", record.source_url),
                        Some(err),
                    );
                }
            }
            Err(e) => failures.record(
                Stage::Persistence,
                format!("could not store {}", record.full_name),
                Some(e.to_string()),
            ),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(stored, total = records.len(), "persisted records");
    stored
}
