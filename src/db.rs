use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// One applied-to job posting.
///
/// Scraped fields degrade to the empty string when extraction fails; a record
/// always has every column populated, never NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub job_url: String,
    pub job_title: String,
    pub company: String,
    pub address: String,
    pub field: String,
    pub job_type: String,
    pub posted_date: String,
    pub applied_date: String,
    pub jd: String,
    pub created_at: String,
}

impl JobRecord {
    /// Fresh record for `job_url` with a generated id, scrape timestamp, and
    /// empty fields for the extractor to fill in.
    pub fn new(job_url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_url: job_url.to_string(),
            job_title: String::new(),
            company: String::new(),
            address: String::new(),
            field: String::new(),
            job_type: String::new(),
            posted_date: String::new(),
            applied_date: String::new(),
            jd: String::new(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    fn label(self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "Inserted",
            UpsertOutcome::Updated => "Updated",
        }
    }
}

/// SQLite store with upsert-by-`job_url` semantics. Single writer, no pool.
pub struct JobStore {
    conn: Connection,
}

impl JobStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS jobs (
                id           TEXT PRIMARY KEY,
                job_url      TEXT UNIQUE,
                job_title    TEXT,
                company      TEXT,
                address      TEXT,
                field        TEXT,
                job_type     TEXT,
                posted_date  TEXT,
                applied_date TEXT,
                jd           TEXT,
                created_at   TEXT
            );
            ",
        )?;
        Ok(Self { conn })
    }

    /// Insert or update by `job_url`.
    ///
    /// An existing row keeps its `id` and its first-insert `created_at`
    /// (`created_at` means "first scraped"); all other fields are replaced.
    /// Persistence failures propagate to the caller and halt the run.
    pub fn upsert(&self, rec: &JobRecord) -> Result<UpsertOutcome> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM jobs WHERE job_url = ?1",
                params![rec.job_url],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                self.conn.execute(
                    "UPDATE jobs
                     SET job_title = ?1, company = ?2, address = ?3, field = ?4,
                         job_type = ?5, posted_date = ?6, applied_date = ?7, jd = ?8
                     WHERE id = ?9",
                    params![
                        rec.job_title,
                        rec.company,
                        rec.address,
                        rec.field,
                        rec.job_type,
                        rec.posted_date,
                        rec.applied_date,
                        rec.jd,
                        id,
                    ],
                )?;
                UpsertOutcome::Updated
            }
            None => {
                self.conn.execute(
                    "INSERT INTO jobs
                     (id, job_url, job_title, company, address, field, job_type,
                      posted_date, applied_date, jd, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        rec.id,
                        rec.job_url,
                        rec.job_title,
                        rec.company,
                        rec.address,
                        rec.field,
                        rec.job_type,
                        rec.posted_date,
                        rec.applied_date,
                        rec.jd,
                        rec.created_at,
                    ],
                )?;
                UpsertOutcome::Inserted
            }
        };

        println!("[{}] {} — {}", outcome.label(), rec.job_title, rec.company);
        Ok(outcome)
    }

    pub fn find_by_url(&self, job_url: &str) -> Result<Option<JobRecord>> {
        let rec = self
            .conn
            .query_row(
                "SELECT id, job_url, job_title, company, address, field, job_type,
                        posted_date, applied_date, jd, created_at
                 FROM jobs WHERE job_url = ?1",
                params![job_url],
                |row| {
                    Ok(JobRecord {
                        id: row.get(0)?,
                        job_url: row.get(1)?,
                        job_title: row.get(2)?,
                        company: row.get(3)?,
                        address: row.get(4)?,
                        field: row.get(5)?,
                        job_type: row.get(6)?,
                        posted_date: row.get(7)?,
                        applied_date: row.get(8)?,
                        jd: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                },
            )
            .optional()?;
        Ok(rec)
    }

    pub fn count(&self) -> Result<usize> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(n)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}
