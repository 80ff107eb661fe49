//! Repository layer for SQLite persistence.
//!
//! Connections are short-lived: each call opens, works, and drops. WAL
//! mode plus a busy-retry wrapper keeps concurrent writers from failing
//! on transient lock contention.

mod content;
mod run_log;

pub use content::{ContentQuery, ContentRepository, ContentStats, UpsertStats};
pub use run_log::{AdapterStats, RunLogFilter, RunLogRepository, ScrapeStats};

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Store error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("bulk upsert failed for {failed} of {total} records: {first_error}")]
    BulkUpsert {
        failed: usize,
        total: usize,
        first_error: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check whether an error is a unique-constraint violation. These are
/// expected under concurrent upserts and are not treated as failures.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Open a connection with the pragmas every caller needs.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// Retry a write closure on transient lock contention.
pub(crate) fn with_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        match op() {
            Err(Error::Sqlite(rusqlite::Error::SqliteFailure(e, msg)))
                if attempt + 1 < MAX_ATTEMPTS
                    && matches!(
                        e.code,
                        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                    ) =>
            {
                attempt += 1;
                tracing::debug!(
                    "database busy ({}), retrying write (attempt {})",
                    msg.unwrap_or_default(),
                    attempt
                );
                std::thread::sleep(Duration::from_millis(50 * attempt as u64));
            }
            other => return other,
        }
    }
}

/// Parse an RFC 3339 datetime column, defaulting to the Unix epoch.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional RFC 3339 datetime column.
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Handle bundling the per-table repositories over one database file.
#[derive(Clone)]
pub struct DbContext {
    db_path: PathBuf,
}

impl DbContext {
    /// Open the database and initialize the schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let ctx = Self {
            db_path: db_path.to_path_buf(),
        };
        ctx.init_schema()?;
        Ok(ctx)
    }

    pub fn content(&self) -> ContentRepository {
        ContentRepository::new(&self.db_path)
    }

    pub fn run_logs(&self) -> RunLogRepository {
        RunLogRepository::new(&self.db_path)
    }

    /// Cheap connectivity probe for the health endpoint.
    pub fn ping(&self) -> bool {
        connect(&self.db_path)
            .and_then(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(Error::from)
            })
            .is_ok()
    }

    fn init_schema(&self) -> Result<()> {
        let conn = connect(&self.db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS content_records (
                content_hash    TEXT PRIMARY KEY,
                category        TEXT NOT NULL,
                title           TEXT NOT NULL,
                url             TEXT NOT NULL,
                description     TEXT,
                body            TEXT,
                image_url       TEXT,
                author          TEXT,
                published_at    TEXT,
                source_host     TEXT NOT NULL,
                source_name     TEXT NOT NULL,
                tags            TEXT NOT NULL DEFAULT '[]',
                keyword_hits    TEXT NOT NULL DEFAULT '[]',
                relevance_score INTEGER NOT NULL DEFAULT 50,
                job_details     TEXT,
                scraped_by      TEXT NOT NULL,
                scraped_at      TEXT NOT NULL,
                expires_at      TEXT,
                status          TEXT NOT NULL DEFAULT 'active',
                views           INTEGER NOT NULL DEFAULT 0,
                clicks          INTEGER NOT NULL DEFAULT 0,
                last_updated    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_content_category ON content_records(category);
            CREATE INDEX IF NOT EXISTS idx_content_source ON content_records(source_host);
            CREATE INDEX IF NOT EXISTS idx_content_scraped_at ON content_records(scraped_at);
            CREATE INDEX IF NOT EXISTS idx_content_published_at ON content_records(published_at);
            CREATE INDEX IF NOT EXISTS idx_content_status ON content_records(status);

            CREATE TABLE IF NOT EXISTS run_logs (
                session_id   TEXT PRIMARY KEY,
                adapter      TEXT NOT NULL,
                source       TEXT NOT NULL,
                origin_url   TEXT NOT NULL,
                status       TEXT NOT NULL,
                started_at   TEXT NOT NULL,
                ended_at     TEXT,
                duration_ms  INTEGER,
                results      TEXT NOT NULL DEFAULT '{}',
                performance  TEXT NOT NULL DEFAULT '{}',
                errors       TEXT NOT NULL DEFAULT '[]',
                warnings     TEXT NOT NULL DEFAULT '[]',
                config       TEXT NOT NULL DEFAULT '{}',
                triggered_by TEXT NOT NULL,
                caller       TEXT,
                rate_limit   TEXT NOT NULL DEFAULT '{}',
                robots       TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_run_logs_adapter ON run_logs(adapter);
            CREATE INDEX IF NOT EXISTS idx_run_logs_status ON run_logs(status);
            CREATE INDEX IF NOT EXISTS idx_run_logs_started_at ON run_logs(started_at);
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_and_ping() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db")).unwrap();
        assert!(ctx.ping());
    }

    #[test]
    fn test_parse_datetime_fallback() {
        assert_eq!(parse_datetime("not-a-date"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(Some("junk".to_string())), None);
        assert_eq!(parse_datetime_opt(None), None);
    }
}
