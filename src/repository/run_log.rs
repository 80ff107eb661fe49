//! Run log repository.
//!
//! Structured sub-objects (results, performance, errors, config) are
//! stored as JSON columns; list filters operate on the indexed scalar
//! columns only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{connect, parse_datetime, parse_datetime_opt, with_retry, Error, Result};
use crate::models::{RunLog, RunStatus, Trigger, RUN_LOG_TTL_DAYS};

/// Filters for listing run logs.
#[derive(Debug, Clone, Default)]
pub struct RunLogFilter {
    pub adapter: Option<String>,
    pub source: Option<String>,
    pub status: Option<RunStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: usize,
    pub limit: usize,
}

impl RunLogFilter {
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }
}

/// Aggregated scrape statistics over a window of days.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStats {
    pub days: i64,
    pub total_runs: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub partial: u64,
    pub total_found: u64,
    pub total_inserted: u64,
    pub total_updated: u64,
    pub total_errors: u64,
    pub avg_duration_ms: f64,
    pub by_adapter: Vec<AdapterStats>,
}

/// Per-adapter slice of `ScrapeStats`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStats {
    pub adapter: String,
    pub runs: u64,
    pub found: u64,
    pub inserted: u64,
    pub errors: u64,
}

/// SQLite-backed run log repository.
pub struct RunLogRepository {
    db_path: PathBuf,
}

impl RunLogRepository {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    /// Persist a run log, replacing any previous snapshot of the session.
    pub fn save(&self, run: &RunLog) -> Result<()> {
        let results = serde_json::to_string(&run.results)?;
        let performance = serde_json::to_string(&run.performance)?;
        let errors = serde_json::to_string(&run.errors)?;
        let warnings = serde_json::to_string(&run.warnings)?;
        let config = serde_json::to_string(&run.config)?;
        let rate_limit = serde_json::to_string(&run.rate_limit)?;
        let robots = serde_json::to_string(&run.robots)?;

        let conn = self.connect()?;
        with_retry(|| {
            conn.execute(
                r#"
                INSERT INTO run_logs
                    (session_id, adapter, source, origin_url, status, started_at,
                     ended_at, duration_ms, results, performance, errors, warnings,
                     config, triggered_by, caller, rate_limit, robots)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                        ?15, ?16, ?17)
                ON CONFLICT(session_id) DO UPDATE SET
                    status = excluded.status,
                    ended_at = excluded.ended_at,
                    duration_ms = excluded.duration_ms,
                    results = excluded.results,
                    performance = excluded.performance,
                    errors = excluded.errors,
                    warnings = excluded.warnings,
                    rate_limit = excluded.rate_limit,
                    robots = excluded.robots
                "#,
                params![
                    run.session_id,
                    run.adapter,
                    run.source,
                    run.origin_url,
                    run.status.as_str(),
                    run.started_at.to_rfc3339(),
                    run.ended_at.map(|dt| dt.to_rfc3339()),
                    run.duration_ms.map(|ms| ms as i64),
                    results,
                    performance,
                    errors,
                    warnings,
                    config,
                    run.triggered_by.as_str(),
                    run.caller,
                    rate_limit,
                    robots,
                ],
            )
            .map_err(Error::from)
        })?;
        Ok(())
    }

    /// Get one run log by session id.
    pub fn get(&self, session_id: &str) -> Result<Option<RunLog>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM run_logs WHERE session_id = ?")?;
        let run = stmt.query_row(params![session_id], row_to_run).optional()?;
        Ok(run)
    }

    /// List run logs matching the filter, newest first.
    pub fn list(&self, filter: &RunLogFilter) -> Result<(Vec<RunLog>, u64)> {
        let conn = self.connect()?;

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(adapter) = &filter.adapter {
            clauses.push("adapter = ?");
            values.push(Box::new(adapter.clone()));
        }
        if let Some(source) = &filter.source {
            clauses.push("source = ?");
            values.push(Box::new(source.clone()));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Box::new(status.as_str().to_string()));
        }
        if let Some(start) = filter.start_date {
            clauses.push("started_at >= ?");
            values.push(Box::new(start.to_rfc3339()));
        }
        if let Some(end) = filter.end_date {
            clauses.push("started_at <= ?");
            values.push(Box::new(end.to_rfc3339()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM run_logs{where_sql}"),
            params_refs.as_slice(),
            |row| row.get::<_, i64>(0),
        )? as u64;

        let limit = filter.limit() as i64;
        let offset = ((filter.page() - 1) * filter.limit()) as i64;
        let mut select_params = params_refs.clone();
        select_params.push(&limit);
        select_params.push(&offset);

        let sql = format!(
            "SELECT * FROM run_logs{where_sql} ORDER BY started_at DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let runs = stmt
            .query_map(select_params.as_slice(), row_to_run)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((runs, total))
    }

    /// Remove run logs older than the retention window.
    pub fn cleanup_expired(&self) -> Result<u64> {
        let conn = self.connect()?;
        let cutoff = (Utc::now() - Duration::days(RUN_LOG_TTL_DAYS)).to_rfc3339();
        let rows = with_retry(|| {
            conn.execute("DELETE FROM run_logs WHERE started_at < ?", params![cutoff])
                .map_err(Error::from)
        })?;
        Ok(rows as u64)
    }

    /// Aggregate run statistics over the last `days` days.
    pub fn stats(&self, days: i64) -> Result<ScrapeStats> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM run_logs WHERE started_at >= ? ORDER BY started_at DESC")?;
        let runs = stmt
            .query_map(params![cutoff], row_to_run)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stats = ScrapeStats {
            days,
            ..Default::default()
        };
        let mut duration_total = 0u64;
        let mut duration_samples = 0u64;
        let mut by_adapter: std::collections::HashMap<String, AdapterStats> = Default::default();

        for run in &runs {
            stats.total_runs += 1;
            match run.status {
                RunStatus::Completed => stats.completed += 1,
                RunStatus::Failed => stats.failed += 1,
                RunStatus::Cancelled => stats.cancelled += 1,
                RunStatus::Partial => stats.partial += 1,
                RunStatus::Pending | RunStatus::Running => {}
            }
            stats.total_found += run.results.found;
            stats.total_inserted += run.results.inserted;
            stats.total_updated += run.results.updated;
            stats.total_errors += run.errors.len() as u64;
            if let Some(ms) = run.duration_ms {
                duration_total += ms;
                duration_samples += 1;
            }

            let entry = by_adapter.entry(run.adapter.clone()).or_insert_with(|| {
                AdapterStats {
                    adapter: run.adapter.clone(),
                    ..Default::default()
                }
            });
            entry.runs += 1;
            entry.found += run.results.found;
            entry.inserted += run.results.inserted;
            entry.errors += run.errors.len() as u64;
        }

        if duration_samples > 0 {
            stats.avg_duration_ms = duration_total as f64 / duration_samples as f64;
        }
        let mut adapters: Vec<AdapterStats> = by_adapter.into_values().collect();
        adapters.sort_by(|a, b| b.runs.cmp(&a.runs));
        stats.by_adapter = adapters;
        Ok(stats)
    }
}

fn row_to_run(row: &Row) -> rusqlite::Result<RunLog> {
    fn json_col<T: serde::de::DeserializeOwned + Default>(
        row: &Row,
        name: &str,
    ) -> rusqlite::Result<T> {
        Ok(row
            .get::<_, Option<String>>(name)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    Ok(RunLog {
        session_id: row.get("session_id")?,
        adapter: row.get("adapter")?,
        source: row.get("source")?,
        origin_url: row.get("origin_url")?,
        status: RunStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(RunStatus::Failed),
        started_at: parse_datetime(&row.get::<_, String>("started_at")?),
        ended_at: parse_datetime_opt(row.get("ended_at")?),
        duration_ms: row.get::<_, Option<i64>>("duration_ms")?.map(|v| v as u64),
        results: json_col(row, "results")?,
        performance: json_col(row, "performance")?,
        errors: json_col(row, "errors")?,
        warnings: json_col(row, "warnings")?,
        config: json_col(row, "config")?,
        triggered_by: Trigger::from_str(&row.get::<_, String>("triggered_by")?)
            .unwrap_or(Trigger::System),
        caller: row.get("caller")?,
        rate_limit: json_col(row, "rate_limit")?,
        robots: json_col(row, "robots")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunConfigSnapshot, RunErrorEntry, RunResults};
    use crate::repository::DbContext;

    fn test_repo() -> (RunLogRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db")).unwrap();
        (ctx.run_logs(), dir)
    }

    fn sample_run(adapter: &str) -> RunLog {
        let mut run = RunLog::new(
            adapter,
            "Example",
            "https://example.com/feed.xml",
            Trigger::Manual,
            RunConfigSnapshot::default(),
        );
        run.start_session();
        run
    }

    #[test]
    fn test_save_and_get_roundtrip() {
        let (repo, _dir) = test_repo();
        let mut run = sample_run("news");
        run.add_error(RunErrorEntry {
            timestamp: Utc::now(),
            kind: "fetch_status".to_string(),
            message: "503".to_string(),
            url: Some("https://example.com/feed.xml".to_string()),
            stack: None,
            retry_count: 1,
        });
        run.complete(RunResults {
            found: 4,
            inserted: 3,
            updated: 1,
            ..Default::default()
        });
        repo.save(&run).unwrap();

        let loaded = repo.get(&run.session_id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.results.found, 4);
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.errors[0].retry_count, 1);
        assert_eq!(loaded.triggered_by, Trigger::Manual);
    }

    #[test]
    fn test_save_updates_existing_session() {
        let (repo, _dir) = test_repo();
        let mut run = sample_run("news");
        repo.save(&run).unwrap();

        run.complete(RunResults {
            found: 2,
            inserted: 2,
            ..Default::default()
        });
        repo.save(&run).unwrap();

        let (runs, total) = repo.list(&RunLogFilter::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
    }

    #[test]
    fn test_list_filters() {
        let (repo, _dir) = test_repo();
        let mut news = sample_run("news");
        news.complete(RunResults::default());
        repo.save(&news).unwrap();
        let mut jobs = sample_run("jobs");
        jobs.cancel();
        repo.save(&jobs).unwrap();

        let (runs, total) = repo
            .list(&RunLogFilter {
                adapter: Some("jobs".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(runs[0].adapter, "jobs");

        let (runs, _) = repo
            .list(&RunLogFilter {
                status: Some(RunStatus::Cancelled),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_cleanup_expired() {
        let (repo, _dir) = test_repo();
        let mut old = sample_run("news");
        old.started_at = Utc::now() - Duration::days(RUN_LOG_TTL_DAYS + 5);
        old.complete(RunResults::default());
        repo.save(&old).unwrap();
        let mut fresh = sample_run("news");
        fresh.complete(RunResults::default());
        repo.save(&fresh).unwrap();

        let removed = repo.cleanup_expired().unwrap();
        assert_eq!(removed, 1);
        assert!(repo.get(&old.session_id).unwrap().is_none());
        assert!(repo.get(&fresh.session_id).unwrap().is_some());
    }

    #[test]
    fn test_stats_aggregation() {
        let (repo, _dir) = test_repo();
        for i in 0..3 {
            let mut run = sample_run(if i == 0 { "jobs" } else { "news" });
            run.complete(RunResults {
                found: 2,
                inserted: 1,
                ..Default::default()
            });
            repo.save(&run).unwrap();
        }

        let stats = repo.stats(7).unwrap();
        assert_eq!(stats.total_runs, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.total_found, 6);
        assert_eq!(stats.total_inserted, 3);
        assert_eq!(stats.by_adapter[0].adapter, "news");
        assert_eq!(stats.by_adapter[0].runs, 2);
    }
}
