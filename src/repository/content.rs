//! Content record repository.
//!
//! The bulk-upsert path is hash-keyed: a record either inserts fresh,
//! updates an existing row's non-identity fields, or is recognized as an
//! unchanged duplicate. Unique-constraint races between concurrent
//! upserts are expected and counted as modifications, never as errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    connect, is_unique_violation, parse_datetime, parse_datetime_opt, with_retry, Error, Result,
};
use crate::models::{Author, ContentCategory, ContentRecord, ContentStatus, JobDetails};

/// Text-rank weights are part of the store contract:
/// title 10, description 5, tags 3, keywords 3, body 1.
const RANK_EXPR: &str = "((CASE WHEN instr(lower(title), ?) > 0 THEN 10 ELSE 0 END) \
     + (CASE WHEN instr(lower(coalesce(description, '')), ?) > 0 THEN 5 ELSE 0 END) \
     + (CASE WHEN instr(lower(tags), ?) > 0 THEN 3 ELSE 0 END) \
     + (CASE WHEN instr(lower(keyword_hits), ?) > 0 THEN 3 ELSE 0 END) \
     + (CASE WHEN instr(lower(coalesce(body, '')), ?) > 0 THEN 1 ELSE 0 END))";

/// Outcome counters of a bulk upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: u64,
    pub modified: u64,
    pub duplicates: u64,
    pub total: u64,
}

/// Aggregate content statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContentStats {
    pub total: u64,
    pub by_type: Vec<(String, u64)>,
    pub by_source: Vec<(String, u64)>,
}

/// Filters and pagination for content listing.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    pub category: Option<ContentCategory>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub status: Option<ContentStatus>,
    pub min_relevance: Option<u8>,
    pub max_age_days: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl ContentQuery {
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.clamp(1, 100)
    }
}

enum UpsertOutcome {
    Inserted,
    Modified,
    Unchanged,
}

/// Non-identity fields compared to decide modified-vs-duplicate.
#[derive(PartialEq)]
struct ComparableFields {
    title: String,
    url: String,
    description: Option<String>,
    body: Option<String>,
    image_url: Option<String>,
    author: Option<String>,
    published_at: Option<String>,
    source_host: String,
    source_name: String,
    tags: String,
    keyword_hits: String,
    relevance_score: i64,
    job_details: Option<String>,
    scraped_by: String,
}

/// SQLite-backed content repository.
pub struct ContentRepository {
    db_path: PathBuf,
}

impl ContentRepository {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        connect(&self.db_path)
    }

    /// Upsert a batch of records keyed by content hash.
    ///
    /// Records are processed independently; a bad record never blocks the
    /// rest. If any record fails with a non-duplicate store error the call
    /// returns `Error::BulkUpsert` after the whole batch was attempted.
    pub fn bulk_upsert(&self, records: &[ContentRecord]) -> Result<UpsertStats> {
        let conn = self.connect()?;
        let mut stats = UpsertStats {
            total: records.len() as u64,
            ..Default::default()
        };
        let mut failed = 0usize;
        let mut first_error: Option<String> = None;

        for record in records {
            let outcome = with_retry(|| self.upsert_one(&conn, record));
            match outcome {
                Ok(UpsertOutcome::Inserted) => stats.inserted += 1,
                Ok(UpsertOutcome::Modified) => stats.modified += 1,
                Ok(UpsertOutcome::Unchanged) => stats.duplicates += 1,
                Err(e) => {
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        if failed > 0 {
            return Err(Error::BulkUpsert {
                failed,
                total: records.len(),
                first_error: first_error.unwrap_or_default(),
            });
        }
        Ok(stats)
    }

    fn upsert_one(&self, conn: &Connection, rec: &ContentRecord) -> Result<UpsertOutcome> {
        let author_json = rec
            .author
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let tags_json = serde_json::to_string(&rec.tags)?;
        let keywords_json = serde_json::to_string(&rec.keyword_hits)?;
        let job_json = rec
            .job_details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let published = rec.published_at.map(|dt| dt.to_rfc3339());
        let now = Utc::now();

        let inserted = match conn.execute(
            r#"
            INSERT INTO content_records
                (content_hash, category, title, url, description, body, image_url,
                 author, published_at, source_host, source_name, tags, keyword_hits,
                 relevance_score, job_details, scraped_by, scraped_at, expires_at,
                 status, views, clicks, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, 0, 0, ?20)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
            params![
                rec.content_hash,
                rec.category.as_str(),
                rec.title,
                rec.url,
                rec.description,
                rec.body,
                rec.image_url,
                author_json,
                published,
                rec.source_host,
                rec.source_name,
                tags_json,
                keywords_json,
                rec.relevance_score as i64,
                job_json,
                rec.scraped_by,
                rec.scraped_at.to_rfc3339(),
                rec.expires_at.map(|dt| dt.to_rfc3339()),
                rec.status.as_str(),
                now.to_rfc3339(),
            ],
        ) {
            Ok(n) => n,
            // A racing insert between our conflict check and write.
            Err(e) if is_unique_violation(&e) => 0,
            Err(e) => return Err(e.into()),
        };
        if inserted == 1 {
            return Ok(UpsertOutcome::Inserted);
        }

        let incoming = ComparableFields {
            title: rec.title.clone(),
            url: rec.url.clone(),
            description: rec.description.clone(),
            body: rec.body.clone(),
            image_url: rec.image_url.clone(),
            author: author_json.clone(),
            published_at: published.clone(),
            source_host: rec.source_host.clone(),
            source_name: rec.source_name.clone(),
            tags: tags_json.clone(),
            keyword_hits: keywords_json.clone(),
            relevance_score: rec.relevance_score as i64,
            job_details: job_json.clone(),
            scraped_by: rec.scraped_by.clone(),
        };

        let existing = conn
            .query_row(
                r#"
                SELECT title, url, description, body, image_url, author, published_at,
                       source_host, source_name, tags, keyword_hits, relevance_score,
                       job_details, scraped_by
                FROM content_records WHERE content_hash = ?
                "#,
                params![rec.content_hash],
                |row| {
                    Ok(ComparableFields {
                        title: row.get(0)?,
                        url: row.get(1)?,
                        description: row.get(2)?,
                        body: row.get(3)?,
                        image_url: row.get(4)?,
                        author: row.get(5)?,
                        published_at: row.get(6)?,
                        source_host: row.get(7)?,
                        source_name: row.get(8)?,
                        tags: row.get(9)?,
                        keyword_hits: row.get(10)?,
                        relevance_score: row.get(11)?,
                        job_details: row.get(12)?,
                        scraped_by: row.get(13)?,
                    })
                },
            )
            .optional()?;

        let existing = match existing {
            Some(e) => e,
            // Row vanished between conflict and read; retake the insert path.
            None => {
                return match conn.execute(
                    "INSERT INTO content_records
                        (content_hash, category, title, url, source_host, source_name,
                         tags, keyword_hits, relevance_score, scraped_by, scraped_at,
                         status, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                     ON CONFLICT(content_hash) DO NOTHING",
                    params![
                        rec.content_hash,
                        rec.category.as_str(),
                        rec.title,
                        rec.url,
                        rec.source_host,
                        rec.source_name,
                        tags_json,
                        keywords_json,
                        rec.relevance_score as i64,
                        rec.scraped_by,
                        rec.scraped_at.to_rfc3339(),
                        rec.status.as_str(),
                        now.to_rfc3339(),
                    ],
                ) {
                    Ok(1) => Ok(UpsertOutcome::Inserted),
                    Ok(_) => Ok(UpsertOutcome::Modified),
                    Err(e) if is_unique_violation(&e) => Ok(UpsertOutcome::Modified),
                    Err(e) => Err(e.into()),
                };
            }
        };

        if existing == incoming {
            return Ok(UpsertOutcome::Unchanged);
        }

        // Update the supplied non-identity fields; scraped_at, expires_at,
        // status, and the counters stay owned by their original writers.
        conn.execute(
            r#"
            UPDATE content_records SET
                category = ?2, title = ?3, url = ?4, description = ?5, body = ?6,
                image_url = ?7, author = ?8, published_at = ?9, source_host = ?10,
                source_name = ?11, tags = ?12, keyword_hits = ?13,
                relevance_score = ?14, job_details = ?15, scraped_by = ?16,
                last_updated = ?17
            WHERE content_hash = ?1
            "#,
            params![
                rec.content_hash,
                rec.category.as_str(),
                rec.title,
                rec.url,
                rec.description,
                rec.body,
                rec.image_url,
                author_json,
                published,
                rec.source_host,
                rec.source_name,
                tags_json,
                keywords_json,
                rec.relevance_score as i64,
                job_json,
                rec.scraped_by,
                now.to_rfc3339(),
            ],
        )?;
        Ok(UpsertOutcome::Modified)
    }

    /// Get a record by content hash.
    pub fn get(&self, content_hash: &str) -> Result<Option<ContentRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM content_records WHERE content_hash = ?")?;
        let record = stmt
            .query_row(params![content_hash], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Increment the view counter. Returns false when the record is absent.
    pub fn increment_views(&self, content_hash: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = with_retry(|| {
            conn.execute(
                "UPDATE content_records SET views = views + 1 WHERE content_hash = ?",
                params![content_hash],
            )
            .map_err(Error::from)
        })?;
        Ok(rows > 0)
    }

    /// Hard-delete a record.
    pub fn delete(&self, content_hash: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn.execute(
            "DELETE FROM content_records WHERE content_hash = ?",
            params![content_hash],
        )?;
        Ok(rows > 0)
    }

    /// Set a record's status.
    pub fn set_status(&self, content_hash: &str, status: ContentStatus) -> Result<bool> {
        let conn = self.connect()?;
        let rows = with_retry(|| {
            conn.execute(
                "UPDATE content_records SET status = ?, last_updated = ? WHERE content_hash = ?",
                params![status.as_str(), Utc::now().to_rfc3339(), content_hash],
            )
            .map_err(Error::from)
        })?;
        Ok(rows > 0)
    }

    /// List records matching the query. Returns the page and the total
    /// match count. With `search` set, rows are ranked by the weighted
    /// text score; otherwise they sort by the named field.
    pub fn find(&self, query: &ContentQuery) -> Result<(Vec<ContentRecord>, u64)> {
        let conn = self.connect()?;

        let mut clauses: Vec<String> = Vec::new();
        let mut filter_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(category) = query.category {
            clauses.push("category = ?".to_string());
            filter_params.push(Box::new(category.as_str().to_string()));
        }
        if let Some(source) = &query.source {
            clauses.push("source_host = ?".to_string());
            filter_params.push(Box::new(source.to_lowercase()));
        }
        for tag in &query.tags {
            clauses.push("instr(lower(tags), ?) > 0".to_string());
            filter_params.push(Box::new(tag.to_lowercase()));
        }
        for keyword in &query.keywords {
            clauses.push("instr(lower(keyword_hits), ?) > 0".to_string());
            filter_params.push(Box::new(keyword.to_lowercase()));
        }
        if let Some(status) = query.status {
            clauses.push("status = ?".to_string());
            filter_params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(min) = query.min_relevance {
            clauses.push("relevance_score >= ?".to_string());
            filter_params.push(Box::new(min as i64));
        }
        if let Some(days) = query.max_age_days {
            clauses.push("scraped_at >= ?".to_string());
            filter_params.push(Box::new((Utc::now() - Duration::days(days)).to_rfc3339()));
        }

        let search_term = query
            .search
            .as_ref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        if search_term.is_some() {
            clauses.push(format!("{RANK_EXPR} > 0"));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let order_sql = match &search_term {
            Some(_) => format!(" ORDER BY {RANK_EXPR} DESC"),
            None => {
                let column = match query.sort.as_deref() {
                    Some("relevance") | Some("relevanceScore") => "relevance_score",
                    Some("published") | Some("publishedAt") => "published_at",
                    Some("title") => "title",
                    Some("views") => "views",
                    Some("lastUpdated") => "last_updated",
                    _ => "scraped_at",
                };
                let direction = match query.order.as_deref() {
                    Some("asc") => "ASC",
                    _ => "DESC",
                };
                format!(" ORDER BY {column} {direction}")
            }
        };

        // Parameter order: filters (incl. one rank instance in WHERE),
        // then the ORDER BY rank instance, then LIMIT/OFFSET.
        let mut select_params: Vec<&dyn rusqlite::ToSql> = Vec::new();
        for p in &filter_params {
            select_params.push(p.as_ref());
        }
        if let Some(term) = &search_term {
            for _ in 0..5 {
                select_params.push(term);
            }
        }
        let count_params = select_params.clone();
        if let Some(term) = &search_term {
            for _ in 0..5 {
                select_params.push(term);
            }
        }

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM content_records{where_sql}"),
            count_params.as_slice(),
            |row| row.get::<_, i64>(0),
        )? as u64;

        let limit = query.limit() as i64;
        let offset = ((query.page() - 1) * query.limit()) as i64;
        select_params.push(&limit);
        select_params.push(&offset);

        let sql =
            format!("SELECT * FROM content_records{where_sql}{order_sql} LIMIT ? OFFSET ?");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(select_params.as_slice(), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((records, total))
    }

    /// Physically delete non-flagged records older than `max_age_days`.
    pub fn cleanup(&self, max_age_days: i64) -> Result<u64> {
        let conn = self.connect()?;
        let cutoff = (Utc::now() - Duration::days(max_age_days)).to_rfc3339();
        let rows = with_retry(|| {
            conn.execute(
                "DELETE FROM content_records WHERE scraped_at < ? AND status != 'flagged'",
                params![cutoff],
            )
            .map_err(Error::from)
        })?;
        Ok(rows as u64)
    }

    /// Remove non-flagged records whose per-record TTL has elapsed.
    pub fn expire_due(&self) -> Result<u64> {
        let conn = self.connect()?;
        let rows = with_retry(|| {
            conn.execute(
                "DELETE FROM content_records
                 WHERE expires_at IS NOT NULL AND expires_at < ? AND status != 'flagged'",
                params![Utc::now().to_rfc3339()],
            )
            .map_err(Error::from)
        })?;
        Ok(rows as u64)
    }

    /// Total record count.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Aggregate stats: totals, per-category counts, top-10 sources.
    pub fn stats(&self) -> Result<ContentStats> {
        let conn = self.connect()?;
        let total: i64 =
            conn.query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM content_records GROUP BY category ORDER BY COUNT(*) DESC",
        )?;
        let by_type = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT source_host, COUNT(*) FROM content_records
             GROUP BY source_host ORDER BY COUNT(*) DESC LIMIT 10",
        )?;
        let by_source = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ContentStats {
            total: total as u64,
            by_type,
            by_source,
        })
    }

    /// Per-source record counts keyed by host.
    pub fn source_counts(&self) -> Result<HashMap<String, u64>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT source_host, COUNT(*) FROM content_records GROUP BY source_host")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<ContentRecord> {
    let author: Option<Author> = row
        .get::<_, Option<String>>("author")?
        .and_then(|s| serde_json::from_str(&s).ok());
    let tags: Vec<String> = row
        .get::<_, Option<String>>("tags")?
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    let keyword_hits: Vec<String> = row
        .get::<_, Option<String>>("keyword_hits")?
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    let job_details: Option<JobDetails> = row
        .get::<_, Option<String>>("job_details")?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(ContentRecord {
        content_hash: row.get("content_hash")?,
        category: ContentCategory::from_str(&row.get::<_, String>("category")?)
            .unwrap_or(ContentCategory::Other),
        title: row.get("title")?,
        url: row.get("url")?,
        description: row.get("description")?,
        body: row.get("body")?,
        image_url: row.get("image_url")?,
        author,
        published_at: parse_datetime_opt(row.get("published_at")?),
        source_host: row.get("source_host")?,
        source_name: row.get("source_name")?,
        tags,
        keyword_hits,
        relevance_score: row.get::<_, i64>("relevance_score")?.clamp(0, 100) as u8,
        job_details,
        scraped_by: row.get("scraped_by")?,
        scraped_at: parse_datetime(&row.get::<_, String>("scraped_at")?),
        expires_at: parse_datetime_opt(row.get("expires_at")?),
        status: ContentStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(ContentStatus::Active),
        views: row.get::<_, i64>("views")?.max(0) as u64,
        clicks: row.get::<_, i64>("clicks")?.max(0) as u64,
        last_updated: parse_datetime(&row.get::<_, String>("last_updated")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;

    fn test_repo() -> (ContentRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db")).unwrap();
        (ctx.content(), dir)
    }

    fn record(title: &str, url: &str) -> ContentRecord {
        let mut rec = ContentRecord::new(ContentCategory::News, title, url, "news");
        rec.source_host = "example.com".to_string();
        rec.source_name = "Example".to_string();
        rec.tags = vec!["news".to_string(), "webmethods".to_string()];
        rec
    }

    #[test]
    fn test_upsert_inserts_then_detects_duplicate() {
        let (repo, _dir) = test_repo();
        let rec = record("webMethods 11 released", "https://example.com/a");

        let stats = repo.bulk_upsert(&[rec.clone()]).unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.modified, 0);
        assert_eq!(stats.duplicates, 0);

        // Identical batch: nothing inserted, nothing modified.
        let stats = repo.bulk_upsert(&[rec]).unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.modified, 0);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_detects_field_change() {
        let (repo, _dir) = test_repo();
        let mut rec = record("Release notes", "https://example.com/notes");
        repo.bulk_upsert(&[rec.clone()]).unwrap();

        rec.set_description("Now with details");
        let stats = repo.bulk_upsert(&[rec.clone()]).unwrap();
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.modified, 1);

        let stored = repo.get(&rec.content_hash).unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("Now with details"));
    }

    #[test]
    fn test_upsert_preserves_scraped_at_and_counters() {
        let (repo, _dir) = test_repo();
        let mut rec = record("Stable", "https://example.com/stable");
        repo.bulk_upsert(&[rec.clone()]).unwrap();
        let original = repo.get(&rec.content_hash).unwrap().unwrap();

        repo.increment_views(&rec.content_hash).unwrap();
        rec.set_description("changed");
        repo.bulk_upsert(&[rec.clone()]).unwrap();

        let updated = repo.get(&rec.content_hash).unwrap().unwrap();
        assert_eq!(updated.scraped_at, original.scraped_at);
        assert_eq!(updated.views, 1);
    }

    #[test]
    fn test_cleanup_skips_flagged() {
        let (repo, _dir) = test_repo();
        let mut old = record("Old", "https://example.com/old");
        old.scraped_at = Utc::now() - Duration::days(120);
        let mut flagged = record("Pinned", "https://example.com/pinned");
        flagged.scraped_at = Utc::now() - Duration::days(120);
        repo.bulk_upsert(&[old.clone(), flagged.clone()]).unwrap();
        repo.set_status(&flagged.content_hash, ContentStatus::Flagged)
            .unwrap();

        let deleted = repo.cleanup(90).unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.get(&old.content_hash).unwrap().is_none());
        assert!(repo.get(&flagged.content_hash).unwrap().is_some());
    }

    #[test]
    fn test_expiry_skips_flagged() {
        let (repo, _dir) = test_repo();
        let mut due = record("Due", "https://example.com/due");
        due.expires_at = Some(Utc::now() - Duration::hours(1));
        let mut pinned = record("Kept", "https://example.com/kept");
        pinned.expires_at = Some(Utc::now() - Duration::hours(1));
        repo.bulk_upsert(&[due.clone(), pinned.clone()]).unwrap();
        repo.set_status(&pinned.content_hash, ContentStatus::Flagged)
            .unwrap();

        let expired = repo.expire_due().unwrap();
        assert_eq!(expired, 1);
        assert!(repo.get(&pinned.content_hash).unwrap().is_some());
    }

    #[test]
    fn test_find_filters_and_pagination() {
        let (repo, _dir) = test_repo();
        let mut records = Vec::new();
        for i in 0..5 {
            let mut rec = record(
                &format!("Item {i}"),
                &format!("https://example.com/item/{i}"),
            );
            if i % 2 == 0 {
                rec.category = ContentCategory::Job;
            }
            records.push(rec);
        }
        repo.bulk_upsert(&records).unwrap();

        let (page, total) = repo
            .find(&ContentQuery {
                category: Some(ContentCategory::Job),
                limit: 2,
                page: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let (page2, _) = repo
            .find(&ContentQuery {
                category: Some(ContentCategory::Job),
                limit: 2,
                page: 2,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[test]
    fn test_search_ranks_title_above_body() {
        let (repo, _dir) = test_repo();
        let mut title_hit = record("Flow services deep dive", "https://example.com/t");
        title_hit.body = Some("unrelated".to_string());
        let mut body_hit = record("Weekly digest", "https://example.com/b");
        body_hit.body = Some("covers flow services briefly".to_string());
        repo.bulk_upsert(&[body_hit, title_hit]).unwrap();

        let (results, total) = repo
            .find(&ContentQuery {
                search: Some("flow services".to_string()),
                limit: 10,
                page: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(results[0].title, "Flow services deep dive");
    }

    #[test]
    fn test_stats_by_type_and_source() {
        let (repo, _dir) = test_repo();
        let mut a = record("One", "https://example.com/1");
        a.category = ContentCategory::Job;
        let b = record("Two", "https://example.com/2");
        repo.bulk_upsert(&[a, b]).unwrap();

        let stats = repo.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_type.len(), 2);
        assert_eq!(stats.by_source[0].0, "example.com");
        assert_eq!(stats.by_source[0].1, 2);
    }
}
