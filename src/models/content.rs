//! Content record model.
//!
//! Records are identified by a content hash over the normalized URL and
//! title, so re-observing the same item updates the existing row instead
//! of creating a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Longest title the store accepts; longer titles are truncated.
pub const MAX_TITLE_LEN: usize = 500;

/// Longest description the store accepts.
pub const MAX_DESCRIPTION_LEN: usize = 5_000;

/// Kind of content a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    News,
    Job,
    Blog,
    Article,
    Documentation,
    Tutorial,
    Video,
    Other,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Job => "job",
            Self::Blog => "blog",
            Self::Article => "article",
            Self::Documentation => "documentation",
            Self::Tutorial => "tutorial",
            Self::Video => "video",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "news" => Some(Self::News),
            "job" => Some(Self::Job),
            "blog" => Some(Self::Blog),
            "article" => Some(Self::Article),
            "documentation" => Some(Self::Documentation),
            "tutorial" => Some(Self::Tutorial),
            "video" => Some(Self::Video),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Moderation status of a record.
///
/// `Flagged` records are pinned: neither TTL expiry nor age-based cleanup
/// may remove them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Active,
    Archived,
    Deleted,
    Flagged,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
            Self::Flagged => "flagged",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            "flagged" => Some(Self::Flagged),
            _ => None,
        }
    }
}

/// Item author, when the feed provides one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Job posting details, present when the category is `job`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
}

/// A single scraped item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// SHA-256 over normalized URL and title; the record's identity.
    pub content_hash: String,
    pub category: ContentCategory,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub author: Option<Author>,
    pub published_at: Option<DateTime<Utc>>,
    /// Origin host, lower-cased with a leading `www.` stripped.
    pub source_host: String,
    /// Human-readable source name.
    pub source_name: String,
    /// Lowercase tag set.
    pub tags: Vec<String>,
    /// Configured keywords that matched this record's text.
    pub keyword_hits: Vec<String>,
    /// Relevance in 0..=100.
    pub relevance_score: u8,
    pub job_details: Option<JobDetails>,
    /// Adapter that produced this record.
    pub scraped_by: String,
    /// First observation time; never changed by re-observation.
    pub scraped_at: DateTime<Utc>,
    /// TTL deadline, `scraped_at` + retention, set at insertion.
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ContentStatus,
    pub views: u64,
    pub clicks: u64,
    pub last_updated: DateTime<Utc>,
}

impl ContentRecord {
    /// Compute the identity hash over the normalized URL and title.
    ///
    /// URL normalization trims whitespace and lower-cases the scheme and
    /// host (path case is significant); the title is trimmed and
    /// lower-cased wholesale.
    pub fn compute_hash(url: &str, title: &str) -> String {
        let trimmed = url.trim();
        let normalized_url = Url::parse(trimmed)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| trimmed.to_lowercase());
        let mut hasher = Sha256::new();
        hasher.update(normalized_url.as_bytes());
        hasher.update(b"|");
        hasher.update(title.trim().to_lowercase().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Create a new record with identity derived from `url` and `title`.
    ///
    /// Title and description are clamped to the store limits.
    pub fn new(category: ContentCategory, title: &str, url: &str, scraped_by: &str) -> Self {
        let title = truncate_chars(title.trim(), MAX_TITLE_LEN);
        let now = Utc::now();
        Self {
            content_hash: Self::compute_hash(url, &title),
            category,
            title,
            url: url.trim().to_string(),
            description: None,
            body: None,
            image_url: None,
            author: None,
            published_at: None,
            source_host: String::new(),
            source_name: String::new(),
            tags: Vec::new(),
            keyword_hits: Vec::new(),
            relevance_score: 50,
            job_details: None,
            scraped_by: scraped_by.to_string(),
            scraped_at: now,
            expires_at: None,
            status: ContentStatus::Active,
            views: 0,
            clicks: 0,
            last_updated: now,
        }
    }

    /// Set the description, clamped to the store limit.
    pub fn set_description(&mut self, description: &str) {
        let trimmed = description.trim();
        if !trimmed.is_empty() {
            self.description = Some(truncate_chars(trimmed, MAX_DESCRIPTION_LEN));
        }
    }

    /// Text searched by the relevance filter: title, description, body,
    /// and the source labels.
    pub fn filter_corpus(&self) -> String {
        let mut corpus = String::with_capacity(
            self.title.len()
                + self.description.as_deref().map_or(0, str::len)
                + self.body.as_deref().map_or(0, str::len)
                + self.source_name.len()
                + self.source_host.len()
                + 8,
        );
        corpus.push_str(&self.title);
        if let Some(d) = &self.description {
            corpus.push(' ');
            corpus.push_str(d);
        }
        if let Some(b) = &self.body {
            corpus.push(' ');
            corpus.push_str(b);
        }
        corpus.push(' ');
        corpus.push_str(&self.source_name);
        corpus.push(' ');
        corpus.push_str(&self.source_host);
        corpus.to_lowercase()
    }
}

/// Truncate to a maximum number of characters without splitting one.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_normalizes_whitespace_and_case() {
        let a = ContentRecord::compute_hash("https://Example.com/a", "Title");
        let b = ContentRecord::compute_hash("  https://example.com/a  ", "  title ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_distinguishes_path_case() {
        let a = ContentRecord::compute_hash("https://example.com/Page", "t");
        let b = ContentRecord::compute_hash("https://example.com/page", "t");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_depends_on_title() {
        let a = ContentRecord::compute_hash("https://example.com/a", "one");
        let b = ContentRecord::compute_hash("https://example.com/a", "two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_category_roundtrip() {
        for cat in [
            ContentCategory::News,
            ContentCategory::Job,
            ContentCategory::Blog,
            ContentCategory::Article,
            ContentCategory::Documentation,
            ContentCategory::Tutorial,
            ContentCategory::Video,
            ContentCategory::Other,
        ] {
            assert_eq!(ContentCategory::from_str(cat.as_str()), Some(cat));
        }
        assert_eq!(ContentCategory::from_str("bogus"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ContentStatus::Active,
            ContentStatus::Archived,
            ContentStatus::Deleted,
            ContentStatus::Flagged,
        ] {
            assert_eq!(ContentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ContentStatus::from_str(""), None);
    }

    #[test]
    fn test_title_truncation() {
        let long = "x".repeat(MAX_TITLE_LEN + 50);
        let rec = ContentRecord::new(ContentCategory::News, &long, "https://example.com", "news");
        assert_eq!(rec.title.chars().count(), MAX_TITLE_LEN);
    }

    #[test]
    fn test_filter_corpus_contains_fields() {
        let mut rec = ContentRecord::new(
            ContentCategory::News,
            "Integration Update",
            "https://example.com/a",
            "news",
        );
        rec.set_description("Details about webMethods Integration Server");
        rec.source_name = "Example News".to_string();
        rec.source_host = "example.com".to_string();
        let corpus = rec.filter_corpus();
        assert!(corpus.contains("integration update"));
        assert!(corpus.contains("webmethods"));
        assert!(corpus.contains("example.com"));
    }
}
