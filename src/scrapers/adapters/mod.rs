//! Source adapters.
//!
//! An adapter names its feed endpoints, the category of records it
//! yields, and any source-specific enrichment. The fetch, parse, filter,
//! and persist machinery is shared and lives in the orchestrator.

mod blogs;
mod jobs;
mod news;

pub use blogs::BlogsAdapter;
pub use jobs::JobsAdapter;
pub use news::NewsAdapter;

use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use url::Url;

use super::feed::FeedItem;
use crate::models::{Author, ContentCategory, ContentRecord};

/// One feed endpoint an adapter polls.
#[derive(Debug, Clone)]
pub struct FeedEndpoint {
    pub url: String,
    pub source_name: String,
}

impl FeedEndpoint {
    pub fn new(url: &str, source_name: &str) -> Self {
        Self {
            url: url.to_string(),
            source_name: source_name.to_string(),
        }
    }
}

/// A source of candidate records.
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> ContentCategory;
    fn endpoints(&self) -> Vec<FeedEndpoint>;

    /// Source-specific post-processing of a normalized record.
    fn enrich(&self, record: &mut ContentRecord, item: &FeedItem) {
        let _ = (record, item);
    }
}

/// The built-in adapter set.
pub fn registry() -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(NewsAdapter),
        Arc::new(JobsAdapter),
        Arc::new(BlogsAdapter),
    ]
}

/// Turn a feed item into a candidate record, or None when it lacks a
/// usable title or link.
pub fn normalize_item(
    adapter: &dyn SourceAdapter,
    endpoint: &FeedEndpoint,
    item: &FeedItem,
    retention_days: i64,
) -> Option<ContentRecord> {
    let title = item.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let link = item.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?;

    let mut record = ContentRecord::new(adapter.category(), title, link, adapter.name());
    record.source_host = host_of(link);
    record.source_name = endpoint.source_name.clone();
    if let Some(description) = &item.description {
        record.set_description(description);
    }
    record.body = item.content.clone();
    record.author = item.author.as_ref().map(|name| Author {
        name: name.clone(),
        url: None,
    });
    record.published_at = item.published;

    let mut tags = vec![
        adapter.category().as_str().to_string(),
        "webmethods".to_string(),
        "rss".to_string(),
    ];
    for category in &item.categories {
        let tag = category.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    record.tags = tags;

    record.relevance_score = default_relevance();
    record.expires_at = Some(record.scraped_at + Duration::days(retention_days));

    adapter.enrich(&mut record, item);
    Some(record)
}

/// Origin host, lower-cased with a leading `www.` stripped.
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_default()
}

/// Baseline relevance for feed-sourced candidates.
fn default_relevance() -> u8 {
    rand::rng().random_range(50..=60)
}
