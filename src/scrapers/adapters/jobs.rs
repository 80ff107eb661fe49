//! Job board feeds.

use super::{FeedEndpoint, SourceAdapter};
use crate::models::{ContentCategory, ContentRecord, JobDetails};
use crate::scrapers::feed::FeedItem;

pub struct JobsAdapter;

impl SourceAdapter for JobsAdapter {
    fn name(&self) -> &'static str {
        "jobs"
    }

    fn category(&self) -> ContentCategory {
        ContentCategory::Job
    }

    fn endpoints(&self) -> Vec<FeedEndpoint> {
        vec![
            FeedEndpoint::new("https://www.indeed.com/rss?q=webmethods", "Indeed"),
            FeedEndpoint::new(
                "https://remoteok.com/remote-webmethods-jobs.rss",
                "Remote OK",
            ),
        ]
    }

    fn enrich(&self, record: &mut ContentRecord, _item: &FeedItem) {
        let mut details = parse_job_title(&record.title).unwrap_or_default();
        if details.remote.is_none() {
            let text = record.filter_corpus();
            if text.contains("remote") {
                details.remote = Some(true);
            }
        }
        record.job_details = Some(details);
    }
}

/// Job boards commonly title postings `role - company - location`.
fn parse_job_title(title: &str) -> Option<JobDetails> {
    let parts: Vec<&str> = title.split(" - ").map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    Some(JobDetails {
        company: Some(parts[1].to_string()),
        location: Some(parts[2..].join(" - ")),
        employment_type: None,
        remote: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_title_shape() {
        let details =
            parse_job_title("webMethods Developer - Acme Corp - Berlin, Germany").unwrap();
        assert_eq!(details.company.as_deref(), Some("Acme Corp"));
        assert_eq!(details.location.as_deref(), Some("Berlin, Germany"));
    }

    #[test]
    fn test_parse_job_title_extra_separators_join_location() {
        let details = parse_job_title("Engineer - Acme - Austin - TX").unwrap();
        assert_eq!(details.location.as_deref(), Some("Austin - TX"));
    }

    #[test]
    fn test_parse_job_title_too_few_parts() {
        assert!(parse_job_title("Senior webMethods Engineer").is_none());
        assert!(parse_job_title("Engineer - Acme").is_none());
    }

    #[test]
    fn test_enrich_marks_remote() {
        let adapter = JobsAdapter;
        let endpoint = FeedEndpoint::new("https://example.com/jobs.rss", "Example Jobs");
        let item = FeedItem {
            title: Some("Integration Lead - Acme - Remote".to_string()),
            link: Some("https://example.com/jobs/1".to_string()),
            description: Some("Fully remote webMethods role".to_string()),
            ..Default::default()
        };
        let record = super::super::normalize_item(&adapter, &endpoint, &item, 90).unwrap();
        let details = record.job_details.unwrap();
        assert_eq!(details.company.as_deref(), Some("Acme"));
        assert_eq!(details.remote, Some(true));
    }
}
