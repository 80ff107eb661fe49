//! News feeds from the vendor and community press.

use super::{FeedEndpoint, SourceAdapter};
use crate::models::{ContentCategory, ContentRecord};
use crate::scrapers::feed::FeedItem;

pub struct NewsAdapter;

impl SourceAdapter for NewsAdapter {
    fn name(&self) -> &'static str {
        "news"
    }

    fn category(&self) -> ContentCategory {
        ContentCategory::News
    }

    fn endpoints(&self) -> Vec<FeedEndpoint> {
        vec![
            FeedEndpoint::new(
                "https://tech.forums.softwareag.com/c/news/7.rss",
                "Software AG Tech Community",
            ),
            FeedEndpoint::new(
                "https://www.integrationnews.io/tag/webmethods/rss",
                "Integration News",
            ),
        ]
    }

    fn enrich(&self, record: &mut ContentRecord, item: &FeedItem) {
        // Press feeds often wrap a lead image into the encoded content.
        if record.image_url.is_none() {
            if let Some(content) = &item.content {
                record.image_url = first_img_src(content);
            }
        }
    }
}

/// Pull the first `<img src="...">` out of an HTML fragment.
fn first_img_src(html: &str) -> Option<String> {
    let img_at = html.find("<img")?;
    let rest = &html[img_at..];
    let src_at = rest.find("src=")?;
    let after = &rest[src_at + 4..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &after[1..];
    let end = inner.find(quote)?;
    let src = &inner[..end];
    if src.starts_with("http") {
        Some(src.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_img_src() {
        assert_eq!(
            first_img_src(r#"<p>intro</p><img src="https://cdn.example.com/a.png" alt="">"#),
            Some("https://cdn.example.com/a.png".to_string())
        );
        assert_eq!(first_img_src("<p>no image</p>"), None);
        assert_eq!(first_img_src(r#"<img src='/relative.png'>"#), None);
    }

    #[test]
    fn test_enrich_sets_image() {
        let adapter = NewsAdapter;
        let endpoint = FeedEndpoint::new("https://example.com/feed", "Example");
        let item = FeedItem {
            title: Some("Story".to_string()),
            link: Some("https://example.com/story".to_string()),
            content: Some(r#"<img src="https://cdn.example.com/lead.jpg">"#.to_string()),
            ..Default::default()
        };
        let record = super::super::normalize_item(&adapter, &endpoint, &item, 90).unwrap();
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://cdn.example.com/lead.jpg")
        );
    }
}
