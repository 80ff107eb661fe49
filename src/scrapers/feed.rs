//! RSS/Atom payload parsing.
//!
//! Normalizes feed entries into a flat item shape; everything
//! adapter-specific (category, enrichment, scoring) happens downstream.

use chrono::{DateTime, Utc};

use super::error::ScrapeError;

/// One normalized feed entry.
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub description: Option<String>,
    /// Full content body (`content:encoded` or the Atom content element).
    pub content: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
}

/// Parse an RSS or Atom payload into items.
pub fn parse(bytes: &[u8]) -> Result<Vec<FeedItem>, ScrapeError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| ScrapeError::Parse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let summary = entry.summary.map(|s| s.content);
            let content = entry.content.and_then(|c| c.body);
            FeedItem {
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                published: entry.published.or(entry.updated),
                description: summary.clone().or_else(|| content.clone()),
                content,
                author: entry.authors.first().map(|a| a.name.clone()),
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
            }
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Feed</title>
    <link>https://example.com</link>
    <item>
      <title>webMethods 11 GA</title>
      <link>https://example.com/news/ga</link>
      <pubDate>Mon, 06 Jul 2026 09:30:00 GMT</pubDate>
      <description>The release is out.</description>
      <content:encoded><![CDATA[<p>Full release notes</p>]]></content:encoded>
    </item>
    <item>
      <title>Second Item</title>
      <link>https://example.com/news/second</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <entry>
    <title>Atom Entry</title>
    <link href="https://example.com/atom/1"/>
    <id>urn:1</id>
    <updated>2026-07-06T10:00:00Z</updated>
    <summary>An atom summary</summary>
    <author><name>Jane Writer</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("webMethods 11 GA"));
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/news/ga"));
        assert!(items[0].published.is_some());
        assert_eq!(items[0].description.as_deref(), Some("The release is out."));
        assert!(items[0]
            .content
            .as_deref()
            .unwrap()
            .contains("Full release notes"));
        // Bare items still come through; the guard downstream drops them.
        assert!(items[1].description.is_none());
    }

    #[test]
    fn test_parse_atom_entry() {
        let items = parse(ATOM_SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/atom/1"));
        assert_eq!(items[0].author.as_deref(), Some("Jane Writer"));
        assert_eq!(items[0].description.as_deref(), Some("An atom summary"));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse(b"this is not xml").is_err());
    }

    #[test]
    fn test_parse_empty_channel() {
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>E</title></channel></rss>"#;
        let items = parse(empty.as_bytes()).unwrap();
        assert!(items.is_empty());
    }
}
