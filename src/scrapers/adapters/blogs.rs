//! Community blog feeds.

use super::{FeedEndpoint, SourceAdapter};
use crate::models::ContentCategory;

pub struct BlogsAdapter;

impl SourceAdapter for BlogsAdapter {
    fn name(&self) -> &'static str {
        "blogs"
    }

    fn category(&self) -> ContentCategory {
        ContentCategory::Blog
    }

    fn endpoints(&self) -> Vec<FeedEndpoint> {
        vec![
            FeedEndpoint::new(
                "https://tech.forums.softwareag.com/c/blogs/23.rss",
                "Software AG Tech Community Blogs",
            ),
            FeedEndpoint::new("https://medium.com/feed/tag/webmethods", "Medium"),
        ]
    }
}
