//! robots.txt compliance cache.
//!
//! Rules are fetched once per origin and cached with a TTL. Concurrent
//! misses on one origin coalesce into a single fetch. Unreachable or
//! malformed robots endpoints degrade to a permissive entry so that a
//! broken robots.txt never silently blocks a source.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::error::ScrapeError;

/// How long a cached entry is trusted.
pub const ROBOTS_TTL: Duration = Duration::from_secs(3600);

/// Maximum cached origins; oldest entries are evicted first.
pub const ROBOTS_CACHE_MAX: usize = 100;

/// Deadline for fetching a robots.txt.
const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Allow,
    Disallow,
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    path: String,
}

/// One `User-agent` group of a robots.txt file.
#[derive(Debug, Clone, Default)]
struct RuleGroup {
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt contents.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    groups: Vec<RuleGroup>,
    sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Parse the standard robots.txt grammar. Unknown directives are
    /// ignored.
    pub fn parse(text: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut current: Option<RuleGroup> = None;
        // Consecutive User-agent lines share one group until a rule line
        // closes the agent list.
        let mut agents_open = false;

        for raw_line in text.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    if !agents_open {
                        if let Some(group) = current.take() {
                            rules.groups.push(group);
                        }
                        current = Some(RuleGroup::default());
                        agents_open = true;
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_lowercase());
                    }
                }
                "allow" | "disallow" => {
                    agents_open = false;
                    if let Some(group) = current.as_mut() {
                        // An empty Disallow means "allow everything" and
                        // matches nothing as a rule.
                        if !value.is_empty() {
                            group.rules.push(Rule {
                                kind: if field == "allow" {
                                    RuleKind::Allow
                                } else {
                                    RuleKind::Disallow
                                },
                                path: value.to_string(),
                            });
                        }
                    }
                }
                "crawl-delay" => {
                    agents_open = false;
                    if let Some(group) = current.as_mut() {
                        group.crawl_delay = value.parse().ok();
                    }
                }
                "sitemap" => {
                    rules.sitemaps.push(value.to_string());
                }
                // `Host` and anything else carry no rule semantics here.
                _ => {
                    agents_open = false;
                }
            }
        }
        if let Some(group) = current.take() {
            rules.groups.push(group);
        }
        rules
    }

    /// Pick the group whose agent token matches `user_agent` most
    /// specifically; `*` is the fallback.
    fn group_for<'a>(&'a self, user_agent: &str) -> Option<&'a RuleGroup> {
        let ua = user_agent.to_lowercase();
        let mut best: Option<(&RuleGroup, usize)> = None;
        for group in &self.groups {
            for agent in &group.agents {
                let specificity = if agent == "*" {
                    Some(0)
                } else if ua.contains(agent.as_str()) {
                    Some(agent.len())
                } else {
                    None
                };
                if let Some(len) = specificity {
                    if best.map_or(true, |(_, b)| len > b) {
                        best = Some((group, len));
                    }
                }
            }
        }
        best.map(|(g, _)| g)
    }

    /// A path is allowed unless the longest matching rule disallows it.
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let mut best: Option<(&Rule, usize)> = None;
        for rule in &group.rules {
            if let Some(len) = match_length(&rule.path, path) {
                let better = match best {
                    None => true,
                    Some((current, best_len)) => {
                        len > best_len
                            // At equal length, Allow wins over Disallow.
                            || (len == best_len
                                && rule.kind == RuleKind::Allow
                                && current.kind == RuleKind::Disallow)
                    }
                };
                if better {
                    best = Some((rule, len));
                }
            }
        }
        match best {
            Some((rule, _)) => rule.kind == RuleKind::Allow,
            None => true,
        }
    }

    /// Crawl-delay for the matching agent group, in seconds.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay)
    }
}

/// Match a robots path pattern (with `*` wildcards and an optional `$`
/// end anchor) against a URL path. Returns the pattern length as the
/// specificity measure when it matches.
fn match_length(pattern: &str, path: &str) -> Option<usize> {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();

    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !path[pos..].starts_with(part) {
                return None;
            }
            pos += part.len();
        } else {
            match path[pos..].find(part) {
                Some(found) => pos += found + part.len(),
                None => return None,
            }
        }
    }
    if anchored {
        let tail_wildcard = parts.last().map_or(false, |p| p.is_empty());
        if !tail_wildcard && pos != path.len() {
            return None;
        }
    }
    Some(pattern.len())
}

/// Cached robots state for one origin.
#[derive(Debug, Clone)]
pub struct RobotsEntry {
    pub origin: String,
    pub fetched_at: Instant,
    /// Whether the origin actually serves a robots.txt.
    pub exists: bool,
    pub rules: Option<RobotsRules>,
    pub raw: Option<String>,
}

impl RobotsEntry {
    fn permissive(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            fetched_at: Instant::now(),
            exists: false,
            rules: None,
            raw: None,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Fetch-once, TTL-cached robots.txt store.
pub struct RobotsCache {
    client: reqwest::Client,
    entries: RwLock<HashMap<String, RobotsEntry>>,
    /// Insertion order for eviction.
    order: Mutex<VecDeque<String>>,
    /// Per-origin fetch locks so concurrent misses coalesce.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: Duration,
    max_size: usize,
    fetch_errors: AtomicU64,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::with_limits(ROBOTS_TTL, ROBOTS_CACHE_MAX)
    }

    pub fn with_limits(ttl: Duration, max_size: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ROBOTS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            inflight: Mutex::new(HashMap::new()),
            ttl,
            max_size,
            fetch_errors: AtomicU64::new(0),
        }
    }

    /// `scheme://host[:port]` cache key for a URL.
    pub fn origin_of(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        })
    }

    /// Whether `user_agent` may fetch `url`.
    pub async fn is_allowed(
        &self,
        url: &str,
        user_agent: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, ScrapeError> {
        let Some(origin) = Self::origin_of(url) else {
            return Ok(true);
        };
        let entry = self.entry_for(&origin, cancel).await?;
        let Some(rules) = entry.rules else {
            return Ok(true);
        };
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        Ok(rules.is_allowed(&path, user_agent))
    }

    /// Crawl-delay in seconds, if the origin requests one.
    pub async fn crawl_delay(
        &self,
        url: &str,
        user_agent: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<f64>, ScrapeError> {
        let Some(origin) = Self::origin_of(url) else {
            return Ok(None);
        };
        let entry = self.entry_for(&origin, cancel).await?;
        Ok(entry
            .rules
            .as_ref()
            .and_then(|r| r.crawl_delay(user_agent)))
    }

    /// Sitemap URLs advertised by the origin's robots.txt.
    pub async fn sitemaps(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScrapeError> {
        let Some(origin) = Self::origin_of(url) else {
            return Ok(Vec::new());
        };
        let entry = self.entry_for(&origin, cancel).await?;
        Ok(entry
            .rules
            .as_ref()
            .map(|r| r.sitemaps.clone())
            .unwrap_or_default())
    }

    /// Count of robots fetches that failed and degraded to allow-all.
    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.load(Ordering::Relaxed)
    }

    async fn entry_for(
        &self,
        origin: &str,
        cancel: &CancellationToken,
    ) -> Result<RobotsEntry, ScrapeError> {
        if let Some(entry) = self.entries.read().await.get(origin) {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.clone());
            }
        }

        // Single-flight: one fetch per origin; late arrivals wait and
        // then hit the fresh cache.
        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(origin.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        if let Some(entry) = self.entries.read().await.get(origin) {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.clone());
            }
        }

        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let entry = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            entry = self.fetch_entry(origin) => entry,
        };
        self.insert(entry.clone()).await;
        Ok(entry)
    }

    async fn fetch_entry(&self, origin: &str) -> RobotsEntry {
        let robots_url = format!("{origin}/robots.txt");
        debug!("fetching {}", robots_url);

        let response = match self.client.get(&robots_url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("robots fetch failed for {}: {}", origin, e);
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                return RobotsEntry::permissive(origin);
            }
        };

        let status = response.status().as_u16();
        if status >= 500 {
            warn!("robots fetch for {} returned {}", origin, status);
            self.fetch_errors.fetch_add(1, Ordering::Relaxed);
            return RobotsEntry::permissive(origin);
        }
        if status != 200 {
            // 4xx means "no robots.txt": everything is allowed.
            return RobotsEntry {
                origin: origin.to_string(),
                fetched_at: Instant::now(),
                exists: false,
                rules: None,
                raw: None,
            };
        }

        match response.text().await {
            Ok(text) => RobotsEntry {
                origin: origin.to_string(),
                fetched_at: Instant::now(),
                exists: true,
                rules: Some(RobotsRules::parse(&text)),
                raw: Some(text),
            },
            Err(e) => {
                warn!("robots body read failed for {}: {}", origin, e);
                self.fetch_errors.fetch_add(1, Ordering::Relaxed);
                RobotsEntry::permissive(origin)
            }
        }
    }

    async fn insert(&self, entry: RobotsEntry) {
        let mut entries = self.entries.write().await;
        let mut order = self.order.lock().await;
        if !entries.contains_key(&entry.origin) {
            while entries.len() >= self.max_size {
                match order.pop_front() {
                    Some(oldest) => {
                        entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            order.push_back(entry.origin.clone());
        }
        entries.insert(entry.origin.clone(), entry);
    }

    /// Seed the cache directly; used by tests and warm starts.
    pub async fn seed(&self, origin: &str, text: &str) {
        self.insert(RobotsEntry {
            origin: origin.to_string(),
            fetched_at: Instant::now(),
            exists: true,
            rules: Some(RobotsRules::parse(text)),
            raw: Some(text.to_string()),
        })
        .await;
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
User-agent: *\n\
Disallow: /private/\n\
Allow: /private/updates\n\
Crawl-delay: 2\n\
Sitemap: https://example.com/sitemap.xml\n\
\n\
User-agent: scoutbot\n\
Disallow: /\n";

    #[test]
    fn test_parse_groups_and_sitemaps() {
        let rules = RobotsRules::parse(SAMPLE);
        assert_eq!(rules.groups.len(), 2);
        assert_eq!(rules.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn test_wildcard_group_matching() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(rules.is_allowed("/public/page", "SomeBrowser/1.0"));
        assert!(!rules.is_allowed("/private/docs", "SomeBrowser/1.0"));
        // Longest match wins: the Allow is more specific.
        assert!(rules.is_allowed("/private/updates/today", "SomeBrowser/1.0"));
    }

    #[test]
    fn test_specific_agent_section_wins() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(!rules.is_allowed("/public/page", "scoutbot/0.1"));
    }

    #[test]
    fn test_crawl_delay() {
        let rules = RobotsRules::parse(SAMPLE);
        assert_eq!(rules.crawl_delay("SomeBrowser/1.0"), Some(2.0));
        assert_eq!(rules.crawl_delay("scoutbot"), None);
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n");
        assert!(rules.is_allowed("/anything", "any"));
    }

    #[test]
    fn test_wildcard_and_anchor_patterns() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /*.pdf$\nDisallow: /tmp/*\n");
        assert!(!rules.is_allowed("/docs/file.pdf", "any"));
        assert!(rules.is_allowed("/docs/file.pdf.html", "any"));
        assert!(!rules.is_allowed("/tmp/a/b", "any"));
    }

    #[test]
    fn test_unknown_directives_ignored() {
        let rules = RobotsRules::parse("User-agent: *\nHost: example.com\nNoise: x\nDisallow: /a\n");
        assert!(!rules.is_allowed("/a", "any"));
        assert!(rules.is_allowed("/b", "any"));
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            RobotsCache::origin_of("https://news.example.com/feed.xml").as_deref(),
            Some("https://news.example.com")
        );
        assert_eq!(
            RobotsCache::origin_of("http://localhost:8080/x").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(RobotsCache::origin_of("not a url"), None);
    }

    #[tokio::test]
    async fn test_seeded_cache_answers_without_network() {
        let cache = RobotsCache::new();
        cache
            .seed("https://example.com", "User-agent: *\nDisallow: /\n")
            .await;
        let cancel = CancellationToken::new();
        let allowed = cache
            .is_allowed("https://example.com/page", "any", &cancel)
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_eviction_keeps_cache_bounded() {
        let cache = RobotsCache::with_limits(ROBOTS_TTL, 2);
        cache.seed("https://a.com", "").await;
        cache.seed("https://b.com", "").await;
        cache.seed("https://c.com", "").await;
        assert!(cache.entries.read().await.len() <= 2);
        assert!(!cache.entries.read().await.contains_key("https://a.com"));
    }
}
