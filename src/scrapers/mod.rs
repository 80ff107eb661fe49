//! Scraping core.
//!
//! The `Scraper` owns every process-wide piece of scrape state: the rate
//! limiter, the concurrency gate, the robots cache, the adapter registry,
//! and the live status map. It is constructed once at startup and passed
//! by handle into the HTTP surface and the scheduler.

pub mod adapters;
#[cfg(feature = "browser")]
mod browser;
mod error;
pub mod feed;
mod gate;
pub mod http_client;
pub mod rate_limiter;
pub mod robots;
mod telemetry;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use error::{FetchFailure, ScrapeError};
pub use gate::{ConcurrencyGate, GateStats};
pub use http_client::{FetchOptions, HttpClient, UserAgentClass};
pub use rate_limiter::{DomainProfile, RateLimiter, RateLimiterStats};
pub use robots::RobotsCache;
pub use telemetry::RunTelemetry;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Settings;
use crate::logging::{Channel, FileLogs};
use crate::models::{
    ContentRecord, RunConfigSnapshot, RunErrorEntry, RunLog, RunResults, RunStatus, Trigger,
};
use crate::repository::DbContext;
use adapters::SourceAdapter;

/// Longest error message stored in the status map.
const MAX_STATUS_ERROR_LEN: usize = 200;

/// Per-adapter state in the live status map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One adapter's slot in the status map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterEntry {
    pub status: AdapterState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdapterEntry {
    fn idle() -> Self {
        Self {
            status: AdapterState::Idle,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

/// Process-wide scrape counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCounters {
    pub total_scraped: u64,
    pub total_inserted: u64,
    pub total_errors: u64,
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperStatus {
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub adapters: HashMap<String, AdapterEntry>,
    pub totals: OverallCounters,
    pub rate_limiter: RateLimiterStats,
    pub gate: GateStats,
}

struct OrchestratorState {
    is_running: bool,
    adapters: HashMap<String, AdapterEntry>,
    last_run: Option<DateTime<Utc>>,
    totals: OverallCounters,
}

/// Collects filtered candidates for one run.
pub struct BatchCollector {
    keywords: Vec<String>,
    max_items: usize,
    batch: Vec<ContentRecord>,
}

impl BatchCollector {
    pub fn new(keywords: Vec<String>, max_items: usize) -> Self {
        Self {
            keywords,
            max_items,
            batch: Vec::new(),
        }
    }

    /// Keep a candidate when it has both a title and a URL and its text
    /// matches at least one configured keyword. Returns whether the item
    /// was kept.
    pub fn add_item(&mut self, mut record: ContentRecord) -> bool {
        if self.is_full() {
            return false;
        }
        if record.title.trim().is_empty() || record.url.trim().is_empty() {
            return false;
        }
        let corpus = record.filter_corpus();
        let hits: Vec<String> = self
            .keywords
            .iter()
            .filter(|keyword| corpus.contains(keyword.as_str()))
            .cloned()
            .collect();
        if hits.is_empty() {
            return false;
        }
        record.keyword_hits = hits;
        self.batch.push(record);
        true
    }

    pub fn is_full(&self) -> bool {
        self.batch.len() >= self.max_items
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn into_batch(self) -> Vec<ContentRecord> {
        self.batch
    }
}

/// The orchestrator. One per process.
pub struct Scraper {
    settings: Arc<Settings>,
    db: DbContext,
    limiter: Arc<RateLimiter>,
    gate: ConcurrencyGate,
    robots: Arc<RobotsCache>,
    client: HttpClient,
    file_logs: Arc<FileLogs>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    state: Mutex<OrchestratorState>,
    cancel: Mutex<CancellationToken>,
}

impl Scraper {
    pub fn new(settings: Arc<Settings>, db: DbContext, file_logs: Arc<FileLogs>) -> Self {
        Self::with_adapters(settings, db, file_logs, adapters::registry())
    }

    /// Build with a custom adapter set; the seam the end-to-end tests use.
    pub fn with_adapters(
        settings: Arc<Settings>,
        db: DbContext,
        file_logs: Arc<FileLogs>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::with_delays(
            settings.scrape_delay_min,
            settings.scrape_delay_max,
        ));
        let gate = ConcurrencyGate::new(settings.max_concurrent_requests);
        let robots = Arc::new(RobotsCache::new());
        let client = HttpClient::new(&settings, robots.clone(), limiter.clone(), gate.clone());

        let entries = adapters
            .iter()
            .map(|a| (a.name().to_string(), AdapterEntry::idle()))
            .collect();

        Self {
            settings,
            db,
            limiter,
            gate,
            robots,
            client,
            file_logs,
            adapters,
            state: Mutex::new(OrchestratorState {
                is_running: false,
                adapters: entries,
                last_run: None,
                totals: OverallCounters::default(),
            }),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().is_running
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn robots(&self) -> &Arc<RobotsCache> {
        &self.robots
    }

    /// Start every adapter in parallel. Returns the supervisor handle;
    /// the work itself is asynchronous.
    pub fn start_all(
        self: Arc<Self>,
        trigger: Trigger,
        caller: Option<String>,
    ) -> Result<JoinHandle<()>, ScrapeError> {
        let names = self.adapter_names();
        self.begin(&names)?;
        Ok(tokio::spawn(async move {
            self.run_adapters(names, trigger, caller, true).await;
        }))
    }

    /// Start one adapter. Rejected while any run is active.
    pub fn start_one(
        self: Arc<Self>,
        name: &str,
        trigger: Trigger,
        caller: Option<String>,
    ) -> Result<JoinHandle<()>, ScrapeError> {
        if !self.adapters.iter().any(|a| a.name() == name) {
            return Err(ScrapeError::UnknownAdapter(name.to_string()));
        }
        let names = vec![name.to_string()];
        self.begin(&names)?;
        Ok(tokio::spawn(async move {
            self.run_adapters(names, trigger, caller, false).await;
        }))
    }

    /// Cooperative stop: flip the flag, mark running adapters cancelled,
    /// and fire the cancellation token. In-flight tasks unwind at their
    /// next suspension point.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.is_running = false;
            for entry in state.adapters.values_mut() {
                if entry.status == AdapterState::Running {
                    entry.status = AdapterState::Cancelled;
                    entry.end_time = Some(Utc::now());
                }
            }
        }
        self.cancel.lock().unwrap().cancel();
        info!("stop requested; cancelling in-flight work");
    }

    /// Live status snapshot.
    pub async fn status(&self) -> ScraperStatus {
        let (is_running, last_run, adapters, totals) = {
            let state = self.state.lock().unwrap();
            (
                state.is_running,
                state.last_run,
                state.adapters.clone(),
                state.totals,
            )
        };
        ScraperStatus {
            is_running,
            last_run,
            adapters,
            totals,
            rate_limiter: self.limiter.stats().await,
            gate: self.gate.stats(),
        }
    }

    fn begin(&self, names: &[String]) -> Result<(), ScrapeError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.is_running {
                return Err(ScrapeError::AlreadyRunning);
            }
            state.is_running = true;
            state.totals = OverallCounters::default();
            let now = Utc::now();
            for name in names {
                state.adapters.insert(
                    name.clone(),
                    AdapterEntry {
                        status: AdapterState::Running,
                        start_time: Some(now),
                        end_time: None,
                        error: None,
                    },
                );
            }
        }
        self.limiter.reset_stats();
        self.gate.reset_stats();
        *self.cancel.lock().unwrap() = CancellationToken::new();
        Ok(())
    }

    async fn run_adapters(
        self: Arc<Self>,
        names: Vec<String>,
        trigger: Trigger,
        caller: Option<String>,
        run_cleanup: bool,
    ) {
        let cancel = self.cancel.lock().unwrap().clone();

        let mut handles = Vec::with_capacity(names.len());
        for name in &names {
            let adapter = self
                .adapters
                .iter()
                .find(|a| a.name() == *name)
                .cloned()
                .expect("adapter registered");
            let this = self.clone();
            let cancel = cancel.clone();
            let caller = caller.clone();
            handles.push((
                name.clone(),
                tokio::spawn(async move { this.run_adapter(adapter, trigger, caller, cancel).await }),
            ));
        }

        for (name, handle) in handles {
            match handle.await {
                Ok(run) => self.finish_adapter(&run),
                Err(join_error) => {
                    // An adapter task died; the others keep going.
                    self.file_logs.log(
                        Channel::Rejections,
                        "error",
                        "adapter task panicked",
                        json!({ "adapter": name, "error": join_error.to_string() }),
                    );
                    let mut state = self.state.lock().unwrap();
                    if let Some(entry) = state.adapters.get_mut(&name) {
                        entry.status = AdapterState::Failed;
                        entry.end_time = Some(Utc::now());
                        entry.error = Some(truncate(&join_error.to_string(), MAX_STATUS_ERROR_LEN));
                    }
                    state.totals.total_errors += 1;
                    state.is_running = state
                        .adapters
                        .values()
                        .any(|e| e.status == AdapterState::Running);
                }
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            state.last_run = Some(Utc::now());
            state.is_running = false;
        }

        if run_cleanup {
            let content = self.db.content();
            match content.cleanup(self.settings.content_max_age_days) {
                Ok(removed) if removed > 0 => info!("cleanup removed {} aged records", removed),
                Ok(_) => {}
                Err(e) => warn!("cleanup failed: {}", e),
            }
            if let Err(e) = content.expire_due() {
                warn!("ttl expiry failed: {}", e);
            }
            if let Err(e) = self.db.run_logs().cleanup_expired() {
                warn!("run log cleanup failed: {}", e);
            }
        }
    }

    fn finish_adapter(&self, run: &RunLog) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.adapters.get_mut(&run.adapter) {
            entry.status = match run.status {
                RunStatus::Completed | RunStatus::Partial => AdapterState::Completed,
                RunStatus::Failed => AdapterState::Failed,
                RunStatus::Cancelled => AdapterState::Cancelled,
                RunStatus::Pending | RunStatus::Running => AdapterState::Failed,
            };
            entry.end_time = run.ended_at;
            entry.error = run
                .errors
                .first()
                .filter(|_| run.status == RunStatus::Failed)
                .map(|e| truncate(&e.message, MAX_STATUS_ERROR_LEN));
        }
        state.totals.total_scraped += run.results.found;
        state.totals.total_inserted += run.results.inserted;
        state.totals.total_errors += run.errors.len() as u64;
        state.is_running = state
            .adapters
            .values()
            .any(|e| e.status == AdapterState::Running);
    }

    /// One adapter run: fetch each endpoint, parse, filter, upsert, and
    /// close the run log.
    async fn run_adapter(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        trigger: Trigger,
        caller: Option<String>,
        cancel: CancellationToken,
    ) -> RunLog {
        let endpoints = adapter.endpoints();
        let origin = endpoints.first().map(|e| e.url.clone()).unwrap_or_default();
        let source = endpoints
            .first()
            .map(|e| e.source_name.clone())
            .unwrap_or_else(|| adapter.name().to_string());

        let mut run = RunLog::new(
            adapter.name(),
            &source,
            &origin,
            trigger,
            self.config_snapshot(),
        );
        run.caller = caller;
        run.start_session();
        if let Err(e) = self.db.run_logs().save(&run) {
            warn!("could not persist run log {}: {}", run.session_id, e);
        }
        self.file_logs.log(
            Channel::Scraping,
            "info",
            "run started",
            json!({ "adapter": adapter.name(), "sessionId": run.session_id }),
        );

        let telemetry = RunTelemetry::new();
        let mut collector = BatchCollector::new(
            self.settings.search_keywords.clone(),
            self.settings.max_items_per_category,
        );
        let started = Instant::now();
        let mut cancelled = false;

        #[cfg(feature = "browser")]
        let mut browser_fetcher = if self.settings.use_browser {
            Some(BrowserFetcher::new(self.settings.request_timeout))
        } else {
            None
        };

        'endpoints: for endpoint in &endpoints {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            #[cfg(feature = "browser")]
            let fetched = match browser_fetcher.as_mut() {
                Some(browser) => {
                    self.fetch_rendered(browser, &endpoint.url, &telemetry, &cancel)
                        .await
                }
                None => self
                    .client
                    .fetch(&endpoint.url, &FetchOptions::default(), &telemetry, &cancel)
                    .await
                    .map(|r| r.body),
            };
            #[cfg(not(feature = "browser"))]
            let fetched = self
                .client
                .fetch(&endpoint.url, &FetchOptions::default(), &telemetry, &cancel)
                .await
                .map(|r| r.body);

            let body = match fetched {
                Ok(body) => {
                    telemetry.urls_processed.fetch_add(1, Ordering::Relaxed);
                    body
                }
                Err(ScrapeError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                // Warning already recorded by the fetcher; the run goes on.
                Err(ScrapeError::RobotsDisallowed(_)) => {
                    telemetry.urls_failed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                // Per-attempt errors already recorded.
                Err(ScrapeError::FetchFailed { .. }) => {
                    telemetry.urls_failed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                Err(e) => {
                    telemetry.urls_failed.fetch_add(1, Ordering::Relaxed);
                    telemetry.record_error(e.kind(), &e.to_string(), Some(&endpoint.url), 0);
                    continue;
                }
            };

            let items = match feed::parse(body.as_bytes()) {
                Ok(items) => items,
                Err(e) => {
                    telemetry.record_warning(&format!("{e}"), Some(&endpoint.url));
                    continue;
                }
            };

            for item in &items {
                if let Some(record) = adapters::normalize_item(
                    adapter.as_ref(),
                    endpoint,
                    item,
                    self.settings.content_max_age_days,
                ) {
                    collector.add_item(record);
                }
                if collector.is_full() {
                    break 'endpoints;
                }
            }
        }

        #[cfg(feature = "browser")]
        if let Some(browser) = browser_fetcher.as_mut() {
            browser.shutdown().await;
        }

        let batch = collector.into_batch();
        let found = batch.len() as u64;
        let mut results = RunResults {
            found,
            urls_processed: telemetry.urls_processed.load(Ordering::Relaxed),
            urls_failed: telemetry.urls_failed.load(Ordering::Relaxed),
            ..Default::default()
        };

        let mut store_failure = None;
        if !batch.is_empty() {
            match self.db.content().bulk_upsert(&batch) {
                Ok(stats) => {
                    results.inserted = stats.inserted;
                    results.updated = stats.modified;
                    results.duplicates = stats.duplicates;
                }
                Err(e) => store_failure = Some(e),
            }
        }

        for error in telemetry.drain_errors() {
            run.add_error(error);
        }
        for warning in telemetry.drain_warnings() {
            run.add_warning(warning);
        }
        run.performance = telemetry.performance(found, started.elapsed().as_millis() as u64);
        run.rate_limit = telemetry.rate_limit_summary();
        run.robots = telemetry.robots_summary();
        self.file_logs.log(
            Channel::Http,
            "info",
            "fetch summary",
            json!({
                "adapter": adapter.name(),
                "totalRequests": run.performance.total_requests,
                "failedRequests": run.performance.failed_requests,
                "avgResponseTimeMs": run.performance.avg_response_time_ms,
                "dataTransferred": run.performance.data_transferred,
            }),
        );

        if let Some(store_error) = store_failure {
            results.failed = found;
            run.update_results(&results);
            self.file_logs.log(
                Channel::Error,
                "error",
                "bulk upsert failed",
                json!({ "adapter": adapter.name(), "error": store_error.to_string() }),
            );
            run.fail(RunErrorEntry {
                timestamp: Utc::now(),
                kind: "store".to_string(),
                message: store_error.to_string(),
                url: None,
                stack: None,
                retry_count: 0,
            });
        } else if cancelled {
            run.update_results(&results);
            run.cancel();
        } else {
            run.complete(results);
        }

        if let Err(e) = self.db.run_logs().save(&run) {
            warn!("could not persist run log {}: {}", run.session_id, e);
        }
        self.file_logs.log(
            Channel::Scraping,
            "info",
            "run finished",
            json!({
                "adapter": adapter.name(),
                "sessionId": run.session_id,
                "status": run.status.as_str(),
                "found": run.results.found,
                "inserted": run.results.inserted,
                "urlsFailed": run.results.urls_failed,
            }),
        );
        run
    }

    /// Browser-path fetch with the same robots, gate, rate-limit, and
    /// retry envelope as the plain HTTP path.
    #[cfg(feature = "browser")]
    async fn fetch_rendered(
        &self,
        browser: &mut BrowserFetcher,
        url: &str,
        telemetry: &RunTelemetry,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        telemetry.robots_checked.fetch_add(1, Ordering::Relaxed);
        let allowed = self
            .robots
            .is_allowed(url, &self.settings.robots_user_agent, cancel)
            .await?;
        if !allowed {
            telemetry.robots_blocked.fetch_add(1, Ordering::Relaxed);
            telemetry.record_warning("robots.txt disallows this URL", Some(url));
            return Err(ScrapeError::RobotsDisallowed(url.to_string()));
        }

        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            let _permit = self.gate.acquire(cancel).await?;
            let acquire = self.limiter.acquire(url, cancel).await?;
            if acquire.throttled {
                telemetry.throttle_count.fetch_add(1, Ordering::Relaxed);
            }
            telemetry
                .total_delay_ms
                .fetch_add(acquire.waited.as_millis() as u64, Ordering::Relaxed);

            telemetry.total_requests.fetch_add(1, Ordering::Relaxed);
            match browser.fetch_rendered(url, cancel).await {
                Ok(dom) => {
                    telemetry
                        .data_transferred
                        .fetch_add(dom.len() as u64, Ordering::Relaxed);
                    return Ok(dom);
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => {
                    telemetry.failed_requests.fetch_add(1, Ordering::Relaxed);
                    attempt += 1;
                    telemetry.record_error(e.kind(), &e.to_string(), Some(url), attempt);
                    if attempt >= self.settings.max_retries {
                        return Err(ScrapeError::FetchFailed {
                            url: url.to_string(),
                            attempts: attempt,
                            last: FetchFailure::Network(e.to_string()),
                        });
                    }
                    let backoff = http_client::backoff_delay(attempt);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    fn config_snapshot(&self) -> RunConfigSnapshot {
        RunConfigSnapshot {
            max_items: self.settings.max_items_per_category,
            delay_min_ms: self.settings.scrape_delay_min.as_millis() as u64,
            delay_max_ms: self.settings.scrape_delay_max.as_millis() as u64,
            timeout_ms: self.settings.request_timeout.as_millis() as u64,
            max_retries: self.settings.max_retries,
            user_agent: self.settings.robots_user_agent.clone(),
            keywords: self.settings.search_keywords.clone(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentCategory;

    fn collector() -> BatchCollector {
        BatchCollector::new(vec!["webmethods".to_string()], 100)
    }

    fn candidate(title: &str, url: &str) -> ContentRecord {
        let mut rec = ContentRecord::new(ContentCategory::News, title, url, "news");
        rec.source_host = "example.com".to_string();
        rec.source_name = "Example".to_string();
        rec
    }

    #[test]
    fn test_collector_keeps_keyword_match() {
        let mut collector = collector();
        assert!(collector.add_item(candidate(
            "webMethods 11 released",
            "https://example.com/a"
        )));
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_collector_drops_irrelevant() {
        let mut collector = collector();
        assert!(!collector.add_item(candidate("Unrelated story", "https://example.com/b")));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_collector_records_keyword_hits() {
        let mut collector = BatchCollector::new(
            vec!["webmethods".to_string(), "integration".to_string()],
            100,
        );
        let mut rec = candidate("webMethods Integration News", "https://example.com/c");
        rec.set_description("integration platform changes");
        collector.add_item(rec);
        let batch = collector.into_batch();
        assert_eq!(batch[0].keyword_hits.len(), 2);
    }

    #[test]
    fn test_collector_requires_title_and_url() {
        let mut collector = collector();
        let mut no_title = candidate("webmethods", "https://example.com/d");
        no_title.title = String::new();
        assert!(!collector.add_item(no_title));
    }

    #[test]
    fn test_collector_caps_batch() {
        let mut collector = BatchCollector::new(vec!["webmethods".to_string()], 2);
        for i in 0..5 {
            collector.add_item(candidate(
                "webmethods item",
                &format!("https://example.com/{i}"),
            ));
        }
        assert_eq!(collector.len(), 2);
        assert!(collector.is_full());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd…");
    }

    mod orchestrator {
        use super::*;
        use crate::logging::FileLogs;
        use crate::repository::DbContext;
        use crate::scrapers::adapters::{FeedEndpoint, SourceAdapter};

        struct EmptyAdapter(&'static str);

        impl SourceAdapter for EmptyAdapter {
            fn name(&self) -> &'static str {
                self.0
            }
            fn category(&self) -> ContentCategory {
                ContentCategory::Other
            }
            fn endpoints(&self) -> Vec<FeedEndpoint> {
                Vec::new()
            }
        }

        fn test_scraper() -> (Arc<Scraper>, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let mut settings = Settings::default();
            settings.database_path = dir.path().join("test.db");
            settings.log_dir = dir.path().join("logs");
            settings.scrape_delay_min = std::time::Duration::ZERO;
            settings.scrape_delay_max = std::time::Duration::ZERO;
            let settings = Arc::new(settings);
            let db = DbContext::new(&settings.database_path).unwrap();
            let file_logs = Arc::new(FileLogs::new(&settings.log_dir));
            let scraper = Arc::new(Scraper::with_adapters(
                settings,
                db.clone(),
                file_logs,
                vec![Arc::new(EmptyAdapter("alpha")), Arc::new(EmptyAdapter("beta"))],
            ));
            (scraper, dir)
        }

        #[tokio::test]
        async fn test_unknown_adapter_rejected() {
            let (scraper, _dir) = test_scraper();
            let result = scraper.clone().start_one("nope", Trigger::Api, None);
            assert!(matches!(result, Err(ScrapeError::UnknownAdapter(_))));
        }

        #[tokio::test]
        async fn test_run_with_no_endpoints_completes_clean() {
            let (scraper, _dir) = test_scraper();
            let handle = scraper.clone().start_all(Trigger::Manual, None).unwrap();
            handle.await.unwrap();

            let status = scraper.status().await;
            assert!(!status.is_running);
            assert!(status.last_run.is_some());
            assert_eq!(status.totals.total_scraped, 0);
            assert_eq!(status.adapters["alpha"].status, AdapterState::Completed);
            assert_eq!(status.adapters["beta"].status, AdapterState::Completed);

            // Both runs persisted as completed with zeroed counters.
            let (runs, total) = scraper
                .db
                .run_logs()
                .list(&crate::repository::RunLogFilter {
                    limit: 10,
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(total, 2);
            assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
            assert!(runs.iter().all(|r| r.results.found == 0));
        }

        #[tokio::test]
        async fn test_single_adapter_run_skips_others() {
            let (scraper, _dir) = test_scraper();
            let handle = scraper.clone().start_one("alpha", Trigger::Api, None).unwrap();
            handle.await.unwrap();

            let status = scraper.status().await;
            assert_eq!(status.adapters["alpha"].status, AdapterState::Completed);
            assert_eq!(status.adapters["beta"].status, AdapterState::Idle);
        }
    }
}
