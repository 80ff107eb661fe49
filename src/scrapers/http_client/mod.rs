//! HTTP fetcher with politeness and retry envelope.
//!
//! Every logical fetch runs the same gauntlet: robots check, concurrency
//! gate, rate-limit token, jittered delay, then the request itself, with
//! exponential backoff across attempts. Cancellation is honored at each
//! of those suspension points.

mod response;
mod user_agent;

pub use response::FetchResponse;
pub use user_agent::{
    browser_headers, random_user_agent, UserAgentClass, DESKTOP_USER_AGENTS, MOBILE_USER_AGENTS,
};

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{FetchFailure, ScrapeError};
use super::gate::ConcurrencyGate;
use super::rate_limiter::RateLimiter;
use super::robots::RobotsCache;
use super::telemetry::RunTelemetry;
use crate::config::Settings;

/// Ceiling for one backoff sleep.
const BACKOFF_CAP: Duration = Duration::from_millis(30_000);

/// Random extra added to each backoff sleep.
const BACKOFF_JITTER_MS: u64 = 500;

/// Per-call overrides for one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub max_retries: Option<u32>,
    pub ua_class: Option<UserAgentClass>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            max_retries: None,
            ua_class: None,
        }
    }
}

/// Shared fetcher handle. Cloning shares the underlying connection pool
/// and politeness state.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    robots: Arc<RobotsCache>,
    limiter: Arc<RateLimiter>,
    gate: ConcurrencyGate,
    robots_user_agent: String,
    timeout: Duration,
    max_retries: u32,
    ua_class: UserAgentClass,
}

impl HttpClient {
    pub fn new(
        settings: &Settings,
        robots: Arc<RobotsCache>,
        limiter: Arc<RateLimiter>,
        gate: ConcurrencyGate,
    ) -> Self {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true);
        if let Some(proxy) = &settings.proxy {
            if let Ok(mut p) = reqwest::Proxy::all(proxy.url()) {
                if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                    p = p.basic_auth(user, pass);
                }
                builder = builder.proxy(p);
            }
        }
        let client = builder.build().unwrap_or_default();

        Self {
            client,
            robots,
            limiter,
            gate,
            robots_user_agent: settings.robots_user_agent.clone(),
            timeout: settings.request_timeout,
            max_retries: settings.max_retries,
            ua_class: UserAgentClass::Desktop,
        }
    }

    pub fn robots(&self) -> &Arc<RobotsCache> {
        &self.robots
    }

    /// Execute one logical fetch with robots, gate, rate-limit, and retry
    /// handling. Any final status in `[200, 400)` counts as success.
    pub async fn fetch(
        &self,
        url: &str,
        opts: &FetchOptions,
        telemetry: &RunTelemetry,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, ScrapeError> {
        // Robots denial is final: no retry, no backoff.
        telemetry.robots_checked.fetch_add(1, Ordering::Relaxed);
        let allowed = self
            .robots
            .is_allowed(url, &self.robots_user_agent, cancel)
            .await?;
        if !allowed {
            telemetry.robots_blocked.fetch_add(1, Ordering::Relaxed);
            telemetry.record_warning("robots.txt disallows this URL", Some(url));
            return Err(ScrapeError::RobotsDisallowed(url.to_string()));
        }
        let crawl_delay = self
            .robots
            .crawl_delay(url, &self.robots_user_agent, cancel)
            .await?
            .map(Duration::from_secs_f64);

        let max_retries = opts.max_retries.unwrap_or(self.max_retries);
        let ua_class = opts.ua_class.unwrap_or(self.ua_class);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            // Gate, then tokens, then the first network byte. The permit
            // is released when this iteration ends.
            let _permit = self.gate.acquire(cancel).await?;
            let acquire = self.limiter.acquire(url, cancel).await?;
            if acquire.throttled {
                telemetry.throttle_count.fetch_add(1, Ordering::Relaxed);
            }
            telemetry
                .total_delay_ms
                .fetch_add(acquire.waited.as_millis() as u64, Ordering::Relaxed);

            if let Some(delay) = crawl_delay {
                telemetry.crawl_delay_applied.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let user_agent = random_user_agent(ua_class);
            telemetry.total_requests.fetch_add(1, Ordering::Relaxed);
            let started = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                result = self.execute(url, user_agent, opts) => result,
            };
            let elapsed = started.elapsed();
            telemetry
                .response_time_ms
                .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);

            let failure = match result {
                Ok(response) if (200..400).contains(&response.status) => {
                    telemetry
                        .data_transferred
                        .fetch_add(response.bytes_transferred(), Ordering::Relaxed);
                    return Ok(FetchResponse {
                        attempts: attempt + 1,
                        elapsed,
                        ..response
                    });
                }
                Ok(response) => FetchFailure::Status(response.status),
                Err(e) if e.is_timeout() => FetchFailure::Timeout,
                Err(e) => FetchFailure::Network(e.to_string()),
            };

            telemetry.failed_requests.fetch_add(1, Ordering::Relaxed);
            attempt += 1;
            telemetry.record_error(failure.kind(), &failure.to_string(), Some(url), attempt);
            debug!("attempt {} for {} failed: {}", attempt, url, failure);

            if attempt >= max_retries {
                return Err(ScrapeError::FetchFailed {
                    url: url.to_string(),
                    attempts: attempt,
                    last: failure,
                });
            }

            let backoff = backoff_delay(attempt);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn execute(
        &self,
        url: &str,
        user_agent: &str,
        opts: &FetchOptions,
    ) -> Result<FetchResponse, reqwest::Error> {
        let mut request = self
            .client
            .request(opts.method.clone(), url)
            .timeout(self.timeout)
            .header(reqwest::header::USER_AGENT, user_agent);
        for (name, value) in browser_headers(user_agent) {
            request = request.header(name, value);
        }
        // Per-call overrides win over the browser-shaped defaults.
        for (name, value) in &opts.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &opts.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let mut headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        let body = response.text().await?;

        Ok(FetchResponse {
            url: url.to_string(),
            status,
            headers,
            body,
            elapsed: Duration::ZERO,
            attempts: 0,
        })
    }
}

/// `min(cap, 2^attempt × 1s + jitter[0..500ms])`.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let base = Duration::from_millis(1_000u64.saturating_mul(1u64 << attempt.min(16)));
    let jitter = Duration::from_millis(rand::rng().random_range(0..BACKOFF_JITTER_MS));
    (base + jitter).min(BACKOFF_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let first = backoff_delay(1);
        assert!(first >= Duration::from_millis(2_000));
        assert!(first < Duration::from_millis(2_500));

        let second = backoff_delay(2);
        assert!(second >= Duration::from_millis(4_000));

        // Far attempts saturate at the cap.
        assert_eq!(backoff_delay(12), BACKOFF_CAP);
    }

    #[test]
    fn test_default_options() {
        let opts = FetchOptions::default();
        assert_eq!(opts.method, Method::GET);
        assert!(opts.headers.is_empty());
        assert!(opts.max_retries.is_none());
    }
}
