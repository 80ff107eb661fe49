//! Per-domain politeness limiter.
//!
//! Two coupled mechanisms: a token bucket per base domain (continuous
//! refill, sleep-until-one-token) and a uniformly random inter-request
//! delay that smears request timing. The global concurrency gate lives
//! separately in `gate.rs`.

mod domain_bucket;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

pub use domain_bucket::{DomainBucket, DomainProfile};

use super::error::ScrapeError;

/// Profile applied to domains without a dedicated entry.
pub const DEFAULT_PROFILE: DomainProfile = DomainProfile::new(5.0, 0.5, 2_000, 5_000);

/// Static per-domain profiles, keyed by exact base domain.
const DOMAIN_PROFILES: &[(&str, DomainProfile)] = &[
    ("google.com", DomainProfile::new(3.0, 0.3, 3_000, 8_000)),
    ("linkedin.com", DomainProfile::new(2.0, 0.2, 5_000, 10_000)),
    ("indeed.com", DomainProfile::new(3.0, 0.3, 3_000, 7_000)),
    ("twitter.com", DomainProfile::new(2.0, 0.2, 4_000, 8_000)),
    ("github.com", DomainProfile::new(5.0, 0.5, 2_000, 4_000)),
];

/// Key used when a URL yields no usable host.
const UNKNOWN_DOMAIN: &str = "unknown";

/// What one acquire cost the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireOutcome {
    /// True when the caller had to wait for tokens.
    pub throttled: bool,
    /// Token wait plus jitter.
    pub waited: Duration,
}

/// Per-domain counters for the status view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DomainStats {
    pub tokens: f64,
    pub total_requests: u64,
    pub throttled_requests: u64,
}

/// Limiter-wide counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub throttled_requests: u64,
    pub avg_wait_ms: f64,
    pub domains: HashMap<String, DomainStats>,
}

/// Token-bucket rate limiter over base domains.
pub struct RateLimiter {
    default_profile: DomainProfile,
    profiles: RwLock<HashMap<String, DomainProfile>>,
    buckets: Arc<RwLock<HashMap<String, DomainBucket>>>,
    total_requests: AtomicU64,
    throttled_requests: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_default_profile(DEFAULT_PROFILE)
    }

    /// Build a limiter whose default profile uses the given jitter bounds.
    pub fn with_delays(min_delay: Duration, max_delay: Duration) -> Self {
        Self::with_default_profile(DomainProfile {
            min_delay,
            max_delay,
            ..DEFAULT_PROFILE
        })
    }

    pub fn with_default_profile(default_profile: DomainProfile) -> Self {
        let profiles = DOMAIN_PROFILES
            .iter()
            .map(|(domain, profile)| (domain.to_string(), *profile))
            .collect();
        Self {
            default_profile,
            profiles: RwLock::new(profiles),
            buckets: Arc::new(RwLock::new(HashMap::new())),
            total_requests: AtomicU64::new(0),
            throttled_requests: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Base domain of a URL: the last two host labels. IP hosts are used
    /// whole; unusable URLs collapse onto a synthetic key.
    pub fn base_domain(url: &str) -> String {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        else {
            return UNKNOWN_DOMAIN.to_string();
        };
        if host.parse::<std::net::IpAddr>().is_ok() {
            return host;
        }
        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        match labels.len() {
            0 => UNKNOWN_DOMAIN.to_string(),
            1 => host,
            n => labels[n - 2..].join("."),
        }
    }

    /// Wait for a token for the URL's base domain, then apply the jittered
    /// inter-request delay. Cancellation pre-empts both sleeps.
    pub async fn acquire(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<AcquireOutcome, ScrapeError> {
        let domain = Self::base_domain(url);
        let mut outcome = AcquireOutcome::default();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        loop {
            let wait = {
                let mut buckets = self.buckets.write().await;
                let bucket = match buckets.get_mut(&domain) {
                    Some(b) => b,
                    None => {
                        let profile = self.profile_for(&domain).await;
                        buckets
                            .entry(domain.clone())
                            .or_insert_with(|| DomainBucket::new(profile))
                    }
                };
                bucket.total_requests += 1;
                let wait = bucket.try_acquire(Instant::now());
                if wait.is_some() {
                    bucket.throttled_requests += 1;
                    // try_acquire bumped the counter; undo the double count
                    // from looping back after the sleep.
                    bucket.total_requests -= 1;
                }
                wait
            };

            match wait {
                None => break,
                Some(delay) => {
                    if !outcome.throttled {
                        outcome.throttled = true;
                        self.throttled_requests.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!("rate limiting {}: waiting {:?} for tokens", domain, delay);
                    outcome.waited += delay;
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        let profile = self.profile_for(&domain).await;
        let jitter = jitter_delay(profile.min_delay, profile.max_delay);
        if jitter > Duration::ZERO {
            outcome.waited += jitter;
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(jitter) => {}
            }
        }

        self.total_wait_ms
            .fetch_add(outcome.waited.as_millis() as u64, Ordering::Relaxed);
        Ok(outcome)
    }

    /// Install or replace a domain profile. The live bucket is dropped so
    /// the next acquire starts from the configured capacity.
    pub async fn configure_domain(&self, domain: &str, profile: DomainProfile) {
        let domain = domain.to_lowercase();
        self.profiles.write().await.insert(domain.clone(), profile);
        self.buckets.write().await.remove(&domain);
    }

    /// Reset limiter-wide counters; per-bucket token state is preserved.
    pub fn reset_stats(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.throttled_requests.store(0, Ordering::Relaxed);
        self.total_wait_ms.store(0, Ordering::Relaxed);
    }

    /// Snapshot of limiter counters and per-domain buckets.
    pub async fn stats(&self) -> RateLimiterStats {
        let total = self.total_requests.load(Ordering::Relaxed);
        let waited = self.total_wait_ms.load(Ordering::Relaxed);
        let buckets = self.buckets.read().await;
        RateLimiterStats {
            total_requests: total,
            throttled_requests: self.throttled_requests.load(Ordering::Relaxed),
            avg_wait_ms: if total > 0 {
                waited as f64 / total as f64
            } else {
                0.0
            },
            domains: buckets
                .iter()
                .map(|(domain, bucket)| {
                    (
                        domain.clone(),
                        DomainStats {
                            tokens: bucket.tokens,
                            total_requests: bucket.total_requests,
                            throttled_requests: bucket.throttled_requests,
                        },
                    )
                })
                .collect(),
        }
    }

    async fn profile_for(&self, domain: &str) -> DomainProfile {
        self.profiles
            .read()
            .await
            .get(domain)
            .copied()
            .unwrap_or(self.default_profile)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform random delay in `[min, max]`. Equal bounds yield exactly that
/// value.
fn jitter_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let ms = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_domain() {
        assert_eq!(
            RateLimiter::base_domain("https://news.example.com/feed"),
            "example.com"
        );
        assert_eq!(
            RateLimiter::base_domain("https://a.b.c.example.co/x"),
            "example.co"
        );
        assert_eq!(RateLimiter::base_domain("http://localhost:9000/x"), "localhost");
        assert_eq!(RateLimiter::base_domain("http://127.0.0.1:9000/x"), "127.0.0.1");
        assert_eq!(RateLimiter::base_domain("garbage"), "unknown");
    }

    #[test]
    fn test_jitter_equal_bounds_is_exact() {
        let d = Duration::from_millis(120);
        assert_eq!(jitter_delay(d, d), d);
    }

    #[test]
    fn test_jitter_within_bounds() {
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(30);
        for _ in 0..50 {
            let j = jitter_delay(min, max);
            assert!(j >= min && j <= max);
        }
    }

    #[tokio::test]
    async fn test_acquire_counts_requests() {
        let limiter = RateLimiter::with_default_profile(DomainProfile::new(10.0, 10.0, 0, 0));
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            limiter
                .acquire("https://example.com/a", &cancel)
                .await
                .unwrap();
        }
        let stats = limiter.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.throttled_requests, 0);
        assert_eq!(stats.domains["example.com"].total_requests, 3);
    }

    #[tokio::test]
    async fn test_acquire_throttles_when_drained() {
        let limiter = RateLimiter::with_default_profile(DomainProfile::new(1.0, 50.0, 0, 0));
        let cancel = CancellationToken::new();
        limiter
            .acquire("https://example.com/1", &cancel)
            .await
            .unwrap();
        let outcome = limiter
            .acquire("https://example.com/2", &cancel)
            .await
            .unwrap();
        assert!(outcome.throttled);
        assert_eq!(limiter.stats().await.throttled_requests, 1);
    }

    #[tokio::test]
    async fn test_cancellation_preempts_token_wait() {
        // Refill so slow the wait would take minutes.
        let limiter = RateLimiter::with_default_profile(DomainProfile::new(1.0, 0.001, 0, 0));
        let cancel = CancellationToken::new();
        limiter
            .acquire("https://example.com/1", &cancel)
            .await
            .unwrap();

        cancel.cancel();
        let result = limiter.acquire("https://example.com/2", &cancel).await;
        assert!(matches!(result, Err(ScrapeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_configure_domain_resets_bucket() {
        let limiter = RateLimiter::with_default_profile(DomainProfile::new(1.0, 0.001, 0, 0));
        let cancel = CancellationToken::new();
        limiter
            .acquire("https://example.com/1", &cancel)
            .await
            .unwrap();

        // Reconfigured bucket starts at full capacity again.
        limiter
            .configure_domain("example.com", DomainProfile::new(5.0, 5.0, 0, 0))
            .await;
        let outcome = limiter
            .acquire("https://example.com/2", &cancel)
            .await
            .unwrap();
        assert!(!outcome.throttled);
    }
}
