//! Per-domain token bucket state.

use std::time::{Duration, Instant};

/// Static rate profile for a base domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainProfile {
    /// Bucket capacity.
    pub max_tokens: f64,
    /// Tokens added per second.
    pub refill_rate: f64,
    /// Jitter bounds applied after a token is consumed.
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl DomainProfile {
    pub const fn new(max_tokens: f64, refill_rate: f64, min_ms: u64, max_ms: u64) -> Self {
        Self {
            max_tokens,
            refill_rate,
            min_delay: Duration::from_millis(min_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }
}

/// Live bucket for one base domain. Created lazily on first acquire and
/// kept for the process lifetime unless reconfigured.
#[derive(Debug, Clone)]
pub struct DomainBucket {
    pub tokens: f64,
    pub last_refill: Instant,
    pub profile: DomainProfile,
    pub total_requests: u64,
    pub throttled_requests: u64,
}

impl DomainBucket {
    pub fn new(profile: DomainProfile) -> Self {
        Self {
            tokens: profile.max_tokens,
            last_refill: Instant::now(),
            profile,
            total_requests: 0,
            throttled_requests: 0,
        }
    }

    /// Continuous refill: `tokens += Δt × refill_rate`, capped at capacity.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.profile.refill_rate)
            .min(self.profile.max_tokens);
        self.last_refill = now;
    }

    /// Consume one token if available, otherwise report how long to wait
    /// for the bucket to reach one token.
    pub fn try_acquire(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(missing / self.profile.refill_rate))
        }
    }
}
