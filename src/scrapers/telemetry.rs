//! Shared per-run telemetry sink.
//!
//! One `RunTelemetry` is shared between the adapter runner and the
//! fetcher for the duration of a run; at the end it is drained into the
//! run log. All counters are atomics so concurrent fetch tasks can report
//! without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::models::{
    RateLimitSummary, RobotsSummary, RunErrorEntry, RunPerformance, RunWarning,
};

#[derive(Debug, Default)]
pub struct RunTelemetry {
    errors: Mutex<Vec<RunErrorEntry>>,
    warnings: Mutex<Vec<RunWarning>>,
    pub total_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub response_time_ms: AtomicU64,
    pub data_transferred: AtomicU64,
    pub throttle_count: AtomicU64,
    pub total_delay_ms: AtomicU64,
    pub robots_checked: AtomicU64,
    pub robots_blocked: AtomicU64,
    pub crawl_delay_applied: AtomicU64,
    pub urls_processed: AtomicU64,
    pub urls_failed: AtomicU64,
}

impl RunTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, kind: &str, message: &str, url: Option<&str>, retry_count: u32) {
        self.errors.lock().unwrap().push(RunErrorEntry {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            message: message.to_string(),
            url: url.map(|u| u.to_string()),
            stack: None,
            retry_count,
        });
    }

    pub fn record_warning(&self, message: &str, url: Option<&str>) {
        self.warnings.lock().unwrap().push(RunWarning {
            timestamp: Utc::now(),
            message: message.to_string(),
            url: url.map(|u| u.to_string()),
        });
    }

    pub fn drain_errors(&self) -> Vec<RunErrorEntry> {
        std::mem::take(&mut self.errors.lock().unwrap())
    }

    pub fn drain_warnings(&self) -> Vec<RunWarning> {
        std::mem::take(&mut self.warnings.lock().unwrap())
    }

    /// Performance counters derived from what was observed so far.
    pub fn performance(&self, items: u64, duration_ms: u64) -> RunPerformance {
        let total = self.total_requests.load(Ordering::Relaxed);
        RunPerformance {
            avg_time_per_item_ms: if items > 0 {
                duration_ms as f64 / items as f64
            } else {
                0.0
            },
            total_requests: total,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_response_time_ms: if total > 0 {
                self.response_time_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
            data_transferred: self.data_transferred.load(Ordering::Relaxed),
            memory_usage: resident_memory_bytes(),
        }
    }

    pub fn rate_limit_summary(&self) -> RateLimitSummary {
        let throttle_count = self.throttle_count.load(Ordering::Relaxed);
        RateLimitSummary {
            was_throttled: throttle_count > 0,
            throttle_count,
            total_delay_ms: self.total_delay_ms.load(Ordering::Relaxed),
        }
    }

    pub fn robots_summary(&self) -> RobotsSummary {
        RobotsSummary {
            checked: self.robots_checked.load(Ordering::Relaxed),
            urls_blocked: self.robots_blocked.load(Ordering::Relaxed),
            crawl_delay_applied: self.crawl_delay_applied.load(Ordering::Relaxed),
        }
    }
}

/// Resident set size of this process, in bytes. Best effort; zero when
/// the platform offers no cheap probe.
fn resident_memory_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(pages) = statm.split_whitespace().nth(1) {
                if let Ok(pages) = pages.parse::<u64>() {
                    return pages * 4096;
                }
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_and_warning_accumulation() {
        let telemetry = RunTelemetry::new();
        telemetry.record_error("fetch_status", "503", Some("https://example.com"), 1);
        telemetry.record_warning("robots disallows", Some("https://example.com/x"));

        let errors = telemetry.drain_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].retry_count, 1);
        assert_eq!(telemetry.drain_errors().len(), 0);
        assert_eq!(telemetry.drain_warnings().len(), 1);
    }

    #[test]
    fn test_performance_averages() {
        let telemetry = RunTelemetry::new();
        telemetry.total_requests.store(4, Ordering::Relaxed);
        telemetry.response_time_ms.store(200, Ordering::Relaxed);
        let perf = telemetry.performance(2, 1000);
        assert_eq!(perf.avg_time_per_item_ms, 500.0);
        assert_eq!(perf.avg_response_time_ms, 50.0);
    }

    #[test]
    fn test_rate_limit_summary() {
        let telemetry = RunTelemetry::new();
        assert!(!telemetry.rate_limit_summary().was_throttled);
        telemetry.throttle_count.store(2, Ordering::Relaxed);
        telemetry.total_delay_ms.store(340, Ordering::Relaxed);
        let summary = telemetry.rate_limit_summary();
        assert!(summary.was_throttled);
        assert_eq!(summary.total_delay_ms, 340);
    }
}
