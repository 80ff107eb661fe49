//! Run log models for tracking scrape sessions.
//!
//! Each adapter invocation is bracketed by a single `RunLog` entry that
//! accumulates counters, errors, and warnings while running and becomes
//! immutable once it reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days a run log is retained before the cleanup sweep removes it.
pub const RUN_LOG_TTL_DAYS: i64 = 30;

/// Session state machine:
/// `pending → running → {completed | failed | cancelled | partial}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Partial,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }

    /// Terminal states may never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Partial
        )
    }
}

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Scheduled,
    Api,
    System,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Api => "api",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "scheduled" => Some(Self::Scheduled),
            "api" => Some(Self::Api),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Result counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub found: u64,
    pub inserted: u64,
    pub updated: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub urls_processed: u64,
    pub urls_failed: u64,
}

impl RunResults {
    /// Add another set of counters into this one.
    pub fn merge(&mut self, delta: &RunResults) {
        self.found += delta.found;
        self.inserted += delta.inserted;
        self.updated += delta.updated;
        self.duplicates += delta.duplicates;
        self.failed += delta.failed;
        self.urls_processed += delta.urls_processed;
        self.urls_failed += delta.urls_failed;
    }
}

/// Performance counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPerformance {
    pub avg_time_per_item_ms: f64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub avg_response_time_ms: f64,
    pub data_transferred: u64,
    pub memory_usage: u64,
}

/// One error observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub retry_count: u32,
}

/// One warning observed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWarning {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Snapshot of the scrape configuration a run was started with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfigSnapshot {
    pub max_items: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub user_agent: String,
    pub keywords: Vec<String>,
}

/// Rate-limiting summary for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSummary {
    pub was_throttled: bool,
    pub throttle_count: u64,
    pub total_delay_ms: u64,
}

/// Robots-compliance summary for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsSummary {
    pub checked: u64,
    pub urls_blocked: u64,
    pub crawl_delay_applied: u64,
}

/// One scrape session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    /// Opaque session token: millisecond timestamp plus a random suffix.
    pub session_id: String,
    /// Adapter that owns this run.
    pub adapter: String,
    /// Human-readable source label.
    pub source: String,
    /// Origin URL of the first endpoint.
    pub origin_url: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub results: RunResults,
    pub performance: RunPerformance,
    pub errors: Vec<RunErrorEntry>,
    pub warnings: Vec<RunWarning>,
    pub config: RunConfigSnapshot,
    pub triggered_by: Trigger,
    pub caller: Option<String>,
    pub rate_limit: RateLimitSummary,
    pub robots: RobotsSummary,
}

impl RunLog {
    /// Create a new session in `pending`.
    pub fn new(
        adapter: &str,
        source: &str,
        origin_url: &str,
        triggered_by: Trigger,
        config: RunConfigSnapshot,
    ) -> Self {
        Self {
            session_id: new_session_id(),
            adapter: adapter.to_string(),
            source: source.to_string(),
            origin_url: origin_url.to_string(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            results: RunResults::default(),
            performance: RunPerformance::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            config,
            triggered_by,
            caller: None,
            rate_limit: RateLimitSummary::default(),
            robots: RobotsSummary::default(),
        }
    }

    /// Transition `pending → running` and stamp the start time.
    pub fn start_session(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Utc::now();
        }
    }

    /// Accumulate result counters. Only legal while running.
    pub fn update_results(&mut self, delta: &RunResults) {
        if self.status == RunStatus::Running {
            self.results.merge(delta);
        }
    }

    /// Append an error entry. Only legal while running.
    pub fn add_error(&mut self, entry: RunErrorEntry) {
        if self.status == RunStatus::Running {
            self.errors.push(entry);
        }
    }

    /// Append a warning. Only legal while running.
    pub fn add_warning(&mut self, warning: RunWarning) {
        if self.status == RunStatus::Running {
            self.warnings.push(warning);
        }
    }

    /// Close the session as `completed`, or `partial` when any record
    /// failed to persist.
    pub fn complete(&mut self, results: RunResults) {
        if self.status != RunStatus::Running {
            return;
        }
        self.results.merge(&results);
        let status = if self.results.failed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        };
        self.finish(status);
    }

    /// Close the session as `failed`, recording the error.
    pub fn fail(&mut self, entry: RunErrorEntry) {
        if self.status != RunStatus::Running {
            return;
        }
        self.errors.push(entry);
        self.finish(RunStatus::Failed);
    }

    /// Close the session as `cancelled`. Accumulated results are kept.
    pub fn cancel(&mut self) {
        if self.status != RunStatus::Running {
            return;
        }
        self.finish(RunStatus::Cancelled);
    }

    fn finish(&mut self, status: RunStatus) {
        let ended = Utc::now();
        self.status = status;
        self.ended_at = Some(ended);
        self.duration_ms = Some((ended - self.started_at).num_milliseconds().max(0) as u64);
    }
}

/// Session token: monotonic source (milliseconds) plus a random suffix.
fn new_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_run() -> RunLog {
        RunLog::new(
            "news",
            "Example News",
            "https://example.com/feed.xml",
            Trigger::Manual,
            RunConfigSnapshot::default(),
        )
    }

    #[test]
    fn test_session_id_unique() {
        let a = new_run();
        let b = new_run();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_lifecycle_completed() {
        let mut run = new_run();
        assert_eq!(run.status, RunStatus::Pending);
        run.start_session();
        assert_eq!(run.status, RunStatus::Running);

        run.update_results(&RunResults {
            found: 3,
            inserted: 2,
            ..Default::default()
        });
        run.complete(RunResults {
            updated: 1,
            ..Default::default()
        });

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.results.found, 3);
        assert_eq!(run.results.inserted, 2);
        assert_eq!(run.results.updated, 1);
        assert!(run.ended_at.unwrap() >= run.started_at);
        assert!(run.duration_ms.is_some());
    }

    #[test]
    fn test_complete_with_failures_is_partial() {
        let mut run = new_run();
        run.start_session();
        run.complete(RunResults {
            found: 5,
            failed: 2,
            ..Default::default()
        });
        assert_eq!(run.status, RunStatus::Partial);
    }

    #[test]
    fn test_fail_records_error() {
        let mut run = new_run();
        run.start_session();
        run.fail(RunErrorEntry {
            timestamp: Utc::now(),
            kind: "store".to_string(),
            message: "disk full".to_string(),
            url: None,
            stack: None,
            retry_count: 0,
        });
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.errors.len(), 1);
    }

    #[test]
    fn test_terminal_transition_first_wins() {
        let mut run = new_run();
        run.start_session();
        run.cancel();
        assert_eq!(run.status, RunStatus::Cancelled);

        // A later terminal transition is ignored.
        run.complete(RunResults::default());
        assert_eq!(run.status, RunStatus::Cancelled);
        run.fail(RunErrorEntry {
            timestamp: Utc::now(),
            kind: "late".to_string(),
            message: "ignored".to_string(),
            url: None,
            stack: None,
            retry_count: 0,
        });
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.errors.is_empty());
    }

    #[test]
    fn test_mutation_after_terminal_ignored() {
        let mut run = new_run();
        run.start_session();
        run.complete(RunResults::default());
        run.update_results(&RunResults {
            found: 10,
            ..Default::default()
        });
        run.add_warning(RunWarning {
            timestamp: Utc::now(),
            message: "late".to_string(),
            url: None,
        });
        assert_eq!(run.results.found, 0);
        assert!(run.warnings.is_empty());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Partial,
        ] {
            assert_eq!(RunStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_trigger_roundtrip() {
        for trigger in [
            Trigger::Manual,
            Trigger::Scheduled,
            Trigger::Api,
            Trigger::System,
        ] {
            assert_eq!(Trigger::from_str(trigger.as_str()), Some(trigger));
        }
    }
}
