//! Scraping error types.

use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request hit its deadline.
    Timeout,
    /// Transport-level failure (DNS, connect, TLS, read).
    Network(String),
    /// The server answered with a status outside `[200, 400)`.
    Status(u16),
}

impl FetchFailure {
    /// Short kind tag for run-log error entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "fetch_timeout",
            Self::Network(_) => "fetch_network",
            Self::Status(_) => "fetch_status",
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Status(code) => write!(f, "unexpected status {code}"),
        }
    }
}

/// Errors surfaced by the scraping core.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// robots.txt forbids this URL. Never retried; the run continues.
    #[error("robots.txt disallows {0}")]
    RobotsDisallowed(String),

    /// The retry budget for one URL is exhausted.
    #[error("fetching {url} failed after {attempts} attempts: {last}")]
    FetchFailed {
        url: String,
        attempts: u32,
        last: FetchFailure,
    },

    /// A feed payload could not be parsed.
    #[error("feed parse error: {0}")]
    Parse(String),

    /// A non-duplicate store failure; fatal to the current batch.
    #[error("store error: {0}")]
    Store(#[from] crate::repository::Error),

    /// A run is already in progress.
    #[error("a scrape run is already in progress")]
    AlreadyRunning,

    /// The named adapter is not registered.
    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),

    /// The run was cancelled cooperatively.
    #[error("scrape cancelled")]
    Cancelled,

    #[cfg(feature = "browser")]
    /// The headless browser could not be driven.
    #[error("browser error: {0}")]
    Browser(String),
}

impl ScrapeError {
    /// Short kind tag for run-log error entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RobotsDisallowed(_) => "robots_disallowed",
            Self::FetchFailed { last, .. } => last.kind(),
            Self::Parse(_) => "parse",
            Self::Store(_) => "store",
            Self::AlreadyRunning => "already_running",
            Self::UnknownAdapter(_) => "not_found",
            Self::Cancelled => "cancelled",
            #[cfg(feature = "browser")]
            Self::Browser(_) => "browser",
        }
    }
}
