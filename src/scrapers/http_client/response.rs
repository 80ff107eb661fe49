//! Fetch response type.

use std::collections::HashMap;
use std::time::Duration;

/// Payload and metadata of one successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL that was requested.
    pub url: String,
    /// Final status after redirects.
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Wall-clock time of the winning attempt.
    pub elapsed: Duration,
    /// Attempts it took to get this response (1 = first try).
    pub attempts: u32,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.body.len() as u64
    }
}
