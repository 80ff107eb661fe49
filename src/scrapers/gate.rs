//! Global concurrency gate.
//!
//! A bounded semaphore caps simultaneous in-flight fetches across all
//! domains. Counters feed the live status view.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use super::error::ScrapeError;

/// Snapshot of gate activity.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStats {
    pub limit: usize,
    pub in_flight: usize,
    pub waiting: usize,
    pub peak_in_flight: usize,
    pub total_acquired: u64,
}

struct GateInner {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: AtomicUsize,
    waiting: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_acquired: AtomicU64,
}

/// Counting-semaphore gate shared by every fetch task.
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

/// Held for the duration of one request; releases the slot on drop.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    inner: Arc<GateInner>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(limit)),
                limit,
                in_flight: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
                total_acquired: AtomicU64::new(0),
            }),
        }
    }

    /// Acquire a slot, waiting if the gate is full. Cancellation pre-empts
    /// the wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, ScrapeError> {
        self.inner.waiting.fetch_add(1, Ordering::Relaxed);
        let acquired = tokio::select! {
            _ = cancel.cancelled() => None,
            permit = self.inner.semaphore.clone().acquire_owned() => permit.ok(),
        };
        self.inner.waiting.fetch_sub(1, Ordering::Relaxed);

        let permit = acquired.ok_or(ScrapeError::Cancelled)?;
        let current = self.inner.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.peak_in_flight.fetch_max(current, Ordering::Relaxed);
        self.inner.total_acquired.fetch_add(1, Ordering::Relaxed);
        Ok(GatePermit {
            _permit: permit,
            inner: self.inner.clone(),
        })
    }

    /// Reset activity counters; live permits are unaffected.
    pub fn reset_stats(&self) {
        self.inner.peak_in_flight.store(0, Ordering::Relaxed);
        self.inner.total_acquired.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            limit: self.inner.limit,
            in_flight: self.inner.in_flight.load(Ordering::Relaxed),
            waiting: self.inner.waiting.load(Ordering::Relaxed),
            peak_in_flight: self.inner.peak_in_flight.load(Ordering::Relaxed),
            total_acquired: self.inner.total_acquired.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_caps_concurrency() {
        let gate = ConcurrencyGate::new(2);
        let cancel = CancellationToken::new();

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = gate.acquire(&cancel).await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stats = gate.stats();
        assert!(stats.peak_in_flight <= 2);
        assert_eq!(stats.total_acquired, 6);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_cancellation_preempts_wait() {
        let gate = ConcurrencyGate::new(1);
        let cancel = CancellationToken::new();
        let _held = gate.acquire(&cancel).await.unwrap();

        cancel.cancel();
        let result = gate.acquire(&cancel).await;
        assert!(matches!(result, Err(ScrapeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_permit_drop_releases_slot() {
        let gate = ConcurrencyGate::new(1);
        let cancel = CancellationToken::new();
        {
            let _permit = gate.acquire(&cancel).await.unwrap();
            assert_eq!(gate.stats().in_flight, 1);
        }
        assert_eq!(gate.stats().in_flight, 0);
        // Slot is usable again.
        let _again = gate.acquire(&cancel).await.unwrap();
    }
}
