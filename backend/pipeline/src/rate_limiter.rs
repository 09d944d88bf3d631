//! Admission gate for remote analysis calls.
//!
//! A counting semaphore bounds how many calls are in flight at once, and each
//! acquired slot waits `min_interval` before the protected work begins. The
//! achievable call rate is therefore about `max_concurrent / min_interval`.
//! Bursts larger than `max_concurrent` queue until a slot frees.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use imgscribe_core::AnalysisError;

/// Rate limit policy for the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// Simultaneous in-flight calls.
    pub max_concurrent: usize,
    /// Delay applied inside each slot before the call starts, in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_concurrent: 20,
            min_interval_ms: 50,
        }
    }
}

impl RateLimitPolicy {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// Upper bound on calls per second, `None` when no interval is configured.
    pub fn max_calls_per_sec(&self) -> Option<f64> {
        (self.min_interval_ms > 0)
            .then(|| self.max_concurrent.max(1) as f64 * 1000.0 / self.min_interval_ms as f64)
    }
}

/// Held for the duration of one remote call; dropping it frees the slot.
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Cheaply cloneable handle to a shared admission gate.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        let slots = policy.max_concurrent.max(1);
        Self {
            policy: RateLimitPolicy { max_concurrent: slots, ..policy },
            semaphore: Arc::new(Semaphore::new(slots)),
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Wait for a free slot, then for the minimum interval.
    ///
    /// Returns [`AnalysisError::Cancelled`] if the limiter is closed while
    /// waiting.
    pub async fn acquire(&self) -> Result<RatePermit, AnalysisError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AnalysisError::Cancelled)?;

        let interval = self.policy.min_interval();
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        if self.semaphore.is_closed() {
            return Err(AnalysisError::Cancelled);
        }

        debug!(in_flight = self.in_flight(), "Rate limiter slot acquired");
        Ok(RatePermit { _permit: permit })
    }

    /// Abandon every queued and future acquisition. Holders of a permit keep it.
    pub fn close(&self) {
        debug!("Rate limiter closed");
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held (including those still in their interval delay).
    pub fn in_flight(&self) -> usize {
        self.policy.max_concurrent.saturating_sub(self.available())
    }
}
