//! Per-key exponential requeue backoff.
//!
//! kube-runtime requeues a failed object after whatever delay the error
//! policy returns. This tracker doubles that delay for each consecutive
//! failure of the same DragonflyDb and forgets the key once a reconcile
//! succeeds.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::crd::ObjectKey;

/// Largest exponent applied to the base delay
const MAX_EXPONENT: u32 = 16;

/// Consecutive-failure tracker producing exponential requeue delays
#[derive(Debug)]
pub struct RequeueBackoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl RequeueBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return the delay before the next attempt
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.clone()).or_insert(0);
        let exponent = (*count).min(MAX_EXPONENT);
        *count = count.saturating_add(1);

        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Delay used for failures that retrying cannot fix
    pub fn max_delay(&self) -> Duration {
        self.max
    }

    /// Forget the failure history of `key`
    pub fn reset(&self, key: &ObjectKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of consecutive failures recorded for `key`
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for RequeueBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}
