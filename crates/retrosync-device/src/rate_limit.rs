//! Fixed-interval pacing for device mutations
//!
//! The device runs a single-threaded web server that drops requests when
//! flooded. Every mutating call (`create`, `delete`, `upload`, and downloads
//! when throttling is enabled) goes through a [`MutationGate`]:
//!
//! - only one mutation is in flight at a time;
//! - the next mutation starts no earlier than `interval` after the previous
//!   one *completed*.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use retrosync_device::rate_limit::MutationGate;
//!
//! # async fn example() {
//! let gate = MutationGate::new(Duration::from_secs(1));
//! let permit = gate.acquire("create").await;
//! // ... make the device call ...
//! drop(permit); // completion time recorded here
//! # }
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

// ============================================================================
// MutationGate
// ============================================================================

/// Serializing gate enforcing a minimum gap between device mutations
#[derive(Debug, Clone)]
pub struct MutationGate {
    interval: Duration,
    /// Completion time of the previous mutation; the lock is the in-flight slot
    last_completed: Arc<Mutex<Option<Instant>>>,
    acquired: Arc<AtomicU64>,
}

impl MutationGate {
    /// Creates a gate with the given inter-call interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: Arc::new(Mutex::new(None)),
            acquired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A gate that serializes calls without waiting between them
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of permits handed out so far
    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Waits for the in-flight slot and for the interval to elapse
    ///
    /// The returned permit must be held for the duration of the device call.
    /// Dropping it records the completion time.
    pub async fn acquire(&self, operation: &'static str) -> MutationPermit {
        let guard = Arc::clone(&self.last_completed).lock_owned().await;

        if let Some(last) = *guard {
            let ready_at = last + self.interval;
            let now = Instant::now();
            if ready_at > now {
                debug!(
                    operation,
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Waiting for device mutation interval"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        self.acquired.fetch_add(1, Ordering::Relaxed);
        MutationPermit { guard, operation }
    }
}

// ============================================================================
// MutationPermit
// ============================================================================

/// Exclusive right to issue one device mutation
#[derive(Debug)]
pub struct MutationPermit {
    guard: OwnedMutexGuard<Option<Instant>>,
    operation: &'static str,
}

impl MutationPermit {
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let gate = MutationGate::new(Duration::from_secs(1));
        let start = Instant::now();
        let permit = gate.acquire("create").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(permit.operation(), "create");
        assert_eq!(gate.acquired_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_waits_interval() {
        let gate = MutationGate::new(Duration::from_secs(1));
        let start = Instant::now();
        drop(gate.acquire("create").await);
        drop(gate.acquire("delete").await);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_counts_from_completion() {
        let gate = MutationGate::new(Duration::from_secs(1));
        let start = Instant::now();

        let permit = gate.acquire("upload").await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(permit);

        drop(gate.acquire("delete").await);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle_period() {
        let gate = MutationGate::new(Duration::from_secs(1));
        let start = Instant::now();

        drop(gate.acquire("create").await);
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(gate.acquire("create").await);

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_serializes_callers() {
        let gate = MutationGate::unthrottled();
        let held = gate.acquire("upload").await;

        let contender = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire("delete").await.operation() })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(held);
        assert_eq!(contender.await.unwrap(), "delete");
        assert_eq!(gate.acquired_count(), 2);
    }
}
