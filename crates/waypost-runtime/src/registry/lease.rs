use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use waypost_core::ServiceId;

/// Default lease window.
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared, mutable lease window. Watchers read it each time they arm.
#[derive(Debug)]
pub(crate) struct LeaseTimeout {
    nanos: AtomicU64,
}

impl LeaseTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(to_nanos(timeout)),
        }
    }

    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    pub fn set(&self, timeout: Duration) {
        self.nanos.store(to_nanos(timeout), Ordering::SeqCst);
    }
}

impl Default for LeaseTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE_TIMEOUT)
    }
}

fn to_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// Signalling side of one entry's lease.
///
/// Both signals are non-blocking: a refresh leaves a permit the watcher picks
/// up on its next poll, and cancellation is a flag. Signalling a watcher that
/// has already exited does nothing.
#[derive(Debug, Clone, Default)]
pub(crate) struct LeaseHandle {
    refresh: Arc<Notify>,
    cancel: CancellationToken,
}

impl LeaseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the countdown with a fresh window.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop the watcher without removing anything.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// How a watcher finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeaseOutcome {
    /// No refresh arrived within the window; the entry must be removed.
    Expired,
    /// The entry was removed by someone else.
    Cancelled,
}

/// Background countdown for a single entry.
///
/// The first deadline is fixed when the watcher is created, not when its task
/// is first polled. Each refresh re-reads the shared timeout.
pub(crate) struct LeaseWatcher {
    id: ServiceId,
    handle: LeaseHandle,
    timeout: Arc<LeaseTimeout>,
    deadline: Instant,
}

impl LeaseWatcher {
    pub fn new(id: ServiceId, handle: LeaseHandle, timeout: Arc<LeaseTimeout>) -> Self {
        let deadline = Instant::now() + timeout.get();
        Self {
            id,
            handle,
            timeout,
            deadline,
        }
    }

    /// Wait until the lease expires or is cancelled.
    pub async fn watch(mut self) -> LeaseOutcome {
        loop {
            tokio::select! {
                biased;

                _ = self.handle.cancel.cancelled() => {
                    tracing::trace!(service_id = %self.id, "Lease cancelled");
                    return LeaseOutcome::Cancelled;
                }
                _ = self.handle.refresh.notified() => {
                    let window = self.timeout.get();
                    self.deadline = Instant::now() + window;
                    tracing::trace!(service_id = %self.id, ?window, "Lease refreshed");
                }
                _ = tokio::time::sleep_until(self.deadline) => {
                    return LeaseOutcome::Expired;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watcher(timeout: Duration) -> (LeaseHandle, Arc<LeaseTimeout>, LeaseWatcher) {
        let handle = LeaseHandle::new();
        let timeout = Arc::new(LeaseTimeout::new(timeout));
        let watcher = LeaseWatcher::new(ServiceId::new(), handle.clone(), timeout.clone());
        (handle, timeout, watcher)
    }

    #[test]
    fn test_lease_timeout_roundtrip() {
        let timeout = LeaseTimeout::default();
        assert_eq!(timeout.get(), DEFAULT_LEASE_TIMEOUT);
        timeout.set(Duration::from_millis(5));
        assert_eq!(timeout.get(), Duration::from_millis(5));
        timeout.set(Duration::MAX);
        assert_eq!(timeout.get(), Duration::from_nanos(u64::MAX));
    }

    #[tokio::test]
    async fn test_expires_without_refresh() {
        let (_handle, _timeout, watcher) = watcher(Duration::from_millis(20));
        let outcome = tokio::time::timeout(Duration::from_secs(2), watcher.watch())
            .await
            .unwrap();
        assert_eq!(outcome, LeaseOutcome::Expired);
    }

    #[tokio::test]
    async fn test_cancel_stops_watcher() {
        let (handle, _timeout, watcher) = watcher(Duration::from_secs(60));
        let task = tokio::spawn(watcher.watch());

        handle.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, LeaseOutcome::Cancelled);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_refresh_extends_lease() {
        let (handle, _timeout, watcher) = watcher(Duration::from_millis(100));
        let task = tokio::spawn(watcher.watch());

        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            handle.refresh();
        }
        assert!(!task.is_finished());

        handle.cancel();
        assert_eq!(task.await.unwrap(), LeaseOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_new_timeout_applies_on_refresh() {
        let (handle, timeout, watcher) = watcher(Duration::from_secs(60));
        let task = tokio::spawn(watcher.watch());

        // Let the watcher start its 60s countdown first.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        timeout.set(Duration::from_millis(20));
        handle.refresh();

        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, LeaseOutcome::Expired);
    }

    #[tokio::test]
    async fn test_first_window_fixed_at_creation() {
        let (handle, timeout, watcher) = watcher(Duration::from_millis(20));
        timeout.set(Duration::from_secs(60));

        let task = tokio::spawn(watcher.watch());
        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, LeaseOutcome::Expired);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_unchanged_timeout_without_refresh() {
        let (_handle, timeout, watcher) = watcher(Duration::from_secs(60));
        let task = tokio::spawn(watcher.watch());

        tokio::time::sleep(Duration::from_millis(10)).await;
        timeout.set(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn test_signals_after_exit_are_noops() {
        let (handle, _timeout, watcher) = watcher(Duration::from_millis(5));
        assert_eq!(watcher.watch().await, LeaseOutcome::Expired);

        handle.refresh();
        handle.cancel();
        handle.cancel();
    }
}
