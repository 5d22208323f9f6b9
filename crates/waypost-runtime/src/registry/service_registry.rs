use std::sync::{Arc, Weak};
use std::time::Duration;

use waypost_core::{Result, ServiceId, ServiceInfo, WaypostError};

use super::lease::{LeaseHandle, LeaseOutcome, LeaseTimeout, LeaseWatcher};
use super::store::{EntryStore, ServiceEntry};

struct RegistryInner {
    store: EntryStore,
    lease_timeout: Arc<LeaseTimeout>,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for entry in self.store.drain() {
            entry.lease.cancel();
        }
    }
}

/// Lease-based service directory.
///
/// Cloning is cheap and every clone refers to the same directory. Each live
/// entry has one background watcher task, so `register` must be called from
/// within a Tokio runtime.
///
/// The store lock is never held while a watcher is signalled, and signals
/// never wait on the watcher, so an expiring watcher that needs the lock can
/// not deadlock against a concurrent heartbeat or deregister.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    /// Create an empty registry with the default lease timeout.
    pub fn new() -> Self {
        Self::with_timeout(super::DEFAULT_LEASE_TIMEOUT)
    }

    /// Create an empty registry with the given lease timeout.
    pub fn with_timeout(lease_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store: EntryStore::new(),
                lease_timeout: Arc::new(LeaseTimeout::new(lease_timeout)),
            }),
        }
    }

    /// Register a service instance and start its lease.
    pub fn register(&self, name: impl Into<String>, address: impl Into<String>) -> ServiceId {
        let id = ServiceId::new();
        let lease = LeaseHandle::new();
        let entry = Arc::new(ServiceEntry::new(id, name.into(), address.into(), lease.clone()));

        tracing::info!(
            service_id = %id,
            name = %entry.name,
            address = %entry.address,
            "Service registered"
        );

        self.inner.store.insert(entry);
        self.spawn_watcher(id, lease);

        id
    }

    fn spawn_watcher(&self, id: ServiceId, lease: LeaseHandle) {
        // Arms the first deadline now, before the task is scheduled.
        let watcher = LeaseWatcher::new(id, lease, self.inner.lease_timeout.clone());
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            if watcher.watch().await == LeaseOutcome::Expired {
                if let Some(inner) = registry.upgrade() {
                    ServiceRegistry { inner }.expire(id);
                }
            }
        });
    }

    /// Called by a watcher whose window elapsed.
    fn expire(&self, id: ServiceId) {
        match self.remove(id) {
            Some(entry) => tracing::info!(
                service_id = %id,
                name = %entry.name,
                "Service lease expired"
            ),
            None => tracing::debug!(service_id = %id, "Expired service already removed"),
        }
    }

    fn remove(&self, id: ServiceId) -> Option<Arc<ServiceEntry>> {
        let entry = self.inner.store.remove(id)?;
        // Lock is released; cancel after removal.
        entry.lease.cancel();
        Some(entry)
    }

    /// Remove a service instance and stop its lease.
    ///
    /// Returns `NotFound` when the id is unknown, including on a second call
    /// for an id that was already removed.
    pub fn deregister(&self, id: ServiceId) -> Result<()> {
        match self.remove(id) {
            Some(entry) => {
                tracing::info!(service_id = %id, name = %entry.name, "Service deregistered");
                Ok(())
            }
            None => {
                tracing::debug!(service_id = %id, "Deregister for unknown service");
                Err(WaypostError::NotFound(format!("service {}", id)))
            }
        }
    }

    /// Resolve a name to the address of one live instance, chosen at random.
    pub fn lookup(&self, name: &str) -> Option<String> {
        self.inner.store.pick_by_name(name)
    }

    /// Extend an instance's lease by a fresh window.
    pub fn heartbeat(&self, id: ServiceId) -> Result<()> {
        match self.inner.store.get(id) {
            Some(entry) => {
                entry.lease.refresh();
                Ok(())
            }
            None => {
                tracing::debug!(service_id = %id, "Heartbeat for unknown service");
                Err(WaypostError::NotFound(format!("service {}", id)))
            }
        }
    }

    /// Change the lease window. Countdowns already running keep their window
    /// until the next heartbeat re-arms them.
    pub fn set_timeout(&self, timeout: Duration) {
        tracing::debug!(?timeout, "Lease timeout updated");
        self.inner.lease_timeout.set(timeout);
    }

    /// Current lease window.
    pub fn timeout(&self) -> Duration {
        self.inner.lease_timeout.get()
    }

    /// Look up a live instance by id.
    pub fn get(&self, id: ServiceId) -> Option<ServiceInfo> {
        self.inner.store.get(id).map(|entry| entry.info())
    }

    /// Live instances registered under `name`.
    pub fn entries_named(&self, name: &str) -> Vec<ServiceInfo> {
        self.inner.store.entries_named(name)
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every instance and stop all watchers. Returns how many were live.
    pub fn shutdown(&self) -> usize {
        let entries = self.inner.store.drain();
        let count = entries.len();
        for entry in entries {
            entry.lease.cancel();
        }
        tracing::info!(count, "Service registry cleared");
        count
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.inner.store.is_consistent()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.len())
            .field("lease_timeout", &self.timeout())
            .finish()
    }
}
