use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use waypost_core::{ServiceId, ServiceInfo};

use super::lease::LeaseHandle;

/// A live service instance. Owned by the id index, referenced by the name index.
#[derive(Debug)]
pub(crate) struct ServiceEntry {
    pub id: ServiceId,
    pub name: String,
    pub address: String,
    pub registered_at: DateTime<Utc>,
    pub lease: LeaseHandle,
}

impl ServiceEntry {
    pub fn new(id: ServiceId, name: String, address: String, lease: LeaseHandle) -> Self {
        Self {
            id,
            name,
            address,
            registered_at: Utc::now(),
            lease,
        }
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            id: self.id,
            name: self.name.clone(),
            address: self.address.clone(),
            registered_at: self.registered_at,
        }
    }
}

#[derive(Debug, Default)]
struct Indices {
    by_id: HashMap<ServiceId, Arc<ServiceEntry>>,
    by_name: HashMap<String, Vec<Arc<ServiceEntry>>>,
}

/// The id and name indices behind a single lock.
///
/// Every method takes the lock once and releases it before returning, so
/// callers never observe one index updated without the other.
#[derive(Debug, Default)]
pub(crate) struct EntryStore {
    indices: Mutex<Indices>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn indices(&self) -> MutexGuard<'_, Indices> {
        // Both maps are updated before any code that could panic runs, so a
        // poisoned guard still holds consistent indices.
        self.indices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entry to both indices. The id must be fresh.
    pub fn insert(&self, entry: Arc<ServiceEntry>) {
        let mut indices = self.indices();
        debug_assert!(!indices.by_id.contains_key(&entry.id));

        indices
            .by_name
            .entry(entry.name.clone())
            .or_default()
            .push(entry.clone());
        indices.by_id.insert(entry.id, entry);
    }

    /// Remove an entry from both indices, dropping its name bucket when empty.
    pub fn remove(&self, id: ServiceId) -> Option<Arc<ServiceEntry>> {
        let mut indices = self.indices();
        let entry = indices.by_id.remove(&id)?;

        if let Some(bucket) = indices.by_name.get_mut(&entry.name) {
            bucket.retain(|e| !Arc::ptr_eq(e, &entry));
            if bucket.is_empty() {
                indices.by_name.remove(&entry.name);
            }
        }

        Some(entry)
    }

    pub fn get(&self, id: ServiceId) -> Option<Arc<ServiceEntry>> {
        self.indices().by_id.get(&id).cloned()
    }

    /// Address of one entry named `name`, chosen uniformly at random.
    pub fn pick_by_name(&self, name: &str) -> Option<String> {
        let indices = self.indices();
        let bucket = indices.by_name.get(name)?;
        bucket
            .choose(&mut rand::thread_rng())
            .map(|entry| entry.address.clone())
    }

    /// Snapshot of the entries currently registered under `name`.
    pub fn entries_named(&self, name: &str) -> Vec<ServiceInfo> {
        self.indices()
            .by_name
            .get(name)
            .map(|bucket| bucket.iter().map(|e| e.info()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.indices().by_id.len()
    }

    /// Remove every entry, returning them for lease cancellation.
    pub fn drain(&self) -> Vec<Arc<ServiceEntry>> {
        let mut indices = self.indices();
        indices.by_name.clear();
        indices.by_id.drain().map(|(_, entry)| entry).collect()
    }

    /// Whether every id has exactly one reference in its name bucket and no
    /// bucket holds a reference the id index does not own.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        let indices = self.indices();

        let referenced: usize = indices.by_name.values().map(Vec::len).sum();
        if referenced != indices.by_id.len() {
            return false;
        }

        let buckets_ok = indices.by_name.iter().all(|(name, bucket)| {
            !bucket.is_empty()
                && bucket.iter().all(|e| {
                    &e.name == name
                        && indices
                            .by_id
                            .get(&e.id)
                            .is_some_and(|owned| Arc::ptr_eq(owned, e))
                })
        });

        let ids_ok = indices.by_id.values().all(|e| {
            indices
                .by_name
                .get(&e.name)
                .map(|bucket| bucket.iter().filter(|r| Arc::ptr_eq(r, e)).count() == 1)
                .unwrap_or(false)
        });

        buckets_ok && ids_ok
    }
}
