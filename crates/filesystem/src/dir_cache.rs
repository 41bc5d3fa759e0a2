//! Short-lived cache of directory listings.
//!
//! Records expire after a fixed TTL and the cache holds a bounded number of
//! paths. Eviction is insertion-order FIFO: when a new path would exceed the
//! bound, the path inserted first is dropped. Overwriting a path keeps its
//! original insertion slot.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::types::DirectoryEntry;

/// Default lifetime of a cached listing.
pub const CACHE_TTL: Duration = Duration::from_secs(5);

/// Default maximum number of cached directories.
pub const MAX_CACHE_SIZE: usize = 50;

#[derive(Debug, Clone)]
struct DirectoryCacheRecord {
    entries: Arc<Vec<DirectoryEntry>>,
    cached_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    records: FnvHashMap<PathBuf, DirectoryCacheRecord>,
    order: VecDeque<PathBuf>,
}

#[derive(Debug)]
pub struct DirectoryCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new(MAX_CACHE_SIZE, CACHE_TTL)
    }
}

impl DirectoryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Returns the cached listing for `path` if it is younger than the TTL.
    pub fn get(&self, path: &Path) -> Option<Arc<Vec<DirectoryEntry>>> {
        self.get_at(path, Instant::now())
    }

    pub(crate) fn get_at(&self, path: &Path, now: Instant) -> Option<Arc<Vec<DirectoryEntry>>> {
        let inner = self.inner.lock();
        let record = inner.records.get(path)?;
        if now.saturating_duration_since(record.cached_at) < self.ttl {
            Some(record.entries.clone())
        } else {
            None
        }
    }

    /// Stores a fresh listing for `path`, evicting the oldest path if full.
    pub fn put(&self, path: PathBuf, entries: Arc<Vec<DirectoryEntry>>) {
        self.put_at(path, entries, Instant::now());
    }

    pub(crate) fn put_at(&self, path: PathBuf, entries: Arc<Vec<DirectoryEntry>>, now: Instant) {
        let record = DirectoryCacheRecord {
            entries,
            cached_at: now,
        };
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.records.get_mut(&path) {
            *existing = record;
            return;
        }
        if inner.records.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.records.remove(&oldest);
                log::debug!("directory cache evicted {}", oldest.display());
            }
        }
        inner.order.push_back(path.clone());
        inner.records.insert(path, record);
    }

    /// Drops the listing for `path`. Returns whether a record was removed.
    pub fn invalidate(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        if inner.records.remove(path).is_none() {
            return false;
        }
        inner.order.retain(|candidate| candidate != path);
        true
    }

    /// Invalidates the directories affected by a create, delete, rename,
    /// move or copy of `source` (and `destination`, when there is one).
    ///
    /// The parents of both paths are invalidated. The paths themselves are
    /// only dropped if they were cached, which means they were directories.
    pub fn invalidate_for_mutation(&self, source: &Path, destination: Option<&Path>) -> usize {
        mutation_targets(source, destination)
            .iter()
            .filter(|target| self.invalidate(target))
            .count()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.records.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().records.contains_key(path)
    }
}

/// Directories whose listings a mutation of `source` (and `destination`)
/// can change: both paths and both parents, deduplicated.
pub fn mutation_targets(source: &Path, destination: Option<&Path>) -> Vec<PathBuf> {
    let mut targets = Vec::with_capacity(4);
    for path in std::iter::once(source).chain(destination) {
        targets.push(path.to_path_buf());
        if let Some(parent) = path.parent() {
            targets.push(parent.to_path_buf());
        }
    }
    targets.sort();
    targets.dedup();
    targets
}
