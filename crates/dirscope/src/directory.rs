//! Cached, coalesced directory listings.
//!
//! A read that is in flight when its directory is invalidated is detached:
//! later callers start a fresh read, and the detached read neither serves
//! them nor writes its result to the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use filesystem::{list_directory, mutation_targets, DirectoryCache, DirectoryEntry, FsBackend};
use parking_lot::Mutex;

use crate::coalesce::SingleFlight;
use crate::config::DirectoryCacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::utils::paths::path_key;

pub type Listing = Arc<Vec<DirectoryEntry>>;

/// Directory to the ticket of the read allowed to fill its cache slot.
type PendingReads = Mutex<HashMap<PathBuf, u64>>;

/// Serves listings from the directory cache, reading the disk on a miss.
///
/// Concurrent misses for the same path share one read.
pub struct DirectoryService {
    backend: Arc<dyn FsBackend>,
    cache: Arc<DirectoryCache>,
    flights: SingleFlight<Listing>,
    pending: Arc<PendingReads>,
    next_ticket: AtomicU64,
}

impl std::fmt::Debug for DirectoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryService")
            .field("cache", &self.cache)
            .field("flights", &self.flights)
            .finish()
    }
}

impl DirectoryService {
    pub fn new(backend: Arc<dyn FsBackend>, config: &DirectoryCacheConfig) -> Self {
        Self {
            backend,
            cache: Arc::new(DirectoryCache::new(config.max_entries, config.ttl())),
            flights: SingleFlight::new(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub async fn list(&self, path: &Path) -> CoreResult<Listing> {
        let dir = path_key(path);
        if let Some(entries) = self.cache.get(&dir) {
            tracing::debug!("directory cache hit {}", dir.display());
            return Ok(entries);
        }
        tracing::debug!("directory cache miss {}", dir.display());

        let key = dir.to_string_lossy().into_owned();
        let backend = self.backend.clone();
        let cache = self.cache.clone();
        let pending = self.pending.clone();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.flights
            .run(&key, move || async move {
                pending.lock().insert(dir.clone(), ticket);
                let read_dir = dir.clone();
                let result = match tokio::task::spawn_blocking(move || {
                    list_directory(backend.as_ref(), &read_dir)
                })
                .await
                {
                    Ok(Ok(entries)) => Ok(Arc::new(entries)),
                    Ok(Err(error)) => Err(CoreError::from(error)),
                    Err(error) => Err(CoreError::Internal(format!("listing task failed: {error}"))),
                };

                {
                    let mut pending = pending.lock();
                    let current = pending.get(&dir) == Some(&ticket);
                    if current {
                        pending.remove(&dir);
                    }
                    match &result {
                        Ok(entries) if current => cache.put(dir, entries.clone()),
                        Ok(_) => tracing::debug!(
                            "discarding listing of {} invalidated mid-read",
                            dir.display()
                        ),
                        Err(_) => {}
                    }
                }
                result
            })
            .await
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        let dir = path_key(path);
        let removed = self.detach(&dir);
        if removed {
            tracing::debug!("directory cache invalidated {}", dir.display());
        }
        removed
    }

    pub fn invalidate_for_mutation(&self, source: &Path, destination: Option<&Path>) -> usize {
        let source = path_key(source);
        let destination = destination.map(path_key);
        mutation_targets(&source, destination.as_deref())
            .iter()
            .filter(|target| self.detach(target))
            .count()
    }

    #[cfg(test)]
    fn cached_directories(&self) -> usize {
        self.cache.len()
    }

    /// Drops the cached listing of `dir` and detaches any read of it that is
    /// in flight. Returns whether a cached listing was removed.
    fn detach(&self, dir: &Path) -> bool {
        let mut pending = self.pending.lock();
        pending.remove(dir);
        self.flights.forget(&dir.to_string_lossy());
        self.cache.invalidate(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoryCacheConfig;
    use filesystem::{EntryStat, LocalFs, RawEntry};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingFs {
        reads: AtomicUsize,
        delay: Duration,
    }

    impl FsBackend for CountingFs {
        fn read_entries(&self, path: &Path) -> io::Result<Vec<RawEntry>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            LocalFs.read_entries(path)
        }

        fn stat(&self, path: &Path) -> io::Result<EntryStat> {
            LocalFs.stat(path)
        }
    }

    /// Reads the directory first, then holds the read open for `stall`.
    struct StallingFs {
        reads: AtomicUsize,
        stall: Duration,
    }

    impl FsBackend for StallingFs {
        fn read_entries(&self, path: &Path) -> io::Result<Vec<RawEntry>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let entries = LocalFs.read_entries(path);
            std::thread::sleep(self.stall);
            entries
        }

        fn stat(&self, path: &Path) -> io::Result<EntryStat> {
            LocalFs.stat(path)
        }
    }

    fn service(backend: Arc<dyn FsBackend>, ttl_ms: u64) -> DirectoryService {
        let config = DirectoryCacheConfig {
            ttl_ms,
            ..DirectoryCacheConfig::default()
        };
        DirectoryService::new(backend, &config)
    }

    #[tokio::test]
    async fn second_listing_within_ttl_hits_cache() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let backend = Arc::new(CountingFs::default());
        let service = service(backend.clone(), 5_000);

        let first = service.list(dir.path()).await.expect("list");
        let second = service.list(dir.path()).await.expect("list");
        assert_eq!(first, second);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_read() {
        let dir = tempdir().expect("tempdir");
        let backend = Arc::new(CountingFs::default());
        let service = service(backend.clone(), 5_000);

        assert!(service.list(dir.path()).await.expect("list").is_empty());
        std::fs::write(dir.path().join("new.txt"), b"n").expect("write");
        service.invalidate_for_mutation(&dir.path().join("new.txt"), None);

        let refreshed = service.list(dir.path()).await.expect("list");
        assert_eq!(refreshed.len(), 1);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_listing_is_reread() {
        let dir = tempdir().expect("tempdir");
        let backend = Arc::new(CountingFs::default());
        let service = service(backend.clone(), 0);

        service.list(dir.path()).await.expect("list");
        service.list(dir.path()).await.expect("list");
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_read() {
        let dir = tempdir().expect("tempdir");
        let backend = Arc::new(CountingFs {
            reads: AtomicUsize::new(0),
            delay: Duration::from_millis(50),
        });
        let service = service(backend.clone(), 5_000);

        let (a, b, c) = tokio::join!(
            service.list(dir.path()),
            service.list(dir.path()),
            service.list(dir.path()),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error_not_an_empty_listing() {
        let dir = tempdir().expect("tempdir");
        let service = service(Arc::new(CountingFs::default()), 5_000);
        let err = service
            .list(&dir.path().join("missing"))
            .await
            .expect_err("missing");
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(service.cached_directories(), 0);
    }

    #[tokio::test]
    async fn invalidation_during_a_read_detaches_it() {
        let dir = tempdir().expect("tempdir");
        let backend = Arc::new(StallingFs {
            reads: AtomicUsize::new(0),
            stall: Duration::from_millis(150),
        });
        let service = Arc::new(service(backend.clone(), 5_000));

        let stale = {
            let service = service.clone();
            let path = dir.path().to_path_buf();
            tokio::spawn(async move { service.list(&path).await })
        };
        tokio::time::sleep(Duration::from_millis(40)).await;

        std::fs::write(dir.path().join("new.txt"), b"n").expect("write");
        service.invalidate(dir.path());

        let fresh = service.list(dir.path()).await.expect("list");
        assert_eq!(fresh.len(), 1);
        let stale = stale.await.expect("join").expect("list");
        assert!(stale.is_empty());

        let cached = service.list(dir.path()).await.expect("list");
        assert_eq!(cached.len(), 1);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trailing_separator_shares_the_cache_slot() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), b"a").expect("write");
        let backend = Arc::new(CountingFs::default());
        let service = service(backend.clone(), 5_000);
        let with_slash = PathBuf::from(format!("{}/", dir.path().display()));

        let first = service.list(&with_slash).await.expect("list");
        let second = service.list(dir.path()).await.expect("list");
        assert_eq!(first, second);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);

        assert!(service.invalidate(&with_slash));
        assert_eq!(service.cached_directories(), 0);
    }
}
