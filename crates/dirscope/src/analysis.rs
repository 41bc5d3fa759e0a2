//! Subtree scans and paging over their duplicate groups.
//!
//! Every scan gets a session id. The full duplicate-group list is kept per
//! session in a bounded cache, so paging through one scan is unaffected by a
//! later scan of a different root. Callers that do not pass an id page the
//! most recent scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use filesystem::{paginate, scan_subtree, DuplicateGroup, DuplicatePage, FsBackend, ScanConfig, ScanResult};

use crate::coalesce::SingleFlight;
use crate::config::DuplicateSessionConfig;
use crate::error::{CoreError, CoreResult};
use crate::utils::paths::path_key;

/// A scan summary tagged with the session that holds its duplicate groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: String,
    #[serde(flatten)]
    pub result: ScanResult,
}

/// Full duplicate-group lists of recent scans, keyed by scan id.
#[derive(Debug)]
pub struct DuplicateSessions {
    cache: Cache<String, Arc<Vec<DuplicateGroup>>>,
    latest: Mutex<Option<String>>,
}

impl DuplicateSessions {
    pub fn new(max_sessions: u64, idle_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_sessions.max(1))
            .time_to_idle(idle_ttl)
            .build();
        Self {
            cache,
            latest: Mutex::new(None),
        }
    }

    pub fn store(&self, scan_id: &str, groups: Vec<DuplicateGroup>) {
        self.cache.insert(scan_id.to_string(), Arc::new(groups));
        *self.latest.lock() = Some(scan_id.to_string());
    }

    pub fn latest_id(&self) -> Option<String> {
        self.latest.lock().clone()
    }

    /// Pages the groups of `scan_id`, or of the latest scan when `None`.
    ///
    /// With no scan yet the page is empty. An explicit id that is unknown or
    /// has been evicted is an error.
    pub fn page(
        &self,
        scan_id: Option<&str>,
        page_index: usize,
        page_size: usize,
    ) -> CoreResult<DuplicatePage> {
        let groups = match scan_id {
            Some(id) => self
                .cache
                .get(id)
                .ok_or_else(|| CoreError::NotFound(format!("scan session {id}")))?,
            None => match self.latest_id().and_then(|id| self.cache.get(&id)) {
                Some(groups) => groups,
                None => return Ok(paginate(&[], page_index, page_size)),
            },
        };
        Ok(paginate(&groups, page_index, page_size))
    }
}

pub struct ScanService {
    backend: Arc<dyn FsBackend>,
    config: ScanConfig,
    flights: SingleFlight<Arc<ScanReport>>,
    sessions: Arc<DuplicateSessions>,
}

impl std::fmt::Debug for ScanService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanService")
            .field("config", &self.config)
            .field("flights", &self.flights)
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl ScanService {
    pub fn new(
        backend: Arc<dyn FsBackend>,
        config: ScanConfig,
        sessions: &DuplicateSessionConfig,
    ) -> Self {
        Self {
            backend,
            config,
            flights: SingleFlight::new(),
            sessions: Arc::new(DuplicateSessions::new(
                sessions.max_sessions,
                Duration::from_secs(sessions.idle_ttl_secs),
            )),
        }
    }

    /// Scans `root`. Concurrent scans of the same root share one walk and
    /// receive the same report.
    pub async fn scan(&self, root: &Path) -> CoreResult<Arc<ScanReport>> {
        let root: PathBuf = path_key(root);
        let key = root.to_string_lossy().into_owned();
        let backend = self.backend.clone();
        let config = self.config.clone();
        let sessions = self.sessions.clone();
        self.flights
            .run(&key, move || async move {
                let outcome =
                    tokio::task::spawn_blocking(move || scan_subtree(backend.as_ref(), &root, &config))
                        .await
                        .map_err(|error| CoreError::Internal(format!("scan task failed: {error}")))??;

                let scan_id = Uuid::now_v7().to_string();
                sessions.store(&scan_id, outcome.duplicate_groups);
                tracing::info!(
                    "scan session {scan_id} stored {} duplicate groups for {}",
                    outcome.summary.duplicate_count,
                    outcome.summary.root
                );
                Ok::<_, CoreError>(Arc::new(ScanReport {
                    scan_id,
                    result: outcome.summary,
                }))
            })
            .await
    }

    pub fn duplicate_page(
        &self,
        scan_id: Option<&str>,
        page_index: usize,
        page_size: usize,
    ) -> CoreResult<DuplicatePage> {
        self.sessions.page(scan_id, page_index, page_size)
    }

    #[cfg(test)]
    fn is_scanning(&self, root: &Path) -> bool {
        self.flights.is_in_flight(&path_key(root).to_string_lossy())
    }
}
