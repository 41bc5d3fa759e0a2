//! Installed-application list cached in memory and on disk.
//!
//! Enumeration is slow, so the list is served from memory while fresh,
//! served stale while a background refresh runs, and only awaited when there
//! is nothing to serve or a refresh is forced. A forced or cold wait is
//! bounded by a timeout; the refresh itself is never cancelled and still
//! lands in the cache when it finishes. The last successful result is
//! written to disk and seeds the cache on the next process start.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::application::enumerator::AppEnumerator;
use crate::coalesce::{FlightHandle, SingleFlight};
use crate::config::InstalledAppsConfig;
use crate::error::{CoreError, CoreResult};
use crate::storage::FileStorage;
use crate::utils::time::now_utc;

/// Coalescing key; there is only one installed-apps resource.
pub const INSTALLED_APPS_KEY: &str = "installed-apps";

pub type AppList = Arc<Vec<InstalledApp>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// On-disk form of the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledAppsSnapshot {
    pub data: Vec<InstalledApp>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AppsState {
    data: AppList,
    fetched_at: Option<DateTime<Utc>>,
}

pub struct InstalledAppsCache {
    enumerator: Arc<dyn AppEnumerator>,
    storage: Option<FileStorage>,
    cache_key: String,
    freshness: Duration,
    timeout: Duration,
    state: Arc<Mutex<AppsState>>,
    loaded: OnceCell<()>,
    flights: SingleFlight<AppList>,
}

impl std::fmt::Debug for InstalledAppsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstalledAppsCache")
            .field("storage", &self.storage)
            .field("freshness", &self.freshness)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .finish()
    }
}

impl InstalledAppsCache {
    /// `storage` is where the snapshot persists; `None` keeps it in memory.
    pub fn new(
        enumerator: Arc<dyn AppEnumerator>,
        storage: Option<FileStorage>,
        config: &InstalledAppsConfig,
    ) -> Self {
        Self {
            enumerator,
            storage,
            cache_key: config.cache_file.clone(),
            freshness: config.freshness(),
            timeout: config.timeout(),
            state: Arc::new(Mutex::new(AppsState::default())),
            loaded: OnceCell::new(),
            flights: SingleFlight::new(),
        }
    }

    pub async fn get(&self, force: bool) -> CoreResult<AppList> {
        self.ensure_loaded().await;

        if !force {
            let (data, fresh) = self.current();
            if fresh {
                return Ok(data);
            }
            if !data.is_empty() {
                tracing::debug!("serving stale installed apps while refreshing");
                let _ = self.start_refresh();
                return Ok(data);
            }
        }

        let flight = self.start_refresh();
        match tokio::time::timeout(self.timeout, flight.clone()).await {
            Ok(result) => self.settle(result),
            Err(_) => {
                let (data, _) = self.current();
                if !data.is_empty() {
                    tracing::warn!(
                        "installed apps scan exceeded {:?}; serving cached list",
                        self.timeout
                    );
                    return Ok(data);
                }
                tracing::warn!(
                    "installed apps scan exceeded {:?} with nothing cached; still waiting",
                    self.timeout
                );
                self.settle(flight.await)
            }
        }
    }

    #[cfg(test)]
    fn refresh_in_flight(&self) -> bool {
        self.flights.is_in_flight(INSTALLED_APPS_KEY)
    }

    fn current(&self) -> (AppList, bool) {
        let state = self.state.lock();
        let fresh = state.fetched_at.is_some_and(|fetched_at| {
            let age = (now_utc() - fetched_at).to_std().unwrap_or(Duration::ZERO);
            age < self.freshness
        });
        (state.data.clone(), fresh)
    }

    /// A failed refresh falls back to whatever is cached; with nothing
    /// cached the failure is returned so it is not mistaken for "no apps".
    fn settle(&self, result: CoreResult<AppList>) -> CoreResult<AppList> {
        match result {
            Ok(data) => Ok(data),
            Err(error) => {
                let (data, _) = self.current();
                if data.is_empty() {
                    Err(error)
                } else {
                    tracing::warn!("installed apps refresh failed, serving cached list: {error}");
                    Ok(data)
                }
            }
        }
    }

    async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                let Some(storage) = &self.storage else {
                    return;
                };
                match storage
                    .read_json::<InstalledAppsSnapshot>(&self.cache_key)
                    .await
                {
                    Ok(Some(snapshot)) => {
                        let mut state = self.state.lock();
                        if state.fetched_at.is_none() {
                            tracing::debug!(
                                "seeded {} installed apps from disk (fetched {})",
                                snapshot.data.len(),
                                snapshot.fetched_at
                            );
                            state.data = Arc::new(snapshot.data);
                            state.fetched_at = Some(snapshot.fetched_at);
                        }
                    }
                    Ok(None) => {}
                    Err(error) => tracing::warn!("ignoring installed apps cache: {error}"),
                }
            })
            .await;
    }

    fn start_refresh(&self) -> FlightHandle<AppList> {
        let enumerator = self.enumerator.clone();
        let storage = self.storage.clone();
        let cache_key = self.cache_key.clone();
        let state = self.state.clone();
        self.flights.start(INSTALLED_APPS_KEY, move || async move {
            let started = Instant::now();
            let mut apps = match enumerator.enumerate().await {
                Ok(apps) => apps,
                Err(error) => {
                    tracing::warn!("installed apps enumeration failed: {error}");
                    return Err(error);
                }
            };
            let mut seen = HashSet::new();
            apps.retain(|app| seen.insert(app.path.clone()));
            apps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

            let snapshot = InstalledAppsSnapshot {
                data: apps,
                fetched_at: now_utc(),
            };
            let data = Arc::new(snapshot.data.clone());
            {
                let mut state = state.lock();
                state.data = data.clone();
                state.fetched_at = Some(snapshot.fetched_at);
            }
            if let Some(storage) = storage {
                if let Err(error) = storage.write_json(&cache_key, &snapshot).await {
                    tracing::warn!("failed to persist installed apps: {error}");
                }
            }
            tracing::info!(
                "enumerated {} installed apps in {}ms",
                data.len(),
                started.elapsed().as_millis()
            );
            Ok::<_, CoreError>(data)
        })
    }
}
