use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use filesystem::{ScanConfig, CACHE_TTL, MAX_CACHE_SIZE};

use crate::error::{CoreError, CoreResult};

pub const CONFIG_FILENAME: &str = "dirscope.json";

/// Tunables for every cache and scan. Missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirscopeConfig {
    pub directory_cache: DirectoryCacheConfig,
    pub scan: ScanConfig,
    pub duplicates: DuplicateSessionConfig,
    pub installed_apps: InstalledAppsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryCacheConfig {
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for DirectoryCacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: CACHE_TTL.as_millis() as u64,
            max_entries: MAX_CACHE_SIZE,
        }
    }
}

impl DirectoryCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSessionConfig {
    /// Number of scans whose full duplicate lists stay pageable.
    pub max_sessions: u64,
    /// A session unused for this long is dropped.
    pub idle_ttl_secs: u64,
}

impl Default for DuplicateSessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 16,
            idle_ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstalledAppsConfig {
    pub freshness_secs: u64,
    pub timeout_ms: u64,
    /// Directories searched by the built-in enumerator.
    pub search_dirs: Vec<String>,
    /// File name of the persisted cache inside the data directory.
    pub cache_file: String,
}

impl Default for InstalledAppsConfig {
    fn default() -> Self {
        Self {
            freshness_secs: 5 * 60,
            timeout_ms: 12_000,
            search_dirs: default_app_dirs(),
            cache_file: "installed-apps.json".to_string(),
        }
    }
}

impl InstalledAppsConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_app_dirs() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["/Applications".to_string(), "~/Applications".to_string()]
    } else if cfg!(target_os = "windows") {
        vec![
            "C:\\ProgramData\\Microsoft\\Windows\\Start Menu\\Programs".to_string(),
        ]
    } else {
        vec![
            "/usr/share/applications".to_string(),
            "~/.local/share/applications".to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
        }
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

pub fn load_or_create_config(dir: &Path) -> CoreResult<DirscopeConfig> {
    std::fs::create_dir_all(dir).map_err(|error| {
        CoreError::Internal(format!(
            "failed to create data directory {}: {error}",
            dir.display()
        ))
    })?;

    let path = config_path(dir);
    if !path.exists() {
        let config = DirscopeConfig::default();
        write_config(&path, &config)?;
        return Ok(config);
    }

    let data = std::fs::read_to_string(&path).map_err(|error| {
        CoreError::Internal(format!("failed to read config {}: {error}", path.display()))
    })?;
    serde_json::from_str(&data).map_err(|error| {
        CoreError::InvalidInput(format!("failed to parse config {}: {error}", path.display()))
    })
}

fn write_config(path: &Path, config: &DirscopeConfig) -> CoreResult<()> {
    let data = serde_json::to_string_pretty(config).map_err(|error| {
        CoreError::Internal(format!(
            "failed to serialize config {}: {error}",
            path.display()
        ))
    })?;
    std::fs::write(path, data).map_err(|error| {
        CoreError::Internal(format!("failed to write config {}: {error}", path.display()))
    })?;
    Ok(())
}
