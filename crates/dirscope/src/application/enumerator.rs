use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::application::installed::InstalledApp;
use crate::config::InstalledAppsConfig;
use crate::error::{CoreError, CoreResult};
use crate::utils::paths::expand_home;

/// The platform primitive that lists installed applications. Slow; callers
/// go through [`InstalledAppsCache`](crate::application::InstalledAppsCache).
#[async_trait]
pub trait AppEnumerator: Send + Sync {
    async fn enumerate(&self) -> CoreResult<Vec<InstalledApp>>;
}

/// Lists application bundles (`*.app`), desktop launchers (`*.desktop`) and
/// shortcuts (`*.lnk`) directly under a set of directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryAppEnumerator {
    dirs: Vec<PathBuf>,
}

impl DirectoryAppEnumerator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_config(config: &InstalledAppsConfig) -> Self {
        let dirs = config
            .search_dirs
            .iter()
            .filter_map(|raw| {
                if raw.starts_with('~') {
                    expand_home(raw).ok()
                } else {
                    Some(PathBuf::from(raw))
                }
            })
            .collect();
        Self::new(dirs)
    }

    async fn scan_dir(dir: &Path, apps: &mut Vec<InstalledApp>) -> CoreResult<()> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => {
                return Err(CoreError::Io(format!(
                    "failed to read application directory {}: {error}",
                    dir.display()
                )))
            }
        };
        while let Some(entry) = entries.next_entry().await.map_err(|error| {
            CoreError::Io(format!("failed to read {}: {error}", dir.display()))
        })? {
            let path = entry.path();
            let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let name = match extension.to_ascii_lowercase().as_str() {
                "app" | "lnk" => stem.to_string(),
                "desktop" => desktop_entry_name(&path)
                    .await
                    .unwrap_or_else(|| stem.to_string()),
                _ => continue,
            };
            apps.push(InstalledApp {
                name,
                path: path.to_string_lossy().into_owned(),
                bundle_id: None,
                version: None,
            });
        }
        Ok(())
    }
}

/// Reads `Name=` from the `[Desktop Entry]` group of a launcher file.
async fn desktop_entry_name(path: &Path) -> Option<String> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let mut in_entry = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if in_entry {
            if let Some(name) = line.strip_prefix("Name=") {
                let name = name.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}

#[async_trait]
impl AppEnumerator for DirectoryAppEnumerator {
    async fn enumerate(&self) -> CoreResult<Vec<InstalledApp>> {
        let mut apps = Vec::new();
        for dir in &self.dirs {
            Self::scan_dir(dir, &mut apps).await?;
        }
        Ok(apps)
    }
}
