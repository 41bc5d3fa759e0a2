use std::path::{Path, PathBuf};
use std::sync::Arc;

use filesystem::{DuplicatePage, FsBackend, LocalFs};

use crate::analysis::{ScanReport, ScanService};
use crate::application::installed::AppList;
use crate::application::{AppEnumerator, DirectoryAppEnumerator, InstalledAppsCache};
use crate::config::{load_or_create_config, DirscopeConfig};
use crate::directory::{DirectoryService, Listing};
use crate::error::{CoreError, CoreResult};
use crate::storage::FileStorage;

/// Boundary operations exposed to the UI layer.
pub struct Core {
    data_dir: PathBuf,
    config: DirscopeConfig,
    directories: DirectoryService,
    scans: ScanService,
    apps: InstalledAppsCache,
}

impl Core {
    /// Loads (or creates) the config in `data_dir` and wires the local disk
    /// and directory-based app enumeration.
    pub fn load(data_dir: &Path) -> CoreResult<Self> {
        let config = load_or_create_config(data_dir)?;
        Ok(Self::new(data_dir.to_path_buf(), config))
    }

    pub fn new(data_dir: PathBuf, config: DirscopeConfig) -> Self {
        let enumerator = Arc::new(DirectoryAppEnumerator::from_config(&config.installed_apps));
        Self::with_backends(data_dir, config, Arc::new(LocalFs), enumerator)
    }

    pub fn with_backends(
        data_dir: PathBuf,
        config: DirscopeConfig,
        backend: Arc<dyn FsBackend>,
        enumerator: Arc<dyn AppEnumerator>,
    ) -> Self {
        let storage = FileStorage::new(data_dir.join("storage"));
        Self {
            directories: DirectoryService::new(backend.clone(), &config.directory_cache),
            scans: ScanService::new(backend, config.scan.clone(), &config.duplicates),
            apps: InstalledAppsCache::new(enumerator, Some(storage), &config.installed_apps),
            data_dir,
            config,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &DirscopeConfig {
        &self.config
    }

    pub async fn list_directory(&self, path: &Path) -> CoreResult<Listing> {
        require_absolute(path)?;
        self.directories.list(path).await
    }

    /// Drops the cached listing of the directory at `path`.
    pub fn invalidate_directory(&self, path: &Path) -> bool {
        self.directories.invalidate(path)
    }

    /// Drops the listings affected by a mutation of `source` (and
    /// `destination` for rename, move and copy).
    pub fn invalidate_for_mutation(&self, source: &Path, destination: Option<&Path>) -> usize {
        self.directories.invalidate_for_mutation(source, destination)
    }

    pub async fn scan_subtree(&self, path: &Path) -> CoreResult<Arc<ScanReport>> {
        require_absolute(path)?;
        self.scans.scan(path).await
    }

    pub fn get_duplicate_page(
        &self,
        scan_id: Option<&str>,
        page_index: usize,
        page_size: usize,
    ) -> CoreResult<DuplicatePage> {
        self.scans.duplicate_page(scan_id, page_index, page_size)
    }

    pub async fn get_installed_apps(&self, force: bool) -> CoreResult<AppList> {
        self.apps.get(force).await
    }
}

fn require_absolute(path: &Path) -> CoreResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!(
            "path must be absolute: {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, bytes: usize) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, vec![b'x'; bytes]).expect("write");
    }

    #[tokio::test]
    async fn load_creates_config_and_serves_operations() {
        let data = tempdir().expect("tempdir");
        let tree = tempdir().expect("tempdir");
        write(&tree.path().join("a/dup.txt"), 1000);
        write(&tree.path().join("b/dup.txt"), 1000);
        write(&tree.path().join("c/dup.txt"), 1000);

        let core = Core::load(data.path()).expect("core");
        assert!(crate::config::config_path(data.path()).exists());

        let listing = core.list_directory(tree.path()).await.expect("list");
        assert_eq!(listing.len(), 3);
        assert!(listing.iter().all(|entry| entry.is_directory));

        let report = core.scan_subtree(tree.path()).await.expect("scan");
        assert_eq!(report.result.duplicate_count, 1);
        assert_eq!(report.result.duplicate_size, 2000);

        let page = core
            .get_duplicate_page(Some(&report.scan_id), 0, 10)
            .expect("page");
        assert_eq!(page.total, 1);
        assert_eq!(page.groups[0].paths.len(), 3);
    }

    #[tokio::test]
    async fn mutation_invalidates_parent_listing() {
        let data = tempdir().expect("tempdir");
        let tree = tempdir().expect("tempdir");
        let core = Core::new(data.path().to_path_buf(), DirscopeConfig::default());

        assert!(core.list_directory(tree.path()).await.expect("list").is_empty());
        let created = tree.path().join("created.txt");
        write(&created, 1);
        assert!(core.list_directory(tree.path()).await.expect("list").is_empty());

        assert_eq!(core.invalidate_for_mutation(&created, None), 1);
        assert_eq!(core.list_directory(tree.path()).await.expect("list").len(), 1);
        assert!(core.invalidate_directory(tree.path()));
    }

    #[tokio::test]
    async fn relative_paths_are_rejected() {
        let data = tempdir().expect("tempdir");
        let core = Core::new(data.path().to_path_buf(), DirscopeConfig::default());
        let err = core
            .list_directory(Path::new("relative/dir"))
            .await
            .expect_err("relative");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }
}
