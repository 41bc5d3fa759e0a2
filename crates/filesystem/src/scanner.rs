//! Subtree statistics in a single depth-first pass.
//!
//! One walk feeds every aggregate: category totals, large and recent file
//! lists, redundant files and duplicate groups. Unreadable subdirectories
//! are skipped and counted; files whose `stat` fails are left out. Symlinks
//! are ignored, so linked content is never counted twice.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::backend::FsBackend;
use crate::category::{extension_of, Category, CategoryTotals};
use crate::duplicates::{reclaimable_total, DuplicateGroup, DuplicateIndex};
use crate::error::{FilesystemError, Result};
use crate::listing::stat_batched;
use crate::time::unix_now_secs;
use crate::types::{EntryStat, RawEntry};

/// Extensions flagged as redundant regardless of size.
pub const REDUNDANT_EXTENSIONS: &[&str] = &["tmp", "log", "cache"];

/// Thresholds and list sizes for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files strictly larger than this many bytes are "large".
    pub large_file_threshold: u64,
    /// Files modified less than this many seconds ago are "recent".
    pub recent_window_secs: u64,
    /// Length of the large and recent lists.
    pub top_files: usize,
    /// Number of duplicate groups included in the summary.
    pub preview_groups: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: 100 * 1024 * 1024,
            recent_window_secs: 24 * 60 * 60,
            top_files: 20,
            preview_groups: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub modified_at: u64,
}

/// Bounded summary of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub root: String,
    pub total_size: u64,
    pub file_count: u64,
    pub categories: CategoryTotals,
    pub large_files: Vec<FileSummary>,
    pub recent_files: Vec<FileSummary>,
    pub redundant_files: Vec<String>,
    /// First `preview_groups` groups of the full list.
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Number of groups in the full list.
    pub duplicate_count: usize,
    /// Reclaimable bytes over the full list.
    pub duplicate_size: u64,
    /// Subdirectories that could not be read and were left out.
    pub skipped_dirs: u64,
    pub elapsed_ms: u64,
}

/// A scan summary plus the complete duplicate-group list behind it.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub summary: ScanResult,
    pub duplicate_groups: Vec<DuplicateGroup>,
}

/// Scans `root` using the current wall clock for the recent-file window.
pub fn scan_subtree<B>(backend: &B, root: &Path, config: &ScanConfig) -> Result<ScanOutcome>
where
    B: FsBackend + ?Sized,
{
    scan_subtree_at(backend, root, config, unix_now_secs())
}

/// Scans `root` as if the current time were `now` (Unix seconds).
pub fn scan_subtree_at<B>(
    backend: &B,
    root: &Path,
    config: &ScanConfig,
    now: u64,
) -> Result<ScanOutcome>
where
    B: FsBackend + ?Sized,
{
    let started = Instant::now();
    let root_entries = backend
        .read_entries(root)
        .map_err(|error| FilesystemError::from_io(root, error))?;

    let mut state = ScanState::new(config, now);
    let mut pending: Vec<(PathBuf, Vec<RawEntry>)> = vec![(root.to_path_buf(), root_entries)];

    while let Some((dir, entries)) = pending.pop() {
        let (dirs, files): (Vec<RawEntry>, Vec<RawEntry>) = entries
            .into_iter()
            .filter(|entry| !entry.is_symlink)
            .partition(|entry| entry.is_dir);

        for (raw, stat) in stat_batched(backend, &dir, &files) {
            let path = dir.join(&raw.name);
            match stat {
                Ok(stat) => state.record_file(&path, &raw.name, stat),
                Err(error) => log::trace!("excluding {}: {}", path.display(), error),
            }
        }

        // Reverse so the first child directory is visited next.
        for sub in dirs.into_iter().rev() {
            let path = dir.join(&sub.name);
            match backend.read_entries(&path) {
                Ok(children) => pending.push((path, children)),
                Err(error) => {
                    state.skipped_dirs += 1;
                    log::debug!("skipping unreadable subtree {}: {}", path.display(), error);
                }
            }
        }
    }

    let outcome = state.finish(root, started);
    log::info!(
        "scan finished root={} files={} bytes={} duplicate_groups={} skipped_dirs={} elapsed_ms={}",
        outcome.summary.root,
        outcome.summary.file_count,
        outcome.summary.total_size,
        outcome.summary.duplicate_count,
        outcome.summary.skipped_dirs,
        outcome.summary.elapsed_ms,
    );
    Ok(outcome)
}

struct ScanState<'a> {
    config: &'a ScanConfig,
    now: u64,
    total_size: u64,
    file_count: u64,
    categories: CategoryTotals,
    large_files: Vec<FileSummary>,
    recent_files: Vec<FileSummary>,
    redundant_files: Vec<String>,
    duplicates: DuplicateIndex,
    skipped_dirs: u64,
}

impl<'a> ScanState<'a> {
    fn new(config: &'a ScanConfig, now: u64) -> Self {
        Self {
            config,
            now,
            total_size: 0,
            file_count: 0,
            categories: CategoryTotals::default(),
            large_files: Vec::new(),
            recent_files: Vec::new(),
            redundant_files: Vec::new(),
            duplicates: DuplicateIndex::default(),
            skipped_dirs: 0,
        }
    }

    fn record_file(&mut self, path: &Path, name: &str, stat: EntryStat) {
        let path_str = path.to_string_lossy().into_owned();
        let extension = extension_of(path);

        self.total_size = self.total_size.saturating_add(stat.size);
        self.file_count += 1;
        self.categories
            .record(Category::classify(extension.as_deref()), stat.size);
        self.duplicates.insert(stat.size, name, path_str.clone());

        let summary = || FileSummary {
            path: path_str.clone(),
            name: name.to_string(),
            size: stat.size,
            modified_at: stat.modified_at,
        };
        if stat.size > self.config.large_file_threshold {
            self.large_files.push(summary());
        }
        if stat.modified_at > 0
            && self.now.saturating_sub(stat.modified_at) < self.config.recent_window_secs
        {
            self.recent_files.push(summary());
        }
        let redundant_ext = extension
            .as_deref()
            .is_some_and(|ext| REDUNDANT_EXTENSIONS.contains(&ext));
        if redundant_ext || stat.size == 0 {
            self.redundant_files.push(path_str);
        }
    }

    fn finish(mut self, root: &Path, started: Instant) -> ScanOutcome {
        let top = self.config.top_files;

        self.large_files
            .sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        self.large_files.truncate(top);

        self.recent_files.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        self.recent_files.truncate(top);

        self.redundant_files.sort();

        let duplicate_groups = self.duplicates.into_groups();
        let preview = duplicate_groups
            .iter()
            .take(self.config.preview_groups)
            .cloned()
            .collect();

        let summary = ScanResult {
            root: root.to_string_lossy().into_owned(),
            total_size: self.total_size,
            file_count: self.file_count,
            categories: self.categories,
            large_files: self.large_files,
            recent_files: self.recent_files,
            redundant_files: self.redundant_files,
            duplicate_groups: preview,
            duplicate_count: duplicate_groups.len(),
            duplicate_size: reclaimable_total(&duplicate_groups),
            skipped_dirs: self.skipped_dirs,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        ScanOutcome {
            summary,
            duplicate_groups,
        }
    }
}
