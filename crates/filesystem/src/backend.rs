//! Raw filesystem primitives.
//!
//! Everything above this module talks to the disk through [`FsBackend`], so
//! listing and scanning can be exercised against counting or failing doubles.

use std::fs;
use std::io;
use std::path::Path;

use crate::time::system_time_secs;
use crate::types::{EntryStat, RawEntry};

/// The two primitives the engine consumes from the filesystem layer.
pub trait FsBackend: Send + Sync {
    /// Enumerates the names directly under `path`.
    fn read_entries(&self, path: &Path) -> io::Result<Vec<RawEntry>>;

    /// Reads size and timestamps for a single path.
    fn stat(&self, path: &Path) -> io::Result<EntryStat>;
}

/// [`FsBackend`] over the local disk.
///
/// Neither primitive follows symlinks: `read_entries` reports a link as a
/// link, never as a directory, and `stat` describes the link itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FsBackend for LocalFs {
    fn read_entries(&self, path: &Path) -> io::Result<Vec<RawEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    log::debug!("skipping unreadable entry in {}: {}", path.display(), error);
                    continue;
                }
            };
            let (is_dir, is_symlink) = entry
                .file_type()
                .map(|file_type| (file_type.is_dir(), file_type.is_symlink()))
                .unwrap_or((false, false));
            entries.push(RawEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
                is_symlink,
            });
        }
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<EntryStat> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(EntryStat {
            size: metadata.len(),
            modified_at: system_time_secs(metadata.modified()),
            created_at: system_time_secs(metadata.created()),
        })
    }
}
