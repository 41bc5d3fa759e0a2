//! Directory listing with batched `stat` calls.
//!
//! Names are enumerated once, then stat'ed in fixed-size batches. Each batch
//! runs in parallel on the rayon pool; batches run one after another, which
//! caps the number of descriptors open at the same time.

use std::io;
use std::path::Path;

use rayon::prelude::*;

use crate::backend::FsBackend;
use crate::error::{FilesystemError, Result};
use crate::types::{DirectoryEntry, EntryStat, RawEntry};

/// Number of `stat` calls issued concurrently per batch.
pub const STAT_BATCH_SIZE: usize = 100;

/// Stats `entries` (children of `dir`) in batches of [`STAT_BATCH_SIZE`].
///
/// Results keep the input order.
pub fn stat_batched<'a, B>(
    backend: &B,
    dir: &Path,
    entries: &'a [RawEntry],
) -> Vec<(&'a RawEntry, io::Result<EntryStat>)>
where
    B: FsBackend + ?Sized,
{
    let mut results = Vec::with_capacity(entries.len());
    for batch in entries.chunks(STAT_BATCH_SIZE) {
        let stated: Vec<_> = batch
            .par_iter()
            .map(|raw| (raw, backend.stat(&dir.join(&raw.name))))
            .collect();
        results.extend(stated);
    }
    results
}

/// Lists `dir`, directories first, then by name.
///
/// Failing to enumerate `dir` itself is an error. Per-entry failures are not:
/// an entry that vanished before its `stat` is dropped, any other failure
/// keeps the entry with `read_error` set.
pub fn list_directory<B>(backend: &B, dir: &Path) -> Result<Vec<DirectoryEntry>>
where
    B: FsBackend + ?Sized,
{
    let raw = backend
        .read_entries(dir)
        .map_err(|error| FilesystemError::from_io(dir, error))?;

    let mut entries = Vec::with_capacity(raw.len());
    for (raw_entry, stat) in stat_batched(backend, dir, &raw) {
        let path = dir.join(&raw_entry.name);
        let entry = match stat {
            Ok(stat) => DirectoryEntry {
                name: raw_entry.name.clone(),
                path: path.to_string_lossy().into_owned(),
                is_directory: raw_entry.is_dir,
                size: stat.size,
                modified_at: stat.modified_at,
                created_at: stat.created_at,
                read_error: false,
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::debug!("entry vanished before stat: {}", path.display());
                continue;
            }
            Err(error) => {
                log::debug!("stat failed for {}: {}", path.display(), error);
                DirectoryEntry {
                    name: raw_entry.name.clone(),
                    path: path.to_string_lossy().into_owned(),
                    is_directory: raw_entry.is_dir,
                    size: 0,
                    modified_at: 0,
                    created_at: 0,
                    read_error: true,
                }
            }
        };
        entries.push(entry);
    }

    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalFs;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Serves a fixed set of names and fails `stat` for some of them.
    struct ScriptedFs {
        entries: Vec<RawEntry>,
        stat_calls: AtomicUsize,
    }

    impl FsBackend for ScriptedFs {
        fn read_entries(&self, _path: &Path) -> io::Result<Vec<RawEntry>> {
            Ok(self.entries.clone())
        }

        fn stat(&self, path: &Path) -> io::Result<EntryStat> {
            self.stat_calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            match name {
                "gone" => Err(io::Error::from(io::ErrorKind::NotFound)),
                "locked" => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
                _ => Ok(EntryStat {
                    size: 10,
                    modified_at: 1,
                    created_at: 1,
                }),
            }
        }
    }

    #[test]
    fn lists_real_directory_sorted() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), b"bb").expect("write");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        fs::create_dir(dir.path().join("zdir")).expect("mkdir");

        let entries = list_directory(&LocalFs, dir.path()).expect("list");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zdir", "a.txt", "b.txt"]);
        assert!(entries[0].is_directory);
        assert_eq!(entries[2].size, 2);
        assert!(entries.iter().all(|e| !e.read_error));
    }

    #[test]
    fn stat_failures_flag_or_drop_entries() {
        let backend = ScriptedFs {
            entries: vec![
                RawEntry::file("ok"),
                RawEntry::file("gone"),
                RawEntry::file("locked"),
            ],
            stat_calls: AtomicUsize::new(0),
        };
        let entries = list_directory(&backend, Path::new("/virtual")).expect("list");
        assert_eq!(entries.len(), 2);

        let locked = entries.iter().find(|e| e.name == "locked").expect("locked");
        assert!(locked.read_error);
        assert_eq!(locked.size, 0);
        assert_eq!(locked.path, "/virtual/locked");

        let ok = entries.iter().find(|e| e.name == "ok").expect("ok");
        assert!(!ok.read_error);
        assert_eq!(ok.size, 10);
    }

    #[test]
    fn stats_every_entry_across_batches() {
        let entries: Vec<_> = (0..(STAT_BATCH_SIZE * 2 + 7))
            .map(|i| RawEntry::file(format!("f{i:04}")))
            .collect();
        let backend = ScriptedFs {
            entries,
            stat_calls: AtomicUsize::new(0),
        };
        let listed = list_directory(&backend, Path::new("/virtual")).expect("list");
        assert_eq!(listed.len(), STAT_BATCH_SIZE * 2 + 7);
        assert_eq!(
            backend.stat_calls.load(Ordering::SeqCst),
            STAT_BATCH_SIZE * 2 + 7
        );
        assert_eq!(listed[0].name, "f0000");
    }

    /// Records how many `stat` calls overlap and whether any call starts
    /// before every call of the previous batch has returned.
    #[derive(Default)]
    struct BatchTrackingFs {
        count: usize,
        active: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
        early_starts: AtomicUsize,
    }

    impl FsBackend for BatchTrackingFs {
        fn read_entries(&self, _path: &Path) -> io::Result<Vec<RawEntry>> {
            Ok((0..self.count)
                .map(|i| RawEntry::file(format!("f{i:04}")))
                .collect())
        }

        fn stat(&self, path: &Path) -> io::Result<EntryStat> {
            let index: usize = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix('f'))
                .and_then(|digits| digits.parse().ok())
                .expect("indexed name");
            let batch = index / STAT_BATCH_SIZE;
            if self.finished.load(Ordering::SeqCst) < batch * STAT_BATCH_SIZE {
                self.early_starts.fetch_add(1, Ordering::SeqCst);
            }

            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(1));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(EntryStat::default())
        }
    }

    #[test]
    fn batches_run_one_after_another() {
        let backend = BatchTrackingFs {
            count: STAT_BATCH_SIZE * 3 + 11,
            ..BatchTrackingFs::default()
        };
        let listed = list_directory(&backend, Path::new("/virtual")).expect("list");

        assert_eq!(listed.len(), STAT_BATCH_SIZE * 3 + 11);
        assert_eq!(backend.finished.load(Ordering::SeqCst), STAT_BATCH_SIZE * 3 + 11);
        assert_eq!(backend.early_starts.load(Ordering::SeqCst), 0);
        let peak = backend.peak.load(Ordering::SeqCst);
        assert!((1..=STAT_BATCH_SIZE).contains(&peak), "peak {peak}");
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let error = list_directory(&LocalFs, &dir.path().join("missing")).expect_err("missing");
        assert!(matches!(error, FilesystemError::NotFound(_)));
    }
}
