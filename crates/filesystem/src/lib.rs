//! Filesystem listing, caching and subtree statistics.
//!
//! This crate provides the synchronous engine behind the directory browser:
//! - Batched directory listing over a pluggable backend
//! - A TTL/FIFO cache of directory listings
//! - A single-pass statistics scanner (categories, large/recent/redundant
//!   files, name+size duplicate groups)
//! - Paging over retained duplicate groups

pub mod backend;
pub mod category;
pub mod dir_cache;
pub mod duplicates;
pub mod error;
pub mod listing;
pub mod scanner;
pub mod time;
pub mod types;

// Re-export main types
pub use backend::{FsBackend, LocalFs};
pub use category::{Category, CategoryBucket, CategoryTotals};
pub use dir_cache::{mutation_targets, DirectoryCache, CACHE_TTL, MAX_CACHE_SIZE};
pub use duplicates::{paginate, DuplicateGroup, DuplicatePage};
pub use error::{FilesystemError, Result};
pub use listing::{list_directory, STAT_BATCH_SIZE};
pub use scanner::{scan_subtree, FileSummary, ScanConfig, ScanOutcome, ScanResult};
pub use types::{DirectoryEntry, EntryStat, RawEntry};
