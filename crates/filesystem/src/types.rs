//! Entry types shared by listing, caching and scanning.
//!
//! `DirectoryEntry` is serialized as-is by the service layer; the raw types
//! are what an [`FsBackend`](crate::backend::FsBackend) hands back.

use serde::{Deserialize, Serialize};

/// One entry of a directory listing.
///
/// When `stat` fails for reasons other than the entry vanishing, the entry is
/// still listed with `read_error` set and `size` zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    /// Absolute path of the entry.
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// Unix seconds, 0 when unknown.
    pub modified_at: u64,
    /// Unix seconds, 0 when unknown or unsupported by the platform.
    pub created_at: u64,
    pub read_error: bool,
}

/// A name produced by enumerating a directory, before any `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub is_dir: bool,
    /// The entry itself is a symbolic link (never set together with `is_dir`).
    pub is_symlink: bool,
}

impl RawEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            is_symlink: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            is_symlink: false,
        }
    }

    pub fn symlink(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            is_symlink: true,
        }
    }
}

/// Metadata returned by a single `stat` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryStat {
    pub size: u64,
    pub modified_at: u64,
    pub created_at: u64,
}
