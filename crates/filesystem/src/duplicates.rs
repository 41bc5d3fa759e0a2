//! Heuristic duplicate detection and paging.
//!
//! Two files are considered duplicates when they share size and basename.
//! No content is read, so unrelated files can collide and renamed copies are
//! missed.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DuplicateKey {
    pub size: u64,
    pub basename: String,
}

/// Paths sharing one [`DuplicateKey`]. Always holds at least two paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub name: String,
    pub size: u64,
    pub paths: Vec<String>,
}

impl DuplicateGroup {
    /// Bytes freed by keeping a single copy.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size
            .saturating_mul(self.paths.len().saturating_sub(1) as u64)
    }
}

/// Multimap from [`DuplicateKey`] to every path seen with that key.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    buckets: FnvHashMap<DuplicateKey, Vec<String>>,
}

impl DuplicateIndex {
    pub fn insert(&mut self, size: u64, basename: &str, path: String) {
        self.buckets
            .entry(DuplicateKey {
                size,
                basename: basename.to_string(),
            })
            .or_default()
            .push(path);
    }

    /// Materializes keys with two or more paths.
    ///
    /// Paths inside a group are sorted. Groups are ordered by reclaimable
    /// bytes, then size (both descending), then name, so the output does not
    /// depend on walk order.
    pub fn into_groups(self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = self
            .buckets
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(key, mut paths)| {
                paths.sort();
                DuplicateGroup {
                    name: key.basename,
                    size: key.size,
                    paths,
                }
            })
            .collect();
        groups.sort_by(|a, b| {
            b.reclaimable_bytes()
                .cmp(&a.reclaimable_bytes())
                .then_with(|| b.size.cmp(&a.size))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.paths.cmp(&b.paths))
        });
        groups
    }
}

/// Total reclaimable bytes over all groups.
pub fn reclaimable_total(groups: &[DuplicateGroup]) -> u64 {
    groups
        .iter()
        .map(DuplicateGroup::reclaimable_bytes)
        .fold(0u64, u64::saturating_add)
}

/// One page of a retained duplicate-group list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePage {
    pub groups: Vec<DuplicateGroup>,
    /// Length of the full list.
    pub total: usize,
    pub page_index: usize,
    pub page_size: usize,
}

/// Slices `groups[page_index * page_size ..]`. Out-of-range pages are empty.
pub fn paginate(groups: &[DuplicateGroup], page_index: usize, page_size: usize) -> DuplicatePage {
    let start = page_index.checked_mul(page_size).unwrap_or(usize::MAX);
    let slice = if page_size == 0 || start >= groups.len() {
        &[][..]
    } else {
        let end = start.saturating_add(page_size).min(groups.len());
        &groups[start..end]
    };
    DuplicatePage {
        groups: slice.to_vec(),
        total: groups.len(),
        page_index,
        page_size,
    }
}
