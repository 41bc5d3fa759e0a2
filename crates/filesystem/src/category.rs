//! File categories used by the statistics scanner.
//!
//! Classification walks [`CATEGORY_TABLE`] in order and takes the first
//! bucket whose extension list matches; anything else is
//! [`Category::Others`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Images,
    Videos,
    Audio,
    Docs,
    Apps,
    Others,
}

/// Ordered extension table. `Others` has no row: it is the fallback arm.
pub const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Images,
        &[
            "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff", "heic", "raw",
        ],
    ),
    (
        Category::Videos,
        &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg"],
    ),
    (
        Category::Audio,
        &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "opus"],
    ),
    (
        Category::Docs,
        &[
            "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md", "rtf", "odt", "ods",
            "odp", "csv",
        ],
    ),
    (
        Category::Apps,
        &["exe", "msi", "dmg", "pkg", "app", "deb", "rpm", "apk", "appimage"],
    ),
];

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Images,
        Category::Videos,
        Category::Audio,
        Category::Docs,
        Category::Apps,
        Category::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Audio => "audio",
            Self::Docs => "docs",
            Self::Apps => "apps",
            Self::Others => "others",
        }
    }

    /// Maps a lowercase extension (without the dot) to its bucket.
    pub fn classify(extension: Option<&str>) -> Category {
        let Some(extension) = extension else {
            return Category::Others;
        };
        CATEGORY_TABLE
            .iter()
            .find(|(_, extensions)| extensions.contains(&extension))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Others)
    }

    /// Extensions that map to this bucket. Empty for `Others`.
    pub fn extensions(self) -> &'static [&'static str] {
        CATEGORY_TABLE
            .iter()
            .find(|(category, _)| *category == self)
            .map(|(_, extensions)| *extensions)
            .unwrap_or(&[])
    }
}

/// Lowercased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Running totals for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBucket {
    /// Cumulative bytes.
    pub size: u64,
    pub count: u64,
    pub extensions: Vec<String>,
}

impl CategoryBucket {
    fn empty(category: Category) -> Self {
        Self {
            size: 0,
            count: 0,
            extensions: category
                .extensions()
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// All six buckets, always present even when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTotals(BTreeMap<Category, CategoryBucket>);

impl Default for CategoryTotals {
    fn default() -> Self {
        Self(
            Category::ALL
                .iter()
                .map(|category| (*category, CategoryBucket::empty(*category)))
                .collect(),
        )
    }
}

impl CategoryTotals {
    pub fn record(&mut self, category: Category, size: u64) {
        let bucket = self
            .0
            .entry(category)
            .or_insert_with(|| CategoryBucket::empty(category));
        bucket.size += size;
        bucket.count += 1;
    }

    pub fn get(&self, category: Category) -> Option<&CategoryBucket> {
        self.0.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &CategoryBucket)> {
        self.0.iter()
    }
}
