//! JSON documents stored as individual files in the data directory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

const JSON_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// File backing document `name`; `.json` is appended when missing.
    pub fn document_path(&self, name: &str) -> CoreResult<PathBuf> {
        check_name(name)?;
        if name.ends_with(JSON_SUFFIX) {
            Ok(self.root.join(name))
        } else {
            Ok(self.root.join(format!("{name}{JSON_SUFFIX}")))
        }
    }

    /// Replaces document `name`. The payload goes to a sibling temp file
    /// first, so readers never observe a half-written document.
    pub async fn write_json<T>(&self, name: &str, data: &T) -> CoreResult<()>
    where
        T: Serialize + ?Sized,
    {
        let path = self.document_path(name)?;
        let payload = serde_json::to_vec_pretty(data)
            .map_err(|error| CoreError::Internal(format!("encode {name}: {error}")))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| io_error(&self.root, error))?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload)
            .await
            .map_err(|error| io_error(&staging, error))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|error| io_error(&path, error))
    }

    /// Reads document `name`; `Ok(None)` when it has never been written.
    pub async fn read_json<T>(&self, name: &str) -> CoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.document_path(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(io_error(&path, error)),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|error| {
            CoreError::InvalidInput(format!("malformed {}: {error}", path.display()))
        })
    }
}

/// Document names are single path components.
fn check_name(name: &str) -> CoreResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name == JSON_SUFFIX;
    if bad {
        Err(CoreError::InvalidInput(format!("invalid document name {name:?}")))
    } else {
        Ok(())
    }
}

fn io_error(path: &Path, error: io::Error) -> CoreError {
    CoreError::Io(format!("{}: {error}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn documents_persist_under_root() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("storage"));
        let value = serde_json::json!({ "apps": ["Mail"] });
        storage.write_json("snapshot", &value).await.expect("write");

        assert!(dir.path().join("storage/snapshot.json").exists());
        assert!(!dir.path().join("storage/snapshot.json.tmp").exists());
        let loaded: serde_json::Value = storage
            .read_json("snapshot.json")
            .await
            .expect("read")
            .expect("value");
        assert_eq!(value, loaded);
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let dir = tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().to_path_buf());
        let loaded: Option<serde_json::Value> = storage.read_json("absent").await.expect("read");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn malformed_document_is_invalid_input() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.json"), b"{ not json").expect("write");
        let storage = FileStorage::new(dir.path().to_path_buf());
        let err = storage
            .read_json::<serde_json::Value>("broken")
            .await
            .expect_err("malformed");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn names_with_separators_are_rejected() {
        let storage = FileStorage::new(PathBuf::from("/data"));
        for name in ["", "..", "a/b", "a\\b"] {
            assert!(storage.document_path(name).is_err(), "{name:?}");
        }
    }
}
