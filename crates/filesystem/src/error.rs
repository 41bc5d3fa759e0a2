use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FilesystemError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FilesystemError {
    /// Classifies a raw IO failure on `path` into the error taxonomy.
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, FilesystemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_io_kinds() {
        let path = Path::new("/tmp/missing");
        let not_found = FilesystemError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(not_found, FilesystemError::NotFound(p) if p == path));

        let denied =
            FilesystemError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, FilesystemError::PermissionDenied(_)));

        let other = FilesystemError::from_io(path, io::Error::other("disk on fire"));
        assert!(matches!(other, FilesystemError::Io { .. }));
    }
}
