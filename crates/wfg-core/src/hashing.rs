use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Hex SHA-256 of raw bytes.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content digest of a file. Metadata (mtime, permissions) is not hashed.
///
/// The baseline and reference registries both go through this function so
/// their digests stay comparable.
pub fn digest_file(path: &Path) -> Result<String, HashError> {
    let bytes = std::fs::read(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(digest_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn digest_is_content_only() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        std::fs::write(&a, b"print('hi')\n").unwrap();
        std::fs::write(&b, b"print('hi')\n").unwrap();

        let da = digest_file(&a).unwrap();
        assert_eq!(da, digest_file(&b).unwrap());
        assert_eq!(da.len(), 64);
        assert_eq!(da, digest_bytes(b"print('hi')\n"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = digest_file(&dir.path().join("gone.py")).unwrap_err();
        assert!(matches!(err, HashError::Io { .. }));
    }
}
