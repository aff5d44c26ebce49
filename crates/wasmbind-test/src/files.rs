//! On-disk fixtures and integrity helpers.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Lowercase hex SHA-256 digest, the format module hashes are declared in.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Create a temporary directory for a test.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

/// Write `contents` to `dir/name` and return the full path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn write_file_round_trip() {
        let dir = temp_dir();
        let path = write_file(dir.path(), "module.wasm", b"\0asm");
        assert_eq!(std::fs::read(path).unwrap(), b"\0asm");
    }
}
