//! Temporary directory management for tests.
//!
//! [`TestDir`] wraps [`tempfile::TempDir`] with helpers for the files the
//! console writes: saved identification images and configuration files.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory removed on drop.
///
/// Every helper panics on I/O failure.
///
/// # Example
///
/// ```
/// use fingerprint_portal_test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.write("fingerprint-portal.toml", "endpoint = \"http://127.0.0.1:8000\"\n");
/// assert_eq!(dir.file_names(), vec!["fingerprint-portal.toml".to_string()]);
/// ```
pub struct TestDir {
    inner: TempDir,
}

impl TestDir {
    /// Creates an empty directory under the system temp dir.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: TempDir::new().expect("create scratch directory") }
    }

    /// Absolute path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// `path` resolved inside the directory.
    #[must_use]
    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.path().join(path)
    }

    /// Writes `contents` to `path` and returns the absolute path.
    pub fn write<P: AsRef<Path>>(&self, path: P, contents: impl AsRef<[u8]>) -> PathBuf {
        let full = self.join(path);
        std::fs::write(&full, contents).expect("write scratch file");
        full
    }

    /// Reads `path` back.
    #[must_use]
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Vec<u8> {
        std::fs::read(self.join(path)).expect("read scratch file")
    }

    /// Sorted names of the top-level entries.
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .expect("list scratch directory")
            .map(|entry| {
                entry.expect("read directory entry").file_name().to_string_lossy().into()
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
