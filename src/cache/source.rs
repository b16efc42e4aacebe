//! Byte sources for volume assets

use std::io;
use std::path::{Path, PathBuf};

/// Where the volume cache reads asset files from
pub trait AssetSource: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads assets from the local filesystem, relative to an optional root
#[derive(Clone, Debug, Default)]
pub struct FsSource {
    root: Option<PathBuf>,
}

impl FsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl AssetSource for FsSource {
    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_source_with_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.json"), b"[]").unwrap();

        let source = FsSource::with_root(dir.path());
        assert!(source.exists(Path::new("model.json")));
        assert!(!source.exists(Path::new("other.json")));
        assert_eq!(source.read(Path::new("model.json")).unwrap(), b"[]");
        assert!(source.read(Path::new("other.json")).is_err());
    }
}
