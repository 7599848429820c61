//! Versioned model registry.
//!
//! The registry root holds one directory per promoted model, named by an
//! integer version. The numerically largest version is the champion.
//! Plain files at the root are ignored; any other directory name makes the
//! registry malformed.

use crate::error::RegistryError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ModelResolver {
    root: PathBuf,
    model_file_name: String,
}

impl ModelResolver {
    pub fn new(root: impl Into<PathBuf>, model_file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model_file_name: model_file_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_file_name(&self) -> &str {
        &self.model_file_name
    }

    /// All version numbers, ascending. A missing root has no versions.
    pub fn versions(&self) -> Result<Vec<u64>, RegistryError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let io_err = |source| RegistryError::Io {
            root: self.root.clone(),
            source,
        };
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let version = name.parse::<u64>().map_err(|_| RegistryError::Malformed {
                root: self.root.clone(),
                entry: name.clone(),
            })?;
            versions.push(version);
        }
        versions.sort_unstable();
        Ok(versions)
    }

    pub fn latest_version(&self) -> Result<Option<u64>, RegistryError> {
        Ok(self.versions()?.last().copied())
    }

    /// Directory of a given version.
    pub fn version_dir(&self, version: u64) -> PathBuf {
        self.root.join(version.to_string())
    }

    /// Model file path of the newest version.
    pub fn latest_version_path(&self) -> Result<PathBuf, RegistryError> {
        let version = self
            .latest_version()?
            .ok_or_else(|| RegistryError::NotFound {
                root: self.root.clone(),
            })?;
        let version_dir = self.version_dir(version);
        let model_path = version_dir.join(&self.model_file_name);
        if !model_path.is_file() {
            return Err(RegistryError::MissingModelFile { version_dir });
        }
        Ok(model_path)
    }

    /// Whether a usable champion exists. A newest version without its model
    /// file counts as absent.
    pub fn exists(&self) -> Result<bool, RegistryError> {
        match self.latest_version_path() {
            Ok(_) => Ok(true),
            Err(RegistryError::NotFound { .. } | RegistryError::MissingModelFile { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Version number the next promotion will use.
    pub fn next_version(&self) -> Result<u64, RegistryError> {
        Ok(self.latest_version()?.map_or(1, |v| v + 1))
    }

    /// Model file path for a version that does not exist yet.
    pub fn model_path_for(&self, version: u64) -> PathBuf {
        self.version_dir(version).join(&self.model_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(root: &Path, version: &str) {
        let dir = root.join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.bin"), version.as_bytes()).unwrap();
    }

    #[test]
    fn test_numeric_not_lexicographic_max() {
        let dir = TempDir::new().unwrap();
        for v in ["2", "10", "1"] {
            seed(dir.path(), v);
        }
        let resolver = ModelResolver::new(dir.path(), "model.bin");
        assert_eq!(resolver.latest_version().unwrap(), Some(10));
        assert_eq!(
            resolver.latest_version_path().unwrap(),
            dir.path().join("10").join("model.bin")
        );
        assert!(resolver.exists().unwrap());
        assert_eq!(resolver.next_version().unwrap(), 11);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let resolver = ModelResolver::new(dir.path().join("saved_models"), "model.bin");
        assert!(!resolver.exists().unwrap());
        assert_eq!(resolver.next_version().unwrap(), 1);
        assert!(matches!(
            resolver.latest_version_path(),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_version_without_model_file() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "1");
        std::fs::create_dir_all(dir.path().join("2")).unwrap();
        let resolver = ModelResolver::new(dir.path(), "model.bin");

        assert!(!resolver.exists().unwrap());
        assert!(matches!(
            resolver.latest_version_path(),
            Err(RegistryError::MissingModelFile { .. })
        ));
    }

    #[test]
    fn test_plain_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "3");
        std::fs::write(dir.path().join("README"), b"notes").unwrap();
        let resolver = ModelResolver::new(dir.path(), "model.bin");
        assert_eq!(resolver.latest_version().unwrap(), Some(3));
    }

    #[test]
    fn test_non_integer_directory_is_malformed() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "1");
        std::fs::create_dir_all(dir.path().join("latest")).unwrap();
        let resolver = ModelResolver::new(dir.path(), "model.bin");
        assert!(matches!(
            resolver.exists(),
            Err(RegistryError::Malformed { ref entry, .. }) if entry == "latest"
        ));
    }
}
