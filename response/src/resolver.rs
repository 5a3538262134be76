//! Mapping calibration keys to local files.
//!
//! Every component in a telescope chain is named by a calibration key such as
//! `optic_msfc_x7` or `cdte2_rmf`. A [`CalibrationResolver`] turns a key and a
//! version into a path on disk. Nothing here downloads or caches; the caller
//! is expected to have the calibration tree available locally.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// No file exists for a key and version under any known extension
#[derive(Debug, Error, Clone, PartialEq)]
#[error("No calibration file for '{key}' version {version} (searched: {})", join_paths(.searched))]
pub struct NotFoundError {
    pub key: String,
    pub version: String,
    /// Every candidate path that was tried
    pub searched: Vec<PathBuf>,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps a calibration key and version to a local file.
///
/// Implementations must not download anything; a missing file is a
/// [`NotFoundError`], never a fallback to another version.
pub trait CalibrationResolver {
    fn resolve(&self, key: &str, version: &str) -> Result<PathBuf, NotFoundError>;
}

/// Extensions tried, in order, for each key
pub const EXTENSIONS: [&str; 2] = ["csv", "json"];

/// Resolves `<root>/<key>_v<version>.csv`, then `.json`
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name a key and version are stored under
    pub fn file_name(key: &str, version: &str, extension: &str) -> String {
        format!("{key}_v{version}.{extension}")
    }
}

impl CalibrationResolver for DirectoryResolver {
    fn resolve(&self, key: &str, version: &str) -> Result<PathBuf, NotFoundError> {
        let candidates: Vec<PathBuf> = EXTENSIONS
            .iter()
            .map(|ext| self.root.join(Self::file_name(key, version, ext)))
            .collect();
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => {
                log::debug!("resolved {key} v{version} -> {}", path.display());
                Ok(path.clone())
            }
            None => Err(NotFoundError {
                key: key.to_string(),
                version: version.to_string(),
                searched: candidates,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_csv_then_json() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = DirectoryResolver::new(dir.path());

        std::fs::write(dir.path().join("optic_v2.json"), "{}").unwrap();
        assert_eq!(
            resolver.resolve("optic", "2").unwrap(),
            dir.path().join("optic_v2.json")
        );

        std::fs::write(dir.path().join("optic_v2.csv"), "energy[keV],a\n1,1\n").unwrap();
        assert_eq!(
            resolver.resolve("optic", "2").unwrap(),
            dir.path().join("optic_v2.csv")
        );
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectoryResolver::new(dir.path())
            .resolve("cdte2_rmf", "1")
            .unwrap_err();
        assert_eq!(err.key, "cdte2_rmf");
        assert_eq!(err.searched.len(), 2);
        assert!(err.to_string().contains("cdte2_rmf_v1.json"));
    }
}
