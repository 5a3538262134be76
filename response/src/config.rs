//! Persistent settings for response assembly.
//!
//! Stored as pretty-printed JSON so it can be checked in next to a
//! calibration tree and edited by hand.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::Extrapolation;
use crate::resolver::DirectoryResolver;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_version() -> String {
    "1".to_string()
}

/// Where calibration files live and which versions to use.
///
/// Keys missing from `versions` use `default_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Directory holding `<key>_v<version>` calibration files
    pub data_dir: PathBuf,

    /// Version used for keys without an override
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Per-key version overrides
    #[serde(default)]
    pub versions: BTreeMap<String, String>,

    #[serde(default)]
    pub extrapolation: Extrapolation,
}

impl ResponseConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            default_version: default_version(),
            versions: BTreeMap::new(),
            extrapolation: Extrapolation::default(),
        }
    }

    /// Resolver over `data_dir`
    pub fn resolver(&self) -> DirectoryResolver {
        DirectoryResolver::new(&self.data_dir)
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
