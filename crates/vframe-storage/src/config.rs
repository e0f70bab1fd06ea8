//! Storage configuration.

use std::path::PathBuf;

/// Root directories for uploads and outputs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Saved uploads, one file per job
    pub upload_dir: PathBuf,
    /// Extracted frames, one directory per job
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }

    /// Config rooted under one directory, as used by tests.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
        }
    }
}
