//! Local upload/output storage and zip archiving.
//!
//! This crate provides:
//! - Upload and output directory layout per job
//! - Upload filename sanitization and extension checks
//! - Output listing and traversal-safe file lookup
//! - Deterministic zip archives of a job's outputs

pub mod archive;
pub mod config;
pub mod error;
pub mod local;
pub mod sanitize;

pub use archive::archive_directory;
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use local::LocalStorage;
pub use sanitize::{extension_of, is_allowed_video, sanitize_filename, ALLOWED_VIDEO_EXTENSIONS};
