//! Filesystem layout for uploads and outputs.
//!
//! Uploads live at `{upload_dir}/{job_id}_{filename}` and are removed once
//! their job finishes. Outputs live under `{output_dir}/{job_id}/` and are
//! kept.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use vframe_models::TaskId;

use crate::archive::archive_directory;
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Local disk storage rooted at the configured directories.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    config: StorageConfig,
}

impl LocalStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(StorageConfig::from_env())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create both root directories.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        Ok(())
    }

    /// Where the upload of `job_id` is stored; `filename` must already be sanitized.
    pub fn input_path(&self, job_id: &TaskId, filename: &str) -> PathBuf {
        self.config
            .upload_dir
            .join(format!("{}_{}", job_id, filename))
    }

    pub fn job_output_dir(&self, job_id: &TaskId) -> PathBuf {
        self.config.output_dir.join(job_id.as_str())
    }

    /// Create and return the output directory of `job_id`.
    pub async fn create_job_output_dir(&self, job_id: &TaskId) -> StorageResult<PathBuf> {
        let dir = self.job_output_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Persist an upload. A partially written file is removed on failure.
    pub async fn save_upload(
        &self,
        job_id: &TaskId,
        filename: &str,
        data: &[u8],
    ) -> StorageResult<PathBuf> {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let path = self.input_path(job_id, filename);

        if let Err(e) = tokio::fs::write(&path, data).await {
            if let Err(cleanup) = self.remove_input(&path) {
                warn!(path = %path.display(), "Failed to remove partial upload: {}", cleanup);
            }
            return Err(e.into());
        }

        debug!(job_id = %job_id, path = %path.display(), bytes = data.len(), "Saved upload");
        Ok(path)
    }

    /// Delete a saved upload. Returns `false` if it was already gone.
    pub fn remove_input(&self, path: &Path) -> StorageResult<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Write one output file into a job directory.
    pub async fn write_output(
        &self,
        dir: &Path,
        filename: &str,
        bytes: &[u8],
    ) -> StorageResult<PathBuf> {
        let path = dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Names of the regular files in `dir`, sorted.
    pub async fn list_outputs(&self, dir: &Path) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path of `filename` inside `dir`, refusing anything but a plain file name.
    pub async fn resolve_output(&self, dir: &Path, filename: &str) -> StorageResult<PathBuf> {
        if !is_plain_file_name(filename) {
            return Err(StorageError::invalid_path(filename));
        }

        let path = dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::not_found(filename)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(filename)),
            Err(e) => Err(e.into()),
        }
    }

    /// Zip the contents of an output directory.
    pub async fn archive_outputs(&self, dir: &Path) -> StorageResult<Vec<u8>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || archive_directory(&dir)).await?
    }
}

fn is_plain_file_name(filename: &str) -> bool {
    if filename.is_empty() || filename.starts_with('.') || filename.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(filename).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(root: &Path) -> LocalStorage {
        LocalStorage::new(StorageConfig::under(root))
    }

    #[test]
    fn test_layout() {
        let storage = storage(Path::new("/data"));
        let id = TaskId::from_string("abc");

        assert_eq!(
            storage.input_path(&id, "clip.mp4"),
            PathBuf::from("/data/uploads/abc_clip.mp4")
        );
        assert_eq!(storage.job_output_dir(&id), PathBuf::from("/data/outputs/abc"));
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("frame_00000.png"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../secret"));
        assert!(!is_plain_file_name("a/b.png"));
        assert!(!is_plain_file_name("a\\b.png"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name(".env"));
    }

    #[tokio::test]
    async fn test_save_and_remove_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());
        let id = TaskId::new();

        let path = storage.save_upload(&id, "clip.mp4", b"data").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"data");

        assert!(storage.remove_input(&path).unwrap());
        assert!(!storage.remove_input(&path).unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_list_and_resolve_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());
        let id = TaskId::new();

        let dir = storage.create_job_output_dir(&id).await.unwrap();
        storage.write_output(&dir, "frame_00001.png", b"b").await.unwrap();
        storage.write_output(&dir, "frame_00000.png", b"a").await.unwrap();
        tokio::fs::create_dir(dir.join("sub")).await.unwrap();

        let names = storage.list_outputs(&dir).await.unwrap();
        assert_eq!(names, vec!["frame_00000.png", "frame_00001.png"]);

        let resolved = storage.resolve_output(&dir, "frame_00000.png").await.unwrap();
        assert_eq!(resolved, dir.join("frame_00000.png"));

        assert!(storage
            .resolve_output(&dir, "missing.png")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(storage.resolve_output(&dir, "sub").await.unwrap_err().is_not_found());
        assert!(matches!(
            storage.resolve_output(&dir, "../../uploads/x.mp4").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = storage(tmp.path());
        let dir = storage.create_job_output_dir(&TaskId::new()).await.unwrap();
        storage.write_output(&dir, "frame_00000.jpg", b"jpeg").await.unwrap();

        let first = storage.archive_outputs(&dir).await.unwrap();
        let second = storage.archive_outputs(&dir).await.unwrap();
        assert!(first.starts_with(b"PK"));
        assert_eq!(first, second);
    }
}
