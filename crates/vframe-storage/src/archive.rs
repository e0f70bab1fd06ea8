//! Zip archives of job outputs.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{StorageError, StorageResult};

/// Deflate every regular file in `dir` into an in-memory zip.
///
/// Entries sit at the archive root, sorted by name, with a fixed timestamp
/// and permissions; the same directory always yields the same bytes.
/// Subdirectories are skipped. Blocking; call from `spawn_blocking`.
pub fn archive_directory(dir: &Path) -> StorageResult<Vec<u8>> {
    let mut entries = regular_files(dir)?;
    entries.sort();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, path) in &entries {
        writer.start_file(name.as_str(), options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut writer)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn regular_files(dir: &Path) -> StorageResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().into_string().map_err(|raw| {
            StorageError::invalid_path(format!("non UTF-8 file name {:?}", raw))
        })?;
        files.push((name, entry.path()));
    }
    Ok(files)
}
