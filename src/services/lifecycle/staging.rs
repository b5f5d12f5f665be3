//! Payload Staging
//!
//! Copies incoming payloads into temporary files under the staging
//! directory. The staged file keeps the original extension so format
//! detection on the path still works, and is removed when its `TempPath`
//! is dropped.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;

use ml_analysis_core::AnalysisError;

use crate::models::analysis::DatasetReference;

/// A payload on disk for the duration of one run
#[derive(Debug)]
pub struct StagedPayload {
    path: TempPath,
    file_name: String,
}

impl StagedPayload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Reference the loader reads from
    pub fn reference(&self) -> DatasetReference {
        DatasetReference::new(PathBuf::from(&*self.path), self.file_name.clone())
    }
}

fn temp_file(staging_dir: &Path, file_name: &str) -> io::Result<tempfile::NamedTempFile> {
    std::fs::create_dir_all(staging_dir)?;
    let suffix = Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(staging_dir)
}

/// Write uploaded bytes to a staged file
pub fn stage_bytes(
    staging_dir: &Path,
    bytes: &[u8],
    file_name: &str,
) -> Result<StagedPayload, AnalysisError> {
    let mut file = temp_file(staging_dir, file_name)
        .map_err(|e| AnalysisError::orchestration(format!("Failed to stage upload: {}", e)))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| {
            AnalysisError::orchestration(format!("Failed to write staged upload: {}", e))
        })?;

    let path = file.into_temp_path();
    debug!("Staged {} ({} bytes) at {}", file_name, bytes.len(), path.display());
    Ok(StagedPayload {
        path,
        file_name: file_name.to_string(),
    })
}

/// Copy a stored dataset into a staged file
pub fn stage_file(
    staging_dir: &Path,
    source: &Path,
    file_name: &str,
) -> Result<StagedPayload, AnalysisError> {
    let mut input = File::open(source).map_err(|e| {
        AnalysisError::dataset_load(format!("Cannot read stored file {}: {}", source.display(), e))
    })?;
    let mut file = temp_file(staging_dir, file_name)
        .map_err(|e| AnalysisError::orchestration(format!("Failed to stage stored file: {}", e)))?;
    let copied = io::copy(&mut input, &mut file)
        .and_then(|n| file.flush().map(|_| n))
        .map_err(|e| AnalysisError::dataset_load(format!("Failed to copy stored file: {}", e)))?;

    let path = file.into_temp_path();
    debug!("Staged {} ({} bytes) at {}", file_name, copied, path.display());
    Ok(StagedPayload {
        path,
        file_name: file_name.to_string(),
    })
}
