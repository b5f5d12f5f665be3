//! Cross-Platform Path Utilities
//!
//! Functions for resolving the service's directories across platforms.
//! Everything lives under ~/.ml-analysis/ unless overridden in config.json.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the service directory (~/.ml-analysis/)
pub fn app_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".ml-analysis"))
}

/// Get the config file path (~/.ml-analysis/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

/// Get the default database file path (~/.ml-analysis/analysis.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("analysis.db"))
}

/// Get the default staging directory for uploaded payloads (~/.ml-analysis/staging/)
pub fn staging_dir() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("staging"))
}

/// Get the default root of stored dataset files (~/.ml-analysis/files/)
pub fn storage_root() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("files"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the service directory, creating if it doesn't exist
pub fn ensure_app_dir() -> AppResult<PathBuf> {
    let path = app_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
