//! Cross-Platform Path Utilities
//!
//! Resolves the dialer's local data directory (~/.crm-dialer/).

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the dialer data directory (~/.crm-dialer/)
pub fn dialer_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".crm-dialer"))
}

/// Get the config file path (~/.crm-dialer/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(dialer_dir()?.join("config.json"))
}

/// Get the database file path (~/.crm-dialer/dialer.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(dialer_dir()?.join("dialer.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the dialer directory, creating if it doesn't exist
pub fn ensure_dialer_dir() -> AppResult<PathBuf> {
    let path = dialer_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
