//! JSON Configuration Management
//!
//! Handles reading and writing the dialer configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{DialerConfig, DialerConfigUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dialer_dir};

/// Configuration service for the dialer settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: DialerConfig,
}

impl ConfigService {
    /// Create a config service at the default location, loading existing
    /// config or writing defaults
    pub fn new() -> AppResult<Self> {
        ensure_dialer_dir()?;
        Self::open(config_path()?)
    }

    /// Create a config service backed by an explicit file
    pub fn open(config_path: PathBuf) -> AppResult<Self> {
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = DialerConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<DialerConfig> {
        let content = fs::read_to_string(path)?;
        let config: DialerConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &DialerConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &DialerConfig {
        &self.config
    }

    /// Update the configuration with a partial update.
    ///
    /// The update is validated before anything is written; an invalid update
    /// leaves both memory and disk untouched.
    pub fn update_config(&mut self, update: DialerConfigUpdate) -> AppResult<DialerConfig> {
        let mut next = self.config.clone();
        next.apply_update(update);
        Self::save_to_file(&self.config_path, &next)?;
        self.config = next;
        Ok(self.config.clone())
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.config = DialerConfig::default();
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}
