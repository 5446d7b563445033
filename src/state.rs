//! Application State
//!
//! Process-wide state of the embedding shell: database, configuration and the
//! dialer built from them.

use std::sync::Arc;
use tokio::sync::RwLock;

use crm_dialer_core::HostPorts;

use crate::models::settings::{DialerConfig, DialerConfigUpdate};
use crate::services::dialer::Dialer;
use crate::storage::{ConfigService, Database};
use crate::utils::error::{AppError, AppResult};

/// Application state shared with the UI layer
pub struct AppState {
    /// SQLite database with connection pool
    database: Arc<RwLock<Option<Database>>>,
    /// Configuration service for dialer settings
    config: Arc<RwLock<Option<ConfigService>>>,
    /// Host ports the dialer was built with, kept for rebuilds
    ports: Arc<RwLock<Option<HostPorts>>>,
    dialer: Arc<RwLock<Option<Dialer>>>,
    /// Whether the state has been initialized
    initialized: Arc<RwLock<bool>>,
}

impl AppState {
    /// Create a new uninitialized app state
    pub fn new() -> Self {
        Self {
            database: Arc::new(RwLock::new(None)),
            config: Arc::new(RwLock::new(None)),
            ports: Arc::new(RwLock::new(None)),
            dialer: Arc::new(RwLock::new(None)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize all services from the default locations under `~/.crm-dialer`
    pub async fn initialize(&self, ports: HostPorts) -> AppResult<()> {
        self.initialize_with(Database::new()?, ConfigService::new()?, ports)
            .await
    }

    /// Initialize all services from explicit storage
    pub async fn initialize_with(
        &self,
        database: Database,
        config: ConfigService,
        ports: HostPorts,
    ) -> AppResult<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        let dialer = Dialer::from_config(config.get_config(), ports.clone(), database.clone())?;

        *self.database.write().await = Some(database);
        *self.config.write().await = Some(config);
        *self.ports.write().await = Some(ports);
        *self.dialer.write().await = Some(dialer);

        *initialized = true;
        tracing::info!("Application state initialized");
        Ok(())
    }

    /// Check if database is healthy
    pub fn is_database_healthy(&self) -> bool {
        // Use try_read to avoid blocking
        if let Ok(guard) = self.database.try_read() {
            if let Some(ref db) = *guard {
                return db.is_healthy();
            }
        }
        false
    }

    /// Check if config is healthy
    pub fn is_config_healthy(&self) -> bool {
        if let Ok(guard) = self.config.try_read() {
            if let Some(ref config) = *guard {
                return config.is_healthy();
            }
        }
        false
    }

    /// Get the current configuration
    pub async fn get_config(&self) -> AppResult<DialerConfig> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.get_config().clone()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Update the configuration and rebuild the dialer with it.
    ///
    /// The previous dialer is torn down; its active call, if any, is recorded.
    pub async fn update_config(&self, update: DialerConfigUpdate) -> AppResult<DialerConfig> {
        let updated = {
            let mut guard = self.config.write().await;
            match &mut *guard {
                Some(config) => config.update_config(update)?,
                None => return Err(AppError::config("Config service not initialized")),
            }
        };

        let database = self
            .database
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::database("Database not initialized"))?;
        let ports = self
            .ports
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::internal("Host ports not initialized"))?;

        let rebuilt = Dialer::from_config(&updated, ports, database)?;
        let mut dialer = self.dialer.write().await;
        if let Some(previous) = dialer.replace(rebuilt) {
            previous.teardown();
        }
        tracing::info!("Dialer rebuilt with updated configuration");
        Ok(updated)
    }

    /// Get a handle to the dialer
    pub async fn dialer(&self) -> AppResult<Dialer> {
        let guard = self.dialer.read().await;
        match &*guard {
            Some(dialer) => Ok(dialer.clone()),
            None => Err(AppError::internal("Dialer not initialized")),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("initialized", &self.initialized)
            .finish()
    }
}
