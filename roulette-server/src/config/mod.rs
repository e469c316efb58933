//! Configuration module for roulette-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables. Also handles admin secret hashing.

pub mod file;
pub mod runtime;

use crate::config::file::{FileConfig, RelayConfig};
use crate::config::runtime::{
    AdminConfig, ChannelsConfig, ScheduleConfig, ServerConfig, SharedConfig,
};
use chrono::FixedOffset;
use roulette_core::config::{
    ConfigStore, DispatcherConfig, NotificationConfig, RelayEndpointConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub schedule: ScheduleConfig,
    pub dispatcher: DispatcherConfig,
    pub notifications: NotificationConfig,
    pub channels: ChannelsConfig,
}

impl LoadedConfig {
    /// Split into the shared, reloadable sections.
    pub fn to_shared(&self) -> SharedConfig {
        SharedConfig {
            server: Arc::new(RwLock::new(self.server.clone())),
            admin: Arc::new(RwLock::new(self.admin.clone())),
            dispatcher: ConfigStore::new(self.dispatcher.clone()),
            notifications: ConfigStore::new(self.notifications.clone()),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Hash the admin secret if it's plaintext (and rewrite the file)
    /// 5. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        // Validate before the rewrite so a broken file is never touched.
        validate(&file_config)?;

        if !file_config.is_admin_secret_hashed() {
            file_config.admin.secret = roulette_sdk::config::hash_admin_secret(
                &file_config.admin.secret,
            )
            .map_err(|e| ConfigError::HashError(e.to_string()))?;
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin secret hashed and config file updated");
        }

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        build_loaded_config(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.admin.secret.is_empty() {
        return Err(ConfigError::ValidationError(
            "admin secret must not be empty".to_string(),
        ));
    }
    if config.dispatcher.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher poll_interval_secs must be positive".to_string(),
        ));
    }
    if config.dispatcher.batch_size <= 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher batch_size must be positive".to_string(),
        ));
    }
    if config.dispatcher.claim_lease_secs <= 0 {
        return Err(ConfigError::ValidationError(
            "dispatcher claim_lease_secs must be positive".to_string(),
        ));
    }
    if config.channels.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "channels request_timeout_secs must be positive".to_string(),
        ));
    }
    // A pass delivers its batch one task at a time; every claim must still be
    // held when its outcome is recorded.
    let worst_case_pass = u64::try_from(config.dispatcher.batch_size)
        .ok()
        .and_then(|batch| batch.checked_mul(config.channels.request_timeout_secs));
    let claim_lease = u64::try_from(config.dispatcher.claim_lease_secs).unwrap_or(0);
    if worst_case_pass.is_none_or(|pass| pass >= claim_lease) {
        return Err(ConfigError::ValidationError(format!(
            "dispatcher claim_lease_secs ({}) must exceed batch_size ({}) x channels request_timeout_secs ({})",
            config.dispatcher.claim_lease_secs,
            config.dispatcher.batch_size,
            config.channels.request_timeout_secs,
        )));
    }
    if config.notifications.reminder_lead_hours < 0 || config.notifications.feedback_delay_hours < 0
    {
        return Err(ConfigError::ValidationError(
            "notification offsets must not be negative".to_string(),
        ));
    }
    utc_offset(config.schedule.utc_offset_minutes)?;
    Ok(())
}

fn utc_offset(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!("utc_offset_minutes {minutes} is out of range"))
        })
}

fn relay_endpoint(relay: RelayConfig) -> RelayEndpointConfig {
    RelayEndpointConfig {
        url: relay.url,
        secret: relay.secret,
    }
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        admin,
        schedule,
        dispatcher,
        notifications,
        channels,
        meetings,
    } = file_config;

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
        },
        admin: AdminConfig::new(admin.secret),
        schedule: ScheduleConfig {
            enabled: schedule.enabled,
            utc_offset: utc_offset(schedule.utc_offset_minutes)?,
            cron: schedule.cron,
        },
        dispatcher: DispatcherConfig {
            poll_interval: std::time::Duration::from_secs(dispatcher.poll_interval_secs),
            batch_size: dispatcher.batch_size,
            claim_lease: time::Duration::seconds(dispatcher.claim_lease_secs),
        },
        notifications: NotificationConfig {
            default_channel: notifications.default_channel.into(),
            reminder_lead: time::Duration::hours(notifications.reminder_lead_hours),
            feedback_delay: time::Duration::hours(notifications.feedback_delay_hours),
            admin_alert_recipients: notifications.admin_alert_recipients,
        },
        channels: ChannelsConfig {
            request_timeout: std::time::Duration::from_secs(channels.request_timeout_secs),
            email: relay_endpoint(channels.email),
            teams: relay_endpoint(channels.teams),
            meetings: meetings.map(relay_endpoint),
        },
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
