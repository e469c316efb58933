//! Runtime configuration, as shared with request handlers and tasks.
//!
//! Sections the core crate consumes are held in its versioned
//! [`ConfigStore`]; the rest sit behind plain `RwLock`s.

use chrono::FixedOffset;
use roulette_core::config::{
    ConfigStore, DispatcherConfig, NotificationConfig, RelayEndpointConfig,
};
pub use roulette_sdk::config::{AdminConfig, ServerConfig};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolved `[schedule]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub cron: String,
    pub utc_offset: FixedOffset,
}

/// Relays built into senders at startup. Changing them requires a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsConfig {
    /// Timeout of the shared relay HTTP client.
    pub request_timeout: std::time::Duration,
    pub email: RelayEndpointConfig,
    pub teams: RelayEndpointConfig,
    pub meetings: Option<RelayEndpointConfig>,
}

/// Configuration shared across the server. Each section has its own lock
/// so a SIGHUP reload can swap them independently.
#[derive(Clone)]
pub struct SharedConfig {
    pub server: Arc<RwLock<ServerConfig>>,
    pub admin: Arc<RwLock<AdminConfig>>,
    pub dispatcher: ConfigStore<DispatcherConfig>,
    pub notifications: ConfigStore<NotificationConfig>,
}
