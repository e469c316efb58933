//! TOML file configuration structures.
//!
//! These structs directly map to the `roulette-config.toml` file format.

use roulette_sdk::objects::NotificationChannel;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    pub channels: ChannelsConfig,
    /// Calendar relay. Meetings are never booked without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meetings: Option<RelayConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// When scheduled rounds run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression (with seconds), e.g. `0 0 9 * * Mon`.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Offset from UTC the cron expression is evaluated in.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            utc_offset_minutes: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 9 * * Mon".to_string()
}

/// Notification dispatcher section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: i64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> i64 {
    50
}

fn default_claim_lease_secs() -> i64 {
    600
}

/// Notification scheduling section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channel")]
    pub default_channel: NotificationChannel,
    #[serde(default = "default_reminder_lead_hours")]
    pub reminder_lead_hours: i64,
    #[serde(default = "default_feedback_delay_hours")]
    pub feedback_delay_hours: i64,
    /// Participant ids of the operators alerted when a round fails.
    #[serde(default)]
    pub admin_alert_recipients: Vec<Uuid>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            reminder_lead_hours: default_reminder_lead_hours(),
            feedback_delay_hours: default_feedback_delay_hours(),
            admin_alert_recipients: Vec::new(),
        }
    }
}

fn default_channel() -> NotificationChannel {
    NotificationChannel::Both
}

fn default_reminder_lead_hours() -> i64 {
    24
}

fn default_feedback_delay_hours() -> i64 {
    2
}

/// Outbound relays, one per delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Deadline for every relay request, including the calendar relay.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub email: RelayConfig,
    pub teams: RelayConfig,
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub url: url::Url,
    /// Key for the `Roulette-Signature` HMAC on every request body.
    pub secret: String,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        roulette_sdk::config::is_hashed_secret(&self.admin.secret)
    }
}
