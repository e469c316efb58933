use crate::entities::NotificationChannel;
use uuid::Uuid;

/// How notification tasks are scheduled and addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Channel used for round notifications.
    pub default_channel: NotificationChannel,
    /// A reminder is due this long before a scheduled meeting.
    pub reminder_lead: time::Duration,
    /// A feedback request is due this long after a scheduled meeting.
    pub feedback_delay: time::Duration,
    /// Operators alerted when a round fails.
    pub admin_alert_recipients: Vec<Uuid>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_channel: NotificationChannel::Both,
            reminder_lead: time::Duration::hours(24),
            feedback_delay: time::Duration::hours(2),
            admin_alert_recipients: Vec::new(),
        }
    }
}

/// Polling cadence of the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub poll_interval: std::time::Duration,
    /// Upper bound of tasks claimed per pass.
    pub batch_size: i64,
    /// A claim older than this is considered abandoned and reclaimed.
    pub claim_lease: time::Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(30),
            batch_size: 50,
            claim_lease: time::Duration::minutes(10),
        }
    }
}

/// Endpoint of an outbound HTTP relay (email gateway, Teams bot, calendar
/// service). Request bodies are signed with `secret`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpointConfig {
    pub url: url::Url,
    pub secret: String,
}
