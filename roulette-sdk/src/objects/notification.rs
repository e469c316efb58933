//! Payloads posted to the email and chat relays.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::NotificationType;
use crate::signature::Signature;

/// The delivery leg a relay request belongs to.
///
/// A task on the `both` channel produces one request per leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayChannel {
    Email,
    Teams,
}

impl std::fmt::Display for RelayChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayChannel::Email => write!(f, "email"),
            RelayChannel::Teams => write!(f, "teams"),
        }
    }
}

/// Body of a relay request. The relay owns template rendering; it receives
/// the notification type and the prepared variable set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub task_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: RelayChannel,
    pub recipient_id: Uuid,
    pub recipient_name: String,
    /// Email address or chat handle, depending on `channel`.
    pub address: String,
    pub variables: serde_json::Value,
}

impl Signature for RelayPayload {}
