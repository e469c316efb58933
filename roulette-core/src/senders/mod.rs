//! Channel senders used by the notification dispatcher.
//!
//! Template rendering and provider integration live behind an HTTP relay;
//! a sender only hands over the notification type, the recipient and the
//! prepared variables.

pub mod http_relay;

pub use http_relay::HttpRelaySender;

use crate::entities::participant::Recipient;
use crate::entities::{NotificationChannel, NotificationType};
use async_trait::async_trait;
use roulette_sdk::objects::RelayChannel;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("relay rejected delivery with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("recipient {recipient_id} has no {channel} address")]
    MissingAddress {
        channel: RelayChannel,
        recipient_id: Uuid,
    },

    #[error("recipient not found: {0}")]
    RecipientNotFound(Uuid),

    #[error("all channels failed (email: {email}; teams: {teams})")]
    AllChannelsFailed {
        email: Box<DeliveryError>,
        teams: Box<DeliveryError>,
    },

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One notification ready to be handed to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub task_id: Uuid,
    pub notification_type: NotificationType,
    pub recipient: Recipient,
    pub variables: serde_json::Value,
}

/// A single delivery channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// The email and chat senders, selected by a task's channel.
#[derive(Clone)]
pub struct ChannelSenders {
    email: Arc<dyn ChannelSender>,
    teams: Arc<dyn ChannelSender>,
}

impl ChannelSenders {
    pub fn new(email: Arc<dyn ChannelSender>, teams: Arc<dyn ChannelSender>) -> Self {
        Self { email, teams }
    }

    /// Deliver through `channel`. For [`NotificationChannel::Both`] the two
    /// legs run independently and one success is enough.
    pub async fn deliver(
        &self,
        channel: NotificationChannel,
        message: &OutboundMessage,
    ) -> Result<(), DeliveryError> {
        match channel {
            NotificationChannel::Email => self.email.send(message).await,
            NotificationChannel::Teams => self.teams.send(message).await,
            NotificationChannel::Both => {
                let (email, teams) =
                    tokio::join!(self.email.send(message), self.teams.send(message));
                match (email, teams) {
                    (Ok(()), Ok(())) => Ok(()),
                    (Ok(()), Err(e)) => {
                        warn!(task_id = %message.task_id, error = %e, "Teams leg failed, email delivered");
                        Ok(())
                    }
                    (Err(e), Ok(())) => {
                        warn!(task_id = %message.task_id, error = %e, "Email leg failed, Teams delivered");
                        Ok(())
                    }
                    (Err(email), Err(teams)) => Err(DeliveryError::AllChannelsFailed {
                        email: Box::new(email),
                        teams: Box::new(teams),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSender, recipient};

    fn message() -> OutboundMessage {
        OutboundMessage {
            task_id: Uuid::from_u128(1),
            notification_type: NotificationType::Pairing,
            recipient: recipient(7),
            variables: serde_json::json!({"partner_name": "Ada"}),
        }
    }

    #[tokio::test]
    async fn test_single_channel_routing() {
        let email = Arc::new(RecordingSender::default());
        let teams = Arc::new(RecordingSender::default());
        let senders = ChannelSenders::new(email.clone(), teams.clone());

        senders.deliver(NotificationChannel::Email, &message()).await.unwrap();
        assert_eq!(email.sent().len(), 1);
        assert!(teams.sent().is_empty());

        senders.deliver(NotificationChannel::Teams, &message()).await.unwrap();
        assert_eq!(teams.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_both_succeeds_when_one_leg_fails() {
        let email = Arc::new(RecordingSender::failing());
        let teams = Arc::new(RecordingSender::default());
        let senders = ChannelSenders::new(email.clone(), teams.clone());

        senders.deliver(NotificationChannel::Both, &message()).await.unwrap();
        assert_eq!(email.attempts(), 1);
        assert_eq!(teams.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_both_fails_only_when_every_leg_fails() {
        let senders = ChannelSenders::new(
            Arc::new(RecordingSender::failing()),
            Arc::new(RecordingSender::failing()),
        );
        let err = senders
            .deliver(NotificationChannel::Both, &message())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::AllChannelsFailed { .. }));
    }
}
