//! Sender that posts signed notification payloads to an HTTP relay.

use super::{ChannelSender, DeliveryError, OutboundMessage};
use crate::config::RelayEndpointConfig;
use async_trait::async_trait;
use roulette_sdk::objects::{RelayChannel, RelayPayload};
use roulette_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use tracing::debug;

pub struct HttpRelaySender {
    channel: RelayChannel,
    endpoint: RelayEndpointConfig,
    http_client: reqwest::Client,
}

impl HttpRelaySender {
    pub fn new(
        channel: RelayChannel,
        endpoint: RelayEndpointConfig,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            channel,
            endpoint,
            http_client,
        }
    }

    fn address<'a>(&self, message: &'a OutboundMessage) -> Option<&'a str> {
        match self.channel {
            RelayChannel::Email => message.recipient.email.as_deref(),
            RelayChannel::Teams => message.recipient.chat_handle.as_deref(),
        }
        .filter(|address| !address.trim().is_empty())
    }
}

#[async_trait]
impl ChannelSender for HttpRelaySender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let address = self
            .address(message)
            .ok_or(DeliveryError::MissingAddress {
                channel: self.channel,
                recipient_id: message.recipient.id,
            })?;

        let payload = RelayPayload {
            task_id: message.task_id,
            notification_type: message.notification_type.into(),
            channel: self.channel,
            recipient_id: message.recipient.id,
            recipient_name: message.recipient.display_name.clone(),
            address: address.to_string(),
            variables: message.variables.clone(),
        };
        let signed = SignedObject::new(payload, self.endpoint.secret.as_bytes())?;

        let response = self
            .http_client
            .post(self.endpoint.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(task_id = %message.task_id, channel = %self.channel, "Relay accepted notification");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
