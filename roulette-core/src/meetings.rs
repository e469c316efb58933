//! Meeting auto-scheduling for committed pairings.
//!
//! The calendar integration is an external relay. It either books a slot
//! both participants have free or reports that none exists; the latter is a
//! normal outcome and leaves the pairing unscheduled.

use crate::config::RelayEndpointConfig;
use crate::entities::participant::Recipient;
use async_trait::async_trait;
use roulette_sdk::objects::{MeetingAttendee, MeetingBookingRequest, MeetingBookingResponse};
use roulette_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("calendar relay rejected booking with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("calendar relay returned an invalid meeting time: {0}")]
    InvalidTime(i64),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    pub pairing_id: Uuid,
    pub participants: [Recipient; 2],
    pub icebreakers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeetingOutcome {
    Scheduled {
        at: time::OffsetDateTime,
        event_ref: String,
    },
    NoCommonAvailability,
}

#[async_trait]
pub trait MeetingScheduler: Send + Sync {
    async fn schedule(&self, request: &MeetingRequest) -> Result<MeetingOutcome, MeetingError>;
}

/// Books meetings through a signed HTTP call to the calendar relay.
pub struct HttpMeetingScheduler {
    endpoint: RelayEndpointConfig,
    http_client: reqwest::Client,
}

impl HttpMeetingScheduler {
    pub fn new(endpoint: RelayEndpointConfig, http_client: reqwest::Client) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }
}

fn attendee(recipient: &Recipient) -> MeetingAttendee {
    MeetingAttendee {
        participant_id: recipient.id,
        display_name: recipient.display_name.clone(),
        email: recipient.email.clone(),
    }
}

#[async_trait]
impl MeetingScheduler for HttpMeetingScheduler {
    async fn schedule(&self, request: &MeetingRequest) -> Result<MeetingOutcome, MeetingError> {
        let [first, second] = &request.participants;
        let body = MeetingBookingRequest {
            pairing_id: request.pairing_id,
            attendees: [attendee(first), attendee(second)],
            icebreakers: request.icebreakers.clone(),
        };
        let signed = SignedObject::new(body, self.endpoint.secret.as_bytes())?;

        let response = self
            .http_client
            .post(self.endpoint.url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeetingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        match response.json::<MeetingBookingResponse>().await? {
            MeetingBookingResponse::Scheduled {
                scheduled_at,
                event_ref,
            } => {
                let at = time::OffsetDateTime::from_unix_timestamp(scheduled_at)
                    .map_err(|_| MeetingError::InvalidTime(scheduled_at))?;
                Ok(MeetingOutcome::Scheduled { at, event_ref })
            }
            MeetingBookingResponse::NoCommonAvailability => Ok(MeetingOutcome::NoCommonAvailability),
        }
    }
}
