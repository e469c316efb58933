//! Producers of notification tasks.
//!
//! Every helper turns a domain event into `pending` tasks with a
//! `scheduled_for` time and a prepared variable set; delivery is the
//! dispatcher's job.

use crate::config::{ConfigStore, NotificationConfig};
use crate::entities::NotificationType;
use crate::entities::notification_task::NewNotificationTask;
use crate::matching::Candidate;
use crate::store::{NotificationStore, StoreError};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// A committed pairing, as announced to its two members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingNotice {
    pub pairing_id: Uuid,
    pub first: Candidate,
    pub second: Candidate,
    pub icebreakers: Vec<String>,
}

impl PairingNotice {
    /// Each member paired with their partner.
    fn sides(&self) -> [(&Candidate, &Candidate); 2] {
        [(&self.first, &self.second), (&self.second, &self.first)]
    }
}

#[derive(Clone)]
pub struct NotificationQueue {
    store: Arc<dyn NotificationStore>,
    config: ConfigStore<NotificationConfig>,
}

impl NotificationQueue {
    pub fn new(store: Arc<dyn NotificationStore>, config: ConfigStore<NotificationConfig>) -> Self {
        Self { store, config }
    }

    /// One immediate pairing announcement per member of each pairing.
    pub async fn enqueue_pairing_announcements(
        &self,
        round_id: Uuid,
        notices: &[PairingNotice],
        now: time::OffsetDateTime,
    ) -> Result<usize, StoreError> {
        let channel = self.config.read().await.default_channel;
        let tasks: Vec<NewNotificationTask> = notices
            .iter()
            .flat_map(|notice| {
                notice.sides().map(|(member, partner)| NewNotificationTask {
                    round_id: Some(round_id),
                    pairing_id: Some(notice.pairing_id),
                    recipient_id: member.id,
                    notification_type: NotificationType::Pairing,
                    channel,
                    scheduled_for: now,
                    variables: json!({
                        "round_id": round_id,
                        "pairing_id": notice.pairing_id,
                        "recipient_name": member.display_name,
                        "partner_id": partner.id,
                        "partner_name": partner.display_name,
                        "icebreakers": notice.icebreakers,
                    }),
                })
            })
            .collect();
        self.enqueue(tasks).await
    }

    /// A reminder before and a feedback request after a scheduled meeting,
    /// for both members.
    ///
    /// A reminder whose lead time has already passed is sent right away.
    pub async fn enqueue_meeting_followups(
        &self,
        round_id: Uuid,
        notice: &PairingNotice,
        meeting_at: time::OffsetDateTime,
        now: time::OffsetDateTime,
    ) -> Result<usize, StoreError> {
        let (channel, reminder_at, feedback_at) = {
            let config = self.config.read().await;
            (
                config.default_channel,
                (meeting_at - config.reminder_lead).max(now),
                meeting_at + config.feedback_delay,
            )
        };
        let meeting_ts = meeting_at.unix_timestamp();

        let mut tasks = Vec::with_capacity(4);
        for (member, partner) in notice.sides() {
            let variables = json!({
                "round_id": round_id,
                "pairing_id": notice.pairing_id,
                "recipient_name": member.display_name,
                "partner_id": partner.id,
                "partner_name": partner.display_name,
                "meeting_at": meeting_ts,
                "icebreakers": notice.icebreakers,
            });
            tasks.push(NewNotificationTask {
                round_id: Some(round_id),
                pairing_id: Some(notice.pairing_id),
                recipient_id: member.id,
                notification_type: NotificationType::Reminder,
                channel,
                scheduled_for: reminder_at,
                variables: variables.clone(),
            });
            tasks.push(NewNotificationTask {
                round_id: Some(round_id),
                pairing_id: Some(notice.pairing_id),
                recipient_id: member.id,
                notification_type: NotificationType::FeedbackRequest,
                channel,
                scheduled_for: feedback_at,
                variables,
            });
        }
        self.enqueue(tasks).await
    }

    /// Welcome message for a participant who just opted in.
    ///
    /// The directory sync calls this through
    /// `POST /admin/participants/{participant_id}/welcome` once it records
    /// the opt-in.
    pub async fn enqueue_welcome(
        &self,
        participant_id: Uuid,
        display_name: &str,
        now: time::OffsetDateTime,
    ) -> Result<usize, StoreError> {
        let channel = self.config.read().await.default_channel;
        self.enqueue(vec![NewNotificationTask {
            round_id: None,
            pairing_id: None,
            recipient_id: participant_id,
            notification_type: NotificationType::Welcome,
            channel,
            scheduled_for: now,
            variables: json!({ "recipient_name": display_name }),
        }])
        .await
    }

    /// Alert every configured operator. Returns 0 when none is configured.
    pub async fn enqueue_admin_alert(
        &self,
        round_id: Option<Uuid>,
        message: &str,
        now: time::OffsetDateTime,
    ) -> Result<usize, StoreError> {
        let (channel, recipients) = {
            let config = self.config.read().await;
            (config.default_channel, config.admin_alert_recipients.clone())
        };
        if recipients.is_empty() {
            warn!(round_id = ?round_id, "No admin alert recipients configured");
            return Ok(0);
        }

        let tasks = recipients
            .into_iter()
            .map(|recipient_id| NewNotificationTask {
                round_id,
                pairing_id: None,
                recipient_id,
                notification_type: NotificationType::AdminAlert,
                channel,
                scheduled_for: now,
                variables: json!({ "round_id": round_id, "message": message }),
            })
            .collect();
        self.enqueue(tasks).await
    }

    async fn enqueue(&self, tasks: Vec<NewNotificationTask>) -> Result<usize, StoreError> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let ids = self.store.enqueue(tasks).await?;
        debug!(count = ids.len(), "Enqueued notification tasks");
        Ok(ids.len())
    }
}
