//! NotificationDispatcher processor.
//!
//! The NotificationDispatcher is responsible for:
//! - Polling the queue on a fixed cadence (and right after a round completes),
//!   picking up a reloaded poll interval without waiting out the old one
//! - Atomically claiming due tasks so concurrent passes never share one
//! - Looking up the recipient and delivering through the task's channel(s)
//! - Settling each task as sent, re-queued with backoff, or permanently failed

use crate::config::{ConfigStore, ConfigWatcher, DispatcherConfig};
use crate::entities::notification_task::NotificationTask;
use crate::events::RoundCompletedReceiver;
use crate::senders::{ChannelSenders, DeliveryError, OutboundMessage};
use crate::store::{NotificationStore, StoreError};
use crate::utils::backoff::DeliveryOutcome;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification store error: {0}")]
    Store(#[from] StoreError),
}

/// Counters of a single dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
    /// Outcomes that could not be recorded; those tasks are reclaimed once
    /// their claim goes stale.
    pub unsettled: usize,
}

pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    senders: ChannelSenders,
    config: ConfigStore<DispatcherConfig>,
    config_watcher: ConfigWatcher,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        senders: ChannelSenders,
        config: ConfigStore<DispatcherConfig>,
    ) -> Self {
        let config_watcher = config.subscribe();
        Self {
            store,
            senders,
            config,
            config_watcher,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut wake_rx: RoundCompletedReceiver,
    ) {
        info!("NotificationDispatcher started");
        let mut wake_open = true;
        let mut config_open = true;

        loop {
            let poll_interval = self.config.read().await.poll_interval;

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                event = wake_rx.recv(), if wake_open => {
                    match event {
                        Some(event) => {
                            debug!(round_id = %event.round_id, "Woken by completed round");
                            self.run_pass().await;
                        }
                        None => {
                            debug!("RoundCompleted channel closed, polling only");
                            wake_open = false;
                        }
                    }
                }

                changed = self.config_watcher.changed(), if config_open => {
                    match changed {
                        Ok(()) => debug!("Dispatcher configuration reloaded"),
                        Err(_) => config_open = false,
                    }
                }

                _ = tokio::time::sleep(poll_interval) => {
                    self.run_pass().await;
                }
            }
        }

        info!("NotificationDispatcher shutdown complete");
    }

    async fn run_pass(&self) {
        match self.dispatch_due(time::OffsetDateTime::now_utc()).await {
            Ok(summary) if summary.claimed > 0 => {
                info!(
                    claimed = summary.claimed,
                    sent = summary.sent,
                    retrying = summary.retrying,
                    failed = summary.failed,
                    unsettled = summary.unsettled,
                    "Dispatch pass finished"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Dispatch pass failed"),
        }
    }

    /// Claim and deliver every task due at `now`, up to the batch size.
    pub async fn dispatch_due(
        &self,
        now: time::OffsetDateTime,
    ) -> Result<DispatchSummary, DispatchError> {
        let (batch_size, claim_lease) = {
            let config = self.config.read().await;
            (config.batch_size, config.claim_lease)
        };

        let tasks = self
            .store
            .claim_due(now, now - claim_lease, batch_size)
            .await?;
        let mut summary = DispatchSummary {
            claimed: tasks.len(),
            ..Default::default()
        };

        for task in tasks {
            let outcome = self.deliver(&task, now).await;
            let claimed_at = task.claimed_at.unwrap_or(now);
            match self.store.settle(task.id, claimed_at, &outcome).await {
                Ok(true) => match outcome {
                    DeliveryOutcome::Sent { .. } => summary.sent += 1,
                    DeliveryOutcome::Retrying { .. } => summary.retrying += 1,
                    DeliveryOutcome::PermanentlyFailed { .. } => summary.failed += 1,
                },
                Ok(false) => {
                    warn!(task_id = %task.id, "Task claim lost before settling");
                    summary.unsettled += 1;
                }
                Err(e) => {
                    error!(task_id = %task.id, error = %e, "Failed to record delivery outcome");
                    summary.unsettled += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Attempt one delivery and decide what it means for the task.
    async fn deliver(&self, task: &NotificationTask, now: time::OffsetDateTime) -> DeliveryOutcome {
        let result = match self.store.recipient(task.recipient_id).await {
            Ok(Some(recipient)) => {
                let message = OutboundMessage {
                    task_id: task.id,
                    notification_type: task.notification_type,
                    recipient,
                    variables: task.variables.0.clone(),
                };
                self.senders
                    .deliver(task.channel, &message)
                    .await
                    .map_err(|e| e.to_string())
            }
            Ok(None) => Err(DeliveryError::RecipientNotFound(task.recipient_id).to_string()),
            Err(e) => Err(format!("recipient lookup failed: {e}")),
        };

        match result {
            Ok(()) => {
                debug!(
                    task_id = %task.id,
                    notification_type = ?task.notification_type,
                    "Notification delivered"
                );
                DeliveryOutcome::sent(now)
            }
            Err(error) => {
                let outcome = DeliveryOutcome::after_failure(task.retry_count, error, now);
                match &outcome {
                    DeliveryOutcome::Retrying { at, attempt, error } => warn!(
                        task_id = %task.id,
                        recipient_id = %task.recipient_id,
                        attempt,
                        retry_at = %at,
                        error = %error,
                        "Notification delivery failed, retrying"
                    ),
                    DeliveryOutcome::PermanentlyFailed { attempts, error } => error!(
                        task_id = %task.id,
                        recipient_id = %task.recipient_id,
                        attempts,
                        error = %error,
                        "Notification delivery permanently failed"
                    ),
                    DeliveryOutcome::Sent { .. } => {}
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::notification_task::NewNotificationTask;
    use crate::entities::{NotificationChannel, NotificationStatus, NotificationType};
    use crate::store::NotificationStore;
    use crate::testing::{MemoryStore, RecordingSender, participant};
    use time::macros::datetime;
    use uuid::Uuid;

    fn task(recipient: u128, channel: NotificationChannel, at: time::OffsetDateTime) -> NewNotificationTask {
        NewNotificationTask {
            round_id: None,
            pairing_id: None,
            recipient_id: Uuid::from_u128(recipient),
            notification_type: NotificationType::Pairing,
            channel,
            scheduled_for: at,
            variables: serde_json::json!({}),
        }
    }

    fn dispatcher(
        store: &MemoryStore,
        email: Arc<RecordingSender>,
        teams: Arc<RecordingSender>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(store.clone()),
            ChannelSenders::new(email, teams),
            ConfigStore::new(DispatcherConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_delivers_due_tasks_only() {
        let store = MemoryStore::default();
        store.add_participants((1..=2).map(participant));
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![
                task(1, NotificationChannel::Email, now),
                task(2, NotificationChannel::Email, now + time::Duration::hours(1)),
            ])
            .await
            .unwrap();

        let email = Arc::new(RecordingSender::default());
        let d = dispatcher(&store, email.clone(), Arc::new(RecordingSender::default()));
        let summary = d.dispatch_due(now).await.unwrap();
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.sent, 1);

        let sent: Vec<_> = store
            .tasks()
            .into_iter()
            .filter(|t| t.status == NotificationStatus::Sent)
            .collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sent_at, Some(now));
        assert_eq!(email.sent()[0].recipient.id, Uuid::from_u128(1));
    }

    #[tokio::test]
    async fn test_retry_cap_stops_after_three_failures() {
        let store = MemoryStore::default();
        store.add_participants([participant(1)]);
        let mut now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![task(1, NotificationChannel::Email, now)])
            .await
            .unwrap();

        let email = Arc::new(RecordingSender::failing());
        let d = dispatcher(&store, email.clone(), Arc::new(RecordingSender::default()));

        let first = d.dispatch_due(now).await.unwrap();
        assert_eq!(first.retrying, 1);
        let pending = &store.tasks()[0];
        assert_eq!(pending.status, NotificationStatus::Pending);
        assert_eq!(pending.retry_count, 1);
        assert_eq!(pending.scheduled_for, now + time::Duration::minutes(10));

        // Not due yet.
        assert_eq!(d.dispatch_due(now).await.unwrap().claimed, 0);

        for _ in 0..5 {
            now += time::Duration::days(1);
            d.dispatch_due(now).await.unwrap();
        }

        let task = &store.tasks()[0];
        assert_eq!(task.status, NotificationStatus::Failed);
        assert_eq!(task.retry_count, 3);
        assert!(task.error_message.is_some());
        assert_eq!(email.attempts(), 3);
    }

    #[tokio::test]
    async fn test_unknown_recipient_counts_as_failure() {
        let store = MemoryStore::default();
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![task(42, NotificationChannel::Teams, now)])
            .await
            .unwrap();
        let d = dispatcher(
            &store,
            Arc::new(RecordingSender::default()),
            Arc::new(RecordingSender::default()),
        );
        let summary = d.dispatch_due(now).await.unwrap();
        assert_eq!(summary.retrying, 1);
        let task = &store.tasks()[0];
        assert!(task.error_message.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_concurrent_passes_never_double_send() {
        let store = MemoryStore::default();
        store.add_participants((1..=20).map(participant));
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(
                (1..=20)
                    .map(|n| task(n, NotificationChannel::Email, now))
                    .collect(),
            )
            .await
            .unwrap();

        let email = Arc::new(RecordingSender::default());
        let teams = Arc::new(RecordingSender::default());
        let config = DispatcherConfig {
            batch_size: 7,
            ..Default::default()
        };
        let make = || {
            NotificationDispatcher::new(
                Arc::new(store.clone()),
                ChannelSenders::new(email.clone(), teams.clone()),
                ConfigStore::new(config.clone()),
            )
        };
        let (a, b) = (make(), make());

        let mut claimed = 0;
        while claimed < 20 {
            let (x, y) = tokio::join!(a.dispatch_due(now), b.dispatch_due(now));
            let (x, y) = (x.unwrap(), y.unwrap());
            assert_eq!(x.unsettled + y.unsettled, 0);
            claimed += x.claimed + y.claimed;
            if x.claimed + y.claimed == 0 {
                break;
            }
        }

        assert_eq!(claimed, 20);
        assert_eq!(email.sent().len(), 20);
        let mut recipients: Vec<Uuid> = email.sent().iter().map(|m| m.recipient.id).collect();
        recipients.sort();
        recipients.dedup();
        assert_eq!(recipients.len(), 20);
        assert!(
            store
                .tasks()
                .iter()
                .all(|t| t.status == NotificationStatus::Sent)
        );
    }

    #[tokio::test]
    async fn test_stale_claim_is_recovered() {
        let store = MemoryStore::default();
        store.add_participants([participant(1)]);
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![task(1, NotificationChannel::Email, now)])
            .await
            .unwrap();

        // A dispatcher that claimed the task and then died.
        let claimed = store.claim_due(now, now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let email = Arc::new(RecordingSender::default());
        let d = dispatcher(&store, email.clone(), Arc::new(RecordingSender::default()));
        assert_eq!(d.dispatch_due(now + time::Duration::minutes(1)).await.unwrap().claimed, 0);

        let later = now + DispatcherConfig::default().claim_lease + time::Duration::minutes(1);
        assert_eq!(d.dispatch_due(later).await.unwrap().sent, 1);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_reclaimed_task_rejects_the_first_claimers_outcome() {
        let store = MemoryStore::default();
        store.add_participants([participant(1)]);
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![task(1, NotificationChannel::Email, now)])
            .await
            .unwrap();

        // A slow pass claims the task and is still delivering when its lease runs out.
        let slow = store.claim_due(now, now, 10).await.unwrap();
        let slow_claim = slow[0].claimed_at.unwrap();

        let later = now + DispatcherConfig::default().claim_lease + time::Duration::minutes(1);
        let email = Arc::new(RecordingSender::default());
        let d = dispatcher(&store, email.clone(), Arc::new(RecordingSender::default()));
        let summary = d.dispatch_due(later).await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.unsettled, 0);

        let late_failure = DeliveryOutcome::after_failure(0, "timed out".into(), later);
        assert!(!store.settle(slow[0].id, slow_claim, &late_failure).await.unwrap());

        let task = &store.tasks()[0];
        assert_eq!(task.status, NotificationStatus::Sent);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.error_message, None);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_requires_the_current_claim() {
        let store = MemoryStore::default();
        let now = datetime!(2026-03-02 09:00 UTC);
        store
            .enqueue(vec![task(1, NotificationChannel::Email, now)])
            .await
            .unwrap();

        // Stale reclaim while the first claim is still out.
        let first = store.claim_due(now, now, 10).await.unwrap();
        let later = now + time::Duration::minutes(30);
        let second = store.claim_due(later, later, 10).await.unwrap();
        assert_eq!(second.len(), 1);

        let sent_first = DeliveryOutcome::sent(now);
        assert!(
            !store
                .settle(first[0].id, first[0].claimed_at.unwrap(), &sent_first)
                .await
                .unwrap()
        );
        let sent_second = DeliveryOutcome::sent(later);
        assert!(
            store
                .settle(second[0].id, second[0].claimed_at.unwrap(), &sent_second)
                .await
                .unwrap()
        );
        assert_eq!(store.tasks()[0].sent_at, Some(later));
    }

    #[tokio::test]
    async fn test_reloaded_poll_interval_applies_without_waiting() {
        let store = MemoryStore::default();
        store.add_participants([participant(1)]);
        store
            .enqueue(vec![task(
                1,
                NotificationChannel::Email,
                time::OffsetDateTime::now_utc() - time::Duration::minutes(1),
            )])
            .await
            .unwrap();

        let config = ConfigStore::new(DispatcherConfig {
            poll_interval: std::time::Duration::from_secs(3600),
            ..Default::default()
        });
        let email = Arc::new(RecordingSender::default());
        let d = NotificationDispatcher::new(
            Arc::new(store.clone()),
            ChannelSenders::new(email.clone(), Arc::new(RecordingSender::default())),
            config.clone(),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_wake_tx, wake_rx) = crate::events::round_completed_channel();
        let handle = tokio::spawn(d.run(shutdown_rx, wake_rx));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(email.sent().is_empty());

        config
            .update(DispatcherConfig {
                poll_interval: std::time::Duration::from_millis(10),
                ..Default::default()
            })
            .await;

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while email.sent().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(email.sent().len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = MemoryStore::default();
        let d = dispatcher(
            &store,
            Arc::new(RecordingSender::default()),
            Arc::new(RecordingSender::default()),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_wake_tx, wake_rx) = crate::events::round_completed_channel();
        let handle = tokio::spawn(d.run(shutdown_rx, wake_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
