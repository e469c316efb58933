use super::{NotificationStore, RoundStore, RoundUnitOfWork, StoreError};
use crate::entities::exclusion::ExclusionPair;
use crate::entities::icebreaker::IcebreakerTopic;
use crate::entities::matching_round::{
    FailStaleRounds, GetMatchingRoundById, MarkRoundFailed, MatchingRound, NewRound,
    RoundCompletion, StartMatchingRound,
};
use crate::entities::notification_task::{
    ClaimDueNotificationTasks, InsertNotificationTasks, ListFailedNotificationTasks,
    NewNotificationTask, NotificationTask, RequeueNotificationTask, SettleNotificationTask,
};
use crate::entities::pairing::{
    ListPairingsForRound, NewPairing, PairHistoryEntry, Pairing, RecordPairingMeeting,
};
use crate::entities::participant::{Department, GetRecipient, Participant, Recipient};
use crate::entities::system_setting::SystemSetting;
use crate::framework::{DatabaseProcessor, TransactionProcessor};
use crate::matching::settings::SETTING_PREFIX;
use crate::utils::backoff::DeliveryOutcome;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::{Connection, PgPool};
use tracing::warn;
use uuid::Uuid;

/// Postgres-backed implementation of every store trait.
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl RoundStore for PgStore {
    async fn start_round(&self, round: NewRound) -> Result<MatchingRound, StoreError> {
        self.db
            .process(StartMatchingRound { round })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::RoundInProgress
                } else {
                    StoreError::Database(e)
                }
            })
    }

    async fn mark_round_failed(
        &self,
        round_id: Uuid,
        error_message: &str,
    ) -> Result<(), StoreError> {
        let updated = self
            .db
            .process(MarkRoundFailed {
                round_id,
                error_message: error_message.to_string(),
            })
            .await?;
        if updated == 0 {
            warn!(round_id = %round_id, "Round was not open when marking it failed");
        }
        Ok(())
    }

    async fn fail_stale_rounds(
        &self,
        started_before: time::OffsetDateTime,
        error_message: &str,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .db
            .process(FailStaleRounds {
                started_before,
                error_message: error_message.to_string(),
            })
            .await?)
    }

    async fn get_round(&self, round_id: Uuid) -> Result<Option<MatchingRound>, StoreError> {
        Ok(self.db.process(GetMatchingRoundById { round_id }).await?)
    }

    async fn pairings_for_round(&self, round_id: Uuid) -> Result<Vec<Pairing>, StoreError> {
        Ok(self.db.process(ListPairingsForRound { round_id }).await?)
    }

    async fn record_meeting(
        &self,
        pairing_id: Uuid,
        scheduled_at: time::OffsetDateTime,
        calendar_event_ref: &str,
    ) -> Result<(), StoreError> {
        self.db
            .process(RecordPairingMeeting {
                pairing_id,
                scheduled_at,
                calendar_event_ref: calendar_event_ref.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn RoundUnitOfWork>, StoreError> {
        let inner = self.db.begin_serializable().await?;
        Ok(Box::new(PgUnitOfWork { inner }))
    }
}

/// A serializable transaction. Optional steps (icebreakers) run inside a
/// savepoint so their failure does not poison the transaction.
pub struct PgUnitOfWork {
    inner: TransactionProcessor<'static>,
}

#[async_trait]
impl RoundUnitOfWork for PgUnitOfWork {
    async fn insert_scratch_round(
        &mut self,
        round: &NewRound,
    ) -> Result<MatchingRound, StoreError> {
        Ok(MatchingRound::insert_scratch(&mut *self.inner.tx, round).await?)
    }

    async fn load_settings(&mut self) -> Result<Vec<SystemSetting>, StoreError> {
        Ok(SystemSetting::list_with_prefix(&mut *self.inner.tx, SETTING_PREFIX).await?)
    }

    async fn load_participants(&mut self) -> Result<Vec<Participant>, StoreError> {
        Ok(Participant::list_opted_in(&mut *self.inner.tx).await?)
    }

    async fn load_departments(&mut self) -> Result<Vec<Department>, StoreError> {
        Ok(Department::list_all(&mut *self.inner.tx).await?)
    }

    async fn load_history(
        &mut self,
        lookback_rounds: i64,
    ) -> Result<Vec<PairHistoryEntry>, StoreError> {
        Ok(PairHistoryEntry::list_recent(&mut *self.inner.tx, lookback_rounds).await?)
    }

    async fn load_exclusions(&mut self) -> Result<Vec<ExclusionPair>, StoreError> {
        Ok(ExclusionPair::list_all(&mut *self.inner.tx).await?)
    }

    async fn insert_pairing(&mut self, pairing: &NewPairing) -> Result<Pairing, StoreError> {
        Ok(Pairing::insert(&mut *self.inner.tx, pairing).await?)
    }

    async fn load_icebreaker_topics(&mut self) -> Result<Vec<IcebreakerTopic>, StoreError> {
        let mut savepoint = Connection::begin(&mut *self.inner.tx).await?;
        match IcebreakerTopic::list_active(&mut *savepoint).await {
            Ok(topics) => {
                savepoint.commit().await?;
                Ok(topics)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn assign_icebreakers(
        &mut self,
        pairing_id: Uuid,
        topic_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut savepoint = Connection::begin(&mut *self.inner.tx).await?;
        match IcebreakerTopic::assign(&mut *savepoint, pairing_id, topic_ids).await {
            Ok(_) => {
                savepoint.commit().await?;
                Ok(())
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn complete_round(
        &mut self,
        round_id: Uuid,
        completion: &RoundCompletion,
    ) -> Result<(), StoreError> {
        let updated = MatchingRound::complete(&mut *self.inner.tx, round_id, completion).await?;
        if updated == 0 {
            return Err(StoreError::Backend(format!(
                "round {round_id} was not in progress at completion"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(self.inner.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(self.inner.rollback().await?)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn enqueue(&self, tasks: Vec<NewNotificationTask>) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.db.process(InsertNotificationTasks { tasks }).await?)
    }

    async fn claim_due(
        &self,
        now: time::OffsetDateTime,
        stale_before: time::OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<NotificationTask>, StoreError> {
        Ok(self
            .db
            .process(ClaimDueNotificationTasks {
                now,
                stale_before,
                limit,
            })
            .await?)
    }

    async fn settle(
        &self,
        task_id: Uuid,
        claimed_at: time::OffsetDateTime,
        outcome: &DeliveryOutcome,
    ) -> Result<bool, StoreError> {
        Ok(self
            .db
            .process(SettleNotificationTask {
                task_id,
                claimed_at,
                outcome: outcome.clone(),
            })
            .await?)
    }

    async fn list_failed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationTask>, StoreError> {
        Ok(self
            .db
            .process(ListFailedNotificationTasks { limit, offset })
            .await?)
    }

    async fn requeue(
        &self,
        task_id: Uuid,
        now: time::OffsetDateTime,
    ) -> Result<Option<NotificationTask>, StoreError> {
        Ok(self
            .db
            .process(RequeueNotificationTask { task_id, now })
            .await?)
    }

    async fn recipient(&self, participant_id: Uuid) -> Result<Option<Recipient>, StoreError> {
        Ok(self.db.process(GetRecipient { participant_id }).await?)
    }
}
