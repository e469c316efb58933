//! Persistence seams of the round engine and the notification pipeline.
//!
//! The coordinator and the dispatcher only talk to these traits. The
//! Postgres implementation lives in [`postgres`].

pub mod postgres;

pub use postgres::PgStore;

use crate::entities::exclusion::ExclusionPair;
use crate::entities::icebreaker::IcebreakerTopic;
use crate::entities::matching_round::{MatchingRound, NewRound, RoundCompletion};
use crate::entities::notification_task::{NewNotificationTask, NotificationTask};
use crate::entities::pairing::{NewPairing, PairHistoryEntry, Pairing};
use crate::entities::participant::{Department, Participant, Recipient};
use crate::entities::system_setting::SystemSetting;
use crate::utils::backoff::DeliveryOutcome;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Another round is already `in_progress`.
    #[error("another matching round is already in progress")]
    RoundInProgress,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Round lifecycle writes and reads that happen outside the matching
/// transaction.
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Create a round directly in `in_progress`.
    ///
    /// Fails with [`StoreError::RoundInProgress`] while another round runs.
    async fn start_round(&self, round: NewRound) -> Result<MatchingRound, StoreError>;

    async fn mark_round_failed(&self, round_id: Uuid, error_message: &str)
    -> Result<(), StoreError>;

    /// Move every `in_progress` round created before `started_before` to
    /// `failed`. Returns the ids of the rounds it changed.
    async fn fail_stale_rounds(
        &self,
        started_before: time::OffsetDateTime,
        error_message: &str,
    ) -> Result<Vec<Uuid>, StoreError>;

    async fn get_round(&self, round_id: Uuid) -> Result<Option<MatchingRound>, StoreError>;

    async fn pairings_for_round(&self, round_id: Uuid) -> Result<Vec<Pairing>, StoreError>;

    async fn record_meeting(
        &self,
        pairing_id: Uuid,
        scheduled_at: time::OffsetDateTime,
        calendar_event_ref: &str,
    ) -> Result<(), StoreError>;

    /// Open the unit of work a round (or a preview) runs in.
    async fn begin(&self) -> Result<Box<dyn RoundUnitOfWork>, StoreError>;
}

/// A single atomic unit of work.
///
/// Nothing written through it is visible until [`commit`](Self::commit).
/// Dropping it without committing discards every write.
#[async_trait]
pub trait RoundUnitOfWork: Send {
    /// Scratch round for dry runs; never survives a rollback.
    async fn insert_scratch_round(&mut self, round: &NewRound)
    -> Result<MatchingRound, StoreError>;

    async fn load_settings(&mut self) -> Result<Vec<SystemSetting>, StoreError>;

    async fn load_participants(&mut self) -> Result<Vec<Participant>, StoreError>;

    async fn load_departments(&mut self) -> Result<Vec<Department>, StoreError>;

    /// Non-cancelled pairings of the most recent `lookback_rounds`
    /// completed rounds.
    async fn load_history(
        &mut self,
        lookback_rounds: i64,
    ) -> Result<Vec<PairHistoryEntry>, StoreError>;

    async fn load_exclusions(&mut self) -> Result<Vec<ExclusionPair>, StoreError>;

    async fn insert_pairing(&mut self, pairing: &NewPairing) -> Result<Pairing, StoreError>;

    /// Load active icebreaker topics. A failure here leaves the unit usable.
    async fn load_icebreaker_topics(&mut self) -> Result<Vec<IcebreakerTopic>, StoreError>;

    /// Attach topics to a pairing. A failure here leaves the unit usable.
    async fn assign_icebreakers(
        &mut self,
        pairing_id: Uuid,
        topic_ids: &[Uuid],
    ) -> Result<(), StoreError>;

    async fn complete_round(
        &mut self,
        round_id: Uuid,
        completion: &RoundCompletion,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable queue of notification tasks.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert `pending` tasks atomically.
    async fn enqueue(&self, tasks: Vec<NewNotificationTask>) -> Result<Vec<Uuid>, StoreError>;

    /// Claim up to `limit` due tasks, oldest first, moving them to `sending`.
    /// Tasks claimed before `stale_before` and never settled are due again.
    async fn claim_due(
        &self,
        now: time::OffsetDateTime,
        stale_before: time::OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<NotificationTask>, StoreError>;

    /// Apply a delivery outcome to a claimed task. `claimed_at` is the claim
    /// timestamp the task was returned with; returns `false` when that claim
    /// no longer holds the task (settled or reclaimed since).
    async fn settle(
        &self,
        task_id: Uuid,
        claimed_at: time::OffsetDateTime,
        outcome: &DeliveryOutcome,
    ) -> Result<bool, StoreError>;

    async fn list_failed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationTask>, StoreError>;

    /// Put a permanently failed task back in the queue with a fresh retry
    /// budget. `None` if the task does not exist or is not failed.
    async fn requeue(
        &self,
        task_id: Uuid,
        now: time::OffsetDateTime,
    ) -> Result<Option<NotificationTask>, StoreError>;

    async fn recipient(&self, participant_id: Uuid) -> Result<Option<Recipient>, StoreError>;
}
