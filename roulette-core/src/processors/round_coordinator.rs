//! RoundCoordinator processor.
//!
//! The RoundCoordinator owns the lifecycle of a matching round:
//! - Opens the round in `in_progress` (one at a time)
//! - Runs snapshot -> matching -> pairing persistence -> icebreakers ->
//!   completion inside a single unit of work, rolled back on any failure
//! - Marks the round `failed` and alerts operators when the unit fails
//! - After commit only, books meetings and enqueues notifications; failures
//!   there are logged and never undo the round
//! - Runs dry-run previews in a unit of work that is always rolled back
//! - Fails rounds a crashed process left `in_progress`, which would otherwise
//!   block every later round

use super::notification_queue::{NotificationQueue, PairingNotice};
use crate::entities::exclusion::ExclusionPair;
use crate::entities::matching_round::{MatchingRound, NewRound, RoundCompletion};
use crate::entities::pairing::{NewPairing, PairHistoryEntry, Pairing};
use crate::entities::participant::{Department, Participant, Recipient};
use crate::entities::{RoundSource, RoundStatus};
use crate::events::{RoundCompleted, RoundCompletedSender};
use crate::matching::icebreakers::pick_topics;
use crate::matching::{
    Candidate, EligibilityError, MatchingSettings, RoundInput, ScoredPair, plan_round,
};
use crate::meetings::{MeetingOutcome, MeetingRequest, MeetingScheduler};
use crate::store::{RoundStore, RoundUnitOfWork, StoreError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use roulette_sdk::objects::ParticipantFilter;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Age after which an `in_progress` round counts as abandoned.
pub const STALE_ROUND_AGE: time::Duration = time::Duration::hours(1);

const STALE_ROUND_MESSAGE: &str = "abandoned while in progress";

#[derive(Debug, Error)]
pub enum RoundError {
    /// Too few eligible participants. The round (if one was opened) is
    /// marked failed.
    #[error("insufficient eligible participants: {eligible} eligible, at least 2 required")]
    InsufficientParticipants {
        round_id: Option<Uuid>,
        eligible: usize,
    },

    #[error("another matching round is already in progress")]
    RoundInProgress,

    /// The store failed before a round record existed (or during a preview).
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The unit of work failed; nothing of the round was persisted.
    #[error("round {round_id} failed: {source}")]
    Aborted {
        round_id: Uuid,
        #[source]
        source: StoreError,
    },
}

impl RoundError {
    pub fn round_id(&self) -> Option<Uuid> {
        match self {
            RoundError::InsufficientParticipants { round_id, .. } => *round_id,
            RoundError::Aborted { round_id, .. } => Some(*round_id),
            RoundError::RoundInProgress | RoundError::Store(_) => None,
        }
    }
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRequest {
    pub scheduled_date: time::Date,
    pub source: RoundSource,
    pub filter: Option<ParticipantFilter>,
    pub ignore_recent_history: bool,
    /// Fixes the shuffle; random per run when absent.
    pub seed: Option<u64>,
}

impl RoundRequest {
    /// A cron-triggered round for the given date.
    pub fn scheduled(scheduled_date: time::Date) -> Self {
        Self {
            scheduled_date,
            source: RoundSource::Scheduled,
            filter: None,
            ignore_recent_history: false,
            seed: None,
        }
    }

    fn new_round(&self) -> NewRound {
        NewRound {
            scheduled_date: self.scheduled_date,
            source: self.source,
            filter: self.filter.clone().filter(|f| !f.is_empty()),
            ignore_recent_history: self.ignore_recent_history,
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Result of a completed round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: MatchingRound,
    pub pairings: Vec<Pairing>,
    pub meetings_scheduled: usize,
    pub notifications_enqueued: usize,
}

/// Result of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub eligible_count: usize,
    pub pairs: Vec<ScoredPair>,
    pub unpaired: Vec<Candidate>,
}

/// Everything the matching computation reads, loaded once.
struct Snapshot {
    settings: MatchingSettings,
    participants: Vec<Participant>,
    departments: Vec<Department>,
    history: Vec<PairHistoryEntry>,
    exclusions: Vec<ExclusionPair>,
}

impl Snapshot {
    async fn load(
        uow: &mut dyn RoundUnitOfWork,
        ignore_recent_history: bool,
    ) -> Result<Self, StoreError> {
        let rows = uow.load_settings().await?;
        let settings =
            MatchingSettings::from_pairs(rows.iter().map(|s| (s.key.as_str(), s.value.as_str())));
        let participants = uow.load_participants().await?;
        let departments = uow.load_departments().await?;
        let history = if ignore_recent_history {
            Vec::new()
        } else {
            uow.load_history(settings.lookback_rounds).await?
        };
        let exclusions = uow.load_exclusions().await?;

        Ok(Self {
            settings,
            participants,
            departments,
            history,
            exclusions,
        })
    }

    fn input<'a>(
        &'a self,
        now: time::OffsetDateTime,
        request: &'a RoundRequest,
    ) -> RoundInput<'a> {
        RoundInput {
            now,
            settings: &self.settings,
            participants: &self.participants,
            departments: &self.departments,
            history: &self.history,
            exclusions: &self.exclusions,
            filter: request.filter.as_ref(),
            ignore_recent_history: request.ignore_recent_history,
        }
    }
}

/// A pairing written inside the unit of work.
struct CommittedPairing {
    pairing: Pairing,
    notice: PairingNotice,
}

/// What the unit of work produced, applied once it commits.
struct UnitResult {
    settings: MatchingSettings,
    completion: RoundCompletion,
    pairings: Vec<CommittedPairing>,
    recipients: HashMap<Uuid, Recipient>,
}

#[derive(Debug, Error)]
enum UnitFailure {
    #[error(transparent)]
    Ineligible(EligibilityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct RoundCoordinator {
    rounds: Arc<dyn RoundStore>,
    queue: NotificationQueue,
    meetings: Option<Arc<dyn MeetingScheduler>>,
    events: Option<RoundCompletedSender>,
}

impl RoundCoordinator {
    pub fn new(rounds: Arc<dyn RoundStore>, queue: NotificationQueue) -> Self {
        Self {
            rounds,
            queue,
            meetings: None,
            events: None,
        }
    }

    pub fn with_meeting_scheduler(mut self, scheduler: Arc<dyn MeetingScheduler>) -> Self {
        self.meetings = Some(scheduler);
        self
    }

    pub fn with_events(mut self, sender: RoundCompletedSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Run a round to completion.
    pub async fn execute(&self, request: RoundRequest) -> Result<RoundReport, RoundError> {
        let now = time::OffsetDateTime::now_utc();
        let mut round = match self.rounds.start_round(request.new_round()).await {
            Ok(round) => round,
            Err(StoreError::RoundInProgress) => {
                warn!("Rejected round request: another round is in progress");
                return Err(RoundError::RoundInProgress);
            }
            Err(e) => return Err(RoundError::Store(e)),
        };
        info!(
            round_id = %round.id,
            scheduled_date = %round.scheduled_date,
            source = ?round.source,
            "Matching round started"
        );

        let mut uow = match self.rounds.begin().await {
            Ok(uow) => uow,
            Err(e) => return Err(self.fail_round(round.id, UnitFailure::Store(e), now).await),
        };

        let result = match self.run_unit(uow.as_mut(), &round, &request, now).await {
            Ok(result) => result,
            Err(failure) => {
                if let Err(e) = uow.rollback().await {
                    error!(round_id = %round.id, error = %e, "Failed to roll back round");
                }
                return Err(self.fail_round(round.id, failure, now).await);
            }
        };
        if let Err(e) = uow.commit().await {
            return Err(self.fail_round(round.id, UnitFailure::Store(e), now).await);
        }

        round.status = RoundStatus::Completed;
        round.participant_count = result.completion.participant_count;
        round.pairing_count = result.completion.pairing_count;
        round
            .unpaired_participant_ids
            .clone_from(&result.completion.unpaired_participant_ids);
        info!(
            round_id = %round.id,
            participants = round.participant_count,
            pairings = round.pairing_count,
            unpaired = round.unpaired_participant_ids.len(),
            "Matching round committed"
        );

        Ok(self.after_commit(round, result, now).await)
    }

    /// Fail every round stuck in `in_progress` for longer than
    /// [`STALE_ROUND_AGE`] and alert operators about each one.
    ///
    /// Returns the ids of the rounds that were failed.
    pub async fn recover_stale_rounds(
        &self,
        now: time::OffsetDateTime,
    ) -> Result<Vec<Uuid>, RoundError> {
        let started_before = now.saturating_sub(STALE_ROUND_AGE);
        let failed = self
            .rounds
            .fail_stale_rounds(started_before, STALE_ROUND_MESSAGE)
            .await?;

        for round_id in &failed {
            warn!(round_id = %round_id, "Stale in-progress round marked failed");
            let alert = format!("Matching round {round_id} failed: {STALE_ROUND_MESSAGE}");
            if let Err(e) = self
                .queue
                .enqueue_admin_alert(Some(*round_id), &alert, now)
                .await
            {
                warn!(round_id = %round_id, error = %e, "Failed to enqueue admin alert");
            }
        }
        Ok(failed)
    }

    /// Run the matching computation without persisting anything.
    pub async fn preview(&self, request: RoundRequest) -> Result<PreviewReport, RoundError> {
        let now = time::OffsetDateTime::now_utc();
        let mut uow = self.rounds.begin().await?;
        let result = self.preview_in(uow.as_mut(), &request, now).await;
        // The scratch round only exists inside this unit.
        if let Err(e) = uow.rollback().await {
            warn!(error = %e, "Failed to roll back preview");
        }
        result
    }

    async fn preview_in(
        &self,
        uow: &mut dyn RoundUnitOfWork,
        request: &RoundRequest,
        now: time::OffsetDateTime,
    ) -> Result<PreviewReport, RoundError> {
        let scratch = uow.insert_scratch_round(&request.new_round()).await?;
        debug!(round_id = %scratch.id, "Preview scratch round created");

        let snapshot = Snapshot::load(uow, request.ignore_recent_history).await?;
        let plan = plan_round(&snapshot.input(now, request), &mut request.rng()).map_err(
            |EligibilityError::InsufficientParticipants { eligible }| {
                RoundError::InsufficientParticipants {
                    round_id: None,
                    eligible,
                }
            },
        )?;

        Ok(PreviewReport {
            eligible_count: plan.eligible_count,
            pairs: plan.pairs,
            unpaired: plan.unpaired,
        })
    }

    async fn run_unit(
        &self,
        uow: &mut dyn RoundUnitOfWork,
        round: &MatchingRound,
        request: &RoundRequest,
        now: time::OffsetDateTime,
    ) -> Result<UnitResult, UnitFailure> {
        let snapshot = Snapshot::load(uow, request.ignore_recent_history).await?;
        let mut rng = request.rng();
        let plan = plan_round(&snapshot.input(now, request), &mut rng)
            .map_err(UnitFailure::Ineligible)?;
        for swap in &plan.vip_swaps {
            debug!(
                round_id = %round.id,
                vip_id = %swap.vip_id,
                displaced_id = %swap.displaced_id,
                "VIP rebalanced into pairing"
            );
        }

        let topics = match uow.load_icebreaker_topics().await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(round_id = %round.id, error = %e, "Icebreaker topics unavailable");
                Vec::new()
            }
        };

        let unpaired_participant_ids = plan.unpaired_ids();
        let mut pairings = Vec::with_capacity(plan.pairs.len());
        for pair in plan.pairs {
            let pairing = uow
                .insert_pairing(&NewPairing {
                    round_id: round.id,
                    participant_a: pair.first.id,
                    participant_b: pair.second.id,
                    score: pair.score,
                })
                .await?;

            let picked = pick_topics(&topics, &mut rng);
            let mut icebreakers = Vec::new();
            if !picked.is_empty() {
                let topic_ids: Vec<Uuid> = picked.iter().map(|t| t.id).collect();
                match uow.assign_icebreakers(pairing.id, &topic_ids).await {
                    Ok(()) => icebreakers = picked.into_iter().map(|t| t.text).collect(),
                    Err(e) => warn!(
                        round_id = %round.id,
                        pairing_id = %pairing.id,
                        error = %e,
                        "Icebreaker assignment failed"
                    ),
                }
            }

            pairings.push(CommittedPairing {
                notice: PairingNotice {
                    pairing_id: pairing.id,
                    first: pair.first,
                    second: pair.second,
                    icebreakers,
                },
                pairing,
            });
        }

        let completion = RoundCompletion {
            participant_count: i32::try_from(plan.eligible_count).unwrap_or(i32::MAX),
            pairing_count: i32::try_from(pairings.len()).unwrap_or(i32::MAX),
            unpaired_participant_ids,
        };
        uow.complete_round(round.id, &completion).await?;

        Ok(UnitResult {
            settings: snapshot.settings,
            completion,
            pairings,
            recipients: snapshot
                .participants
                .iter()
                .map(|p| (p.id, Recipient::from(p)))
                .collect(),
        })
    }

    /// Record the failure and alert operators. Returns the error to surface.
    async fn fail_round(
        &self,
        round_id: Uuid,
        failure: UnitFailure,
        now: time::OffsetDateTime,
    ) -> RoundError {
        let message = failure.to_string();
        match &failure {
            UnitFailure::Ineligible(_) => {
                warn!(round_id = %round_id, reason = %message, "Matching round rejected")
            }
            UnitFailure::Store(_) => {
                error!(round_id = %round_id, error = %message, "Matching round failed")
            }
        }

        if let Err(e) = self.rounds.mark_round_failed(round_id, &message).await {
            error!(round_id = %round_id, error = %e, "Failed to mark round failed");
        }
        let alert = format!("Matching round {round_id} failed: {message}");
        if let Err(e) = self
            .queue
            .enqueue_admin_alert(Some(round_id), &alert, now)
            .await
        {
            warn!(round_id = %round_id, error = %e, "Failed to enqueue admin alert");
        }

        match failure {
            UnitFailure::Ineligible(EligibilityError::InsufficientParticipants { eligible }) => {
                RoundError::InsufficientParticipants {
                    round_id: Some(round_id),
                    eligible,
                }
            }
            UnitFailure::Store(source) => RoundError::Aborted { round_id, source },
        }
    }

    /// Best-effort side effects of a committed round.
    async fn after_commit(
        &self,
        round: MatchingRound,
        result: UnitResult,
        now: time::OffsetDateTime,
    ) -> RoundReport {
        let UnitResult {
            settings,
            pairings: committed,
            recipients,
            ..
        } = result;

        let mut pairings = Vec::with_capacity(committed.len());
        let mut notices = Vec::with_capacity(committed.len());
        let mut meetings_scheduled = 0;
        let mut notifications_enqueued = 0;

        let scheduler = self
            .meetings
            .as_deref()
            .filter(|_| settings.auto_schedule_meetings);
        for CommittedPairing {
            mut pairing,
            notice,
        } in committed
        {
            let booked = match scheduler {
                Some(scheduler) => {
                    self.schedule_meeting(scheduler, &pairing, &notice, &recipients)
                        .await
                }
                None => None,
            };
            if let Some(at) = booked {
                meetings_scheduled += 1;
                pairing.meeting_scheduled_at = Some(at);
                match self
                    .queue
                    .enqueue_meeting_followups(round.id, &notice, at, now)
                    .await
                {
                    Ok(count) => notifications_enqueued += count,
                    Err(e) => warn!(
                        round_id = %round.id,
                        pairing_id = %pairing.id,
                        error = %e,
                        "Failed to enqueue meeting follow-ups"
                    ),
                }
            }
            pairings.push(pairing);
            notices.push(notice);
        }

        match self
            .queue
            .enqueue_pairing_announcements(round.id, &notices, now)
            .await
        {
            Ok(count) => notifications_enqueued += count,
            Err(e) => warn!(
                round_id = %round.id,
                error = %e,
                "Failed to enqueue pairing announcements"
            ),
        }

        if let Some(events) = &self.events {
            let event = RoundCompleted {
                round_id: round.id,
                pairing_count: pairings.len(),
                notifications_enqueued,
            };
            match events.try_send(event) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => {
                    debug!(round_id = %round.id, "No dispatcher listening for completed rounds")
                }
            }
        }

        RoundReport {
            round,
            pairings,
            meetings_scheduled,
            notifications_enqueued,
        }
    }

    /// Book a meeting and record it. Returns the meeting time if booked.
    async fn schedule_meeting(
        &self,
        scheduler: &dyn MeetingScheduler,
        pairing: &Pairing,
        notice: &PairingNotice,
        recipients: &HashMap<Uuid, Recipient>,
    ) -> Option<time::OffsetDateTime> {
        let (Some(first), Some(second)) = (
            recipients.get(&pairing.participant_a),
            recipients.get(&pairing.participant_b),
        ) else {
            warn!(pairing_id = %pairing.id, "Pairing members missing from snapshot");
            return None;
        };
        let request = MeetingRequest {
            pairing_id: pairing.id,
            participants: [first.clone(), second.clone()],
            icebreakers: notice.icebreakers.clone(),
        };

        match scheduler.schedule(&request).await {
            Ok(MeetingOutcome::Scheduled { at, event_ref }) => {
                if let Err(e) = self.rounds.record_meeting(pairing.id, at, &event_ref).await {
                    warn!(pairing_id = %pairing.id, error = %e, "Failed to record meeting");
                }
                Some(at)
            }
            Ok(MeetingOutcome::NoCommonAvailability) => {
                info!(pairing_id = %pairing.id, "No common availability, pairing left unscheduled");
                None
            }
            Err(e) => {
                warn!(pairing_id = %pairing.id, error = %e, "Meeting scheduling failed");
                None
            }
        }
    }
}
