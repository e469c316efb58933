//! In-memory fakes shared by the unit tests.

use crate::entities::exclusion::ExclusionPair;
use crate::entities::icebreaker::IcebreakerTopic;
use crate::entities::matching_round::{MatchingRound, NewRound, RoundCompletion};
use crate::entities::notification_task::{NewNotificationTask, NotificationTask};
use crate::entities::pairing::{NewPairing, PairHistoryEntry, Pairing};
use crate::entities::participant::{Department, Participant, Recipient};
use crate::entities::system_setting::SystemSetting;
use crate::entities::{
    MatchingPreference, NotificationStatus, PairingStatus, RoundStatus, SeniorityLevel,
};
use crate::matching::Candidate;
use crate::meetings::{MeetingError, MeetingOutcome, MeetingRequest, MeetingScheduler};
use crate::senders::{ChannelSender, DeliveryError, OutboundMessage};
use crate::store::{NotificationStore, RoundStore, RoundUnitOfWork, StoreError};
use crate::utils::backoff::DeliveryOutcome;
use async_trait::async_trait;
use sqlx::types::Json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use time::macros::datetime;
use uuid::Uuid;

/// An active, opted-in participant who has long passed the grace period.
pub fn participant(n: u128) -> Participant {
    Participant {
        id: Uuid::from_u128(n),
        display_name: format!("Participant {n}"),
        email: Some(format!("p{n}@example.com")),
        chat_handle: Some(format!("p{n}")),
        department_id: None,
        seniority: SeniorityLevel::Mid,
        matching_preference: MatchingPreference::Any,
        is_vip: false,
        is_active: true,
        opted_in: true,
        opted_in_at: Some(datetime!(2025-01-01 00:00 UTC)),
        skip_grace_period: false,
        available_from: None,
        department_exclusion_override: false,
    }
}

pub fn candidate(n: u128) -> Candidate {
    Candidate::from(&participant(n))
}

pub fn recipient(n: u128) -> Recipient {
    Recipient::from(&participant(n))
}

#[derive(Default)]
struct Failures {
    /// Zero-based index of the pairing insert that fails.
    pairing_insert_at: Option<usize>,
    icebreakers: bool,
    enqueue: bool,
}

#[derive(Default)]
struct MemoryState {
    participants: Vec<Participant>,
    departments: Vec<Department>,
    settings: Vec<SystemSetting>,
    exclusions: Vec<ExclusionPair>,
    topics: Vec<IcebreakerTopic>,
    rounds: Vec<MatchingRound>,
    pairings: Vec<Pairing>,
    icebreakers: Vec<(Uuid, Uuid)>,
    tasks: Vec<NotificationTask>,
    failures: Failures,
}

/// Store fake with the same visibility rules as the Postgres store: unit of
/// work writes stay staged until commit, claims are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_participants(&self, participants: impl IntoIterator<Item = Participant>) {
        self.with(|s| s.participants.extend(participants));
    }

    pub fn add_departments(&self, departments: impl IntoIterator<Item = Department>) {
        self.with(|s| s.departments.extend(departments));
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.with(|s| {
            s.settings.retain(|setting| setting.key != key);
            s.settings.push(SystemSetting {
                key: key.to_string(),
                value: value.to_string(),
            });
        });
    }

    pub fn add_exclusion(&self, a: Uuid, b: Uuid) {
        self.with(|s| s.exclusions.extend(ExclusionPair::new(a, b)));
    }

    pub fn add_topics(&self, texts: &[&str]) {
        self.with(|s| {
            s.topics.extend(texts.iter().map(|text| IcebreakerTopic {
                id: Uuid::now_v7(),
                text: text.to_string(),
            }))
        });
    }

    pub fn fail_pairing_insert_at(&self, index: usize) {
        self.with(|s| s.failures.pairing_insert_at = Some(index));
    }

    pub fn fail_icebreakers(&self) {
        self.with(|s| s.failures.icebreakers = true);
    }

    pub fn fail_enqueue(&self) {
        self.with(|s| s.failures.enqueue = true);
    }

    pub fn rounds(&self) -> Vec<MatchingRound> {
        self.with(|s| s.rounds.clone())
    }

    pub fn pairings(&self) -> Vec<Pairing> {
        self.with(|s| s.pairings.clone())
    }

    /// `(pairing_id, topic_id)` rows.
    pub fn icebreaker_assignments(&self) -> Vec<(Uuid, Uuid)> {
        self.with(|s| s.icebreakers.clone())
    }

    pub fn tasks(&self) -> Vec<NotificationTask> {
        self.with(|s| s.tasks.clone())
    }
}

fn new_round(round: &NewRound, status: RoundStatus) -> MatchingRound {
    let now = time::OffsetDateTime::now_utc();
    MatchingRound {
        id: Uuid::now_v7(),
        scheduled_date: round.scheduled_date,
        executed_at: Some(now),
        status,
        source: round.source,
        participant_count: 0,
        pairing_count: 0,
        filter: round.filter.clone().map(Json),
        ignore_recent_history: round.ignore_recent_history,
        unpaired_participant_ids: Vec::new(),
        error_message: None,
        created_at: now,
    }
}

#[async_trait]
impl RoundStore for MemoryStore {
    async fn start_round(&self, round: NewRound) -> Result<MatchingRound, StoreError> {
        self.with(|s| {
            if s.rounds.iter().any(|r| r.status == RoundStatus::InProgress) {
                return Err(StoreError::RoundInProgress);
            }
            let round = new_round(&round, RoundStatus::InProgress);
            s.rounds.push(round.clone());
            Ok(round)
        })
    }

    async fn mark_round_failed(
        &self,
        round_id: Uuid,
        error_message: &str,
    ) -> Result<(), StoreError> {
        self.with(|s| {
            if let Some(round) = s.rounds.iter_mut().find(|r| {
                r.id == round_id
                    && matches!(r.status, RoundStatus::Scheduled | RoundStatus::InProgress)
            }) {
                round.status = RoundStatus::Failed;
                round.error_message = Some(error_message.to_string());
            }
        });
        Ok(())
    }

    async fn fail_stale_rounds(
        &self,
        started_before: time::OffsetDateTime,
        error_message: &str,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.with(|s| {
            s.rounds
                .iter_mut()
                .filter(|r| r.status == RoundStatus::InProgress && r.created_at < started_before)
                .map(|r| {
                    r.status = RoundStatus::Failed;
                    r.error_message = Some(error_message.to_string());
                    r.id
                })
                .collect()
        }))
    }

    async fn get_round(&self, round_id: Uuid) -> Result<Option<MatchingRound>, StoreError> {
        Ok(self.with(|s| s.rounds.iter().find(|r| r.id == round_id).cloned()))
    }

    async fn pairings_for_round(&self, round_id: Uuid) -> Result<Vec<Pairing>, StoreError> {
        Ok(self.with(|s| {
            s.pairings
                .iter()
                .filter(|p| p.round_id == round_id)
                .cloned()
                .collect()
        }))
    }

    async fn record_meeting(
        &self,
        pairing_id: Uuid,
        scheduled_at: time::OffsetDateTime,
        calendar_event_ref: &str,
    ) -> Result<(), StoreError> {
        self.with(|s| {
            if let Some(pairing) = s.pairings.iter_mut().find(|p| p.id == pairing_id) {
                pairing.meeting_scheduled_at = Some(scheduled_at);
                pairing.calendar_event_ref = Some(calendar_event_ref.to_string());
            }
        });
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn RoundUnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            pairings: Vec::new(),
            icebreakers: Vec::new(),
            completion: None,
            inserts: 0,
        }))
    }
}

struct MemoryUnitOfWork {
    store: MemoryStore,
    pairings: Vec<Pairing>,
    icebreakers: Vec<(Uuid, Uuid)>,
    completion: Option<(Uuid, RoundCompletion)>,
    inserts: usize,
}

#[async_trait]
impl RoundUnitOfWork for MemoryUnitOfWork {
    async fn insert_scratch_round(
        &mut self,
        round: &NewRound,
    ) -> Result<MatchingRound, StoreError> {
        // Never written to shared state, so a rollback leaves nothing behind.
        Ok(new_round(round, RoundStatus::Scheduled))
    }

    async fn load_settings(&mut self) -> Result<Vec<SystemSetting>, StoreError> {
        Ok(self.store.with(|s| s.settings.clone()))
    }

    async fn load_participants(&mut self) -> Result<Vec<Participant>, StoreError> {
        Ok(self.store.with(|s| {
            s.participants
                .iter()
                .filter(|p| p.is_active && p.opted_in)
                .cloned()
                .collect()
        }))
    }

    async fn load_departments(&mut self) -> Result<Vec<Department>, StoreError> {
        Ok(self.store.with(|s| s.departments.clone()))
    }

    async fn load_history(
        &mut self,
        lookback_rounds: i64,
    ) -> Result<Vec<PairHistoryEntry>, StoreError> {
        let lookback = usize::try_from(lookback_rounds).unwrap_or(0);
        Ok(self.store.with(|s| {
            let mut completed: Vec<&MatchingRound> = s
                .rounds
                .iter()
                .filter(|r| r.status == RoundStatus::Completed)
                .collect();
            completed.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
            let recent: HashSet<Uuid> = completed.iter().take(lookback).map(|r| r.id).collect();
            s.pairings
                .iter()
                .filter(|p| recent.contains(&p.round_id) && p.status != PairingStatus::Cancelled)
                .map(|p| PairHistoryEntry {
                    round_id: p.round_id,
                    participant_a: p.participant_a,
                    participant_b: p.participant_b,
                })
                .collect()
        }))
    }

    async fn load_exclusions(&mut self) -> Result<Vec<ExclusionPair>, StoreError> {
        Ok(self.store.with(|s| s.exclusions.clone()))
    }

    async fn insert_pairing(&mut self, pairing: &NewPairing) -> Result<Pairing, StoreError> {
        let index = self.inserts;
        self.inserts += 1;
        if self.store.with(|s| s.failures.pairing_insert_at) == Some(index) {
            return Err(StoreError::Backend(format!("pairing insert {index} failed")));
        }
        let row = Pairing {
            id: Uuid::now_v7(),
            round_id: pairing.round_id,
            participant_a: pairing.participant_a,
            participant_b: pairing.participant_b,
            status: PairingStatus::Pending,
            score: pairing.score,
            meeting_scheduled_at: None,
            meeting_completed_at: None,
            calendar_event_ref: None,
            created_at: time::OffsetDateTime::now_utc(),
        };
        self.pairings.push(row.clone());
        Ok(row)
    }

    async fn load_icebreaker_topics(&mut self) -> Result<Vec<IcebreakerTopic>, StoreError> {
        Ok(self.store.with(|s| s.topics.clone()))
    }

    async fn assign_icebreakers(
        &mut self,
        pairing_id: Uuid,
        topic_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        if self.store.with(|s| s.failures.icebreakers) {
            return Err(StoreError::Backend("icebreaker table unavailable".into()));
        }
        self.icebreakers
            .extend(topic_ids.iter().map(|topic_id| (pairing_id, *topic_id)));
        Ok(())
    }

    async fn complete_round(
        &mut self,
        round_id: Uuid,
        completion: &RoundCompletion,
    ) -> Result<(), StoreError> {
        self.completion = Some((round_id, completion.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork {
            store,
            pairings,
            icebreakers,
            completion,
            ..
        } = *self;
        store.with(|s| {
            if let Some((round_id, completion)) = completion {
                let round = s
                    .rounds
                    .iter_mut()
                    .find(|r| r.id == round_id && r.status == RoundStatus::InProgress)
                    .ok_or_else(|| StoreError::Backend(format!("round {round_id} not open")))?;
                round.status = RoundStatus::Completed;
                round.participant_count = completion.participant_count;
                round.pairing_count = completion.pairing_count;
                round.unpaired_participant_ids = completion.unpaired_participant_ids;
            }
            s.pairings.extend(pairings);
            s.icebreakers.extend(icebreakers);
            Ok(())
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn enqueue(&self, tasks: Vec<NewNotificationTask>) -> Result<Vec<Uuid>, StoreError> {
        self.with(|s| {
            if s.failures.enqueue {
                return Err(StoreError::Backend("notification queue unavailable".into()));
            }
            let now = time::OffsetDateTime::now_utc();
            Ok(tasks
                .into_iter()
                .map(|task| {
                    let id = Uuid::now_v7();
                    s.tasks.push(NotificationTask {
                        id,
                        round_id: task.round_id,
                        pairing_id: task.pairing_id,
                        recipient_id: task.recipient_id,
                        notification_type: task.notification_type,
                        channel: task.channel,
                        status: NotificationStatus::Pending,
                        scheduled_for: task.scheduled_for,
                        sent_at: None,
                        claimed_at: None,
                        error_message: None,
                        retry_count: 0,
                        variables: Json(task.variables),
                        created_at: now,
                    });
                    id
                })
                .collect())
        })
    }

    async fn claim_due(
        &self,
        now: time::OffsetDateTime,
        stale_before: time::OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<NotificationTask>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.with(|s| {
            let mut due: Vec<&mut NotificationTask> = s
                .tasks
                .iter_mut()
                .filter(|t| match t.status {
                    NotificationStatus::Pending => t.scheduled_for <= now,
                    NotificationStatus::Sending => t.claimed_at.is_some_and(|c| c < stale_before),
                    NotificationStatus::Sent | NotificationStatus::Failed => false,
                })
                .collect();
            due.sort_by_key(|t| (t.scheduled_for, t.id));
            due.into_iter()
                .take(limit)
                .map(|t| {
                    t.status = NotificationStatus::Sending;
                    t.claimed_at = Some(now);
                    t.clone()
                })
                .collect()
        }))
    }

    async fn settle(
        &self,
        task_id: Uuid,
        claimed_at: time::OffsetDateTime,
        outcome: &DeliveryOutcome,
    ) -> Result<bool, StoreError> {
        Ok(self.with(|s| {
            let Some(task) = s.tasks.iter_mut().find(|t| {
                t.id == task_id
                    && t.status == NotificationStatus::Sending
                    && t.claimed_at == Some(claimed_at)
            })
            else {
                return false;
            };
            task.claimed_at = None;
            match outcome {
                DeliveryOutcome::Sent { at } => {
                    task.status = NotificationStatus::Sent;
                    task.sent_at = Some(*at);
                    task.error_message = None;
                }
                DeliveryOutcome::Retrying { at, attempt, error } => {
                    task.status = NotificationStatus::Pending;
                    task.scheduled_for = *at;
                    task.retry_count = *attempt;
                    task.error_message = Some(error.clone());
                }
                DeliveryOutcome::PermanentlyFailed { attempts, error } => {
                    task.status = NotificationStatus::Failed;
                    task.retry_count = *attempts;
                    task.error_message = Some(error.clone());
                }
            }
            true
        }))
    }

    async fn list_failed(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationTask>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);
        Ok(self.with(|s| {
            let mut failed: Vec<NotificationTask> = s
                .tasks
                .iter()
                .filter(|t| t.status == NotificationStatus::Failed)
                .cloned()
                .collect();
            failed.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            failed.into_iter().skip(offset).take(limit).collect()
        }))
    }

    async fn requeue(
        &self,
        task_id: Uuid,
        now: time::OffsetDateTime,
    ) -> Result<Option<NotificationTask>, StoreError> {
        Ok(self.with(|s| {
            let task = s
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id && t.status == NotificationStatus::Failed)?;
            task.status = NotificationStatus::Pending;
            task.scheduled_for = now;
            task.retry_count = 0;
            task.claimed_at = None;
            Some(task.clone())
        }))
    }

    async fn recipient(&self, participant_id: Uuid) -> Result<Option<Recipient>, StoreError> {
        Ok(self.with(|s| {
            s.participants
                .iter()
                .find(|p| p.id == participant_id)
                .map(Recipient::from)
        }))
    }
}

/// Channel sender that records every attempt.
#[derive(Default)]
pub struct RecordingSender {
    fail: bool,
    attempts: Mutex<usize>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    /// Rejects every message.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "relay unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Meeting scheduler that books every pairing at a fixed time, or finds no
/// common slot when `at` is `None`.
#[derive(Default)]
pub struct FixedMeetingScheduler {
    pub at: Option<time::OffsetDateTime>,
    requests: Mutex<Vec<MeetingRequest>>,
}

impl FixedMeetingScheduler {
    pub fn at(at: time::OffsetDateTime) -> Self {
        Self {
            at: Some(at),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<MeetingRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeetingScheduler for FixedMeetingScheduler {
    async fn schedule(&self, request: &MeetingRequest) -> Result<MeetingOutcome, MeetingError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(match self.at {
            Some(at) => MeetingOutcome::Scheduled {
                at,
                event_ref: format!("evt-{}", request.pairing_id),
            },
            None => MeetingOutcome::NoCommonAvailability,
        })
    }
}
