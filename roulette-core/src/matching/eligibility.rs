//! Selection of the participant pool for a round.

use super::Candidate;
use crate::entities::participant::{Department, Participant};
use crate::entities::SeniorityLevel;
use roulette_sdk::objects::ParticipantFilter;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Smallest pool that can produce a pairing.
pub const MIN_ELIGIBLE: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    /// Business-rule rejection, not an infrastructure fault.
    #[error("insufficient eligible participants: {eligible} eligible, at least {MIN_ELIGIBLE} required")]
    InsufficientParticipants { eligible: usize },
}

/// Everything besides the participants themselves that decides eligibility.
pub struct EligibilityRules<'a> {
    pub now: time::OffsetDateTime,
    pub grace_period: time::Duration,
    /// `matching_enabled` per department.
    pub departments: HashMap<Uuid, bool>,
    pub filter: Option<&'a ParticipantFilter>,
}

impl<'a> EligibilityRules<'a> {
    pub fn new(
        now: time::OffsetDateTime,
        grace_period: time::Duration,
        departments: &[Department],
        filter: Option<&'a ParticipantFilter>,
    ) -> Self {
        Self {
            now,
            grace_period,
            departments: departments
                .iter()
                .map(|d| (d.id, d.matching_enabled))
                .collect(),
            filter,
        }
    }

    /// Whether a single participant may take part in this round.
    pub fn is_eligible(&self, participant: &Participant) -> bool {
        participant.is_active
            && participant.opted_in
            && self.is_available(participant)
            && self.department_allows(participant)
            && self.grace_period_elapsed(participant)
            && self.filter_allows(participant)
    }

    fn is_available(&self, participant: &Participant) -> bool {
        participant
            .available_from
            .is_none_or(|from| from <= self.now.date())
    }

    fn department_allows(&self, participant: &Participant) -> bool {
        if participant.department_exclusion_override {
            return true;
        }
        match participant.department_id {
            // Participants outside any department are never blocked here.
            None => true,
            Some(id) => self.departments.get(&id).copied().unwrap_or(true),
        }
    }

    fn grace_period_elapsed(&self, participant: &Participant) -> bool {
        if participant.skip_grace_period {
            return true;
        }
        match participant.opted_in_at {
            // A cutoff before the earliest representable instant cannot have passed.
            Some(opted_in_at) => self
                .now
                .checked_sub(self.grace_period)
                .is_some_and(|cutoff| opted_in_at <= cutoff),
            // Opt-ins recorded before timestamps were kept.
            None => true,
        }
    }

    fn filter_allows(&self, participant: &Participant) -> bool {
        let Some(filter) = self.filter else {
            return true;
        };
        let department_ok = filter.department_ids.is_empty()
            || participant
                .department_id
                .is_some_and(|id| filter.department_ids.contains(&id));
        let seniority_ok = filter.seniority_levels.is_empty()
            || filter
                .seniority_levels
                .iter()
                .any(|level| SeniorityLevel::from(*level) == participant.seniority);
        let participant_ok =
            filter.participant_ids.is_empty() || filter.participant_ids.contains(&participant.id);
        department_ok && seniority_ok && participant_ok
    }
}

/// The eligible subset of `participants`, in input order.
pub fn resolve_eligible(
    participants: &[Participant],
    rules: &EligibilityRules<'_>,
) -> Result<Vec<Candidate>, EligibilityError> {
    let eligible: Vec<Candidate> = participants
        .iter()
        .filter(|p| rules.is_eligible(p))
        .map(Candidate::from)
        .collect();

    if eligible.len() < MIN_ELIGIBLE {
        return Err(EligibilityError::InsufficientParticipants {
            eligible: eligible.len(),
        });
    }
    Ok(eligible)
}
