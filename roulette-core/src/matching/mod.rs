//! The matching computation of a round.
//!
//! Everything here is pure and synchronous: the caller loads a snapshot of
//! participants, departments, settings, history and exclusions, and
//! [`plan_round`] turns it into pairings. The same function backs real
//! rounds and dry-run previews.
//!
//! Pipeline: eligibility -> lookup sets -> greedy matching -> VIP rebalance.

pub mod eligibility;
pub mod greedy;
pub mod history;
pub mod icebreakers;
pub mod rebalance;
pub mod scoring;
pub mod settings;

pub use eligibility::{EligibilityError, EligibilityRules, resolve_eligible};
pub use greedy::{Assignment, GreedyMatcher, ScoredPair};
pub use history::{ExclusionSet, PairHistory, PairKey};
pub use rebalance::{VipSwap, rebalance_vips};
pub use scoring::{PairScore, ScoreWeights, ScoringEngine, Veto};
pub use settings::MatchingSettings;

use crate::entities::exclusion::ExclusionPair;
use crate::entities::pairing::PairHistoryEntry;
use crate::entities::participant::{Department, Participant};
use crate::entities::{MatchingPreference, SeniorityLevel};
use rand::Rng;
use roulette_sdk::objects::ParticipantFilter;
use uuid::Uuid;

/// The attributes of an eligible participant that matching looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: Uuid,
    pub display_name: String,
    pub department_id: Option<Uuid>,
    pub seniority: SeniorityLevel,
    pub preference: MatchingPreference,
    pub is_vip: bool,
}

impl From<&Participant> for Candidate {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            department_id: p.department_id,
            seniority: p.seniority,
            preference: p.matching_preference,
            is_vip: p.is_vip,
        }
    }
}

/// Snapshot a round is planned from.
pub struct RoundInput<'a> {
    pub now: time::OffsetDateTime,
    pub settings: &'a MatchingSettings,
    pub participants: &'a [Participant],
    pub departments: &'a [Department],
    pub history: &'a [PairHistoryEntry],
    pub exclusions: &'a [ExclusionPair],
    pub filter: Option<&'a ParticipantFilter>,
    /// Score as if nobody had met before.
    pub ignore_recent_history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPlan {
    pub eligible_count: usize,
    pub pairs: Vec<ScoredPair>,
    /// Participants sitting this round out.
    pub unpaired: Vec<Candidate>,
    pub vip_swaps: Vec<VipSwap>,
}

impl RoundPlan {
    pub fn unpaired_ids(&self) -> Vec<Uuid> {
        self.unpaired.iter().map(|c| c.id).collect()
    }
}

/// Run eligibility, scoring, greedy matching and VIP rebalancing over a
/// snapshot.
pub fn plan_round<R: Rng + ?Sized>(
    input: &RoundInput<'_>,
    rng: &mut R,
) -> Result<RoundPlan, EligibilityError> {
    let rules = EligibilityRules::new(
        input.now,
        input.settings.grace_period(),
        input.departments,
        input.filter,
    );
    let pool = resolve_eligible(input.participants, &rules)?;
    let eligible_count = pool.len();

    let history = if input.ignore_recent_history {
        PairHistory::empty()
    } else {
        PairHistory::from_entries(input.history)
    };
    let exclusions = ExclusionSet::from_pairs(input.exclusions);
    let scorer = ScoringEngine::new(ScoreWeights::from(input.settings), &history, &exclusions);

    let mut assignment = GreedyMatcher::new(&scorer).assign(pool, rng);
    let vip_swaps = if assignment.unmatched.iter().any(|c| c.is_vip) {
        rebalance_vips(&mut assignment, &scorer)
    } else {
        Vec::new()
    };

    Ok(RoundPlan {
        eligible_count,
        pairs: assignment.pairs,
        unpaired: assignment.unmatched,
        vip_swaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::participant;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use time::macros::datetime;

    fn input<'a>(
        settings: &'a MatchingSettings,
        participants: &'a [Participant],
        history: &'a [PairHistoryEntry],
        exclusions: &'a [ExclusionPair],
    ) -> RoundInput<'a> {
        RoundInput {
            now: datetime!(2026-03-02 09:00 UTC),
            settings,
            participants,
            departments: &[],
            history,
            exclusions,
            filter: None,
            ignore_recent_history: false,
        }
    }

    #[test]
    fn test_pool_sizes_yield_floor_half_pairings() {
        let settings = MatchingSettings::default();
        for n in 2..=15u128 {
            let participants: Vec<Participant> = (1..=n).map(participant).collect();
            for seed in 0..8 {
                let plan = plan_round(
                    &input(&settings, &participants, &[], &[]),
                    &mut StdRng::seed_from_u64(seed),
                )
                .unwrap();
                assert_eq!(plan.pairs.len() as u128, n / 2);
                assert_eq!(plan.unpaired.len() as u128, n % 2);

                let mut seen = HashSet::new();
                for pair in &plan.pairs {
                    assert!(seen.insert(pair.first.id));
                    assert!(seen.insert(pair.second.id));
                }
            }
        }
    }

    #[test]
    fn test_seven_without_history_leaves_one_unpaired() {
        let settings = MatchingSettings::default();
        let participants: Vec<Participant> = (1..=7).map(participant).collect();
        let plan = plan_round(
            &input(&settings, &participants, &[], &[]),
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();
        assert_eq!(plan.eligible_count, 7);
        assert_eq!(plan.pairs.len(), 3);
        assert_eq!(plan.unpaired_ids().len(), 1);
        assert!(plan.vip_swaps.is_empty());
    }

    #[test]
    fn test_five_with_vip_never_benches_vip() {
        let settings = MatchingSettings::default();
        let mut participants: Vec<Participant> = (1..=5).map(participant).collect();
        participants[4].is_vip = true;
        let vip_id = participants[4].id;

        let mut swapped = false;
        for seed in 0..64 {
            let plan = plan_round(
                &input(&settings, &participants, &[], &[]),
                &mut StdRng::seed_from_u64(seed),
            )
            .unwrap();
            assert_eq!(plan.pairs.len(), 2);
            assert_ne!(plan.unpaired_ids(), vec![vip_id], "seed {seed}");
            assert!(plan.pairs.iter().any(|p| p.contains(vip_id)));
            swapped |= !plan.vip_swaps.is_empty();
        }
        // Some shuffle leaves the VIP over and forces a swap.
        assert!(swapped);
    }

    #[test]
    fn test_recent_history_steers_away_from_repeats() {
        let settings = MatchingSettings::default();
        let participants: Vec<Participant> = (1..=4).map(participant).collect();
        let history: Vec<PairHistoryEntry> = [(1, 2), (3, 4)]
            .into_iter()
            .map(|(a, b)| PairHistoryEntry {
                round_id: Uuid::from_u128(77),
                participant_a: Uuid::from_u128(a),
                participant_b: Uuid::from_u128(b),
            })
            .collect();
        let repeated = |plan: &RoundPlan| {
            plan.pairs.iter().any(|p| {
                (p.contains(Uuid::from_u128(1)) && p.contains(Uuid::from_u128(2)))
                    || (p.contains(Uuid::from_u128(3)) && p.contains(Uuid::from_u128(4)))
            })
        };

        for seed in 0..16 {
            let plan = plan_round(
                &input(&settings, &participants, &history, &[]),
                &mut StdRng::seed_from_u64(seed),
            )
            .unwrap();
            assert!(!repeated(&plan), "seed {seed}");
        }
    }

    #[test]
    fn test_ignore_recent_history_scores_flat() {
        let settings = MatchingSettings::default();
        let participants: Vec<Participant> = (1..=2).map(participant).collect();
        let history = vec![PairHistoryEntry {
            round_id: Uuid::from_u128(77),
            participant_a: Uuid::from_u128(1),
            participant_b: Uuid::from_u128(2),
        }];
        let mut round = input(&settings, &participants, &history, &[]);
        let penalised = plan_round(&round, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(penalised.pairs[0].score, 50);

        round.ignore_recent_history = true;
        let flat = plan_round(&round, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(flat.pairs[0].score, 100);
    }

    #[test]
    fn test_insufficient_pool_is_rejected() {
        let settings = MatchingSettings::default();
        let participants = vec![participant(1)];
        let err = plan_round(
            &input(&settings, &participants, &[], &[]),
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap_err();
        assert_eq!(err, EligibilityError::InsufficientParticipants { eligible: 1 });
    }

    #[test]
    fn test_oversized_grace_setting_still_plans() {
        let settings =
            MatchingSettings::from_pairs([("matching.grace_period_hours", "9000000000000000")]);
        let participants: Vec<Participant> = (1..=4).map(participant).collect();
        let plan = plan_round(
            &input(&settings, &participants, &[], &[]),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert_eq!(plan.pairs.len(), 2);
    }
}
