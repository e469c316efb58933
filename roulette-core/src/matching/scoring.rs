//! Pair compatibility scoring.
//!
//! Scores only rank candidates. Hard constraints (exclusions and matching
//! preferences) produce a [`PairScore::Vetoed`] instead of a number, and a
//! vetoed pair is never committed.

use super::history::{ExclusionSet, PairHistory};
use super::settings::MatchingSettings;
use super::Candidate;
use crate::entities::MatchingPreference;
use std::cmp::Ordering;
use uuid::Uuid;

/// Starting score of every compatible pair.
pub const BASE_SCORE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub repeat_penalty: i64,
    pub cross_department_weight: i64,
    pub cross_seniority_weight: i64,
}

impl From<&MatchingSettings> for ScoreWeights {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            repeat_penalty: settings.repeat_penalty,
            cross_department_weight: settings.cross_department_weight,
            cross_seniority_weight: settings.cross_seniority_weight,
        }
    }
}

/// Why a pair can never be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Veto {
    SameParticipant,
    Excluded,
    Preference {
        participant_id: Uuid,
        preference: MatchingPreference,
    },
}

/// Result of scoring a pair. Every vetoed score orders below every
/// compatible one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairScore {
    Vetoed(Veto),
    Compatible(i64),
}

impl PairScore {
    pub fn value(&self) -> Option<i64> {
        match self {
            PairScore::Compatible(score) => Some(*score),
            PairScore::Vetoed(_) => None,
        }
    }

    pub fn is_compatible(&self) -> bool {
        matches!(self, PairScore::Compatible(_))
    }
}

impl PartialOrd for PairScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (PairScore::Compatible(a), PairScore::Compatible(b)) => Some(a.cmp(b)),
            (PairScore::Compatible(_), PairScore::Vetoed(_)) => Some(Ordering::Greater),
            (PairScore::Vetoed(_), PairScore::Compatible(_)) => Some(Ordering::Less),
            (PairScore::Vetoed(a), PairScore::Vetoed(b)) => (a == b).then_some(Ordering::Equal),
        }
    }
}

pub struct ScoringEngine<'a> {
    weights: ScoreWeights,
    history: &'a PairHistory,
    exclusions: &'a ExclusionSet,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(weights: ScoreWeights, history: &'a PairHistory, exclusions: &'a ExclusionSet) -> Self {
        Self {
            weights,
            history,
            exclusions,
        }
    }

    /// Score an unordered pair; `score(a, b) == score(b, a)` up to which
    /// participant a preference veto names.
    pub fn score(&self, a: &Candidate, b: &Candidate) -> PairScore {
        if a.id == b.id {
            return PairScore::Vetoed(Veto::SameParticipant);
        }
        if self.exclusions.contains(a.id, b.id) {
            return PairScore::Vetoed(Veto::Excluded);
        }
        if let Some(veto) = preference_veto(a, b).or_else(|| preference_veto(b, a)) {
            return PairScore::Vetoed(veto);
        }

        let repeats = i64::from(self.history.times_paired(a.id, b.id));
        let mut score = BASE_SCORE.saturating_sub(self.weights.repeat_penalty.saturating_mul(repeats));
        if departments_differ(a, b) {
            score = score.saturating_add(self.weights.cross_department_weight);
        }
        if a.seniority != b.seniority {
            score = score.saturating_add(self.weights.cross_seniority_weight);
        }
        PairScore::Compatible(score)
    }

    pub fn is_compatible(&self, a: &Candidate, b: &Candidate) -> bool {
        self.score(a, b).is_compatible()
    }
}

/// Departments are only compared when both sides belong to one.
fn departments_differ(a: &Candidate, b: &Candidate) -> bool {
    matches!((a.department_id, b.department_id), (Some(x), Some(y)) if x != y)
}

fn departments_match(a: &Candidate, b: &Candidate) -> bool {
    matches!((a.department_id, b.department_id), (Some(x), Some(y)) if x == y)
}

/// Whether `holder`'s own preference rules out `other`.
fn preference_veto(holder: &Candidate, other: &Candidate) -> Option<Veto> {
    let vetoed = match holder.preference {
        MatchingPreference::Any => false,
        MatchingPreference::CrossDepartmentOnly => departments_match(holder, other),
        MatchingPreference::SameDepartmentOnly => departments_differ(holder, other),
        MatchingPreference::CrossSeniorityOnly => holder.seniority == other.seniority,
    };
    vetoed.then_some(Veto::Preference {
        participant_id: holder.id,
        preference: holder.preference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::exclusion::ExclusionPair;
    use crate::entities::pairing::PairHistoryEntry;
    use crate::entities::SeniorityLevel;
    use crate::testing::candidate;

    const WEIGHTS: ScoreWeights = ScoreWeights {
        repeat_penalty: 50,
        cross_department_weight: 20,
        cross_seniority_weight: 10,
    };

    fn dept(n: u128) -> Option<Uuid> {
        Some(Uuid::from_u128(1000 + n))
    }

    #[test]
    fn test_base_and_bonuses() {
        let history = PairHistory::empty();
        let exclusions = ExclusionSet::default();
        let engine = ScoringEngine::new(WEIGHTS, &history, &exclusions);

        let mut a = candidate(1);
        let mut b = candidate(2);
        assert_eq!(engine.score(&a, &b), PairScore::Compatible(100));

        a.department_id = dept(1);
        b.department_id = dept(2);
        assert_eq!(engine.score(&a, &b), PairScore::Compatible(120));

        b.seniority = SeniorityLevel::Lead;
        assert_eq!(engine.score(&a, &b), PairScore::Compatible(130));
        assert_eq!(engine.score(&b, &a), PairScore::Compatible(130));
    }

    #[test]
    fn test_repeat_penalty_is_monotonic() {
        let a = candidate(1);
        let b = candidate(2);
        let exclusions = ExclusionSet::default();

        let mut previous = PairScore::Compatible(i64::MAX);
        for times in 0..5u128 {
            let entries: Vec<PairHistoryEntry> = (0..times)
                .map(|round| PairHistoryEntry {
                    round_id: Uuid::from_u128(500 + round),
                    participant_a: a.id,
                    participant_b: b.id,
                })
                .collect();
            let history = PairHistory::from_entries(&entries);
            let engine = ScoringEngine::new(WEIGHTS, &history, &exclusions);
            let score = engine.score(&a, &b);
            assert!(score < previous, "{score:?} should be below {previous:?}");
            previous = score;
        }
        assert_eq!(previous, PairScore::Compatible(100 - 4 * 50));
    }

    #[test]
    fn test_exclusion_vetoes_before_preferences() {
        let history = PairHistory::empty();
        let a = candidate(1);
        let mut b = candidate(2);
        b.preference = MatchingPreference::CrossSeniorityOnly;
        let exclusions = ExclusionSet::from_pairs(&[ExclusionPair::new(a.id, b.id).unwrap()]);
        let engine = ScoringEngine::new(WEIGHTS, &history, &exclusions);
        assert_eq!(engine.score(&a, &b), PairScore::Vetoed(Veto::Excluded));
    }

    #[test]
    fn test_preference_vetoes() {
        let history = PairHistory::empty();
        let exclusions = ExclusionSet::default();
        let engine = ScoringEngine::new(WEIGHTS, &history, &exclusions);

        let mut cross = candidate(1);
        cross.preference = MatchingPreference::CrossDepartmentOnly;
        cross.department_id = dept(1);
        let mut colleague = candidate(2);
        colleague.department_id = dept(1);
        let mut outsider = candidate(3);
        outsider.department_id = dept(2);

        assert!(!engine.is_compatible(&cross, &colleague));
        assert!(!engine.is_compatible(&colleague, &cross));
        assert!(engine.is_compatible(&cross, &outsider));

        let mut same = candidate(4);
        same.preference = MatchingPreference::SameDepartmentOnly;
        same.department_id = dept(1);
        assert!(engine.is_compatible(&same, &colleague));
        assert_eq!(
            engine.score(&outsider, &same),
            PairScore::Vetoed(Veto::Preference {
                participant_id: same.id,
                preference: MatchingPreference::SameDepartmentOnly,
            })
        );

        let mut mixer = candidate(5);
        mixer.preference = MatchingPreference::CrossSeniorityOnly;
        let peer = candidate(6);
        let mut senior = candidate(7);
        senior.seniority = SeniorityLevel::Senior;
        assert!(!engine.is_compatible(&mixer, &peer));
        assert!(engine.is_compatible(&mixer, &senior));
    }

    #[test]
    fn test_unknown_department_is_never_compared() {
        let history = PairHistory::empty();
        let exclusions = ExclusionSet::default();
        let engine = ScoringEngine::new(WEIGHTS, &history, &exclusions);

        let mut same = candidate(1);
        same.preference = MatchingPreference::SameDepartmentOnly;
        same.department_id = dept(1);
        let floating = candidate(2);
        assert_eq!(engine.score(&same, &floating), PairScore::Compatible(100));
    }

    #[test]
    fn test_vetoed_orders_below_any_score() {
        let veto = PairScore::Vetoed(Veto::Excluded);
        assert!(veto < PairScore::Compatible(i64::MIN));
        assert!(PairScore::Compatible(-500) > veto);
        assert_eq!(veto.value(), None);
    }
}
