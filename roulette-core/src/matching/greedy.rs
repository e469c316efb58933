//! Greedy pairing over a shuffled pool.
//!
//! Each participant, in shuffled order, takes the best-scoring partner among
//! those after it that are still free. A committed pair is never revisited,
//! so the result is not globally optimal. Pools are organisational in size
//! (tens to low hundreds), which keeps the O(n²) scan cheap.

use super::scoring::{PairScore, ScoringEngine};
use super::Candidate;
use rand::Rng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPair {
    pub first: Candidate,
    pub second: Candidate,
    pub score: i64,
}

impl ScoredPair {
    pub fn contains(&self, id: uuid::Uuid) -> bool {
        self.first.id == id || self.second.id == id
    }
}

/// Output of a matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub pairs: Vec<ScoredPair>,
    /// Participants left without a partner, in shuffled order. At most one
    /// unless vetoes left several participants without a compatible partner.
    pub unmatched: Vec<Candidate>,
}

pub struct GreedyMatcher<'a> {
    scorer: &'a ScoringEngine<'a>,
}

impl<'a> GreedyMatcher<'a> {
    pub fn new(scorer: &'a ScoringEngine<'a>) -> Self {
        Self { scorer }
    }

    /// Shuffle `pool` with `rng`, then pair greedily.
    pub fn assign<R: Rng + ?Sized>(&self, mut pool: Vec<Candidate>, rng: &mut R) -> Assignment {
        pool.shuffle(rng);
        self.assign_in_order(pool)
    }

    /// Pair greedily in the given order, without shuffling.
    pub fn assign_in_order(&self, pool: Vec<Candidate>) -> Assignment {
        let mut matched = vec![false; pool.len()];
        let mut pairs = Vec::with_capacity(pool.len() / 2);

        for i in 0..pool.len() {
            if matched[i] {
                continue;
            }

            let mut best: Option<(usize, i64)> = None;
            for j in (i + 1)..pool.len() {
                if matched[j] {
                    continue;
                }
                if let PairScore::Compatible(score) = self.scorer.score(&pool[i], &pool[j]) {
                    // Strictly greater keeps the first candidate on ties.
                    if best.is_none_or(|(_, best_score)| score > best_score) {
                        best = Some((j, score));
                    }
                }
            }

            if let Some((j, score)) = best {
                matched[i] = true;
                matched[j] = true;
                pairs.push((i, j, score));
            }
        }

        let mut slots: Vec<Option<Candidate>> = pool.into_iter().map(Some).collect();
        let pairs = pairs
            .into_iter()
            .filter_map(|(i, j, score)| {
                Some(ScoredPair {
                    first: slots[i].take()?,
                    second: slots[j].take()?,
                    score,
                })
            })
            .collect();
        let unmatched = slots.into_iter().flatten().collect();

        Assignment { pairs, unmatched }
    }
}
