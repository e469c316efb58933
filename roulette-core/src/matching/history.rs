//! Lookup sets built once per round so the matcher's inner loop stays O(1)
//! per comparison.

use crate::entities::exclusion::ExclusionPair;
use crate::entities::pairing::PairHistoryEntry;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Unordered pair of participant ids, stored smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(Uuid, Uuid);

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b { PairKey(a, b) } else { PairKey(b, a) }
    }
}

/// How often each pair met within the lookback window.
#[derive(Debug, Clone, Default)]
pub struct PairHistory {
    counts: HashMap<PairKey, u32>,
}

impl PairHistory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a PairHistoryEntry>,
    {
        let mut counts = HashMap::new();
        for entry in entries {
            *counts
                .entry(PairKey::new(entry.participant_a, entry.participant_b))
                .or_insert(0u32) += 1;
        }
        Self { counts }
    }

    pub fn times_paired(&self, a: Uuid, b: Uuid) -> u32 {
        self.counts.get(&PairKey::new(a, b)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Pairs that must never be matched.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    pairs: HashSet<PairKey>,
}

impl ExclusionSet {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = &'a ExclusionPair>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|p| PairKey::new(p.participant_low, p.participant_high))
                .collect(),
        }
    }

    pub fn contains(&self, a: Uuid, b: Uuid) -> bool {
        self.pairs.contains(&PairKey::new(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round: u128, a: u128, b: u128) -> PairHistoryEntry {
        PairHistoryEntry {
            round_id: Uuid::from_u128(round),
            participant_a: Uuid::from_u128(a),
            participant_b: Uuid::from_u128(b),
        }
    }

    #[test]
    fn test_history_counts_unordered() {
        let entries = vec![entry(10, 1, 2), entry(11, 2, 1), entry(11, 3, 4)];
        let history = PairHistory::from_entries(&entries);
        assert_eq!(history.times_paired(Uuid::from_u128(1), Uuid::from_u128(2)), 2);
        assert_eq!(history.times_paired(Uuid::from_u128(4), Uuid::from_u128(3)), 1);
        assert_eq!(history.times_paired(Uuid::from_u128(1), Uuid::from_u128(3)), 0);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_exclusions_are_symmetric() {
        let pairs = vec![ExclusionPair {
            participant_low: Uuid::from_u128(5),
            participant_high: Uuid::from_u128(9),
        }];
        let set = ExclusionSet::from_pairs(&pairs);
        assert!(set.contains(Uuid::from_u128(9), Uuid::from_u128(5)));
        assert!(set.contains(Uuid::from_u128(5), Uuid::from_u128(9)));
        assert!(!set.contains(Uuid::from_u128(5), Uuid::from_u128(6)));
    }
}
