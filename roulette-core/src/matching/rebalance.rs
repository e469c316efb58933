//! Keeps VIP participants from sitting out a round.

use super::greedy::{Assignment, ScoredPair};
use super::scoring::{PairScore, ScoringEngine};
use super::Candidate;
use tracing::{debug, warn};
use uuid::Uuid;

/// A VIP moved into an existing pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VipSwap {
    pub vip_id: Uuid,
    pub displaced_id: Uuid,
    pub pairing_index: usize,
}

/// Swap each unmatched VIP into a committed pairing, displacing a non-VIP
/// member whose partner is compatible with the VIP. The displaced member
/// takes the VIP's place among the unmatched.
///
/// Pairings are scanned in commit order and the first workable one is used.
/// When no swap exists (every participant is a VIP, or every candidate
/// partner vetoes the VIP) the VIP sits out and a warning is logged.
pub fn rebalance_vips(assignment: &mut Assignment, scorer: &ScoringEngine<'_>) -> Vec<VipSwap> {
    let mut swaps = Vec::new();

    for slot in 0..assignment.unmatched.len() {
        if !assignment.unmatched[slot].is_vip {
            continue;
        }

        let vip = assignment.unmatched[slot].clone();
        let Some((pairing_index, displace_first, score)) =
            find_swap(&assignment.pairs, &vip, scorer)
        else {
            warn!(
                participant_id = %vip.id,
                "VIP participant sits out: no pairing with a compatible non-VIP member"
            );
            continue;
        };

        let pair = &mut assignment.pairs[pairing_index];
        let displaced = if displace_first {
            std::mem::replace(&mut pair.first, vip)
        } else {
            std::mem::replace(&mut pair.second, vip)
        };
        pair.score = score;

        debug!(
            vip_id = %assignment.unmatched[slot].id,
            displaced_id = %displaced.id,
            pairing_index,
            "Swapped VIP into pairing"
        );
        swaps.push(VipSwap {
            vip_id: assignment.unmatched[slot].id,
            displaced_id: displaced.id,
            pairing_index,
        });
        assignment.unmatched[slot] = displaced;
    }

    swaps
}

/// First pairing with a displaceable non-VIP member. Returns the pairing
/// index, whether the first member is displaced, and the new score.
fn find_swap(
    pairs: &[ScoredPair],
    vip: &Candidate,
    scorer: &ScoringEngine<'_>,
) -> Option<(usize, bool, i64)> {
    pairs.iter().enumerate().find_map(|(index, pair)| {
        let try_displace = |out: &Candidate, stays: &Candidate| -> Option<i64> {
            if out.is_vip {
                return None;
            }
            match scorer.score(vip, stays) {
                PairScore::Compatible(score) => Some(score),
                PairScore::Vetoed(_) => None,
            }
        };
        if let Some(score) = try_displace(&pair.second, &pair.first) {
            return Some((index, false, score));
        }
        try_displace(&pair.first, &pair.second).map(|score| (index, true, score))
    })
}
