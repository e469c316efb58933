use crate::entities::icebreaker::IcebreakerTopic;
use rand::Rng;
use rand::seq::IndexedRandom;

/// Topics attached to each pairing.
pub const TOPICS_PER_PAIRING: usize = 3;

/// Pick up to [`TOPICS_PER_PAIRING`] distinct topics at random.
pub fn pick_topics<R: Rng + ?Sized>(
    topics: &[IcebreakerTopic],
    rng: &mut R,
) -> Vec<IcebreakerTopic> {
    topics
        .choose_multiple(rng, TOPICS_PER_PAIRING)
        .cloned()
        .collect()
}
