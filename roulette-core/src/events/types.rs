//! Event types passed between the round engine and the dispatcher.
//!
//! Events carry identifiers only; receivers re-read state from the store.

use uuid::Uuid;

/// Emitted after a round commits and its notifications are enqueued.
///
/// Wakes the dispatcher so announcements go out without waiting for the
/// next poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundCompleted {
    pub round_id: Uuid,
    pub pairing_count: usize,
    pub notifications_enqueued: usize,
}
