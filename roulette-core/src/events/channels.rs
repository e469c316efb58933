//! Event channel factories.

use super::types::RoundCompleted;
use tokio::sync::mpsc;

/// Buffer of every event channel. Events are only wake-ups, so a full
/// buffer can drop them without losing work.
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

pub type RoundCompletedSender = mpsc::Sender<RoundCompleted>;
pub type RoundCompletedReceiver = mpsc::Receiver<RoundCompleted>;

pub fn round_completed_channel() -> (RoundCompletedSender, RoundCompletedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
