//! Event plumbing.
//!
//! `RoundCoordinator` emits `RoundCompleted` -> `NotificationDispatcher`
//! runs a pass immediately.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, RoundCompletedReceiver, RoundCompletedSender, round_completed_channel,
};
pub use types::RoundCompleted;
