//! Long-running and request-driven processors.
//!
//! - `RoundCoordinator`: runs a matching round (or a dry run) end to end,
//!   emits `RoundCompleted`
//! - `NotificationQueue`: turns round and participant events into queued
//!   notification tasks
//! - `NotificationDispatcher`: receives `RoundCompleted` and polls the
//!   queue, delivers due tasks with retry

pub mod notification_dispatcher;
pub mod notification_queue;
pub mod round_coordinator;

pub use notification_dispatcher::{DispatchError, DispatchSummary, NotificationDispatcher};
pub use notification_queue::{NotificationQueue, PairingNotice};
pub use round_coordinator::{
    PreviewReport, RoundCoordinator, RoundError, RoundReport, RoundRequest,
};
