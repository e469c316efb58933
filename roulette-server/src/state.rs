//! Application state shared across all request handlers.

use crate::config::runtime::SharedConfig;
use roulette_core::processors::{NotificationQueue, RoundCoordinator};
use roulette_core::store::PgStore;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Postgres-backed store for rounds and notification tasks.
    pub store: Arc<PgStore>,
    /// Runs rounds and previews; shared with the cron trigger.
    pub coordinator: Arc<RoundCoordinator>,
    /// Producer of notification tasks outside of rounds.
    pub queue: NotificationQueue,
    /// Runtime configuration (can be reloaded via SIGHUP).
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(
        store: Arc<PgStore>,
        coordinator: Arc<RoundCoordinator>,
        queue: NotificationQueue,
        config: SharedConfig,
    ) -> Self {
        Self {
            store,
            coordinator,
            queue,
            config,
        }
    }
}
