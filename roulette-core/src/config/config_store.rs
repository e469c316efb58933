//! Reloadable configuration sections.
//!
//! A [`ConfigStore`] holds one section of the runtime configuration. The
//! server replaces its value on SIGHUP; long-running loops either read it
//! on every pass or subscribe to be woken when it changes.

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, watch};

pub struct ConfigStore<T> {
    inner: Arc<Shared<T>>,
}

struct Shared<T> {
    value: RwLock<T>,
    changed_tx: watch::Sender<()>,
}

/// Wakes when the [`ConfigStore`] it was created from is replaced.
pub struct ConfigWatcher {
    changed_rx: watch::Receiver<()>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (changed_tx, _) = watch::channel(());
        Self {
            inner: Arc::new(Shared {
                value: RwLock::new(initial),
                changed_tx,
            }),
        }
    }

    /// Replace the value and wake every watcher.
    pub async fn update(&self, value: T) {
        {
            let mut guard = self.inner.value.write().await;
            *guard = value;
        }
        // Watchers may read immediately; the write guard is already gone.
        self.inner.changed_tx.send_replace(());
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.value.read().await
    }

    /// Watch for updates applied after this call.
    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            changed_rx: self.inner.changed_tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone the current value so no lock is held across awaits.
    pub async fn snapshot(&self) -> T {
        self.inner.value.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Wait for the next update. Errors once the store is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.changed_rx.changed().await
    }
}
