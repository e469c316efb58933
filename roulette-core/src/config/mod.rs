//! Runtime configuration types shared with the server crate.
//!
//! The server parses the TOML file and fills these in; see
//! `roulette-server/src/config`.

mod config_store;
mod notifications;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use notifications::{DispatcherConfig, NotificationConfig, RelayEndpointConfig};
