#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod matching;
pub mod meetings;
pub mod processors;
pub mod senders;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
