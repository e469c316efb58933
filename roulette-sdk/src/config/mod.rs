//! Configuration types shared between the server and its clients.

mod admin;
mod server;

pub use admin::{AdminConfig, hash_admin_secret, is_hashed_secret};
pub use server::ServerConfig;
