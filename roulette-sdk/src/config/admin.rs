//! Admin credentials for the round trigger API.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Prefix every PHC-formatted argon2 hash starts with.
const ARGON2_PREFIX: &str = "$argon2";

/// Admin configuration holding the argon2 hash of the operator secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Check a plaintext secret (from the `Roulette-Admin-Authorization`
    /// header) against the stored hash.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Whether a configured secret is already an argon2 hash.
pub fn is_hashed_secret(secret: &str) -> bool {
    secret.starts_with(ARGON2_PREFIX)
}

/// Hash a plaintext admin secret with a fresh salt.
pub fn hash_admin_secret(plaintext: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}
