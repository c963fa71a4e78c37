//! PIN hashing
//!
//! Folders and items can be gated behind a short numeric PIN.
//! PINs are stored only as Argon2id hashes; the raw PIN never
//! touches the database.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::config::{MAX_PIN_LENGTH, MIN_PIN_LENGTH};
use crate::error::{AppError, Result};

/// Hash a PIN with Argon2id and a random salt.
pub fn hash_pin(pin: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| AppError::Generic(format!("PIN hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a PIN against a stored hash.
pub fn verify_pin(pin: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Generic(format!("Stored PIN hash is malformed: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok())
}

/// Check PIN format: 4 to 6 ASCII digits.
/// Manual check instead of a regex dependency.
pub fn is_valid_pin(pin: &str) -> bool {
    (MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&pin.len())
        && pin.chars().all(|c| c.is_ascii_digit())
}
