//! Password policy and Argon2id hashing

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use delivery_util::{DeliveryError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// At least eight characters with an uppercase letter, a lowercase letter
/// and a digit
pub fn check_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DeliveryError::validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(DeliveryError::validation(
            "password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(DeliveryError::validation(
            "password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DeliveryError::validation("password must contain a digit"));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DeliveryError::internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash. A malformed hash never verifies.
pub fn verify(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
