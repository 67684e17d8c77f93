//! Password hashing with argon2, the ambient credential-storage concern
//! `/auth/register` and `/auth/login` need underneath.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use ticketq_core::TicketingError;

/// Hashes `password` with a freshly generated salt.
///
/// # Errors
///
/// Returns `Internal` if the underlying hasher fails (out-of-memory or a
/// malformed parameter set — never a function of the password itself).
pub fn hash_password(password: &str) -> Result<String, TicketingError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TicketingError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies `password` against a previously stored `hash`. A malformed hash
/// or a mismatching password both simply return `false` — the caller always
/// wants this collapsed into a single "wrong credentials" outcome.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_correct_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }
}
