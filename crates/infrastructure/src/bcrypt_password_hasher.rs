//! bcrypt password hasher implementation.

use bcrypt::{DEFAULT_COST, hash, verify};
use castellan_application::PasswordHasher as PasswordHasherPort;
use castellan_core::{AppError, AppResult};

/// bcrypt password hasher at the library's default cost factor.
#[derive(Clone, Default)]
pub struct BcryptPasswordHasher;

impl BcryptPasswordHasher {
    /// Creates a new bcrypt hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PasswordHasherPort for BcryptPasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        hash(password, DEFAULT_COST)
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        verify(password, hash)
            .map_err(|error| AppError::Internal(format!("password verification failed: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_correct_password() -> AppResult<()> {
        let hasher = BcryptPasswordHasher::new();
        let hash = hasher.hash_password("my-secret-password")?;
        assert!(hasher.verify_password("my-secret-password", &hash)?);
        Ok(())
    }

    #[test]
    fn verify_wrong_password_returns_false() -> AppResult<()> {
        let hasher = BcryptPasswordHasher::new();
        let hash = hasher.hash_password("correct-password")?;
        assert!(!hasher.verify_password("wrong-password", &hash)?);
        Ok(())
    }
}
