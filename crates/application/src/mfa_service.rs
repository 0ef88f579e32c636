//! TOTP multi-factor authentication: enrollment, verification, and
//! recovery codes.
//!
//! Follows the OWASP Multifactor Authentication Cheat Sheet: TOTP codes are
//! 6-digit with a 30-second window and +/-1 step tolerance, recovery codes
//! are single-use and stored hashed, and disabling MFA requires password
//! re-authentication.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::UserId;

use crate::credential_service::{PasswordHasher, UserRepository};

/// TOTP enrollment data returned to the caller for QR code display.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    /// Base32-encoded TOTP secret for manual entry.
    pub secret_base32: String,
    /// `otpauth://` URI for QR code generation.
    pub otpauth_uri: String,
    /// PNG QR code encoding `otpauth_uri`, as a `data:image/png;base64,...` string.
    pub qr_code_png: String,
    /// Single-use recovery codes, shown to the caller exactly once.
    pub recovery_codes: Vec<String>,
}

/// Port for TOTP secret generation, code verification, and QR code
/// rendering. Infrastructure provides the concrete RFC 6238 implementation.
#[async_trait]
pub trait TotpProvider: Send + Sync {
    /// Generates a new TOTP secret and returns `(secret_bytes, base32, otpauth_uri)`.
    fn generate_secret(&self, account_label: &str) -> AppResult<(Vec<u8>, String, String)>;

    /// Verifies a TOTP code against a secret, honoring the configured skew.
    fn verify_code(&self, secret_bytes: &[u8], code: &str) -> AppResult<bool>;

    /// Renders `otpauth_uri` as a PNG QR code, returned as a
    /// `data:image/png;base64,...` string.
    fn render_qr_code_png(&self, otpauth_uri: &str) -> AppResult<String>;
}

/// Port for encrypting/decrypting TOTP secrets at rest.
#[async_trait]
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts a TOTP secret for database storage.
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>>;

    /// Decrypts a stored TOTP secret.
    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>>;
}

/// Port tracking consecutive TOTP verification failures for lockout.
#[async_trait]
pub trait MfaRateLimiter: Send + Sync {
    /// Records a failed verification attempt and returns the new failure count.
    async fn record_failure(&self, user_id: castellan_domain::UserId) -> AppResult<u32>;

    /// Clears the failure count after a successful verification.
    async fn clear(&self, user_id: castellan_domain::UserId) -> AppResult<()>;
}

/// Application service for MFA operations.
#[derive(Clone)]
pub struct MfaService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    totp_provider: Arc<dyn TotpProvider>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
    rate_limiter: Arc<dyn MfaRateLimiter>,
}

impl MfaService {
    /// Creates a new MFA service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        totp_provider: Arc<dyn TotpProvider>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
        rate_limiter: Arc<dyn MfaRateLimiter>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            totp_provider,
            secret_encryptor,
            rate_limiter,
        }
    }
}

mod enrollment;
mod management;
mod recovery_codes;
mod verification;

#[cfg(test)]
mod tests;
