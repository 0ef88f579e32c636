//! Credential lifecycle: registration, login, password change, password
//! reset, and email verification.
//!
//! Follows OWASP Authentication and Forgot Password cheat sheets: generic
//! failure messages that never reveal whether an account exists, constant
//! hashing work on every login attempt regardless of outcome, and atomic
//! single-use consumption of reset/verification tokens.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::{AppError, AppResult};
use castellan_domain::{AuthTokenType, PasswordPolicy, UserId};

use crate::{AuditEvent, AuditService};

/// User record as persisted by the credential repository.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Canonical, lower-cased email address.
    pub email: String,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// bcrypt password hash, or `None` for federation-only accounts.
    pub password_hash: Option<String>,
    /// Whether TOTP MFA is enabled.
    pub totp_enabled: bool,
    /// Encrypted TOTP secret, if enrolled.
    pub totp_secret_enc: Option<Vec<u8>>,
    /// Hashed recovery codes as a JSON array, if enrolled.
    pub recovery_codes_hash: Option<serde_json::Value>,
    /// Number of consecutive failed login attempts.
    pub failed_login_count: i32,
    /// Account is locked until this time, if set.
    pub locked_until: Option<chrono::DateTime<chrono::Utc>>,
    /// Deployment-level role.
    pub role: castellan_domain::Role,
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by email (case-insensitive, already-normalized input expected).
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by their unique identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Creates a new user record. Returns the assigned user ID.
    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        email_verified: bool,
    ) -> AppResult<UserId>;

    /// Updates the password hash for a user.
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()>;

    /// Increments the failed-login counter and locks the account once the
    /// configured consecutive-failure threshold is crossed.
    async fn record_failed_login(&self, user_id: UserId) -> AppResult<()>;

    /// Resets the failed-login counter and removes any account lock.
    async fn reset_failed_logins(&self, user_id: UserId) -> AppResult<()>;

    /// Marks the user's email as verified.
    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()>;

    /// Updates the user's email address.
    async fn update_email(&self, user_id: UserId, new_email: &str) -> AppResult<()>;

    /// Stores an encrypted TOTP secret, hashed recovery codes, and the
    /// enabled flag in a single write.
    async fn set_totp_state(
        &self,
        user_id: UserId,
        totp_secret_enc: Option<&[u8]>,
        recovery_codes_hash: Option<&serde_json::Value>,
        enabled: bool,
    ) -> AppResult<()>;

    /// Updates the hashed recovery codes.
    async fn update_recovery_codes(
        &self,
        user_id: UserId,
        recovery_codes_hash: &serde_json::Value,
    ) -> AppResult<()>;
}

/// Port for password hashing. Keeps domain/application free of direct
/// cryptographic library coupling.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using bcrypt.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored bcrypt hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Auth token record as persisted in the database.
#[derive(Debug, Clone)]
pub struct AuthTokenRecord {
    /// Token identifier.
    pub id: uuid::Uuid,
    /// User ID the token belongs to.
    pub user_id: UserId,
    /// Email address the token was sent to.
    pub email: String,
    /// SHA-256 hash of the token value.
    pub token_hash: String,
    /// Type discriminator.
    pub token_type: AuthTokenType,
    /// Expiration timestamp.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// When the token was consumed, if ever.
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Repository port for single-use auth token persistence.
#[async_trait]
pub trait AuthTokenRepository: Send + Sync {
    /// Stores a new auth token.
    async fn create_token(
        &self,
        user_id: UserId,
        email: &str,
        token_hash: &str,
        token_type: AuthTokenType,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<uuid::Uuid>;

    /// Atomically consumes a valid token by its hash and returns the record.
    ///
    /// Consumption succeeds only when the token is unexpired and unused;
    /// `used_at` is set in the same statement to prevent replay races.
    async fn consume_valid_token(
        &self,
        token_hash: &str,
        token_type: AuthTokenType,
    ) -> AppResult<Option<AuthTokenRecord>>;

    /// Invalidates all unused tokens of a given type for a user.
    async fn invalidate_tokens_for_user(
        &self,
        user_id: UserId,
        token_type: AuthTokenType,
    ) -> AppResult<()>;

    /// Counts tokens created in a time window for rate limiting.
    async fn count_recent_tokens(
        &self,
        email: &str,
        token_type: AuthTokenType,
        since: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<i64>;
}

/// Port for sending emails. Infrastructure provides SMTP or console
/// implementations.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends a plain-text or HTML email.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()>;
}

/// Result of a login attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Authentication succeeded. A session can be established.
    Authenticated(UserRecord),
    /// Password was correct but TOTP verification is still required.
    MfaRequired {
        /// The user ID awaiting MFA.
        user_id: UserId,
    },
    /// Authentication failed. Message is deliberately generic.
    Failed,
}

/// Parameters for user registration.
pub struct RegisterParams {
    /// Email address for the new account.
    pub email: String,
    /// Plaintext password (validated against the active policy).
    pub password: String,
    /// Whether self-service sign-up is currently enabled for this deployment.
    pub signup_enabled: bool,
    /// Caller IP address, for audit logging.
    pub ip_address: Option<String>,
    /// Caller User-Agent header, for audit logging.
    pub user_agent: Option<String>,
}

/// Application service for credential lifecycle operations.
#[derive(Clone)]
pub struct CredentialService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_repository: Arc<dyn AuthTokenRepository>,
    email_service: Arc<dyn EmailService>,
    audit_service: AuditService,
    password_policy: PasswordPolicy,
    frontend_url: String,
}

impl CredentialService {
    /// Creates a new credential service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_repository: Arc<dyn AuthTokenRepository>,
        email_service: Arc<dyn EmailService>,
        audit_service: AuditService,
        password_policy: PasswordPolicy,
        frontend_url: String,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            token_repository,
            email_service,
            audit_service,
            password_policy,
            frontend_url,
        }
    }

    /// Returns a reference to the password hasher, for use by other services.
    #[must_use]
    pub fn password_hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.password_hasher
    }

    /// Returns a reference to the user repository, for use by other services.
    #[must_use]
    pub fn user_repository(&self) -> &Arc<dyn UserRepository> {
        &self.user_repository
    }

    /// Returns a user record by ID, if it exists.
    pub async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        self.user_repository.find_by_id(user_id).await
    }

    /// Returns a user record by email, if it exists.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        self.user_repository.find_by_email(email).await
    }
}

mod login;
mod password_reset;
mod registration;
mod token_crypto;
mod verification;

#[cfg(test)]
mod tests;
