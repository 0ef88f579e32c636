//! Shared primitives for every Castellan crate: the result type, the
//! generic application error, and the stable domain error taxonomy.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Castellan crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// `Domain` carries the stable, named error kinds callers are expected to
/// match on (see [`DomainError`]); the remaining variants are the generic
/// escape hatch used by infrastructure code for failures with no domain
/// meaning (a dropped connection, a malformed row).
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// User is not authenticated or not allowed to access a resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller exceeded a rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),

    /// One of the stable, named error kinds of the authentication core.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AppError {
    /// Returns the stable domain error kind, if this error carries one.
    #[must_use]
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Stable, named error kinds exposed by the authentication core (spec §7).
///
/// Every variant is stable across implementations: callers match on the
/// variant, never on the rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DomainError {
    // --- Input ---
    /// Email address failed structural validation.
    #[error("invalid email")]
    InvalidEmail,
    /// Password failed the configured policy.
    #[error("invalid password")]
    InvalidPassword,
    /// Password exceeds the 72-byte bcrypt limit.
    #[error("password too long")]
    PasswordTooLong,
    /// Redirect URL is not an absolute http(s) URL.
    #[error("invalid redirect url")]
    InvalidRedirectURL,

    // --- Auth state ---
    /// Email/password combination did not match any account.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Account is locked until a future time.
    #[error("account locked")]
    AccountLocked,
    /// Email verification is required but has not happened.
    #[error("email not verified")]
    EmailNotVerified,
    /// Self-service sign-up is disabled.
    #[error("signup disabled")]
    SignupDisabled,

    // --- Sessions / tokens ---
    /// Token failed signature or structural validation.
    #[error("invalid token")]
    InvalidToken,
    /// Token kind does not match what the operation requires.
    #[error("invalid token type")]
    InvalidTokenType,
    /// No session matches the supplied token.
    #[error("session not found")]
    SessionNotFound,
    /// Session has expired.
    #[error("session expired")]
    SessionExpired,
    /// Token jti is present in the blacklist.
    #[error("token blacklisted")]
    TokenBlacklisted,
    /// Attempted to revoke a service-role token.
    #[error("cannot revoke service role token")]
    CannotRevokeServiceRole,
    /// Attempted to revoke an opaque service key (`sk_` prefix).
    #[error("cannot revoke service key")]
    CannotRevokeServiceKey,
    /// Attempted to revoke an opaque client key (`fbk_` prefix).
    #[error("cannot revoke client key")]
    CannotRevokeClientKey,

    // --- Reset / verify ---
    /// No token matches the supplied hash.
    #[error("token not found")]
    TokenNotFound,
    /// Token has expired.
    #[error("token expired")]
    TokenExpired,
    /// Token has already been consumed.
    #[error("token used")]
    TokenUsed,
    /// A second request arrived before the rate-limit window elapsed.
    #[error("too soon")]
    TooSoon,

    // --- Trust / challenge ---
    /// No challenge matches the supplied id.
    #[error("challenge not found")]
    ChallengeNotFound,
    /// Challenge has expired.
    #[error("challenge expired")]
    ChallengeExpired,
    /// Challenge has already been consumed.
    #[error("challenge consumed")]
    ChallengeConsumed,
    /// Challenge endpoint or binding does not match the request.
    #[error("challenge mismatch")]
    ChallengeMismatch,
    /// CAPTCHA verification was required but not supplied.
    #[error("captcha required")]
    CaptchaRequired,
    /// Trust token does not match its binding or is unknown.
    #[error("trust token invalid")]
    TrustTokenInvalid,
    /// Trust token has expired.
    #[error("trust token expired")]
    TrustTokenExpired,

    // --- Federation ---
    /// Provider name is not one of the supported providers.
    #[error("invalid provider")]
    InvalidProvider,
    /// Provider is not configured in this deployment.
    #[error("provider not configured")]
    NotConfigured,
    /// No identity matches the supplied (provider, provider_user_id).
    #[error("identity not found")]
    IdentityNotFound,
    /// Identity is already linked to a different user.
    #[error("identity already linked")]
    IdentityAlreadyLinked,
    /// Provider did not return an email claim.
    #[error("missing email")]
    MissingEmail,
    /// Unlinking would leave the user with zero authentication factors.
    #[error("cannot remove last authentication factor")]
    LastAuthFactor,

    // --- MFA ---
    /// Too many consecutive TOTP failures; verification is locked out.
    #[error("totp rate limit exceeded")]
    TOTPRateLimitExceeded,
    /// Supplied backup code does not match any stored hash.
    #[error("backup code invalid")]
    BackupCodeInvalid,
    /// TOTP is not enabled for this account.
    #[error("totp not enabled")]
    TOTPNotEnabled,

    // --- Admin ---
    /// Caller is not authorized to perform an admin operation.
    #[error("forbidden")]
    Forbidden,
    /// An admin attempted to impersonate themselves.
    #[error("self impersonation")]
    SelfImpersonation,
    /// The admin already has an active impersonation session.
    #[error("already impersonating")]
    AlreadyImpersonating,

    // --- Infra ---
    /// No SMTP transport is configured.
    #[error("smtp not configured")]
    SMTPNotConfigured,
    /// The email collaborator failed to send a message.
    #[error("email send failed")]
    EmailSendFailed,
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, DomainError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn domain_error_round_trips_through_app_error() {
        let error: AppError = DomainError::AccountLocked.into();
        assert_eq!(error.domain(), Some(&DomainError::AccountLocked));
    }

    #[test]
    fn generic_error_has_no_domain_kind() {
        let error = AppError::Internal("boom".to_owned());
        assert_eq!(error.domain(), None);
    }
}
