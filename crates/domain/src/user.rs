//! User domain types and password policy.
//!
//! Follows OWASP Authentication and Password Storage cheat sheets for all
//! password strength and email validation rules.

use std::str::FromStr;

use castellan_core::{AppError, AppResult, DomainError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as a user identifier.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated email address, always stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validates and normalizes an email address.
    ///
    /// Checks: non-empty, exactly one `@`, non-empty local/domain parts,
    /// domain contains a `.`, total length at most 254 bytes.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let trimmed = value.into().trim().to_lowercase();

        if trimmed.is_empty() || trimmed.len() > 254 {
            return Err(DomainError::InvalidEmail.into());
        }

        let parts: Vec<&str> = trimmed.splitn(2, '@').collect();
        let [local, domain] = parts.as_slice() else {
            return Err(DomainError::InvalidEmail.into());
        };

        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(DomainError::InvalidEmail.into());
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Hard ceiling on password byte length; bcrypt silently ignores bytes past
/// this, so anything longer must be rejected rather than truncated.
pub const PASSWORD_MAX_BYTES: usize = 72;

/// Configurable password strength policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Minimum character count.
    pub min_length: usize,
    /// Require at least one uppercase letter.
    pub require_uppercase: bool,
    /// Require at least one lowercase letter.
    pub require_lowercase: bool,
    /// Require at least one digit.
    pub require_digit: bool,
    /// Require at least one non-alphanumeric symbol.
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    /// Validates a plaintext password against this policy.
    pub fn validate(&self, password: &str) -> AppResult<()> {
        if password.len() > PASSWORD_MAX_BYTES {
            return Err(DomainError::PasswordTooLong.into());
        }

        if password.chars().count() < self.min_length {
            return Err(DomainError::InvalidPassword.into());
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::InvalidPassword.into());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(DomainError::InvalidPassword.into());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(DomainError::InvalidPassword.into());
        }
        if self.require_symbol && !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidPassword.into());
        }

        if is_common_password(password) {
            return Err(DomainError::InvalidPassword.into());
        }

        Ok(())
    }
}

fn is_common_password(password: &str) -> bool {
    let lowered = password.to_lowercase();
    COMMON_PASSWORDS.iter().any(|entry| *entry == lowered)
}

static COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password123",
    "123456789012",
    "qwertyuiop12",
    "letmein123456",
    "administrator",
    "changeme12345",
    "welcome123456",
];

/// Role carried by an issued session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unauthenticated caller holding an anon token.
    Anon,
    /// Ordinary signed-in user.
    Authenticated,
    /// Tenant-scoped administrator.
    Admin,
    /// Platform dashboard administrator.
    DashboardAdmin,
    /// Non-revocable identity used by trusted backend callers.
    ServiceRole,
}

impl Role {
    /// Returns the storage string for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anon => "anon",
            Self::Authenticated => "authenticated",
            Self::Admin => "admin",
            Self::DashboardAdmin => "dashboard_admin",
            Self::ServiceRole => "service_role",
        }
    }

    /// Returns true for roles that may edit admin-gated settings
    /// unconditionally regardless of a key's declared `editable_by` list.
    #[must_use]
    pub fn always_allowed_for_settings(&self) -> bool {
        matches!(self, Self::DashboardAdmin | Self::Admin | Self::ServiceRole)
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "anon" => Ok(Self::Anon),
            "authenticated" => Ok(Self::Authenticated),
            "admin" => Ok(Self::Admin),
            "dashboard_admin" => Ok(Self::DashboardAdmin),
            "service_role" => Ok(Self::ServiceRole),
            other => Err(AppError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Type of a single-use token stored in the auth_tokens table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTokenType {
    /// Email address verification token.
    EmailVerification,
    /// Password reset token.
    PasswordReset,
}

impl AuthTokenType {
    /// Returns the storage string for this token type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }
}

impl FromStr for AuthTokenType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email_verification" => Ok(Self::EmailVerification),
            "password_reset" => Ok(Self::PasswordReset),
            other => Err(AppError::Validation(format!(
                "unknown auth token type '{other}'"
            ))),
        }
    }
}
