//! Audit event vocabulary shared by every service that records outcomes.

use std::str::FromStr;

use castellan_core::AppError;
use serde::{Deserialize, Serialize};

/// Named kinds of audit-worthy events across the authentication core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A new account was created.
    UserRegistered,
    /// A login attempt succeeded.
    LoginSucceeded,
    /// A login attempt failed.
    LoginFailed,
    /// A password was changed by its owner.
    PasswordChanged,
    /// A password reset was requested.
    PasswordResetRequested,
    /// A password reset was completed.
    PasswordResetCompleted,
    /// An email address was verified.
    EmailVerified,
    /// An access token was refreshed.
    TokenRefreshed,
    /// A session was revoked.
    SessionRevoked,
    /// An adaptive trust challenge was issued.
    ChallengeIssued,
    /// An adaptive trust challenge was solved.
    ChallengeSolved,
    /// TOTP MFA was enabled.
    MfaEnabled,
    /// TOTP MFA was disabled.
    MfaDisabled,
    /// An MFA challenge failed.
    MfaChallengeFailed,
    /// A federated identity was linked to an account.
    IdentityLinked,
    /// A federated identity was unlinked from an account.
    IdentityUnlinked,
    /// A SAML-asserted login succeeded.
    SamlLoginSucceeded,
    /// An admin started impersonating a user.
    ImpersonationStarted,
    /// An impersonation session ended.
    ImpersonationEnded,
    /// A settings value was changed.
    SettingsChanged,
}

impl AuditAction {
    /// Returns the storage string for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegistered => "user_registered",
            Self::LoginSucceeded => "login_succeeded",
            Self::LoginFailed => "login_failed",
            Self::PasswordChanged => "password_changed",
            Self::PasswordResetRequested => "password_reset_requested",
            Self::PasswordResetCompleted => "password_reset_completed",
            Self::EmailVerified => "email_verified",
            Self::TokenRefreshed => "token_refreshed",
            Self::SessionRevoked => "session_revoked",
            Self::ChallengeIssued => "challenge_issued",
            Self::ChallengeSolved => "challenge_solved",
            Self::MfaEnabled => "mfa_enabled",
            Self::MfaDisabled => "mfa_disabled",
            Self::MfaChallengeFailed => "mfa_challenge_failed",
            Self::IdentityLinked => "identity_linked",
            Self::IdentityUnlinked => "identity_unlinked",
            Self::SamlLoginSucceeded => "saml_login_succeeded",
            Self::ImpersonationStarted => "impersonation_started",
            Self::ImpersonationEnded => "impersonation_ended",
            Self::SettingsChanged => "settings_changed",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "user_registered" => Self::UserRegistered,
            "login_succeeded" => Self::LoginSucceeded,
            "login_failed" => Self::LoginFailed,
            "password_changed" => Self::PasswordChanged,
            "password_reset_requested" => Self::PasswordResetRequested,
            "password_reset_completed" => Self::PasswordResetCompleted,
            "email_verified" => Self::EmailVerified,
            "token_refreshed" => Self::TokenRefreshed,
            "session_revoked" => Self::SessionRevoked,
            "challenge_issued" => Self::ChallengeIssued,
            "challenge_solved" => Self::ChallengeSolved,
            "mfa_enabled" => Self::MfaEnabled,
            "mfa_disabled" => Self::MfaDisabled,
            "mfa_challenge_failed" => Self::MfaChallengeFailed,
            "identity_linked" => Self::IdentityLinked,
            "identity_unlinked" => Self::IdentityUnlinked,
            "saml_login_succeeded" => Self::SamlLoginSucceeded,
            "impersonation_started" => Self::ImpersonationStarted,
            "impersonation_ended" => Self::ImpersonationEnded,
            "settings_changed" => Self::SettingsChanged,
            other => {
                return Err(AppError::Validation(format!(
                    "unknown audit action '{other}'"
                )));
            }
        })
    }
}

/// Outcome recorded alongside an [`AuditAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The action completed as intended.
    Success,
    /// The action was attempted but did not complete.
    Failure,
}

impl AuditOutcome {
    /// Returns the storage string for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}
