//! Federated identity provider vocabulary.

use castellan_core::DomainError;
use serde::{Deserialize, Serialize};

/// A supported OAuth2/OIDC identity provider.
///
/// `Oidc` covers any generically-configured OpenID Connect issuer that
/// isn't one of the named social providers (a deployment-specific SSO
/// provider, for example); its name is whatever the deployment configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Google OAuth2/OIDC.
    Google,
    /// GitHub OAuth2.
    GitHub,
    /// Microsoft identity platform.
    Microsoft,
    /// Sign in with Apple.
    Apple,
    /// Facebook Login.
    Facebook,
    /// Twitter/X OAuth2.
    Twitter,
    /// LinkedIn OAuth2.
    LinkedIn,
    /// GitLab OAuth2.
    GitLab,
    /// Bitbucket OAuth2.
    Bitbucket,
    /// A generic, deployment-configured OIDC issuer.
    Oidc(String),
}

impl Provider {
    /// Parses a provider name case-insensitively. Unrecognized names are
    /// not rejected here — they become `Oidc(name)` — validity against the
    /// deployment's configured providers is checked by the federation
    /// service (`NotConfigured`), not by this parse step.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "google" => Self::Google,
            "github" => Self::GitHub,
            "microsoft" => Self::Microsoft,
            "apple" => Self::Apple,
            "facebook" => Self::Facebook,
            "twitter" | "x" => Self::Twitter,
            "linkedin" => Self::LinkedIn,
            "gitlab" => Self::GitLab,
            "bitbucket" => Self::Bitbucket,
            other => Self::Oidc(other.to_owned()),
        }
    }

    /// Returns the storage string for this provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
            Self::Microsoft => "microsoft",
            Self::Apple => "apple",
            Self::Facebook => "facebook",
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::GitLab => "gitlab",
            Self::Bitbucket => "bitbucket",
            Self::Oidc(name) => name.as_str(),
        }
    }

    /// Returns `InvalidProvider` if the name is empty after trimming.
    pub fn validate_name(value: &str) -> Result<(), DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::InvalidProvider);
        }
        Ok(())
    }
}
