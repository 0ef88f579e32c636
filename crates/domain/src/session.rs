//! Session and token-kind types shared by the session/JWT service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a refresh-token session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID as a session identifier.
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

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Kind of bearer token carried by a JWT `token_kind` claim.
///
/// `ServiceRole` tokens are minted out of band from a static secret and are
/// never stored as sessions; `CannotRevokeServiceRole` exists precisely to
/// keep revocation code from trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token.
    Access,
    /// Long-lived refresh token, always tied to a session row.
    Refresh,
    /// Non-revocable backend-to-backend token.
    ServiceRole,
    /// Unauthenticated caller token.
    Anon,
}

impl TokenKind {
    /// Returns the storage/claim string for this token kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::ServiceRole => "service_role",
            Self::Anon => "anon",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_matches_uuid() {
        let id = SessionId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }
}
