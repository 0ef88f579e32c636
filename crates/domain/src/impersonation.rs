//! Admin impersonation session types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an impersonation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImpersonationId(Uuid);

impl ImpersonationId {
    /// Creates a new random impersonation session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Wraps an existing UUID, e.g. one read back from storage.
    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for ImpersonationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImpersonationId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
