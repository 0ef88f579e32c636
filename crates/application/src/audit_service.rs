//! Ambient audit trail: every credential, session, trust, federation, MFA,
//! and impersonation outcome is appended here.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::{AuditAction, AuditOutcome};

/// A single audit-worthy event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Subject the event is about, usually a user ID, if known.
    pub subject: Option<String>,
    /// Stable event kind.
    pub event_type: AuditAction,
    /// Whether the action succeeded.
    pub outcome: AuditOutcome,
    /// Caller IP address, if available.
    pub ip_address: Option<String>,
    /// Caller User-Agent header, if available.
    pub user_agent: Option<String>,
}

/// Repository port for audit event persistence.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an audit event entry.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Application service for audit recording.
#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditService {
    /// Creates a service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Persists an audit event.
    pub async fn record_event(&self, event: AuditEvent) -> AppResult<()> {
        self.repository.append_event(event).await
    }
}
