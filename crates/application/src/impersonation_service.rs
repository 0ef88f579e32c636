//! Admin impersonation: issuing a session acting as another user, or as
//! the anonymous or service role, with a mandatory audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use castellan_core::{AppResult, DomainError};
use castellan_domain::{AuditAction, AuditOutcome, ImpersonationId, Role, UserId};

use crate::audit_service::{AuditEvent, AuditService};

/// A recorded impersonation session.
#[derive(Debug, Clone)]
pub struct ImpersonationRecord {
    pub id: ImpersonationId,
    pub admin_id: UserId,
    pub target_user_id: Option<UserId>,
    pub target_role: Role,
    pub reason: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Repository port for impersonation sessions.
#[async_trait]
pub trait ImpersonationRepository: Send + Sync {
    /// Returns the admin's active (not yet ended) impersonation session, if any.
    async fn find_active_for_admin(&self, admin_id: UserId) -> AppResult<Option<ImpersonationRecord>>;

    /// Creates a new impersonation session.
    async fn create(&self, record: ImpersonationRecord) -> AppResult<()>;

    /// Marks an impersonation session ended.
    async fn end(&self, impersonation_id: ImpersonationId, ended_at: DateTime<Utc>) -> AppResult<()>;
}

/// Parameters for starting an impersonation session.
pub struct StartImpersonationParams {
    pub admin_id: UserId,
    pub admin_role: Role,
    pub target_user_id: Option<UserId>,
    pub target_role: Role,
    pub reason: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Application service for admin impersonation.
#[derive(Clone)]
pub struct ImpersonationService {
    repository: Arc<dyn ImpersonationRepository>,
    audit: AuditService,
}

impl ImpersonationService {
    /// Creates a new impersonation service.
    #[must_use]
    pub fn new(repository: Arc<dyn ImpersonationRepository>, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    /// Starts an impersonation session. Requires admin authorization, a
    /// non-empty reason, and refuses self-impersonation or a second
    /// concurrent session for the same admin.
    pub async fn start(&self, params: StartImpersonationParams) -> AppResult<ImpersonationRecord> {
        if !matches!(params.admin_role, Role::Admin | Role::DashboardAdmin) {
            return Err(DomainError::Forbidden.into());
        }

        if params.reason.trim().is_empty() {
            return Err(castellan_core::AppError::Validation(
                "impersonation reason is required".to_owned(),
            ));
        }

        if params.target_user_id == Some(params.admin_id) {
            return Err(DomainError::SelfImpersonation.into());
        }

        if self
            .repository
            .find_active_for_admin(params.admin_id)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyImpersonating.into());
        }

        let record = ImpersonationRecord {
            id: ImpersonationId::new(),
            admin_id: params.admin_id,
            target_user_id: params.target_user_id,
            target_role: params.target_role,
            reason: params.reason,
            ip_address: params.ip_address,
            user_agent: params.user_agent,
            started_at: Utc::now(),
            ended_at: None,
        };

        self.repository.create(record.clone()).await?;

        self.audit
            .record_event(AuditEvent {
                subject: Some(record.admin_id.to_string()),
                event_type: AuditAction::ImpersonationStarted,
                outcome: AuditOutcome::Success,
                ip_address: record.ip_address.clone(),
                user_agent: record.user_agent.clone(),
            })
            .await?;

        Ok(record)
    }

    /// Ends an impersonation session.
    pub async fn end(&self, admin_id: UserId, impersonation_id: ImpersonationId) -> AppResult<()> {
        let ended_at = Utc::now();
        self.repository.end(impersonation_id, ended_at).await?;

        self.audit
            .record_event(AuditEvent {
                subject: Some(admin_id.to_string()),
                event_type: AuditAction::ImpersonationEnded,
                outcome: AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
