//! PostgreSQL-backed append-only audit trail.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{AuditEvent, AuditRepository};
use castellan_core::{AppError, AppResult};

/// PostgreSQL implementation of the audit repository port.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (subject, action, outcome, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.subject)
        .bind(event.event_type.as_str())
        .bind(event.outcome.as_str())
        .bind(event.ip_address)
        .bind(event.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
