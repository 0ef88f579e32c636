//! PostgreSQL-backed admin impersonation session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use castellan_application::{ImpersonationRecord, ImpersonationRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{ImpersonationId, Role, UserId};

/// PostgreSQL implementation of the impersonation repository port.
#[derive(Clone)]
pub struct PostgresImpersonationRepository {
    pool: PgPool,
}

impl PostgresImpersonationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImpersonationRow {
    id: uuid::Uuid,
    admin_id: uuid::Uuid,
    target_user_id: Option<uuid::Uuid>,
    target_role: String,
    reason: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<ImpersonationRow> for ImpersonationRecord {
    type Error = AppError;

    fn try_from(row: ImpersonationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ImpersonationId::from_uuid(row.id),
            admin_id: UserId::from_uuid(row.admin_id),
            target_user_id: row.target_user_id.map(UserId::from_uuid),
            target_role: row.target_role.parse::<Role>()?,
            reason: row.reason,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

fn internal(action: &str, error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl ImpersonationRepository for PostgresImpersonationRepository {
    async fn find_active_for_admin(&self, admin_id: UserId) -> AppResult<Option<ImpersonationRecord>> {
        let row = sqlx::query_as::<_, ImpersonationRow>(
            r#"
            SELECT id, admin_id, target_user_id, target_role, reason, ip_address, user_agent, started_at, ended_at
            FROM impersonation_sessions
            WHERE admin_id = $1 AND ended_at IS NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(admin_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("find active impersonation session", error))?;

        row.map(ImpersonationRecord::try_from).transpose()
    }

    async fn create(&self, record: ImpersonationRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO impersonation_sessions
                (id, admin_id, target_user_id, target_role, reason, ip_address, user_agent, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.admin_id.as_uuid())
        .bind(record.target_user_id.map(|id| id.as_uuid()))
        .bind(record.target_role.as_str())
        .bind(&record.reason)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(record.started_at)
        .bind(record.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|error| internal("create impersonation session", error))?;

        Ok(())
    }

    async fn end(&self, impersonation_id: ImpersonationId, ended_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE impersonation_sessions SET ended_at = $2 WHERE id = $1 AND ended_at IS NULL")
            .bind(impersonation_id.as_uuid())
            .bind(ended_at)
            .execute(&self.pool)
            .await
            .map_err(|error| internal("end impersonation session", error))?;

        Ok(())
    }
}
