//! PostgreSQL-backed refresh-token session repository.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{SessionRecord, SessionRepository};
use castellan_core::AppResult;
use castellan_domain::{SessionId, UserId};

/// PostgreSQL implementation of the session repository port.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    refresh_token_jti: String,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: chrono::DateTime<chrono::Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            refresh_token_jti: row.refresh_token_jti,
            created_at: row.created_at,
            expires_at: row.expires_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            revoked_at: row.revoked_at,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_jti, created_at, expires_at, \
    ip_address, user_agent, revoked_at";

fn internal(action: &str, error: sqlx::Error) -> castellan_core::AppError {
    castellan_core::AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create(
        &self,
        user_id: UserId,
        refresh_token_jti: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<SessionId> {
        let id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO sessions (user_id, refresh_token_jti, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(refresh_token_jti)
        .bind(expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| internal("create session", error))?;

        Ok(SessionId::from_uuid(id))
    }

    async fn find(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("find session", error))?;

        Ok(row.map(SessionRecord::from))
    }

    async fn rotate(
        &self,
        session_id: SessionId,
        expected_jti: &str,
        new_jti: &str,
        new_expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE sessions
            SET refresh_token_jti = $2, expires_at = $3
            WHERE id = $1
              AND refresh_token_jti = $4
              AND revoked_at IS NULL
              AND expires_at > now()
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id.as_uuid())
        .bind(new_jti)
        .bind(new_expires_at)
        .bind(expected_jti)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("rotate session", error))?;

        Ok(row.map(SessionRecord::from))
    }

    async fn revoke(&self, session_id: SessionId) -> AppResult<()> {
        sqlx::query("UPDATE sessions SET revoked_at = now() WHERE id = $1")
            .bind(session_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| internal("revoke session", error))?;

        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            "UPDATE sessions SET revoked_at = now() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| internal("revoke all sessions", error))?;

        Ok(())
    }
}
