//! PostgreSQL-backed federated identity repository, shared by OAuth2/OIDC
//! and SAML login.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{IdentityRecord, IdentityRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Provider, UserId};

/// PostgreSQL implementation of the federated identity repository port.
#[derive(Clone)]
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    user_id: uuid::Uuid,
    provider_user_id: String,
    email: Option<String>,
    linked_at: chrono::DateTime<chrono::Utc>,
}

fn row_into_record(row: IdentityRow, provider: &Provider) -> IdentityRecord {
    IdentityRecord {
        user_id: UserId::from_uuid(row.user_id),
        provider: provider.clone(),
        provider_user_id: row.provider_user_id,
        email: row.email,
        linked_at: row.linked_at,
    }
}

fn internal(action: &str, error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn find(
        &self,
        provider: &Provider,
        provider_user_id: &str,
    ) -> AppResult<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT user_id, provider_user_id, email, linked_at
            FROM federated_identities
            WHERE provider = $1 AND provider_user_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("find federated identity", error))?;

        Ok(row.map(|row| row_into_record(row, provider)))
    }

    async fn link(
        &self,
        user_id: UserId,
        provider: &Provider,
        provider_user_id: &str,
        email: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO federated_identities (user_id, provider, provider_user_id, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_user_id) DO UPDATE SET email = EXCLUDED.email
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(provider.as_str())
        .bind(provider_user_id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|error| internal("link federated identity", error))?;

        Ok(())
    }

    async fn unlink(&self, user_id: UserId, provider: &Provider) -> AppResult<()> {
        sqlx::query("DELETE FROM federated_identities WHERE user_id = $1 AND provider = $2")
            .bind(user_id.as_uuid())
            .bind(provider.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| internal("unlink federated identity", error))?;

        Ok(())
    }

    async fn count_auth_factors(&self, user_id: UserId) -> AppResult<i64> {
        let has_password = sqlx::query_scalar::<_, bool>(
            "SELECT password_hash IS NOT NULL FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("check password factor", error))?
        .unwrap_or(false);

        let linked_identities = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM federated_identities WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| internal("count linked identities", error))?;

        Ok(i64::from(has_password) + linked_identities)
    }
}
