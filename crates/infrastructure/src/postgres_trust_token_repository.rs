//! PostgreSQL-backed trust-token persistence.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{TrustTokenRecord, TrustTokenRepository};
use castellan_core::{AppError, AppResult};

/// PostgreSQL implementation of the trust token repository port.
#[derive(Clone)]
pub struct PostgresTrustTokenRepository {
    pool: PgPool,
}

impl PostgresTrustTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrustTokenRow {
    token_hash: String,
    ip_address: Option<String>,
    device_fingerprint: Option<String>,
    expires_at: chrono::DateTime<chrono::Utc>,
    used_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<TrustTokenRow> for TrustTokenRecord {
    fn from(row: TrustTokenRow) -> Self {
        Self {
            token_hash: row.token_hash,
            ip_address: row.ip_address,
            device_fingerprint: row.device_fingerprint,
            expires_at: row.expires_at,
            used_at: row.used_at,
        }
    }
}

#[async_trait]
impl TrustTokenRepository for PostgresTrustTokenRepository {
    async fn create(
        &self,
        token_hash: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trust_tokens (token_hash, ip_address, device_fingerprint, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_hash)
        .bind(ip_address)
        .bind(device_fingerprint)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create trust token: {error}")))?;

        Ok(())
    }

    async fn find(&self, token_hash: &str) -> AppResult<Option<TrustTokenRecord>> {
        let row = sqlx::query_as::<_, TrustTokenRow>(
            "SELECT token_hash, ip_address, device_fingerprint, expires_at, used_at \
             FROM trust_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find trust token: {error}")))?;

        Ok(row.map(TrustTokenRecord::from))
    }

    async fn consume(
        &self,
        token_hash: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<Option<TrustTokenRecord>> {
        let row = sqlx::query_as::<_, TrustTokenRow>(
            r#"
            UPDATE trust_tokens
            SET used_at = now()
            WHERE token_hash = $1
              AND used_at IS NULL
              AND expires_at > now()
              AND (ip_address IS NULL OR $2 IS NULL OR ip_address = $2)
              AND (device_fingerprint IS NULL OR $3 IS NULL OR device_fingerprint = $3)
            RETURNING token_hash, ip_address, device_fingerprint, expires_at, used_at
            "#,
        )
        .bind(token_hash)
        .bind(ip_address)
        .bind(device_fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to consume trust token: {error}")))?;

        Ok(row.map(TrustTokenRecord::from))
    }
}
