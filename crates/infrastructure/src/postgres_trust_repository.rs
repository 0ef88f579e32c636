//! PostgreSQL-backed trust signal history and CAPTCHA challenge persistence.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{ChallengeRecord, ChallengeRepository, TrustSignalRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::TrustSignals;

/// PostgreSQL implementation of trust-signal gathering and challenge storage.
#[derive(Clone)]
pub struct PostgresTrustRepository {
    pool: PgPool,
}

impl PostgresTrustRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn internal(action: &str, error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl TrustSignalRepository for PostgresTrustRepository {
    async fn gather_signals(
        &self,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<TrustSignals> {
        #[derive(sqlx::FromRow)]
        struct AccountRow {
            email_verified: bool,
            totp_enabled: bool,
            failed_login_count: i32,
            account_age_established: bool,
        }

        let account = match email {
            Some(email) => sqlx::query_as::<_, AccountRow>(
                r#"
                SELECT email_verified, totp_enabled, failed_login_count,
                       created_at < now() - interval '7 days' AS account_age_established
                FROM users
                WHERE LOWER(email) = LOWER($1)
                "#,
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| internal("gather account trust signals", error))?,
            None => None,
        };

        let known_ip = match (email, ip_address) {
            (Some(email), Some(ip)) => sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM trust_history WHERE email = $1 AND ip_address = $2)",
            )
            .bind(email)
            .bind(ip)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| internal("check known ip", error))?,
            _ => false,
        };

        let known_device = match (email, device_fingerprint) {
            (Some(email), Some(fingerprint)) => sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM trust_history WHERE email = $1 AND device_fingerprint = $2)",
            )
            .bind(email)
            .bind(fingerprint)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| internal("check known device", error))?,
            _ => false,
        };

        let has_successful_logins = match email {
            Some(email) => sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM trust_history WHERE email = $1)",
            )
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| internal("check login history", error))?,
            None => false,
        };

        Ok(TrustSignals {
            verified_email: account.as_ref().is_some_and(|row| row.email_verified),
            account_age_established: account
                .as_ref()
                .is_some_and(|row| row.account_age_established),
            mfa_enabled: account.as_ref().is_some_and(|row| row.totp_enabled),
            known_ip,
            known_device,
            has_successful_logins,
            has_recent_failures: account.as_ref().is_some_and(|row| row.failed_login_count > 0),
            recent_captcha_solved: false,
            blocked: false,
            admin_trusted: false,
            new_ip: ip_address.is_some() && !known_ip,
            new_device: device_fingerprint.is_some() && !known_device,
            no_account_history: account.is_none() && !has_successful_logins,
        })
    }

    async fn record_success(
        &self,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<()> {
        let Some(email) = email else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO trust_history (email, ip_address, device_fingerprint)
            VALUES ($1, $2, $3)
            ON CONFLICT (email, ip_address, device_fingerprint) DO UPDATE
            SET seen_at = now()
            "#,
        )
        .bind(email)
        .bind(ip_address)
        .bind(device_fingerprint)
        .execute(&self.pool)
        .await
        .map_err(|error| internal("record trust success", error))?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChallengeRow {
    id: uuid::Uuid,
    endpoint: String,
    email: Option<String>,
    ip_address: Option<String>,
    device_fingerprint: Option<String>,
    user_agent: Option<String>,
    score: i32,
    required: bool,
    reason: String,
    expires_at: chrono::DateTime<chrono::Utc>,
    consumed_at: Option<chrono::DateTime<chrono::Utc>>,
    verified: Option<bool>,
}

impl From<ChallengeRow> for ChallengeRecord {
    fn from(row: ChallengeRow) -> Self {
        Self {
            id: row.id.to_string(),
            endpoint: row.endpoint,
            email: row.email,
            ip_address: row.ip_address,
            device_fingerprint: row.device_fingerprint,
            user_agent: row.user_agent,
            score: row.score,
            required: row.required,
            reason: row.reason,
            expires_at: row.expires_at,
            consumed_at: row.consumed_at,
            verified: row.verified,
        }
    }
}

const CHALLENGE_COLUMNS: &str = "id, endpoint, email, ip_address, device_fingerprint, \
    user_agent, score, required, reason, expires_at, consumed_at, verified";

#[async_trait]
impl ChallengeRepository for PostgresTrustRepository {
    async fn create(
        &self,
        endpoint: &str,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        user_agent: Option<&str>,
        score: i32,
        required: bool,
        reason: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<ChallengeRecord> {
        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            r#"
            INSERT INTO trust_challenges
                (endpoint, email, ip_address, device_fingerprint, user_agent, score, required, reason, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {CHALLENGE_COLUMNS}
            "#
        ))
        .bind(endpoint)
        .bind(email)
        .bind(ip_address)
        .bind(device_fingerprint)
        .bind(user_agent)
        .bind(score)
        .bind(required)
        .bind(reason)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| internal("create challenge", error))?;

        Ok(ChallengeRecord::from(row))
    }

    async fn find(&self, challenge_id: &str) -> AppResult<Option<ChallengeRecord>> {
        let Ok(id) = challenge_id.parse::<uuid::Uuid>() else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM trust_challenges WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("find challenge", error))?;

        Ok(row.map(ChallengeRecord::from))
    }

    async fn consume(&self, challenge_id: &str, verified: bool) -> AppResult<Option<ChallengeRecord>> {
        let Ok(id) = challenge_id.parse::<uuid::Uuid>() else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ChallengeRow>(&format!(
            r#"
            UPDATE trust_challenges
            SET consumed_at = now(), verified = $2
            WHERE id = $1
              AND consumed_at IS NULL
              AND expires_at > now()
            RETURNING {CHALLENGE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("consume challenge", error))?;

        Ok(row.map(ChallengeRecord::from))
    }
}
