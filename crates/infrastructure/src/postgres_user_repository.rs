//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{UserRecord, UserRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Role, UserId};

/// Consecutive failures after which an account locks, and the lockout window.
const LOCKOUT_THRESHOLD: i32 = 5;
const LOCKOUT_WINDOW_MINUTES: i64 = 15;

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    email_verified: bool,
    password_hash: Option<String>,
    totp_enabled: bool,
    totp_secret_enc: Option<Vec<u8>>,
    recovery_codes_hash: Option<serde_json::Value>,
    failed_login_count: i32,
    locked_until: Option<chrono::DateTime<chrono::Utc>>,
    role: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            email_verified: row.email_verified,
            password_hash: row.password_hash,
            totp_enabled: row.totp_enabled,
            totp_secret_enc: row.totp_secret_enc,
            recovery_codes_hash: row.recovery_codes_hash,
            failed_login_count: row.failed_login_count,
            locked_until: row.locked_until,
            role: row.role.parse::<Role>()?,
        })
    }
}

fn email_conflict_or_internal(error: sqlx::Error, action: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict("an account with this email already exists".to_owned());
    }
    AppError::Internal(format!("failed to {action}: {error}"))
}

const USER_COLUMNS: &str = "id, email, email_verified, password_hash, totp_enabled, \
    totp_secret_enc, recovery_codes_hash, failed_login_count, locked_until, role";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by email: {error}")))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by id: {error}")))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        email_verified: bool,
    ) -> AppResult<UserId> {
        let id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO users (email, password_hash, email_verified)
            VALUES (LOWER($1), $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(email_verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| email_conflict_or_internal(error, "create user"))?;

        Ok(UserId::from_uuid(id))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, password_changed_at = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update password: {error}")))?;

        Ok(())
    }

    async fn record_failed_login(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = failed_login_count + 1,
                locked_until = CASE
                    WHEN failed_login_count + 1 >= $2
                        THEN now() + make_interval(mins => $3)
                    ELSE locked_until
                END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(LOCKOUT_THRESHOLD)
        .bind(LOCKOUT_WINDOW_MINUTES as i32)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record failed login: {error}")))?;

        Ok(())
    }

    async fn reset_failed_logins(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = 0, locked_until = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reset failed logins: {error}")))?;

        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to mark email verified: {error}")))?;

        Ok(())
    }

    async fn update_email(&self, user_id: UserId, new_email: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email = LOWER($2), email_verified = FALSE, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(new_email)
        .execute(&self.pool)
        .await
        .map_err(|error| email_conflict_or_internal(error, "update email"))?;

        Ok(())
    }

    async fn set_totp_state(
        &self,
        user_id: UserId,
        totp_secret_enc: Option<&[u8]>,
        recovery_codes_hash: Option<&serde_json::Value>,
        enabled: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET totp_secret_enc = $2,
                recovery_codes_hash = $3,
                totp_enabled = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(totp_secret_enc)
        .bind(recovery_codes_hash)
        .bind(enabled)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update TOTP state: {error}")))?;

        Ok(())
    }

    async fn update_recovery_codes(
        &self,
        user_id: UserId,
        recovery_codes_hash: &serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET recovery_codes_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(recovery_codes_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update recovery codes: {error}")))?;

        Ok(())
    }
}
