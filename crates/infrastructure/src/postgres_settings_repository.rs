//! PostgreSQL-backed settings persistence, storing both system-tier and
//! per-user custom overrides in a single table.

use async_trait::async_trait;
use sqlx::PgPool;

use castellan_application::{SettingsRecord, SettingsRepository};
use castellan_core::{AppError, AppResult};
use castellan_domain::{Role, SettingsTier, UserId};

/// PostgreSQL implementation of the settings repository port.
#[derive(Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    key: String,
    tier: String,
    owner: Option<uuid::Uuid>,
    value: serde_json::Value,
    value_type: String,
    description: Option<String>,
    editable_by: serde_json::Value,
}

fn tier_as_str(tier: SettingsTier) -> &'static str {
    match tier {
        SettingsTier::System => "system",
        SettingsTier::Custom => "custom",
    }
}

fn parse_tier(value: &str) -> AppResult<SettingsTier> {
    match value {
        "system" => Ok(SettingsTier::System),
        "custom" => Ok(SettingsTier::Custom),
        other => Err(AppError::Internal(format!("unknown settings tier: {other}"))),
    }
}

impl TryFrom<SettingsRow> for SettingsRecord {
    type Error = AppError;

    fn try_from(row: SettingsRow) -> Result<Self, Self::Error> {
        let editable_by = row
            .editable_by
            .as_array()
            .ok_or_else(|| AppError::Internal("editable_by column is not a JSON array".to_owned()))?
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .ok_or_else(|| AppError::Internal("editable_by entry is not a string".to_owned()))
                    .and_then(|role| role.parse::<Role>())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            key: row.key,
            tier: parse_tier(&row.tier)?,
            owner: row.owner.map(UserId::from_uuid),
            value: row.value,
            value_type: row.value_type,
            description: row.description,
            editable_by,
        })
    }
}

fn internal(action: &str, error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to {action}: {error}"))
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get(&self, key: &str, owner: Option<UserId>) -> AppResult<Option<SettingsRecord>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT key, tier, owner, value, value_type, description, editable_by
            FROM settings
            WHERE key = $1 AND owner IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(key)
        .bind(owner.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| internal("fetch setting", error))?;

        row.map(SettingsRecord::try_from).transpose()
    }

    async fn get_many(&self, keys: &[String], owner: Option<UserId>) -> AppResult<Vec<SettingsRecord>> {
        let rows = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT key, tier, owner, value, value_type, description, editable_by
            FROM settings
            WHERE key = ANY($1) AND owner IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(keys)
        .bind(owner.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| internal("fetch settings", error))?;

        rows.into_iter().map(SettingsRecord::try_from).collect()
    }

    async fn put(&self, record: SettingsRecord) -> AppResult<()> {
        let editable_by = serde_json::Value::Array(
            record
                .editable_by
                .iter()
                .map(|role| serde_json::Value::String(role.as_str().to_owned()))
                .collect(),
        );

        sqlx::query(
            r#"
            INSERT INTO settings (key, tier, owner, value, value_type, description, editable_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key, owner) DO UPDATE SET
                tier = EXCLUDED.tier,
                value = EXCLUDED.value,
                value_type = EXCLUDED.value_type,
                description = EXCLUDED.description,
                editable_by = EXCLUDED.editable_by
            "#,
        )
        .bind(&record.key)
        .bind(tier_as_str(record.tier))
        .bind(record.owner.map(|id| id.as_uuid()))
        .bind(&record.value)
        .bind(&record.value_type)
        .bind(&record.description)
        .bind(editable_by)
        .execute(&self.pool)
        .await
        .map_err(|error| internal("upsert setting", error))?;

        Ok(())
    }
}
