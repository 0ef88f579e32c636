//! System, custom, and per-user settings with role-gated writes and an
//! explicit-invalidation cache.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use castellan_core::{AppError, AppResult, DomainError};
use castellan_domain::{AuditAction, AuditOutcome, Role, SettingsKey, SettingsTier, UserId};

use crate::audit_service::{AuditEvent, AuditService};

/// A stored settings value.
#[derive(Debug, Clone)]
pub struct SettingsRecord {
    pub key: String,
    pub tier: SettingsTier,
    pub owner: Option<UserId>,
    pub value: Value,
    pub value_type: String,
    pub description: Option<String>,
    pub editable_by: Vec<Role>,
}

/// Repository port for settings persistence.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetches a single setting, optionally scoped to a user for user-tier lookups.
    async fn get(&self, key: &str, owner: Option<UserId>) -> AppResult<Option<SettingsRecord>>;

    /// Fetches several settings by key in one round-trip.
    async fn get_many(&self, keys: &[String], owner: Option<UserId>) -> AppResult<Vec<SettingsRecord>>;

    /// Upserts a setting value.
    async fn put(&self, record: SettingsRecord) -> AppResult<()>;
}

/// Port for an explicit-invalidation settings cache.
#[async_trait]
pub trait SettingsCache: Send + Sync {
    /// Returns a cached value, if present.
    async fn get(&self, key: &str, owner: Option<UserId>) -> Option<SettingsRecord>;

    /// Inserts or replaces a cached value.
    async fn put(&self, record: SettingsRecord);

    /// Invalidates a cached value after a write.
    async fn invalidate(&self, key: &str, owner: Option<UserId>);
}

const SETUP_COMPLETED_KEY: &str = "setup_completed";

/// Application service for settings reads/writes.
#[derive(Clone)]
pub struct SettingsService {
    repository: Arc<dyn SettingsRepository>,
    cache: Arc<dyn SettingsCache>,
    audit: AuditService,
}

impl SettingsService {
    /// Creates a new settings service.
    #[must_use]
    pub fn new(repository: Arc<dyn SettingsRepository>, cache: Arc<dyn SettingsCache>, audit: AuditService) -> Self {
        Self {
            repository,
            cache,
            audit,
        }
    }

    /// Reads a single setting, consulting the cache first.
    pub async fn get(&self, key: &str, owner: Option<UserId>) -> AppResult<Option<SettingsRecord>> {
        SettingsKey::new(key)?;

        if let Some(cached) = self.cache.get(key, owner).await {
            return Ok(Some(cached));
        }

        let record = self.repository.get(key, owner).await?;
        if let Some(ref record) = record {
            self.cache.put(record.clone()).await;
        }
        Ok(record)
    }

    /// Reads several settings by key in one batch.
    pub async fn get_many(&self, keys: &[String], owner: Option<UserId>) -> AppResult<Vec<SettingsRecord>> {
        for key in keys {
            SettingsKey::new(key.as_str())?;
        }
        self.repository.get_many(keys, owner).await
    }

    /// Writes a setting, gated by the actor's role against the existing
    /// record's `editable_by` list (always allowed for roles where
    /// [`Role::always_allowed_for_settings`] is true).
    pub async fn set(&self, record: SettingsRecord, actor_role: Role) -> AppResult<()> {
        SettingsKey::new(record.key.as_str())?;

        if !actor_role.always_allowed_for_settings() && !record.editable_by.contains(&actor_role) {
            return Err(DomainError::Forbidden.into());
        }

        let owner = record.owner;
        let key = record.key.clone();

        self.repository.put(record).await?;
        self.cache.invalidate(&key, owner).await;

        self.audit
            .record_event(AuditEvent {
                subject: owner.map(|id| id.to_string()),
                event_type: AuditAction::SettingsChanged,
                outcome: AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await?;

        Ok(())
    }

    /// Marks first-admin provisioning complete. Idempotent calls fail with
    /// `AlreadyCompleted`-equivalent conflict semantics.
    pub async fn mark_setup_complete(&self, actor_role: Role) -> AppResult<()> {
        if let Some(existing) = self.repository.get(SETUP_COMPLETED_KEY, None).await? {
            if existing.value == Value::Bool(true) {
                return Err(AppError::Conflict("setup already completed".to_owned()));
            }
        }

        self.set(
            SettingsRecord {
                key: SETUP_COMPLETED_KEY.to_owned(),
                tier: SettingsTier::System,
                owner: None,
                value: Value::Bool(true),
                value_type: "bool".to_owned(),
                description: Some("one-time first-admin provisioning marker".to_owned()),
                editable_by: vec![Role::DashboardAdmin],
            },
            actor_role,
        )
        .await
    }
}

#[cfg(test)]
mod tests;
