use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::audit_service::AuditRepository;

fn cache_key(key: &str, owner: Option<UserId>) -> String {
    format!("{key}:{owner:?}")
}

#[derive(Default)]
struct FakeSettingsRepository {
    rows: Mutex<HashMap<String, SettingsRecord>>,
}

#[async_trait]
impl SettingsRepository for FakeSettingsRepository {
    async fn get(&self, key: &str, owner: Option<UserId>) -> AppResult<Option<SettingsRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cache_key(key, owner))
            .cloned())
    }

    async fn get_many(&self, keys: &[String], owner: Option<UserId>) -> AppResult<Vec<SettingsRecord>> {
        let guard = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys
            .iter()
            .filter_map(|key| guard.get(&cache_key(key, owner)).cloned())
            .collect())
    }

    async fn put(&self, record: SettingsRecord) -> AppResult<()> {
        let owner = record.owner;
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key(&record.key, owner), record);
        Ok(())
    }
}

#[derive(Default)]
struct NoopCache;

#[async_trait]
impl SettingsCache for NoopCache {
    async fn get(&self, _key: &str, _owner: Option<UserId>) -> Option<SettingsRecord> {
        None
    }

    async fn put(&self, _record: SettingsRecord) {}

    async fn invalidate(&self, _key: &str, _owner: Option<UserId>) {}
}

struct FakeAudit;

#[async_trait]
impl AuditRepository for FakeAudit {
    async fn append_event(&self, _event: AuditEvent) -> AppResult<()> {
        Ok(())
    }
}

fn build_service() -> SettingsService {
    SettingsService::new(
        Arc::new(FakeSettingsRepository::default()),
        Arc::new(NoopCache),
        AuditService::new(Arc::new(FakeAudit)),
    )
}

#[tokio::test]
async fn writing_outside_editable_by_is_refused() {
    let service = build_service();
    let record = SettingsRecord {
        key: "rate_limit_window".to_owned(),
        tier: SettingsTier::Custom,
        owner: None,
        value: json!(60),
        value_type: "number".to_owned(),
        description: None,
        editable_by: vec![Role::DashboardAdmin],
    };

    let result = service.set(record, Role::Authenticated).await;
    assert_eq!(result.unwrap_err().domain(), Some(&DomainError::Forbidden));
}

#[tokio::test]
async fn admin_roles_always_pass_regardless_of_editable_by() {
    let service = build_service();
    let record = SettingsRecord {
        key: "rate_limit_window".to_owned(),
        tier: SettingsTier::Custom,
        owner: None,
        value: json!(60),
        value_type: "number".to_owned(),
        description: None,
        editable_by: vec![],
    };

    service.set(record, Role::Admin).await.unwrap_or_else(|e| panic!("{e}"));

    let stored = service
        .get("rate_limit_window", None)
        .await
        .unwrap_or_else(|e| panic!("{e}"))
        .unwrap_or_else(|| panic!("setting missing"));
    assert_eq!(stored.value, json!(60));
}

#[tokio::test]
async fn marking_setup_complete_twice_fails() {
    let service = build_service();

    service
        .mark_setup_complete(Role::DashboardAdmin)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let result = service.mark_setup_complete(Role::DashboardAdmin).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}
