use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::audit_service::AuditRepository;

#[derive(Default)]
struct FakeImpersonations {
    records: Mutex<Vec<ImpersonationRecord>>,
}

#[async_trait]
impl ImpersonationRepository for FakeImpersonations {
    async fn find_active_for_admin(&self, admin_id: UserId) -> AppResult<Option<ImpersonationRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.admin_id == admin_id && r.ended_at.is_none())
            .cloned())
    }

    async fn create(&self, record: ImpersonationRecord) -> AppResult<()> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(record);
        Ok(())
    }

    async fn end(&self, impersonation_id: ImpersonationId, ended_at: DateTime<Utc>) -> AppResult<()> {
        let mut guard = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = guard.iter_mut().find(|r| r.id == impersonation_id) {
            record.ended_at = Some(ended_at);
        }
        Ok(())
    }
}

struct FakeAudit;

#[async_trait]
impl AuditRepository for FakeAudit {
    async fn append_event(&self, _event: AuditEvent) -> AppResult<()> {
        Ok(())
    }
}

fn build_service() -> ImpersonationService {
    ImpersonationService::new(
        Arc::new(FakeImpersonations::default()),
        AuditService::new(Arc::new(FakeAudit)),
    )
}

fn params(admin_id: UserId, target: Option<UserId>) -> StartImpersonationParams {
    StartImpersonationParams {
        admin_id,
        admin_role: Role::Admin,
        target_user_id: target,
        target_role: Role::Authenticated,
        reason: "investigating a support ticket".to_owned(),
        ip_address: Some("203.0.113.5".to_owned()),
        user_agent: Some("test-agent".to_owned()),
    }
}

#[tokio::test]
async fn non_admin_is_refused() {
    let service = build_service();
    let mut request = params(UserId::new(), Some(UserId::new()));
    request.admin_role = Role::Authenticated;

    let result = service.start(request).await;
    assert_eq!(result.unwrap_err().domain(), Some(&DomainError::Forbidden));
}

#[tokio::test]
async fn self_impersonation_is_refused() {
    let service = build_service();
    let admin_id = UserId::new();

    let result = service.start(params(admin_id, Some(admin_id))).await;
    assert_eq!(result.unwrap_err().domain(), Some(&DomainError::SelfImpersonation));
}

#[tokio::test]
async fn a_second_concurrent_session_is_refused() {
    let service = build_service();
    let admin_id = UserId::new();

    service
        .start(params(admin_id, Some(UserId::new())))
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let result = service.start(params(admin_id, Some(UserId::new()))).await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&DomainError::AlreadyImpersonating)
    );
}

#[tokio::test]
async fn ending_a_session_allows_starting_a_new_one() {
    let service = build_service();
    let admin_id = UserId::new();

    let first = service
        .start(params(admin_id, Some(UserId::new())))
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    service.end(admin_id, first.id).await.unwrap_or_else(|e| panic!("{e}"));

    service
        .start(params(admin_id, Some(UserId::new())))
        .await
        .unwrap_or_else(|e| panic!("{e}"));
}
