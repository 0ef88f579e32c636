use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::credential_service::UserRecord;

#[derive(Default)]
struct FakeIdentities {
    identities: Mutex<Vec<IdentityRecord>>,
}

#[async_trait]
impl IdentityRepository for FakeIdentities {
    async fn find(
        &self,
        provider: &Provider,
        provider_user_id: &str,
    ) -> AppResult<Option<IdentityRecord>> {
        Ok(self
            .identities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|i| &i.provider == provider && i.provider_user_id == provider_user_id)
            .cloned())
    }

    async fn link(
        &self,
        user_id: UserId,
        provider: &Provider,
        provider_user_id: &str,
        email: Option<&str>,
    ) -> AppResult<()> {
        self.identities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(IdentityRecord {
                user_id,
                provider: provider.clone(),
                provider_user_id: provider_user_id.to_owned(),
                email: email.map(str::to_owned),
                linked_at: chrono::Utc::now(),
            });
        Ok(())
    }

    async fn unlink(&self, user_id: UserId, provider: &Provider) -> AppResult<()> {
        self.identities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|i| !(i.user_id == user_id && &i.provider == provider));
        Ok(())
    }

    async fn count_auth_factors(&self, user_id: UserId) -> AppResult<i64> {
        Ok(self
            .identities
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|i| i.user_id == user_id)
            .count() as i64)
    }
}

#[derive(Default)]
struct FakeUsers {
    users: Mutex<Vec<UserRecord>>,
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn create(
        &self,
        email: &str,
        password_hash: Option<&str>,
        email_verified: bool,
    ) -> AppResult<UserId> {
        let id = UserId::new();
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(UserRecord {
                id,
                email: email.to_owned(),
                email_verified,
                password_hash: password_hash.map(str::to_owned),
                totp_enabled: false,
                totp_secret_enc: None,
                recovery_codes_hash: None,
                failed_login_count: 0,
                locked_until: None,
                role: castellan_domain::Role::Authenticated,
            });
        Ok(id)
    }

    async fn update_password(&self, _user_id: UserId, _password_hash: &str) -> AppResult<()> {
        Ok(())
    }

    async fn record_failed_login(&self, _user_id: UserId) -> AppResult<()> {
        Ok(())
    }

    async fn reset_failed_logins(&self, _user_id: UserId) -> AppResult<()> {
        Ok(())
    }

    async fn mark_email_verified(&self, _user_id: UserId) -> AppResult<()> {
        Ok(())
    }

    async fn update_email(&self, _user_id: UserId, _new_email: &str) -> AppResult<()> {
        Ok(())
    }

    async fn set_totp_state(
        &self,
        _user_id: UserId,
        _totp_secret_enc: Option<&[u8]>,
        _recovery_codes_hash: Option<&serde_json::Value>,
        _enabled: bool,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn update_recovery_codes(
        &self,
        _user_id: UserId,
        _recovery_codes_hash: &serde_json::Value,
    ) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeStateStore {
    states: Mutex<Vec<(String, String, Provider)>>,
}

#[async_trait]
impl OAuthStateStore for FakeStateStore {
    async fn store(&self, state: &str, pkce_verifier: &str, provider: &Provider) -> AppResult<()> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((state.to_owned(), pkce_verifier.to_owned(), provider.clone()));
        Ok(())
    }

    async fn consume(&self, state: &str) -> AppResult<Option<(String, Provider)>> {
        let mut guard = self.states.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = guard.iter().position(|(s, _, _)| s == state) {
            let (_, verifier, provider) = guard.remove(pos);
            return Ok(Some((verifier, provider)));
        }
        Ok(None)
    }
}

struct FakeOAuthClient;

#[async_trait]
impl OAuthClient for FakeOAuthClient {
    fn build_authorization_request(&self, provider: &Provider) -> AppResult<(String, String)> {
        Ok((
            format!("https://provider.example/{}/authorize", provider.as_str()),
            "verifier".to_owned(),
        ))
    }

    async fn exchange_code(
        &self,
        _provider: &Provider,
        code: &str,
        _pkce_verifier: &str,
    ) -> AppResult<FederatedIdentity> {
        Ok(FederatedIdentity {
            provider_user_id: format!("provider-user-{code}"),
            email: Some("federated@example.com".to_owned()),
            email_verified: true,
        })
    }
}

struct FakeOidcVerifier;

#[async_trait]
impl OidcVerifier for FakeOidcVerifier {
    async fn verify_id_token(&self, _provider: &Provider, id_token: &str) -> AppResult<FederatedIdentity> {
        Ok(FederatedIdentity {
            provider_user_id: format!("oidc-user-{id_token}"),
            email: Some("oidc@example.com".to_owned()),
            email_verified: true,
        })
    }
}

fn build_service() -> (FederationService, Arc<FakeIdentities>, Arc<FakeUsers>) {
    let identities = Arc::new(FakeIdentities::default());
    let users = Arc::new(FakeUsers::default());
    let service = FederationService::new(
        identities.clone(),
        users.clone(),
        Arc::new(FakeStateStore::default()),
        Arc::new(FakeOAuthClient),
        Some(Arc::new(FakeOidcVerifier)),
    );
    (service, identities, users)
}

#[tokio::test]
async fn login_creates_account_on_first_sign_in() {
    let (service, _identities, users) = build_service();

    let request = service.start_login("google").await.unwrap_or_else(|e| panic!("{e}"));
    let user = service
        .complete_login(&request.state, "auth-code")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(user.email, "federated@example.com");
    assert_eq!(users.users.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
}

#[tokio::test]
async fn second_login_reuses_the_linked_identity() {
    let (service, _identities, users) = build_service();

    let first_request = service.start_login("google").await.unwrap_or_else(|e| panic!("{e}"));
    let first_user = service
        .complete_login(&first_request.state, "same-code")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let second_request = service.start_login("google").await.unwrap_or_else(|e| panic!("{e}"));
    let second_user = service
        .complete_login(&second_request.state, "same-code")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(first_user.id, second_user.id);
    assert_eq!(users.users.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
}

#[tokio::test]
async fn unlinking_last_factor_is_refused() {
    let (service, _identities, users) = build_service();
    let user_id = users
        .create("solo@example.com", None, true)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    service
        .link_identity(user_id, "github", "gh-1", Some("solo@example.com"))
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    let result = service.unlink_identity(user_id, "github").await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&castellan_core::DomainError::LastAuthFactor)
    );
}

#[tokio::test]
async fn unknown_state_on_callback_is_rejected() {
    let (service, _identities, _users) = build_service();
    let result = service.complete_login("bogus-state", "code").await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&castellan_core::DomainError::InvalidToken)
    );
}

#[tokio::test]
async fn oidc_login_verifies_id_token_and_creates_account() {
    let (service, _identities, users) = build_service();

    let user = service
        .complete_oidc_login("https://issuer.example", "token-1")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(user.email, "oidc@example.com");
    assert_eq!(users.users.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
}

#[tokio::test]
async fn oidc_login_without_a_configured_verifier_is_rejected() {
    let identities = Arc::new(FakeIdentities::default());
    let users = Arc::new(FakeUsers::default());
    let service = FederationService::new(
        identities,
        users,
        Arc::new(FakeStateStore::default()),
        Arc::new(FakeOAuthClient),
        None,
    );

    let result = service.complete_oidc_login("https://issuer.example", "token-1").await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&castellan_core::DomainError::NotConfigured)
    );
}
