use std::sync::Mutex;

use async_trait::async_trait;

use super::*;
use crate::credential_service::UserRecord;

#[derive(Default)]
struct FakeUsers {
    users: Mutex<Vec<UserRecord>>,
}

impl FakeUsers {
    fn seed(&self, user: UserRecord) -> UserId {
        let id = user.id;
        self.users.lock().unwrap_or_else(|e| e.into_inner()).push(user);
        id
    }
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

    async fn create(&self, _email: &str, _password_hash: Option<&str>, _email_verified: bool) -> AppResult<UserId> {
        Ok(UserId::new())
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
        user_id: UserId,
        totp_secret_enc: Option<&[u8]>,
        recovery_codes_hash: Option<&serde_json::Value>,
        enabled: bool,
    ) -> AppResult<()> {
        let mut guard = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = guard.iter_mut().find(|u| u.id == user_id) {
            user.totp_secret_enc = totp_secret_enc.map(<[u8]>::to_vec);
            user.recovery_codes_hash = recovery_codes_hash.cloned();
            user.totp_enabled = enabled;
        }
        Ok(())
    }

    async fn update_recovery_codes(&self, user_id: UserId, recovery_codes_hash: &serde_json::Value) -> AppResult<()> {
        let mut guard = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = guard.iter_mut().find(|u| u.id == user_id) {
            user.recovery_codes_hash = Some(recovery_codes_hash.clone());
        }
        Ok(())
    }
}

struct FakeHasher;

#[async_trait]
impl PasswordHasher for FakeHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("hashed:{password}"))
    }
}

struct FakeTotp;

#[async_trait]
impl TotpProvider for FakeTotp {
    fn generate_secret(&self, _account_label: &str) -> AppResult<(Vec<u8>, String, String)> {
        Ok((vec![1, 2, 3, 4], "AAAA".to_owned(), "otpauth://totp/x".to_owned()))
    }

    fn verify_code(&self, _secret_bytes: &[u8], code: &str) -> AppResult<bool> {
        Ok(code == "123456")
    }

    fn render_qr_code_png(&self, _otpauth_uri: &str) -> AppResult<String> {
        Ok("data:image/png;base64,AA==".to_owned())
    }
}

struct FakeEncryptor;

#[async_trait]
impl SecretEncryptor for FakeEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

#[derive(Default)]
struct FakeRateLimiter {
    failures: Mutex<u32>,
}

#[async_trait]
impl MfaRateLimiter for FakeRateLimiter {
    async fn record_failure(&self, _user_id: UserId) -> AppResult<u32> {
        let mut guard = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        *guard += 1;
        Ok(*guard)
    }

    async fn clear(&self, _user_id: UserId) -> AppResult<()> {
        *self.failures.lock().unwrap_or_else(|e| e.into_inner()) = 0;
        Ok(())
    }
}

fn new_user(email: &str) -> UserRecord {
    UserRecord {
        id: UserId::new(),
        email: email.to_owned(),
        email_verified: true,
        password_hash: Some("hashed:Password123!".to_owned()),
        totp_enabled: false,
        totp_secret_enc: None,
        recovery_codes_hash: None,
        failed_login_count: 0,
        locked_until: None,
        role: castellan_domain::Role::Authenticated,
    }
}

fn build_service() -> (MfaService, Arc<FakeUsers>) {
    let users = Arc::new(FakeUsers::default());
    let service = MfaService::new(
        users.clone(),
        Arc::new(FakeHasher),
        Arc::new(FakeTotp),
        Arc::new(FakeEncryptor),
        Arc::new(FakeRateLimiter::default()),
    );
    (service, users)
}

#[tokio::test]
async fn enrollment_then_confirmation_enables_totp() {
    let (service, users) = build_service();
    let user_id = users.seed(new_user("mfa@example.com"));

    let enrollment = service.start_enrollment(user_id).await.unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(enrollment.recovery_codes.len(), castellan_domain::BACKUP_CODE_COUNT);
    assert!(enrollment.qr_code_png.starts_with("data:image/png;base64,"));

    let unconfirmed = users.find_by_id(user_id).await.unwrap_or_else(|e| panic!("{e}")).unwrap_or_else(|| panic!("user"));
    assert!(!unconfirmed.totp_enabled);

    service.confirm_enrollment(user_id, "123456").await.unwrap_or_else(|e| panic!("{e}"));

    let confirmed = users.find_by_id(user_id).await.unwrap_or_else(|e| panic!("{e}")).unwrap_or_else(|| panic!("user"));
    assert!(confirmed.totp_enabled);
}

#[tokio::test]
async fn confirm_with_wrong_code_does_not_enable() {
    let (service, users) = build_service();
    let user_id = users.seed(new_user("mfa2@example.com"));
    service.start_enrollment(user_id).await.unwrap_or_else(|e| panic!("{e}"));

    let result = service.confirm_enrollment(user_id, "000000").await;
    assert!(result.is_err());

    let user = users.find_by_id(user_id).await.unwrap_or_else(|e| panic!("{e}")).unwrap_or_else(|| panic!("user"));
    assert!(!user.totp_enabled);
}

#[tokio::test]
async fn recovery_code_is_single_use() {
    let (service, users) = build_service();
    let mut user = new_user("recovery@example.com");
    let codes = vec!["abcd1234".to_owned()];
    user.recovery_codes_hash = Some(super::recovery_codes::hash_recovery_codes(&codes));
    let user_id = users.seed(user);

    let first = service.verify_recovery_code(user_id, "abcd1234").await.unwrap_or_else(|e| panic!("{e}"));
    assert!(first);

    let second = service.verify_recovery_code(user_id, "abcd1234").await;
    assert_eq!(
        second.unwrap_err().domain(),
        Some(&castellan_core::DomainError::BackupCodeInvalid)
    );
}

#[tokio::test]
async fn disabling_totp_requires_correct_password() {
    let (service, users) = build_service();
    let mut user = new_user("disable@example.com");
    user.totp_enabled = true;
    let user_id = users.seed(user);

    let result = service.disable_totp(user_id, "wrong-password").await;
    assert_eq!(
        result.unwrap_err().domain(),
        Some(&castellan_core::DomainError::InvalidCredentials)
    );

    service.disable_totp(user_id, "Password123!").await.unwrap_or_else(|e| panic!("{e}"));
    let user = users.find_by_id(user_id).await.unwrap_or_else(|e| panic!("{e}")).unwrap_or_else(|| panic!("user"));
    assert!(!user.totp_enabled);
}
