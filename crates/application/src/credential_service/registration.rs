use castellan_domain::EmailAddress;

use super::token_crypto::generate_token;
use super::*;

impl CredentialService {
    /// Registers a new user with email and password and sends a
    /// verification email.
    pub async fn register(&self, params: RegisterParams) -> AppResult<UserId> {
        if !params.signup_enabled {
            return Err(castellan_core::DomainError::SignupDisabled.into());
        }

        let email_address = EmailAddress::new(&params.email)?;
        self.password_policy.validate(&params.password)?;

        let existing = self
            .user_repository
            .find_by_email(email_address.as_str())
            .await?;

        if existing.is_some() {
            // Keep the hashing work constant regardless of branch; do not
            // reveal that the account already exists.
            let _ = self.password_hasher.hash_password(&params.password);
            return Err(AppError::Conflict(
                "a link to activate your account has been emailed to the address provided"
                    .to_owned(),
            ));
        }

        let password_hash = self.password_hasher.hash_password(&params.password)?;
        let user_id = self
            .user_repository
            .create(email_address.as_str(), Some(&password_hash), false)
            .await?;

        self.send_email_verification(user_id, email_address.as_str())
            .await?;

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(user_id.to_string()),
                event_type: castellan_domain::AuditAction::UserRegistered,
                outcome: castellan_domain::AuditOutcome::Success,
                ip_address: params.ip_address,
                user_agent: params.user_agent,
            })
            .await?;

        Ok(user_id)
    }

    /// Issues an email verification token and sends the verification email.
    pub(super) async fn send_email_verification(
        &self,
        user_id: UserId,
        email: &str,
    ) -> AppResult<()> {
        self.token_repository
            .invalidate_tokens_for_user(user_id, AuthTokenType::EmailVerification)
            .await?;

        let (raw_token, token_hash) = generate_token()?;
        let expires_at = chrono::Utc::now() + chrono::Duration::hours(24);

        self.token_repository
            .create_token(
                user_id,
                email,
                &token_hash,
                AuthTokenType::EmailVerification,
                expires_at,
            )
            .await?;

        let verify_url = format!("{}/verify-email?token={}", self.frontend_url, raw_token);
        let subject = "Verify your email address";
        let text_body = format!(
            "Welcome! Click the link below to verify your email address:\n{verify_url}\n\n\
             This link expires in 24 hours."
        );

        self.email_service
            .send_email(email, subject, &text_body, None)
            .await
    }
}
