use castellan_domain::EmailAddress;

use super::token_crypto::generate_token;
use super::*;

impl CredentialService {
    /// Issues a password reset token and sends the reset email.
    ///
    /// Always returns `Ok(())` regardless of whether the email exists, per
    /// OWASP Forgot Password guidance: "If that email is in our system, we
    /// will send you an email to reset your password."
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Ok(canonical_email) = EmailAddress::new(email) else {
            return Ok(());
        };

        let one_hour_ago = chrono::Utc::now() - chrono::Duration::hours(1);
        let recent_count = self
            .token_repository
            .count_recent_tokens(
                canonical_email.as_str(),
                AuthTokenType::PasswordReset,
                one_hour_ago,
            )
            .await?;

        if recent_count >= 3 {
            return Ok(());
        }

        let Some(user) = self
            .user_repository
            .find_by_email(canonical_email.as_str())
            .await?
        else {
            return Ok(());
        };

        self.token_repository
            .invalidate_tokens_for_user(user.id, AuthTokenType::PasswordReset)
            .await?;

        let (raw_token, token_hash) = generate_token()?;
        let expires_at = chrono::Utc::now() + chrono::Duration::hours(1);

        self.token_repository
            .create_token(
                user.id,
                canonical_email.as_str(),
                &token_hash,
                AuthTokenType::PasswordReset,
                expires_at,
            )
            .await?;

        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, raw_token);
        let subject = "Reset your password";
        let text_body = format!(
            "You requested a password reset.\n\n\
             Click the link below to set a new password:\n{reset_url}\n\n\
             This link expires in 1 hour.\n\n\
             If you did not request this, you can safely ignore this email."
        );

        self.email_service
            .send_email(canonical_email.as_str(), subject, &text_body, None)
            .await?;

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(user.id.to_string()),
                event_type: castellan_domain::AuditAction::PasswordResetRequested,
                outcome: castellan_domain::AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await
    }

    /// Completes a password reset using a previously issued token. Returns
    /// the affected user ID so the caller can revoke existing sessions.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> AppResult<UserId> {
        let token_hash = super::token_crypto::hash_token(raw_token);

        let record = self
            .token_repository
            .consume_valid_token(&token_hash, AuthTokenType::PasswordReset)
            .await?
            .ok_or(castellan_core::DomainError::TokenNotFound)?;

        self.password_policy.validate(new_password)?;

        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.user_repository
            .update_password(record.user_id, &new_hash)
            .await?;

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(record.user_id.to_string()),
                event_type: castellan_domain::AuditAction::PasswordResetCompleted,
                outcome: castellan_domain::AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await?;

        Ok(record.user_id)
    }
}
