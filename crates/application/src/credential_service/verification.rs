use super::*;

impl CredentialService {
    /// Re-sends the email verification link for an unverified account.
    pub async fn resend_email_verification(&self, user_id: UserId) -> AppResult<()> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        if user.email_verified {
            return Ok(());
        }

        self.send_email_verification(user_id, &user.email).await
    }

    /// Verifies an email address using a previously issued token.
    pub async fn verify_email(&self, raw_token: &str) -> AppResult<()> {
        let token_hash = super::token_crypto::hash_token(raw_token);

        let record = self
            .token_repository
            .consume_valid_token(&token_hash, AuthTokenType::EmailVerification)
            .await?
            .ok_or(castellan_core::DomainError::TokenNotFound)?;

        self.user_repository
            .mark_email_verified(record.user_id)
            .await?;

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(record.user_id.to_string()),
                event_type: castellan_domain::AuditAction::EmailVerified,
                outcome: castellan_domain::AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await
    }
}
