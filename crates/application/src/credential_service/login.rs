use castellan_domain::{AuditAction, AuditOutcome};

use super::*;

impl CredentialService {
    /// Authenticates a user with email and password.
    ///
    /// Returns `AuthOutcome::Failed` with no further detail for any failure
    /// (unknown email, wrong password, locked account) to prevent account
    /// enumeration. Hashing always runs, even on paths that fail before a
    /// stored hash is available, so the response time does not leak which
    /// branch was taken.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<AuthOutcome> {
        let user = self.user_repository.find_by_email(email).await?;

        let Some(user) = user else {
            let _ = self.password_hasher.hash_password(password);
            return Ok(AuthOutcome::Failed);
        };

        if let Some(locked_until) = user.locked_until {
            if chrono::Utc::now() < locked_until {
                let _ = self.password_hasher.hash_password(password);
                self.audit_service
                    .record_event(AuditEvent {
                        subject: Some(user.id.to_string()),
                        event_type: AuditAction::LoginFailed,
                        outcome: AuditOutcome::Failure,
                        ip_address,
                        user_agent,
                    })
                    .await?;
                return Ok(AuthOutcome::Failed);
            }
        }

        let Some(ref stored_hash) = user.password_hash else {
            let _ = self.password_hasher.hash_password(password);
            return Ok(AuthOutcome::Failed);
        };

        let password_valid = self.password_hasher.verify_password(password, stored_hash)?;

        if !password_valid {
            self.user_repository.record_failed_login(user.id).await?;
            self.audit_service
                .record_event(AuditEvent {
                    subject: Some(user.id.to_string()),
                    event_type: AuditAction::LoginFailed,
                    outcome: AuditOutcome::Failure,
                    ip_address,
                    user_agent,
                })
                .await?;
            return Ok(AuthOutcome::Failed);
        }

        self.user_repository.reset_failed_logins(user.id).await?;

        if user.totp_enabled {
            return Ok(AuthOutcome::MfaRequired { user_id: user.id });
        }

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(user.id.to_string()),
                event_type: AuditAction::LoginSucceeded,
                outcome: AuditOutcome::Success,
                ip_address,
                user_agent,
            })
            .await?;

        Ok(AuthOutcome::Authenticated(user))
    }

    /// Changes the password for an authenticated user. Requires the current
    /// password for re-authentication.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        let Some(ref stored_hash) = user.password_hash else {
            return Err(AppError::Validation(
                "no password is set on this account".to_owned(),
            ));
        };

        let current_valid = self
            .password_hasher
            .verify_password(current_password, stored_hash)?;

        if !current_valid {
            return Err(castellan_core::DomainError::InvalidCredentials.into());
        }

        self.password_policy.validate(new_password)?;

        let new_hash = self.password_hasher.hash_password(new_password)?;
        self.user_repository
            .update_password(user_id, &new_hash)
            .await?;

        self.audit_service
            .record_event(AuditEvent {
                subject: Some(user_id.to_string()),
                event_type: AuditAction::PasswordChanged,
                outcome: AuditOutcome::Success,
                ip_address: None,
                user_agent: None,
            })
            .await
    }
}
