use castellan_core::{AppError, DomainError};
use castellan_domain::{UserId, TOTP_MAX_FAILURES};

use super::recovery_codes::hash_single_code;
use super::*;

impl MfaService {
    /// Verifies a TOTP code for an authenticated MFA challenge, tracking
    /// consecutive failures toward the lockout threshold.
    pub async fn verify_totp(&self, user_id: UserId, code: &str) -> AppResult<bool> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        if !user.totp_enabled {
            return Err(DomainError::TOTPNotEnabled.into());
        }

        let failure_count = self.rate_limiter.record_failure(user_id).await?;
        if failure_count > TOTP_MAX_FAILURES {
            return Err(DomainError::TOTPRateLimitExceeded.into());
        }

        let Some(ref encrypted_secret) = user.totp_secret_enc else {
            return Err(AppError::Internal(
                "TOTP enabled but secret is missing".to_owned(),
            ));
        };

        let secret_bytes = self.secret_encryptor.decrypt(encrypted_secret)?;
        let valid = self.totp_provider.verify_code(&secret_bytes, code)?;

        if valid {
            self.rate_limiter.clear(user_id).await?;
        }

        Ok(valid)
    }

    /// Verifies a recovery code and marks it consumed.
    pub async fn verify_recovery_code(&self, user_id: UserId, code: &str) -> AppResult<bool> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        let Some(ref codes_json) = user.recovery_codes_hash else {
            return Ok(false);
        };

        let hashed_codes: Vec<String> = serde_json::from_value(codes_json.clone())
            .map_err(|error| AppError::Internal(format!("failed to parse recovery codes: {error}")))?;

        let code_hash = hash_single_code(code);

        let mut matched = false;
        let mut remaining_codes: Vec<String> = Vec::new();

        for stored_hash in &hashed_codes {
            if !matched && *stored_hash == code_hash {
                matched = true;
            } else {
                remaining_codes.push(stored_hash.clone());
            }
        }

        if !matched {
            return Err(DomainError::BackupCodeInvalid.into());
        }

        let updated_json = serde_json::to_value(&remaining_codes)
            .map_err(|error| AppError::Internal(format!("failed to serialize recovery codes: {error}")))?;

        self.user_repository
            .update_recovery_codes(user_id, &updated_json)
            .await?;

        Ok(true)
    }
}
