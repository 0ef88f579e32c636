use castellan_core::{AppError, DomainError};
use castellan_domain::UserId;

use super::recovery_codes::{generate_recovery_codes, hash_recovery_codes};
use super::*;

impl MfaService {
    /// Starts TOTP enrollment for a user.
    ///
    /// Stores the encrypted secret and hashed recovery codes with
    /// `enabled = false`; the caller is not protected by MFA until
    /// [`MfaService::confirm_enrollment`] verifies a live code.
    pub async fn start_enrollment(&self, user_id: UserId) -> AppResult<TotpEnrollment> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        if user.totp_enabled {
            return Err(AppError::Conflict(
                "TOTP is already enabled for this account".to_owned(),
            ));
        }

        let (secret_bytes, secret_base32, otpauth_uri) =
            self.totp_provider.generate_secret(&user.email)?;
        let qr_code_png = self.totp_provider.render_qr_code_png(&otpauth_uri)?;

        let encrypted_secret = self.secret_encryptor.encrypt(&secret_bytes)?;
        let recovery_codes = generate_recovery_codes();
        let hashed_codes = hash_recovery_codes(&recovery_codes);

        self.user_repository
            .set_totp_state(user_id, Some(&encrypted_secret), Some(&hashed_codes), false)
            .await?;

        Ok(TotpEnrollment {
            secret_base32,
            otpauth_uri,
            qr_code_png,
            recovery_codes,
        })
    }

    /// Confirms TOTP enrollment by verifying a code from the user's
    /// authenticator app, flipping `enabled` to true on success.
    pub async fn confirm_enrollment(&self, user_id: UserId, code: &str) -> AppResult<()> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        let Some(ref encrypted_secret) = user.totp_secret_enc else {
            return Err(AppError::Validation(
                "no TOTP enrollment in progress".to_owned(),
            ));
        };

        let secret_bytes = self.secret_encryptor.decrypt(encrypted_secret)?;
        let valid = self.totp_provider.verify_code(&secret_bytes, code)?;

        if !valid {
            return Err(DomainError::InvalidToken.into());
        }

        self.user_repository
            .set_totp_state(
                user_id,
                Some(encrypted_secret),
                user.recovery_codes_hash.as_ref(),
                true,
            )
            .await
    }
}
