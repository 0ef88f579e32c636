//! Outer composition root exposing the authentication core's operations as
//! plain async methods, cancellable at any suspension point.

use tokio_util::sync::CancellationToken;

use castellan_core::{AppError, AppResult};
use castellan_domain::{ImpersonationId, Role, SessionId, UserId};

use crate::credential_service::{AuthOutcome, CredentialService, RegisterParams, UserRecord};
use crate::federation_service::{AuthorizationRequest, FederationService};
use crate::impersonation_service::{ImpersonationRecord, ImpersonationService, StartImpersonationParams};
use crate::mfa_service::{MfaService, TotpEnrollment};
use crate::saml_service::SamlService;
use crate::session_service::{Claims, SessionService, TokenPair};
use crate::settings_service::{SettingsRecord, SettingsService};
use crate::trust_service::{CaptchaRequirement, TrustService};

/// Request payload for [`AuthService::register`].
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub signup_enabled: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Request payload for [`AuthService::login`].
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Request payload for [`AuthService::change_password`].
pub struct ChangePasswordRequest {
    pub user_id: UserId,
    pub current_password: String,
    pub new_password: String,
}

fn check_cancelled(token: &CancellationToken) -> AppResult<()> {
    if token.is_cancelled() {
        return Err(AppError::Internal("operation cancelled".to_owned()));
    }
    Ok(())
}

/// Composes the eight domain services behind a single RPC-shaped surface.
#[derive(Clone)]
pub struct AuthService {
    credentials: CredentialService,
    sessions: SessionService,
    trust: TrustService,
    federation: FederationService,
    saml: SamlService,
    mfa: MfaService,
    impersonation: ImpersonationService,
    settings: SettingsService,
}

impl AuthService {
    /// Creates a new composed authentication service.
    #[must_use]
    pub fn new(
        credentials: CredentialService,
        sessions: SessionService,
        trust: TrustService,
        federation: FederationService,
        saml: SamlService,
        mfa: MfaService,
        impersonation: ImpersonationService,
        settings: SettingsService,
    ) -> Self {
        Self {
            credentials,
            sessions,
            trust,
            federation,
            saml,
            mfa,
            impersonation,
            settings,
        }
    }

    /// Registers a new account and sends an email verification link.
    /// Returns the newly created user ID.
    pub async fn register(&self, request: RegisterRequest, token: CancellationToken) -> AppResult<UserId> {
        check_cancelled(&token)?;
        self.credentials
            .register(RegisterParams {
                email: request.email,
                password: request.password,
                signup_enabled: request.signup_enabled,
                ip_address: request.ip_address,
                user_agent: request.user_agent,
            })
            .await
    }

    /// Authenticates with email/password and, when MFA is not required,
    /// issues a session token pair.
    pub async fn login(&self, request: LoginRequest, token: CancellationToken) -> AppResult<LoginResult> {
        check_cancelled(&token)?;
        let outcome = self
            .credentials
            .login(
                &request.email,
                &request.password,
                request.ip_address.clone(),
                request.user_agent.clone(),
            )
            .await?;

        match outcome {
            AuthOutcome::Authenticated(user) => {
                check_cancelled(&token)?;
                let pair = self
                    .sessions
                    .issue_session(user.id, user.role, request.ip_address, request.user_agent)
                    .await?;
                Ok(LoginResult::Authenticated { user, tokens: pair })
            }
            AuthOutcome::MfaRequired { user_id } => Ok(LoginResult::MfaRequired { user_id }),
            AuthOutcome::Failed => Err(castellan_core::DomainError::InvalidCredentials.into()),
        }
    }

    /// Completes a login that required MFA by verifying the TOTP code and
    /// issuing a session.
    pub async fn login_with_totp(
        &self,
        user_id: UserId,
        code: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        token: CancellationToken,
    ) -> AppResult<TokenPair> {
        check_cancelled(&token)?;
        let valid = self.mfa.verify_totp(user_id, code).await?;
        if !valid {
            return Err(castellan_core::DomainError::InvalidToken.into());
        }

        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;

        self.sessions
            .issue_session(user.id, user.role, ip_address, user_agent)
            .await
    }

    /// Changes the authenticated user's password and revokes all sessions.
    pub async fn change_password(&self, request: ChangePasswordRequest, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.credentials
            .change_password(request.user_id, &request.current_password, &request.new_password)
            .await?;
        self.sessions.revoke_all_for_user(request.user_id).await
    }

    /// Requests a password reset email.
    pub async fn request_password_reset(&self, email: &str, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.credentials.request_password_reset(email).await
    }

    /// Completes a password reset and revokes all of the user's sessions.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        let user_id = self.credentials.reset_password(raw_token, new_password).await?;
        self.sessions.revoke_all_for_user(user_id).await
    }

    /// Verifies an email address from a mailed token.
    pub async fn verify_email(&self, raw_token: &str, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.credentials.verify_email(raw_token).await
    }

    /// Refreshes a session, rotating the refresh token.
    pub async fn refresh_session(&self, refresh_token: &str, token: CancellationToken) -> AppResult<TokenPair> {
        check_cancelled(&token)?;
        self.sessions.refresh(refresh_token).await
    }

    /// Verifies an access token and returns its claims.
    pub async fn introspect(&self, access_token: &str, token: CancellationToken) -> AppResult<Claims> {
        check_cancelled(&token)?;
        self.sessions.introspect(access_token).await
    }

    /// Logs out by revoking a single access token and its session.
    pub async fn logout(&self, access_token: &str, session_id: SessionId, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.sessions.revoke_access_token(access_token).await?;
        self.sessions.revoke_session(session_id).await
    }

    /// Evaluates adaptive trust for an endpoint, issuing a challenge row
    /// whether or not CAPTCHA is required.
    #[allow(clippy::too_many_arguments)]
    pub async fn check_captcha_required(
        &self,
        endpoint: &str,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        user_agent: Option<&str>,
        trust_token: Option<&str>,
        token: CancellationToken,
    ) -> AppResult<CaptchaRequirement> {
        check_cancelled(&token)?;
        self.trust
            .check_captcha_required(endpoint, email, ip_address, device_fingerprint, user_agent, trust_token)
            .await
    }

    /// Validates a previously issued challenge against the endpoint it was
    /// evaluated for, the bound IP, and whether CAPTCHA verification passed.
    pub async fn validate_challenge(
        &self,
        challenge_id: &str,
        endpoint: &str,
        ip_address: Option<&str>,
        verified: bool,
        token: CancellationToken,
    ) -> AppResult<()> {
        check_cancelled(&token)?;
        self.trust.validate_challenge(challenge_id, endpoint, ip_address, verified).await
    }

    /// Solves a CAPTCHA challenge and returns a redeemable trust token.
    pub async fn solve_challenge(
        &self,
        challenge_id: &str,
        endpoint: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        captcha_response: &str,
        token: CancellationToken,
    ) -> AppResult<String> {
        check_cancelled(&token)?;
        self.trust
            .solve_challenge(challenge_id, endpoint, ip_address, device_fingerprint, captcha_response)
            .await
    }

    /// Redeems a trust token in place of solving a fresh CAPTCHA challenge.
    pub async fn redeem_trust_token(
        &self,
        raw_token: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        token: CancellationToken,
    ) -> AppResult<()> {
        check_cancelled(&token)?;
        self.trust.redeem_trust_token(raw_token, ip_address, device_fingerprint).await
    }

    /// Starts an OAuth2/OIDC login redirect.
    pub async fn start_oauth_login(&self, provider_name: &str, token: CancellationToken) -> AppResult<AuthorizationRequest> {
        check_cancelled(&token)?;
        self.federation.start_login(provider_name).await
    }

    /// Completes an OAuth2/OIDC login callback.
    pub async fn complete_oauth_login(&self, state: &str, code: &str, token: CancellationToken) -> AppResult<UserRecord> {
        check_cancelled(&token)?;
        self.federation.complete_login(state, code).await
    }

    /// Completes a generic OIDC login by verifying a raw ID token, for
    /// providers configured with an `OidcVerifier` rather than a userinfo
    /// endpoint.
    pub async fn complete_oidc_login(&self, provider_name: &str, id_token: &str, token: CancellationToken) -> AppResult<UserRecord> {
        check_cancelled(&token)?;
        self.federation.complete_oidc_login(provider_name, id_token).await
    }

    /// Unlinks a federated identity from the caller's account.
    pub async fn unlink_identity(&self, user_id: UserId, provider_name: &str, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.federation.unlink_identity(user_id, provider_name).await
    }

    /// Validates a SAML assertion and returns the matching account.
    pub async fn saml_login(&self, saml_response: &str, token: CancellationToken) -> AppResult<UserRecord> {
        check_cancelled(&token)?;
        self.saml.login(saml_response).await
    }

    /// Starts TOTP enrollment for the caller.
    pub async fn start_mfa_enrollment(&self, user_id: UserId, token: CancellationToken) -> AppResult<TotpEnrollment> {
        check_cancelled(&token)?;
        self.mfa.start_enrollment(user_id).await
    }

    /// Confirms TOTP enrollment with a live code.
    pub async fn confirm_mfa_enrollment(&self, user_id: UserId, code: &str, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.mfa.confirm_enrollment(user_id, code).await
    }

    /// Starts an admin impersonation session.
    pub async fn start_impersonation(
        &self,
        params: StartImpersonationParams,
        token: CancellationToken,
    ) -> AppResult<ImpersonationRecord> {
        check_cancelled(&token)?;
        self.impersonation.start(params).await
    }

    /// Ends an admin impersonation session.
    pub async fn end_impersonation(
        &self,
        admin_id: UserId,
        impersonation_id: ImpersonationId,
        token: CancellationToken,
    ) -> AppResult<()> {
        check_cancelled(&token)?;
        self.impersonation.end(admin_id, impersonation_id).await
    }

    /// Reads a single settings value.
    pub async fn get_setting(&self, key: &str, owner: Option<UserId>, token: CancellationToken) -> AppResult<Option<SettingsRecord>> {
        check_cancelled(&token)?;
        self.settings.get(key, owner).await
    }

    /// Writes a settings value, gated by the caller's role.
    pub async fn set_setting(&self, record: SettingsRecord, actor_role: Role, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.settings.set(record, actor_role).await
    }

    /// Marks first-admin provisioning complete.
    pub async fn mark_setup_complete(&self, actor_role: Role, token: CancellationToken) -> AppResult<()> {
        check_cancelled(&token)?;
        self.settings.mark_setup_complete(actor_role).await
    }
}

/// Outcome of [`AuthService::login`].
#[derive(Debug)]
pub enum LoginResult {
    /// Login succeeded outright; a session was issued.
    Authenticated {
        /// The authenticated account.
        user: UserRecord,
        /// Freshly issued access/refresh token pair.
        tokens: TokenPair,
    },
    /// Password was correct but a TOTP code is still required.
    MfaRequired {
        /// The user awaiting a second factor.
        user_id: UserId,
    },
}
