//! Adaptive trust and CAPTCHA challenge orchestration.
//!
//! Scoring itself is pure (`castellan_domain::trust`); this service wires
//! the score to persistence: issuing a challenge when required, validating
//! the solved challenge with the configured CAPTCHA provider, and minting a
//! short-lived trust token so the caller doesn't need to solve a second
//! challenge for the remainder of the flow.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::{AppResult, DomainError};
use castellan_domain::{evaluate_trust, TrustSignals, TrustWeights, CHALLENGE_THRESHOLD};

/// A trust evaluation's outcome, persisted as a challenge row whether or
/// not CAPTCHA turned out to be required, so every evaluation is
/// auditable and `ValidateChallenge` always has a row to load.
#[derive(Debug, Clone)]
pub struct ChallengeRecord {
    /// Opaque challenge identifier handed to the caller.
    pub id: String,
    /// The endpoint this evaluation was performed for (e.g. `/auth/signup`).
    pub endpoint: String,
    /// Email the challenge is bound to, when the attempt names an account.
    pub email: Option<String>,
    /// Request IP the challenge is bound to.
    pub ip_address: Option<String>,
    /// Request device fingerprint the challenge is bound to.
    pub device_fingerprint: Option<String>,
    /// Request User-Agent at evaluation time.
    pub user_agent: Option<String>,
    /// The computed trust score.
    pub score: i32,
    /// Whether CAPTCHA was required by this evaluation.
    pub required: bool,
    /// The reported reason: the most negative contributing signal,
    /// `"low_trust_score"`, `"sensitive_action"`, or `"trusted"`.
    pub reason: String,
    /// When this challenge expires.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Set once the challenge has been validated, with the verification result.
    pub consumed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// The CAPTCHA verification result recorded at consumption, if any.
    pub verified: Option<bool>,
}

/// Repository port for challenge persistence.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// Creates a new challenge row recording a trust evaluation's outcome.
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        endpoint: &str,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        user_agent: Option<&str>,
        score: i32,
        required: bool,
        reason: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<ChallengeRecord>;

    /// Loads a challenge without consuming it, so `NotFound`/`Expired`/
    /// `Consumed`/`Mismatch` can be distinguished before the atomic consume.
    async fn find(&self, challenge_id: &str) -> AppResult<Option<ChallengeRecord>>;

    /// Atomically marks a challenge consumed with the verification result,
    /// only succeeding when it is currently unconsumed.
    async fn consume(&self, challenge_id: &str, verified: bool) -> AppResult<Option<ChallengeRecord>>;
}

/// A short-lived token proving a challenge was recently solved, bound to
/// the IP and device it was issued for.
#[derive(Debug, Clone)]
pub struct TrustTokenRecord {
    /// SHA-256 hash of the opaque token value.
    pub token_hash: String,
    /// IP the token is bound to, if any.
    pub ip_address: Option<String>,
    /// Device fingerprint the token is bound to, if any.
    pub device_fingerprint: Option<String>,
    /// Expiration timestamp.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Set once the token has been consumed.
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Repository port for trust-token persistence.
#[async_trait]
pub trait TrustTokenRepository: Send + Sync {
    /// Stores a new trust token bound to an IP/device pair.
    async fn create(
        &self,
        token_hash: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()>;

    /// Loads a trust token without consuming it, so `TrustTokenExpired` can
    /// be distinguished from a generically invalid token.
    async fn find(&self, token_hash: &str) -> AppResult<Option<TrustTokenRecord>>;

    /// Atomically consumes a trust token, only succeeding when it exists,
    /// is unused, unexpired, and bound to a matching IP/device (a `NULL`
    /// bound value is not enforced, matching `TrustTokenBoundIP` being
    /// optional).
    async fn consume(
        &self,
        token_hash: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<Option<TrustTokenRecord>>;
}

/// Port for verifying a solved CAPTCHA with an upstream provider
/// (reCAPTCHA, hCaptcha, Turnstile).
#[async_trait]
pub trait CaptchaProvider: Send + Sync {
    /// Verifies a provider response token, returning true when it passed.
    async fn verify(&self, response_token: &str, remote_ip: Option<&str>) -> AppResult<bool>;

    /// The provider's public site key, returned to the caller so it can
    /// render the CAPTCHA widget.
    fn site_key(&self) -> &str;

    /// The provider's name (`"recaptcha"`, `"hcaptcha"`, `"turnstile"`).
    fn provider_name(&self) -> &str;
}

/// Repository port for recording and retrieving the trust-relevant history
/// (known IPs/devices, recent failures) behind a [`TrustSignals`] lookup.
#[async_trait]
pub trait TrustSignalRepository: Send + Sync {
    /// Gathers the current trust signals for an identity/IP/device combination.
    async fn gather_signals(
        &self,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<TrustSignals>;

    /// Records a successful authentication event, updating known IP/device history.
    async fn record_success(
        &self,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<()>;
}

/// The outcome of `CheckCaptchaRequired`, ready to hand back to the caller.
#[derive(Debug, Clone)]
pub struct CaptchaRequirement {
    /// Whether the caller must solve a CAPTCHA before proceeding.
    pub required: bool,
    /// The reported reason.
    pub reason: String,
    /// The computed trust score.
    pub score: i32,
    /// The configured CAPTCHA provider's name, when one is required.
    pub provider: Option<String>,
    /// The provider's public site key, when one is required.
    pub site_key: Option<String>,
    /// The challenge identifier to pass to `ValidateChallenge`.
    pub challenge_id: String,
    /// When the challenge expires.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Application service for adaptive trust and CAPTCHA challenges.
#[derive(Clone)]
pub struct TrustService {
    signal_repository: Arc<dyn TrustSignalRepository>,
    challenge_repository: Arc<dyn ChallengeRepository>,
    trust_token_repository: Arc<dyn TrustTokenRepository>,
    captcha_provider: Arc<dyn CaptchaProvider>,
    weights: TrustWeights,
    threshold: i32,
    always_require_endpoints: HashSet<String>,
    challenge_ttl: chrono::Duration,
    trust_token_ttl: chrono::Duration,
}

impl TrustService {
    /// Creates a new trust service. `always_require_endpoints` is the
    /// deployment's configured endpoint list that forces CAPTCHA
    /// regardless of score (e.g. `/auth/signup`, `/auth/password-reset`).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        signal_repository: Arc<dyn TrustSignalRepository>,
        challenge_repository: Arc<dyn ChallengeRepository>,
        trust_token_repository: Arc<dyn TrustTokenRepository>,
        captcha_provider: Arc<dyn CaptchaProvider>,
        weights: TrustWeights,
        always_require_endpoints: HashSet<String>,
        challenge_ttl: chrono::Duration,
        trust_token_ttl: chrono::Duration,
    ) -> Self {
        Self {
            signal_repository,
            challenge_repository,
            trust_token_repository,
            captcha_provider,
            weights,
            threshold: CHALLENGE_THRESHOLD,
            always_require_endpoints,
            challenge_ttl,
            trust_token_ttl,
        }
    }

    /// Evaluates trust for a request against `endpoint` and persists the
    /// outcome as a challenge row, whether or not CAPTCHA is required.
    pub async fn check_captcha_required(
        &self,
        endpoint: &str,
        email: Option<&str>,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        user_agent: Option<&str>,
        trust_token: Option<&str>,
    ) -> AppResult<CaptchaRequirement> {
        let mut signals = self
            .signal_repository
            .gather_signals(email, ip_address, device_fingerprint)
            .await?;

        if let Some(raw_token) = trust_token
            && self
                .peek_trust_token(raw_token, ip_address, device_fingerprint)
                .await?
        {
            signals.recent_captcha_solved = true;
        }

        let forced = self.always_require_endpoints.contains(endpoint);
        let decision = evaluate_trust(&signals, &self.weights, self.threshold, forced);

        let expires_at = chrono::Utc::now() + self.challenge_ttl;
        let challenge = self
            .challenge_repository
            .create(
                endpoint,
                email,
                ip_address,
                device_fingerprint,
                user_agent,
                decision.score,
                decision.required,
                decision.reason,
                expires_at,
            )
            .await?;

        Ok(CaptchaRequirement {
            required: decision.required,
            reason: decision.reason.to_owned(),
            score: decision.score,
            provider: decision.required.then(|| self.captcha_provider.provider_name().to_owned()),
            site_key: decision.required.then(|| self.captcha_provider.site_key().to_owned()),
            challenge_id: challenge.id,
            expires_at: challenge.expires_at,
        })
    }

    /// Checks whether a trust token is currently valid for the given
    /// binding without consuming it, used to fold "recently verified" into
    /// a fresh evaluation's signals.
    async fn peek_trust_token(
        &self,
        raw_token: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<bool> {
        let token_hash = hash_trust_token(raw_token);
        let Some(record) = self.trust_token_repository.find(&token_hash).await? else {
            return Ok(false);
        };
        Ok(record.used_at.is_none()
            && record.expires_at > chrono::Utc::now()
            && binding_matches(record.ip_address.as_deref(), ip_address)
            && binding_matches(record.device_fingerprint.as_deref(), device_fingerprint))
    }

    /// Loads a challenge and rejects `NotFound`, `Consumed`, `Expired`, or
    /// an endpoint/bound-IP mismatch, leaving the CAPTCHA-verification
    /// decision to the caller.
    async fn checked_challenge(
        &self,
        challenge_id: &str,
        endpoint: &str,
        ip_address: Option<&str>,
    ) -> AppResult<ChallengeRecord> {
        let challenge = self
            .challenge_repository
            .find(challenge_id)
            .await?
            .ok_or(DomainError::ChallengeNotFound)?;

        if challenge.consumed_at.is_some() {
            return Err(DomainError::ChallengeConsumed.into());
        }
        if challenge.expires_at <= chrono::Utc::now() {
            return Err(DomainError::ChallengeExpired.into());
        }
        if challenge.endpoint != endpoint {
            return Err(DomainError::ChallengeMismatch.into());
        }
        if !binding_matches(challenge.ip_address.as_deref(), ip_address) {
            return Err(DomainError::ChallengeMismatch.into());
        }

        Ok(challenge)
    }

    /// Validates a challenge directly (the `ValidateChallenge` RPC): rejects
    /// `NotFound`, `Expired`, `Consumed`, or endpoint/bound-IP mismatch; if
    /// CAPTCHA was required but `verified` is false, `CaptchaRequired`.
    pub async fn validate_challenge(
        &self,
        challenge_id: &str,
        endpoint: &str,
        ip_address: Option<&str>,
        verified: bool,
    ) -> AppResult<()> {
        let challenge = self.checked_challenge(challenge_id, endpoint, ip_address).await?;

        if challenge.required && !verified {
            return Err(DomainError::CaptchaRequired.into());
        }

        self.challenge_repository
            .consume(challenge_id, verified)
            .await?
            .ok_or(DomainError::ChallengeConsumed)?;

        Ok(())
    }

    /// Solves a challenge end-to-end: verifies the CAPTCHA response with
    /// the upstream provider, consumes the challenge, and mints a trust
    /// token the caller can redeem instead of solving another CAPTCHA for
    /// the rest of the flow. A required challenge whose response fails
    /// provider verification is a `ChallengeMismatch`, not `CaptchaRequired`
    /// — a response was supplied, it just didn't verify.
    pub async fn solve_challenge(
        &self,
        challenge_id: &str,
        endpoint: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
        captcha_response: &str,
    ) -> AppResult<String> {
        let passed = self.captcha_provider.verify(captcha_response, ip_address).await?;

        let challenge = self.checked_challenge(challenge_id, endpoint, ip_address).await?;

        if challenge.required && !passed {
            return Err(DomainError::ChallengeMismatch.into());
        }

        self.challenge_repository
            .consume(challenge_id, passed)
            .await?
            .ok_or(DomainError::ChallengeConsumed)?;

        self.issue_trust_token(ip_address, device_fingerprint).await
    }

    async fn issue_trust_token(
        &self,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<String> {
        use std::fmt::Write;

        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).map_err(|error| {
            castellan_core::AppError::Internal(format!("failed to generate trust token: {error}"))
        })?;
        let raw_token = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc, byte| {
                let _ = write!(acc, "{byte:02x}");
                acc
            });

        let token_hash = hash_trust_token(&raw_token);
        let expires_at = chrono::Utc::now() + self.trust_token_ttl;
        self.trust_token_repository
            .create(&token_hash, ip_address, device_fingerprint, expires_at)
            .await?;

        Ok(raw_token)
    }

    /// Consumes a trust token, bypassing a fresh challenge for this attempt.
    /// `Validate(TT, ip', fp')` succeeds iff `ip'` and `fp'` match the
    /// values the token was issued for (when bound) and it is unexpired.
    pub async fn redeem_trust_token(
        &self,
        raw_token: &str,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> AppResult<()> {
        let token_hash = hash_trust_token(raw_token);

        let record = self
            .trust_token_repository
            .find(&token_hash)
            .await?
            .ok_or(DomainError::TrustTokenInvalid)?;

        if record.used_at.is_some() {
            return Err(DomainError::TrustTokenInvalid.into());
        }
        if record.expires_at <= chrono::Utc::now() {
            return Err(DomainError::TrustTokenExpired.into());
        }
        if !binding_matches(record.ip_address.as_deref(), ip_address)
            || !binding_matches(record.device_fingerprint.as_deref(), device_fingerprint)
        {
            return Err(DomainError::TrustTokenInvalid.into());
        }

        self.trust_token_repository
            .consume(&token_hash, ip_address, device_fingerprint)
            .await?
            .ok_or(DomainError::TrustTokenInvalid)?;

        Ok(())
    }
}

/// A bound value matches the request's value when either side is absent
/// (binding wasn't enforced for that dimension) or both are equal.
fn binding_matches(bound: Option<&str>, request: Option<&str>) -> bool {
    match (bound, request) {
        (Some(bound), Some(request)) => bound == request,
        _ => true,
    }
}

fn hash_trust_token(raw_token: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    let result = hasher.finalize();
    result
        .iter()
        .fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
