//! Adaptive trust scoring. Pure, no I/O: callers gather the signal inputs
//! from repositories and the request, then hand them here.

/// Individual signals feeding a trust score, gathered by the caller from a
/// login/registration attempt and the account's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustSignals {
    /// The account's email has been verified.
    pub verified_email: bool,
    /// The account is older than the "new account" threshold.
    pub account_age_established: bool,
    /// TOTP MFA is enabled on the account.
    pub mfa_enabled: bool,
    /// The request IP has been seen before for this account.
    pub known_ip: bool,
    /// The request device fingerprint has been seen before for this account.
    pub known_device: bool,
    /// The account has a history of successful logins.
    pub has_successful_logins: bool,
    /// The account has recent failed login attempts.
    pub has_recent_failures: bool,
    /// A CAPTCHA challenge was solved recently for this identity.
    pub recent_captcha_solved: bool,
    /// The account is currently blocked by policy.
    pub blocked: bool,
    /// An administrator has manually marked this account as trusted.
    pub admin_trusted: bool,
    /// The request IP has never been seen for this account.
    pub new_ip: bool,
    /// The request device has never been seen for this account.
    pub new_device: bool,
    /// There is no account history at all (first-ever attempt).
    pub no_account_history: bool,
}

/// Points contributed by each signal toward the trust score. Positive
/// signals raise trust (less likely to be challenged); negative signals
/// lower it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustWeights {
    /// Weight for [`TrustSignals::verified_email`].
    pub verified_email: i32,
    /// Weight for [`TrustSignals::account_age_established`].
    pub account_age_established: i32,
    /// Weight for [`TrustSignals::mfa_enabled`].
    pub mfa_enabled: i32,
    /// Weight for [`TrustSignals::known_ip`].
    pub known_ip: i32,
    /// Weight for [`TrustSignals::known_device`].
    pub known_device: i32,
    /// Weight for [`TrustSignals::has_successful_logins`].
    pub has_successful_logins: i32,
    /// Weight for [`TrustSignals::has_recent_failures`].
    pub has_recent_failures: i32,
    /// Weight for [`TrustSignals::recent_captcha_solved`].
    pub recent_captcha_solved: i32,
    /// Weight for [`TrustSignals::blocked`].
    pub blocked: i32,
    /// Weight for [`TrustSignals::admin_trusted`].
    pub admin_trusted: i32,
    /// Weight for [`TrustSignals::new_ip`].
    pub new_ip: i32,
    /// Weight for [`TrustSignals::new_device`].
    pub new_device: i32,
    /// Weight for [`TrustSignals::no_account_history`].
    pub no_account_history: i32,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            verified_email: 15,
            account_age_established: 10,
            mfa_enabled: 25,
            known_ip: 15,
            known_device: 15,
            has_successful_logins: 10,
            has_recent_failures: -20,
            recent_captcha_solved: 10,
            blocked: -1000,
            admin_trusted: 1000,
            new_ip: -10,
            new_device: -10,
            no_account_history: -15,
        }
    }
}

/// Threshold below which a CAPTCHA challenge is required.
pub const CHALLENGE_THRESHOLD: i32 = 0;

/// Computes a trust score from signals using the given weight table.
///
/// `blocked` and `admin_trusted` are deliberately lopsided (±1000) so that
/// either one dominates every other signal combined.
#[must_use]
pub fn compute_trust_score(signals: &TrustSignals, weights: &TrustWeights) -> i32 {
    let mut score = 0;

    macro_rules! add_if {
        ($flag:expr, $weight:expr) => {
            if $flag {
                score += $weight;
            }
        };
    }

    add_if!(signals.verified_email, weights.verified_email);
    add_if!(
        signals.account_age_established,
        weights.account_age_established
    );
    add_if!(signals.mfa_enabled, weights.mfa_enabled);
    add_if!(signals.known_ip, weights.known_ip);
    add_if!(signals.known_device, weights.known_device);
    add_if!(
        signals.has_successful_logins,
        weights.has_successful_logins
    );
    add_if!(signals.has_recent_failures, weights.has_recent_failures);
    add_if!(
        signals.recent_captcha_solved,
        weights.recent_captcha_solved
    );
    add_if!(signals.blocked, weights.blocked);
    add_if!(signals.admin_trusted, weights.admin_trusted);
    add_if!(signals.new_ip, weights.new_ip);
    add_if!(signals.new_device, weights.new_device);
    add_if!(signals.no_account_history, weights.no_account_history);

    score
}

/// Decides whether a CAPTCHA challenge must be solved before the attempt
/// proceeds. An explicit `admin_trusted` always bypasses challenge
/// regardless of score; an explicit `blocked` always requires one.
#[must_use]
pub fn requires_challenge(signals: &TrustSignals, weights: &TrustWeights) -> bool {
    if signals.admin_trusted {
        return false;
    }
    if signals.blocked {
        return true;
    }
    compute_trust_score(signals, weights) < CHALLENGE_THRESHOLD
}

/// Outcome of a single trust evaluation: whether CAPTCHA is required, the
/// reported reason, and the raw score for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    /// Whether the caller must solve a CAPTCHA before proceeding.
    pub required: bool,
    /// The most negative contributing signal, `"low_trust_score"` if none
    /// is negative, `"sensitive_action"` when forced by the endpoint list,
    /// or `"trusted"` when not required.
    pub reason: &'static str,
    /// The computed trust score.
    pub score: i32,
}

/// Evaluates trust for a request, honoring an endpoint-forced CAPTCHA
/// requirement ahead of the score-based decision. `admin_trusted` still
/// bypasses even a forced endpoint. `threshold` is the deployment's
/// configured `CaptchaThreshold` (see [`CHALLENGE_THRESHOLD`] for the
/// default).
#[must_use]
pub fn evaluate_trust(
    signals: &TrustSignals,
    weights: &TrustWeights,
    threshold: i32,
    endpoint_always_requires_captcha: bool,
) -> TrustDecision {
    let score = compute_trust_score(signals, weights);

    if signals.admin_trusted {
        return TrustDecision { required: false, reason: "trusted", score };
    }

    if endpoint_always_requires_captcha {
        return TrustDecision { required: true, reason: "sensitive_action", score };
    }

    if signals.blocked || score < threshold {
        return TrustDecision { required: true, reason: captcha_reason(signals, weights), score };
    }

    TrustDecision { required: false, reason: "trusted", score }
}

/// Names the most negative contributing signal, or `"low_trust_score"` when
/// no signal contributed negatively.
fn captcha_reason(signals: &TrustSignals, weights: &TrustWeights) -> &'static str {
    let mut worst: Option<(&'static str, i32)> = None;

    macro_rules! consider {
        ($flag:expr, $weight:expr, $name:literal) => {
            if $flag && $weight < 0 {
                let is_worse = match worst {
                    Some((_, current)) => $weight < current,
                    None => true,
                };
                if is_worse {
                    worst = Some(($name, $weight));
                }
            }
        };
    }

    // Every signal is considered, not only the ones with a negative
    // default weight: weights are a deployment-configurable table, so any
    // signal can end up contributing negatively.
    consider!(signals.verified_email, weights.verified_email, "verified_email");
    consider!(
        signals.account_age_established,
        weights.account_age_established,
        "account_age_established"
    );
    consider!(signals.mfa_enabled, weights.mfa_enabled, "mfa_enabled");
    consider!(signals.known_ip, weights.known_ip, "known_ip");
    consider!(signals.known_device, weights.known_device, "known_device");
    consider!(
        signals.has_successful_logins,
        weights.has_successful_logins,
        "has_successful_logins"
    );
    consider!(signals.has_recent_failures, weights.has_recent_failures, "has_recent_failures");
    consider!(
        signals.recent_captcha_solved,
        weights.recent_captcha_solved,
        "recent_captcha_solved"
    );
    consider!(signals.blocked, weights.blocked, "blocked");
    consider!(signals.admin_trusted, weights.admin_trusted, "admin_trusted");
    consider!(signals.new_ip, weights.new_ip, "new_ip");
    consider!(signals.new_device, weights.new_device, "new_device");
    consider!(signals.no_account_history, weights.no_account_history, "no_account_history");

    match worst {
        Some((name, _)) => name,
        None => "low_trust_score",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_trusted_account_does_not_require_challenge() {
        let signals = TrustSignals {
            verified_email: true,
            account_age_established: true,
            mfa_enabled: true,
            known_ip: true,
            known_device: true,
            has_successful_logins: true,
            ..Default::default()
        };
        assert!(!requires_challenge(&signals, &TrustWeights::default()));
    }

    #[test]
    fn brand_new_anonymous_attempt_requires_challenge() {
        let signals = TrustSignals {
            no_account_history: true,
            new_ip: true,
            new_device: true,
            ..Default::default()
        };
        assert!(requires_challenge(&signals, &TrustWeights::default()));
    }

    #[test]
    fn admin_trusted_overrides_every_negative_signal() {
        let signals = TrustSignals {
            blocked: false,
            admin_trusted: true,
            has_recent_failures: true,
            new_ip: true,
            new_device: true,
            no_account_history: true,
            ..Default::default()
        };
        assert!(!requires_challenge(&signals, &TrustWeights::default()));
    }

    #[test]
    fn blocked_always_requires_challenge_even_with_high_score() {
        let signals = TrustSignals {
            verified_email: true,
            account_age_established: true,
            mfa_enabled: true,
            known_ip: true,
            known_device: true,
            has_successful_logins: true,
            blocked: true,
            ..Default::default()
        };
        assert!(requires_challenge(&signals, &TrustWeights::default()));
    }

    #[test]
    fn forced_endpoint_requires_captcha_with_sensitive_action_reason() {
        let signals = TrustSignals {
            verified_email: true,
            account_age_established: true,
            mfa_enabled: true,
            known_ip: true,
            known_device: true,
            has_successful_logins: true,
            ..Default::default()
        };
        let decision = evaluate_trust(&signals, &TrustWeights::default(), CHALLENGE_THRESHOLD, true);
        assert!(decision.required);
        assert_eq!(decision.reason, "sensitive_action");
    }

    #[test]
    fn untrusted_attempt_reports_most_negative_signal_as_reason() {
        let signals = TrustSignals {
            no_account_history: true,
            new_ip: true,
            new_device: true,
            ..Default::default()
        };
        let decision = evaluate_trust(&signals, &TrustWeights::default(), CHALLENGE_THRESHOLD, false);
        assert!(decision.required);
        assert_eq!(decision.reason, "no_account_history");
    }

    #[test]
    fn trusted_attempt_reports_trusted_reason() {
        let signals = TrustSignals {
            verified_email: true,
            account_age_established: true,
            mfa_enabled: true,
            known_ip: true,
            known_device: true,
            has_successful_logins: true,
            ..Default::default()
        };
        let decision = evaluate_trust(&signals, &TrustWeights::default(), CHALLENGE_THRESHOLD, false);
        assert!(!decision.required);
        assert_eq!(decision.reason, "trusted");
    }

    #[test]
    fn no_negative_signal_falls_back_to_low_trust_score() {
        // A deployment can configure a stricter threshold than the
        // fixed-point default: here every weight is non-negative, but the
        // account simply hasn't accrued enough positive signal yet.
        let signals = TrustSignals {
            verified_email: true,
            ..Default::default()
        };
        let weights = TrustWeights {
            verified_email: 0,
            account_age_established: 0,
            mfa_enabled: 0,
            known_ip: 0,
            known_device: 0,
            has_successful_logins: 0,
            has_recent_failures: 0,
            recent_captcha_solved: 0,
            blocked: -1000,
            admin_trusted: 1000,
            new_ip: 0,
            new_device: 0,
            no_account_history: 0,
        };
        let decision = evaluate_trust(&signals, &weights, 1, false);
        assert!(decision.required);
        assert_eq!(decision.score, 0);
        assert_eq!(decision.reason, "low_trust_score");
    }

    #[test]
    fn admin_trusted_overrides_a_forced_endpoint() {
        let signals = TrustSignals {
            admin_trusted: true,
            ..Default::default()
        };
        let decision = evaluate_trust(&signals, &TrustWeights::default(), CHALLENGE_THRESHOLD, true);
        assert!(!decision.required);
        assert_eq!(decision.reason, "trusted");
    }
}
