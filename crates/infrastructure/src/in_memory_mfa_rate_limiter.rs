//! In-process MFA verification rate limiter, counting consecutive failures
//! per user since their last success.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use castellan_application::MfaRateLimiter;
use castellan_core::AppResult;
use castellan_domain::UserId;

/// In-memory [`MfaRateLimiter`] backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryMfaRateLimiter {
    failures: Mutex<HashMap<UserId, u32>>,
}

impl InMemoryMfaRateLimiter {
    /// Creates a rate limiter with no recorded failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MfaRateLimiter for InMemoryMfaRateLimiter {
    async fn record_failure(&self, user_id: UserId) -> AppResult<u32> {
        let mut failures = self.failures.lock().unwrap_or_else(|error| error.into_inner());
        let count = failures.entry(user_id).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn clear(&self, user_id: UserId) -> AppResult<()> {
        let mut failures = self.failures.lock().unwrap_or_else(|error| error.into_inner());
        failures.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_accumulate_and_clear_resets() {
        let limiter = InMemoryMfaRateLimiter::new();
        let user_id = UserId::new();

        assert_eq!(limiter.record_failure(user_id).await.unwrap_or_else(|e| panic!("{e}")), 1);
        assert_eq!(limiter.record_failure(user_id).await.unwrap_or_else(|e| panic!("{e}")), 2);

        limiter.clear(user_id).await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(limiter.record_failure(user_id).await.unwrap_or_else(|e| panic!("{e}")), 1);
    }
}
