//! In-process CSRF/PKCE state store for the OAuth2 redirect round-trip.
//!
//! State only needs to survive the brief window between redirecting the
//! browser and the provider calling back, so an in-memory map guarded by a
//! lock is sufficient for a single-instance deployment; a multi-instance
//! deployment would back this with Redis instead.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use castellan_application::OAuthStateStore;
use castellan_core::AppResult;
use castellan_domain::Provider;

struct StoredState {
    pkce_verifier: String,
    provider: Provider,
}

/// In-memory [`OAuthStateStore`] backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryOAuthStateStore {
    states: Mutex<HashMap<String, StoredState>>,
}

impl InMemoryOAuthStateStore {
    /// Creates an empty state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthStateStore for InMemoryOAuthStateStore {
    async fn store(&self, state: &str, pkce_verifier: &str, provider: &Provider) -> AppResult<()> {
        let mut states = self.states.lock().unwrap_or_else(|error| error.into_inner());
        states.insert(
            state.to_owned(),
            StoredState {
                pkce_verifier: pkce_verifier.to_owned(),
                provider: provider.clone(),
            },
        );
        Ok(())
    }

    async fn consume(&self, state: &str) -> AppResult<Option<(String, Provider)>> {
        let mut states = self.states.lock().unwrap_or_else(|error| error.into_inner());
        Ok(states
            .remove(state)
            .map(|stored| (stored.pkce_verifier, stored.provider)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stored_state_is_consumed_exactly_once() {
        let store = InMemoryOAuthStateStore::new();
        store
            .store("state-1", "verifier-1", &Provider::Google)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let consumed = store
            .consume("state-1")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(consumed, Some(("verifier-1".to_owned(), Provider::Google)));

        let second = store
            .consume("state-1")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(second, None);
    }
}
