//! In-process settings cache with explicit invalidation on write, rather
//! than a TTL — settings change rarely and must be immediately consistent
//! once written.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use castellan_application::{SettingsCache, SettingsRecord};
use castellan_domain::UserId;

fn cache_key(key: &str, owner: Option<UserId>) -> String {
    match owner {
        Some(owner) => format!("{key}:{owner}"),
        None => key.to_owned(),
    }
}

/// In-memory [`SettingsCache`] backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemorySettingsCache {
    entries: Mutex<HashMap<String, SettingsRecord>>,
}

impl InMemorySettingsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsCache for InMemorySettingsCache {
    async fn get(&self, key: &str, owner: Option<UserId>) -> Option<SettingsRecord> {
        let entries = self.entries.lock().unwrap_or_else(|error| error.into_inner());
        entries.get(&cache_key(key, owner)).cloned()
    }

    async fn put(&self, record: SettingsRecord) {
        let mut entries = self.entries.lock().unwrap_or_else(|error| error.into_inner());
        entries.insert(cache_key(&record.key, record.owner), record);
    }

    async fn invalidate(&self, key: &str, owner: Option<UserId>) {
        let mut entries = self.entries.lock().unwrap_or_else(|error| error.into_inner());
        entries.remove(&cache_key(key, owner));
    }
}
