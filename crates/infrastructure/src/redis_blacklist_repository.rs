//! Redis-backed access-token blacklist, keyed by jti with a TTL matching
//! the token's remaining lifetime.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use castellan_application::BlacklistRepository;
use castellan_core::{AppError, AppResult};

const KEY_PREFIX: &str = "castellan:blacklist:";

/// Redis implementation of the access-token blacklist port.
#[derive(Clone)]
pub struct RedisBlacklistRepository {
    connection: ConnectionManager,
}

impl RedisBlacklistRepository {
    /// Creates a repository from an established connection manager.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl BlacklistRepository for RedisBlacklistRepository {
    async fn blacklist(
        &self,
        jti: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        let ttl_seconds = (expires_at - chrono::Utc::now()).num_seconds().max(1) as u64;
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(format!("{KEY_PREFIX}{jti}"), 1u8, ttl_seconds)
            .await
            .map_err(|error| AppError::Internal(format!("failed to blacklist token: {error}")))
    }

    async fn is_blacklisted(&self, jti: &str) -> AppResult<bool> {
        let mut connection = self.connection.clone();
        connection
            .exists(format!("{KEY_PREFIX}{jti}"))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to check token blacklist: {error}"))
            })
    }
}
