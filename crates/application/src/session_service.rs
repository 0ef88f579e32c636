//! Session and JWT issuance, refresh, and revocation.
//!
//! Access tokens are short-lived and stateless; refresh tokens are tied to
//! a session row and rotated on every use (Open Question (c)) so a stolen
//! refresh token stops working the moment the legitimate client refreshes.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::AppResult;
use castellan_domain::{Role, SessionId, TokenKind, UserId};

/// Claims carried by an issued JWT. Pure data; encoding/signing lives in
/// the infrastructure `TokenCodec` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user ID, or a service identifier for service-role tokens.
    pub subject: String,
    /// Role carried by this token.
    pub role: Role,
    /// Session this token belongs to, for access/refresh tokens.
    pub session_id: Option<SessionId>,
    /// Kind of token.
    pub token_kind: TokenKind,
    /// Unique token identifier, used for blacklist lookups.
    pub jti: String,
    /// Issued-at timestamp.
    pub issued_at: chrono::DateTime<chrono::Utc>,
    /// Expiration timestamp.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// A signed token pair returned after a successful authentication or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Encoded access token.
    pub access_token: String,
    /// Encoded refresh token.
    pub refresh_token: String,
    /// Access token expiry, for client-side scheduling.
    pub access_expires_at: chrono::DateTime<chrono::Utc>,
}

/// Port for encoding and decoding signed tokens.
pub trait TokenCodec: Send + Sync {
    /// Signs claims into an opaque token string.
    fn encode(&self, claims: &Claims) -> AppResult<String>;

    /// Verifies signature and decodes a token into its claims.
    fn decode(&self, token: &str) -> AppResult<Claims>;
}

/// A persisted refresh-token session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: SessionId,
    /// Owning user.
    pub user_id: UserId,
    /// SHA-256 hash of the current refresh token's jti.
    pub refresh_token_jti: String,
    /// When the session was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When this session's refresh token expires.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Caller IP address at creation.
    pub ip_address: Option<String>,
    /// Caller User-Agent at creation.
    pub user_agent: Option<String>,
    /// Set once the session has been explicitly revoked.
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Repository port for session persistence.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Creates a new session row.
    async fn create(
        &self,
        user_id: UserId,
        refresh_token_jti: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<SessionId>;

    /// Finds a session by id.
    async fn find(&self, session_id: SessionId) -> AppResult<Option<SessionRecord>>;

    /// Atomically rotates a session's refresh token jti, only succeeding
    /// when the session is not revoked, not expired, and the supplied jti
    /// matches the currently active one.
    async fn rotate(
        &self,
        session_id: SessionId,
        expected_jti: &str,
        new_jti: &str,
        new_expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Option<SessionRecord>>;

    /// Marks a session as revoked.
    async fn revoke(&self, session_id: SessionId) -> AppResult<()>;

    /// Revokes every active session for a user.
    async fn revoke_all_for_user(&self, user_id: UserId) -> AppResult<()>;
}

/// Repository port for the jti blacklist used to revoke individual access
/// tokens before their natural expiry.
#[async_trait]
pub trait BlacklistRepository: Send + Sync {
    /// Adds a jti to the blacklist until the given expiry.
    async fn blacklist(&self, jti: &str, expires_at: chrono::DateTime<chrono::Utc>)
    -> AppResult<()>;

    /// Checks whether a jti is currently blacklisted.
    async fn is_blacklisted(&self, jti: &str) -> AppResult<bool>;
}

/// Application service for session and token lifecycle.
#[derive(Clone)]
pub struct SessionService {
    session_repository: Arc<dyn SessionRepository>,
    blacklist_repository: Arc<dyn BlacklistRepository>,
    token_codec: Arc<dyn TokenCodec>,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl SessionService {
    /// Creates a new session service.
    #[must_use]
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        blacklist_repository: Arc<dyn BlacklistRepository>,
        token_codec: Arc<dyn TokenCodec>,
        access_ttl: chrono::Duration,
        refresh_ttl: chrono::Duration,
    ) -> Self {
        Self {
            session_repository,
            blacklist_repository,
            token_codec,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issues a fresh access/refresh token pair for a newly authenticated user.
    pub async fn issue_session(
        &self,
        user_id: UserId,
        role: Role,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<TokenPair> {
        let now = chrono::Utc::now();
        let refresh_jti = uuid::Uuid::new_v4().to_string();
        let refresh_expires_at = now + self.refresh_ttl;

        let session_id = self
            .session_repository
            .create(
                user_id,
                &refresh_jti,
                refresh_expires_at,
                ip_address.as_deref(),
                user_agent.as_deref(),
            )
            .await?;

        self.mint_pair(user_id, role, session_id, &refresh_jti, refresh_expires_at, now)
    }

    /// Refreshes a session, rotating the refresh token and minting a new
    /// access token. The old refresh token stops working immediately.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.token_codec.decode(refresh_token)?;

        if claims.token_kind != TokenKind::Refresh {
            return Err(castellan_core::DomainError::InvalidTokenType.into());
        }

        let session_id = claims
            .session_id
            .ok_or(castellan_core::DomainError::SessionNotFound)?;

        let now = chrono::Utc::now();
        let new_jti = uuid::Uuid::new_v4().to_string();
        let new_expires_at = now + self.refresh_ttl;

        let session = self
            .session_repository
            .rotate(session_id, &claims.jti, &new_jti, new_expires_at)
            .await?
            .ok_or(castellan_core::DomainError::SessionExpired)?;

        self.mint_pair(
            session.user_id,
            claims.role,
            session_id,
            &new_jti,
            new_expires_at,
            now,
        )
    }

    fn mint_pair(
        &self,
        user_id: UserId,
        role: Role,
        session_id: SessionId,
        refresh_jti: &str,
        refresh_expires_at: chrono::DateTime<chrono::Utc>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<TokenPair> {
        let access_expires_at = now + self.access_ttl;
        let access_claims = Claims {
            subject: user_id.to_string(),
            role,
            session_id: Some(session_id),
            token_kind: TokenKind::Access,
            jti: uuid::Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: access_expires_at,
        };
        let refresh_claims = Claims {
            subject: user_id.to_string(),
            role,
            session_id: Some(session_id),
            token_kind: TokenKind::Refresh,
            jti: refresh_jti.to_owned(),
            issued_at: now,
            expires_at: refresh_expires_at,
        };

        Ok(TokenPair {
            access_token: self.token_codec.encode(&access_claims)?,
            refresh_token: self.token_codec.encode(&refresh_claims)?,
            access_expires_at,
        })
    }

    /// Verifies an access token: signature, expiry, and blacklist status.
    pub async fn introspect(&self, access_token: &str) -> AppResult<Claims> {
        let claims = self.token_codec.decode(access_token)?;

        if claims.token_kind == TokenKind::ServiceRole {
            return Ok(claims);
        }

        if self.blacklist_repository.is_blacklisted(&claims.jti).await? {
            return Err(castellan_core::DomainError::TokenBlacklisted.into());
        }

        Ok(claims)
    }

    /// Revokes a single access token immediately by blacklisting its jti.
    pub async fn revoke_access_token(&self, access_token: &str) -> AppResult<()> {
        if access_token.starts_with("sk_") {
            return Err(castellan_core::DomainError::CannotRevokeServiceKey.into());
        }
        if access_token.starts_with("fbk_") {
            return Err(castellan_core::DomainError::CannotRevokeClientKey.into());
        }

        let claims = self.token_codec.decode(access_token)?;

        match claims.token_kind {
            TokenKind::ServiceRole => {
                return Err(castellan_core::DomainError::CannotRevokeServiceRole.into());
            }
            TokenKind::Access => {}
            TokenKind::Refresh | TokenKind::Anon => {
                return Err(castellan_core::DomainError::InvalidTokenType.into());
            }
        }

        self.blacklist_repository
            .blacklist(&claims.jti, claims.expires_at)
            .await
    }

    /// Revokes a session (and therefore its refresh token) by id.
    pub async fn revoke_session(&self, session_id: SessionId) -> AppResult<()> {
        self.session_repository.revoke(session_id).await
    }

    /// Revokes every session belonging to a user, e.g. on password change.
    pub async fn revoke_all_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.session_repository.revoke_all_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests;
