//! OAuth2/OIDC federated identity login and account linking.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::{AppResult, DomainError};
use castellan_domain::{EmailAddress, Provider, UserId};

use crate::credential_service::{UserRecord, UserRepository};

/// A linked federated identity.
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    /// Owning user.
    pub user_id: UserId,
    /// Identity provider.
    pub provider: Provider,
    /// Provider-issued subject identifier.
    pub provider_user_id: String,
    /// Email claim returned by the provider at link time.
    pub email: Option<String>,
    /// When the identity was linked.
    pub linked_at: chrono::DateTime<chrono::Utc>,
}

/// Repository port for federated identity persistence.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Finds an identity by (provider, provider_user_id).
    async fn find(&self, provider: &Provider, provider_user_id: &str)
    -> AppResult<Option<IdentityRecord>>;

    /// Links an identity to a user.
    async fn link(
        &self,
        user_id: UserId,
        provider: &Provider,
        provider_user_id: &str,
        email: Option<&str>,
    ) -> AppResult<()>;

    /// Unlinks an identity from a user.
    async fn unlink(&self, user_id: UserId, provider: &Provider) -> AppResult<()>;

    /// Counts how many authentication factors (password + linked identities)
    /// a user currently has, used to guard against removing the last one.
    async fn count_auth_factors(&self, user_id: UserId) -> AppResult<i64>;
}

/// Authorization details needed to start an OAuth2 authorization-code flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL the caller should redirect the browser to.
    pub authorize_url: String,
    /// Opaque CSRF state value the caller must echo back on callback.
    pub state: String,
}

/// Port for in-memory CSRF state storage during the OAuth2 redirect round-trip.
#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    /// Stores a CSRF state value with the PKCE verifier it was issued with.
    async fn store(&self, state: &str, pkce_verifier: &str, provider: &Provider) -> AppResult<()>;

    /// Atomically consumes a stored state, returning its PKCE verifier.
    async fn consume(&self, state: &str) -> AppResult<Option<(String, Provider)>>;
}

/// Claims extracted from a verified OAuth2/OIDC identity.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    /// Provider-issued subject identifier.
    pub provider_user_id: String,
    /// Email claim, if the provider returned one.
    pub email: Option<String>,
    /// Whether the provider asserts the email is verified.
    pub email_verified: bool,
}

/// Port for the OAuth2 authorization-code exchange with a specific provider.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Builds the authorization URL and PKCE verifier for a login attempt.
    fn build_authorization_request(&self, provider: &Provider) -> AppResult<(String, String)>;

    /// Exchanges an authorization code for the caller's verified identity.
    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        pkce_verifier: &str,
    ) -> AppResult<FederatedIdentity>;
}

/// Port for verifying an OIDC ID token against a provider's published JWKS,
/// used for generic OIDC providers that hand back an ID token alongside (or
/// instead of) an access token.
#[async_trait]
pub trait OidcVerifier: Send + Sync {
    /// Verifies the token's signature, issuer, audience, and expiry, and
    /// extracts the caller's verified identity from its claims.
    async fn verify_id_token(&self, provider: &Provider, id_token: &str) -> AppResult<FederatedIdentity>;
}

/// Application service for federated identity login and linking.
#[derive(Clone)]
pub struct FederationService {
    identity_repository: Arc<dyn IdentityRepository>,
    user_repository: Arc<dyn UserRepository>,
    state_store: Arc<dyn OAuthStateStore>,
    oauth_client: Arc<dyn OAuthClient>,
    oidc_verifier: Option<Arc<dyn OidcVerifier>>,
}

impl FederationService {
    /// Creates a new federation service. `oidc_verifier` is optional since a
    /// deployment with only named providers (Google, GitHub, ...) never
    /// needs ID-token verification — those exchange a code for an access
    /// token and call the provider's userinfo endpoint instead.
    #[must_use]
    pub fn new(
        identity_repository: Arc<dyn IdentityRepository>,
        user_repository: Arc<dyn UserRepository>,
        state_store: Arc<dyn OAuthStateStore>,
        oauth_client: Arc<dyn OAuthClient>,
        oidc_verifier: Option<Arc<dyn OidcVerifier>>,
    ) -> Self {
        Self {
            identity_repository,
            user_repository,
            state_store,
            oauth_client,
            oidc_verifier,
        }
    }

    /// Starts an OAuth2 login by building the provider redirect URL and
    /// stashing CSRF/PKCE state.
    pub async fn start_login(&self, provider_name: &str) -> AppResult<AuthorizationRequest> {
        Provider::validate_name(provider_name)?;
        let provider = Provider::parse(provider_name);

        let (authorize_url, state, pkce_verifier) = {
            let (url, verifier) = self.oauth_client.build_authorization_request(&provider)?;
            (url, uuid::Uuid::new_v4().to_string(), verifier)
        };

        self.state_store
            .store(&state, &pkce_verifier, &provider)
            .await?;

        Ok(AuthorizationRequest {
            authorize_url,
            state,
        })
    }

    /// Completes an OAuth2 callback: exchanges the code, finds or creates
    /// the local account, and returns it.
    pub async fn complete_login(&self, state: &str, code: &str) -> AppResult<UserRecord> {
        let (pkce_verifier, provider) = self
            .state_store
            .consume(state)
            .await?
            .ok_or(DomainError::InvalidToken)?;

        let identity = self
            .oauth_client
            .exchange_code(&provider, code, &pkce_verifier)
            .await?;

        self.resolve_identity(&provider, identity).await
    }

    /// Completes a generic OIDC login by verifying a raw ID token against
    /// the provider's JWKS, bypassing the userinfo-endpoint round-trip
    /// named providers use. Requires an `OidcVerifier` to have been
    /// configured for this deployment.
    pub async fn complete_oidc_login(&self, provider_name: &str, id_token: &str) -> AppResult<UserRecord> {
        Provider::validate_name(provider_name)?;
        let provider = Provider::parse(provider_name);

        let verifier = self
            .oidc_verifier
            .as_ref()
            .ok_or(DomainError::NotConfigured)?;
        let identity = verifier.verify_id_token(&provider, id_token).await?;

        self.resolve_identity(&provider, identity).await
    }

    async fn resolve_identity(&self, provider: &Provider, identity: FederatedIdentity) -> AppResult<UserRecord> {
        if let Some(existing) = self
            .identity_repository
            .find(provider, &identity.provider_user_id)
            .await?
        {
            return self
                .user_repository
                .find_by_id(existing.user_id)
                .await?
                .ok_or(DomainError::IdentityNotFound.into());
        }

        let Some(email) = identity.email.as_deref() else {
            return Err(DomainError::MissingEmail.into());
        };
        let email_address = EmailAddress::new(email)?;

        let user = match self
            .user_repository
            .find_by_email(email_address.as_str())
            .await?
        {
            Some(user) => user,
            None => {
                let user_id = self
                    .user_repository
                    .create(email_address.as_str(), None, identity.email_verified)
                    .await?;
                self.user_repository
                    .find_by_id(user_id)
                    .await?
                    .ok_or_else(|| {
                        castellan_core::AppError::Internal(
                            "user disappeared immediately after creation".to_owned(),
                        )
                    })?
            }
        };

        self.identity_repository
            .link(
                user.id,
                provider,
                &identity.provider_user_id,
                identity.email.as_deref(),
            )
            .await?;

        Ok(user)
    }

    /// Links an additional federated identity to an already-authenticated user.
    pub async fn link_identity(
        &self,
        user_id: UserId,
        provider_name: &str,
        provider_user_id: &str,
        email: Option<&str>,
    ) -> AppResult<()> {
        Provider::validate_name(provider_name)?;
        let provider = Provider::parse(provider_name);

        if let Some(existing) = self.identity_repository.find(&provider, provider_user_id).await? {
            if existing.user_id != user_id {
                return Err(DomainError::IdentityAlreadyLinked.into());
            }
            return Ok(());
        }

        self.identity_repository
            .link(user_id, &provider, provider_user_id, email)
            .await
    }

    /// Unlinks a federated identity, refusing to leave the user with zero
    /// authentication factors (Open Question (b)).
    pub async fn unlink_identity(&self, user_id: UserId, provider_name: &str) -> AppResult<()> {
        Provider::validate_name(provider_name)?;
        let provider = Provider::parse(provider_name);

        let remaining_factors = self.identity_repository.count_auth_factors(user_id).await?;
        if remaining_factors <= 1 {
            return Err(DomainError::LastAuthFactor.into());
        }

        self.identity_repository.unlink(user_id, &provider).await
    }
}

#[cfg(test)]
mod tests;
