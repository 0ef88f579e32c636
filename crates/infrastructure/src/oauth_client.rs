//! OAuth2 authorization-code exchange via the `oauth2` crate, covering a
//! deployment-configured set of named and generic OIDC providers.

use std::collections::HashMap;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;

use castellan_application::{FederatedIdentity, OAuthClient};
use castellan_core::{AppError, AppResult, DomainError};
use castellan_domain::Provider;

/// Static OAuth2 endpoint configuration for one provider.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Registered client ID.
    pub client_id: String,
    /// Registered client secret.
    pub client_secret: String,
    /// Provider authorization endpoint.
    pub auth_url: String,
    /// Provider token endpoint.
    pub token_url: String,
    /// Provider userinfo endpoint, queried after token exchange.
    pub userinfo_url: String,
    /// Redirect URI registered with the provider.
    pub redirect_url: String,
    /// OAuth2 scopes to request.
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    sub: Option<String>,
    id: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    verified_email: Option<bool>,
}

/// [`OAuthClient`] backed by statically configured per-provider endpoints.
#[derive(Clone)]
pub struct HttpOAuthClient {
    http_client: reqwest::Client,
    providers: HashMap<String, ProviderConfig>,
}

impl HttpOAuthClient {
    /// Creates a client from a map of provider name to endpoint configuration.
    #[must_use]
    pub fn new(http_client: reqwest::Client, providers: HashMap<String, ProviderConfig>) -> Self {
        Self {
            http_client,
            providers,
        }
    }

    fn config_for(&self, provider: &Provider) -> AppResult<&ProviderConfig> {
        self.providers
            .get(provider.as_str())
            .ok_or(DomainError::NotConfigured.into())
    }

    fn basic_client(config: &ProviderConfig) -> AppResult<BasicClient> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|error| AppError::Validation(format!("invalid authorize URL: {error}")))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|error| AppError::Validation(format!("invalid token URL: {error}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|error| AppError::Validation(format!("invalid redirect URL: {error}")))?;

        Ok(BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url))
    }
}

#[async_trait]
impl OAuthClient for HttpOAuthClient {
    fn build_authorization_request(&self, provider: &Provider) -> AppResult<(String, String)> {
        let config = self.config_for(provider)?;
        let client = Self::basic_client(config)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in &config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (authorize_url, _csrf_token) = request.url();

        Ok((authorize_url.to_string(), pkce_verifier.secret().clone()))
    }

    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        pkce_verifier: &str,
    ) -> AppResult<FederatedIdentity> {
        let config = self.config_for(provider)?;
        let client = Self::basic_client(config)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_owned()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
            .request_async(async_http_client)
            .await
            .map_err(|error| {
                AppError::Internal(format!("OAuth2 code exchange failed: {error}"))
            })?;

        let userinfo = self
            .http_client
            .get(&config.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("userinfo request failed: {error}")))?
            .json::<UserinfoResponse>()
            .await
            .map_err(|error| AppError::Internal(format!("failed to parse userinfo: {error}")))?;

        let provider_user_id = userinfo
            .sub
            .or(userinfo.id)
            .ok_or_else(|| AppError::Internal("userinfo response carried no subject".to_owned()))?;

        Ok(FederatedIdentity {
            provider_user_id,
            email: userinfo.email,
            email_verified: userinfo.email_verified.or(userinfo.verified_email).unwrap_or(false),
        })
    }
}
