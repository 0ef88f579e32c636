//! OIDC ID-token verification against a provider's published JWKS, with an
//! in-memory per-issuer cache so a verification doesn't refetch keys on
//! every call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use castellan_application::{FederatedIdentity, OidcVerifier};
use castellan_core::{AppError, AppResult, DomainError};
use castellan_domain::Provider;

const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Static per-issuer configuration: where to fetch keys and what audience
/// to expect in a verified token.
#[derive(Clone)]
pub struct OidcIssuerConfig {
    pub issuer: String,
    pub jwks_url: String,
    pub audience: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// [`OidcVerifier`] backed by live JWKS fetches over `reqwest`.
pub struct JwksOidcVerifier {
    http_client: reqwest::Client,
    issuers: HashMap<String, OidcIssuerConfig>,
    cache: RwLock<HashMap<String, CachedJwks>>,
}

impl JwksOidcVerifier {
    /// Creates a verifier from a map of provider name to issuer configuration.
    #[must_use]
    pub fn new(http_client: reqwest::Client, issuers: HashMap<String, OidcIssuerConfig>) -> Self {
        Self {
            http_client,
            issuers,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn config_for(&self, provider: &Provider) -> AppResult<&OidcIssuerConfig> {
        self.issuers
            .get(provider.as_str())
            .ok_or(DomainError::NotConfigured.into())
    }

    async fn fetch_jwks(&self, config: &OidcIssuerConfig) -> AppResult<()> {
        let document = self
            .http_client
            .get(&config.jwks_url)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("JWKS fetch failed: {error}")))?
            .json::<JwksDocument>()
            .await
            .map_err(|error| AppError::Internal(format!("failed to parse JWKS document: {error}")))?;

        let keys = document
            .keys
            .into_iter()
            .map(|jwk| (jwk.kid.clone(), jwk))
            .collect();

        let mut cache = self.cache.write().await;
        cache.insert(
            config.issuer.clone(),
            CachedJwks {
                keys,
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn decoding_key_for(&self, config: &OidcIssuerConfig, kid: &str) -> AppResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&config.issuer) {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(jwk) = cached.keys.get(kid) {
                        return DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                            .map_err(|error| AppError::Internal(format!("invalid JWKS key: {error}")));
                    }
                }
            }
        }

        self.fetch_jwks(config).await?;

        let cache = self.cache.read().await;
        let jwk = cache
            .get(&config.issuer)
            .and_then(|cached| cached.keys.get(kid))
            .ok_or(DomainError::InvalidToken)?;

        DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|error| AppError::Internal(format!("invalid JWKS key: {error}")))
    }
}

#[async_trait]
impl OidcVerifier for JwksOidcVerifier {
    async fn verify_id_token(&self, provider: &Provider, id_token: &str) -> AppResult<FederatedIdentity> {
        let config = self.config_for(provider)?;

        let header = decode_header(id_token).map_err(|_| DomainError::InvalidToken)?;
        let kid = header.kid.ok_or(DomainError::InvalidToken)?;
        let decoding_key = self.decoding_key_for(config, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&config.audience]);
        validation.set_issuer(&[&config.issuer]);

        let decoded = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|error| match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => DomainError::TokenExpired.into(),
                _ => AppError::from(DomainError::InvalidToken),
            })?;

        Ok(FederatedIdentity {
            provider_user_id: decoded.claims.sub,
            email: decoded.claims.email,
            email_verified: decoded.claims.email_verified.unwrap_or(false),
        })
    }
}
