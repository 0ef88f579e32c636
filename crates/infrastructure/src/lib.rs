//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod bcrypt_password_hasher;
mod captcha_provider;
mod config;
mod console_email_service;
mod in_memory_mfa_rate_limiter;
mod in_memory_oauth_state_store;
mod in_memory_settings_cache;
mod jwt_token_codec;
mod oauth_client;
mod oidc_verifier;
mod postgres_audit_repository;
mod postgres_auth_token_repository;
mod postgres_identity_repository;
mod postgres_impersonation_repository;
mod postgres_session_repository;
mod postgres_settings_repository;
mod postgres_trust_repository;
mod postgres_trust_token_repository;
mod postgres_user_repository;
mod qr_code;
mod redis_blacklist_repository;
mod saml_validator;
mod smtp_email_service;
mod totp_provider;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use bcrypt_password_hasher::BcryptPasswordHasher;
pub use captcha_provider::HttpCaptchaProvider;
pub use config::{CaptchaConfig, EmailProviderConfig, InfrastructureConfig, SamlConfig, SmtpRuntimeConfig};
pub use console_email_service::ConsoleEmailService;
pub use in_memory_mfa_rate_limiter::InMemoryMfaRateLimiter;
pub use in_memory_oauth_state_store::InMemoryOAuthStateStore;
pub use in_memory_settings_cache::InMemorySettingsCache;
pub use jwt_token_codec::JwtTokenCodec;
pub use oauth_client::{HttpOAuthClient, ProviderConfig};
pub use oidc_verifier::{JwksOidcVerifier, OidcIssuerConfig};
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_auth_token_repository::PostgresAuthTokenRepository;
pub use postgres_identity_repository::PostgresIdentityRepository;
pub use postgres_impersonation_repository::PostgresImpersonationRepository;
pub use postgres_session_repository::PostgresSessionRepository;
pub use postgres_settings_repository::PostgresSettingsRepository;
pub use postgres_trust_repository::PostgresTrustRepository;
pub use postgres_trust_token_repository::PostgresTrustTokenRepository;
pub use postgres_user_repository::PostgresUserRepository;
pub use qr_code::render_totp_qr_code_png;
pub use redis_blacklist_repository::RedisBlacklistRepository;
pub use saml_validator::SamelSamlValidator;
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
pub use totp_provider::TotpRsProvider;
