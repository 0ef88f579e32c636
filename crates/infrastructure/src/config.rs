//! Deployment configuration, loaded from the process environment (with an
//! optional `.env` file via `dotenvy`) and validated at construction so a
//! misconfigured deployment fails at boot rather than on first request.

use std::collections::HashMap;
use std::env;

use castellan_core::AppError;

use crate::oauth_client::ProviderConfig;
use crate::oidc_verifier::OidcIssuerConfig;

/// SMTP connection details for [`EmailProviderConfig::Smtp`].
#[derive(Debug, Clone)]
pub struct SmtpRuntimeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Which email adapter to wire up.
#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    /// Logs outgoing mail instead of sending it, for local development.
    Console,
    /// Sends mail over SMTP.
    Smtp(SmtpRuntimeConfig),
}

/// CAPTCHA siteverify endpoint configuration.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub verify_url: String,
    pub secret_key: String,
}

/// SAML service-provider configuration for a single configured identity
/// provider.
#[derive(Debug, Clone)]
pub struct SamlConfig {
    pub idp_metadata_xml: String,
    pub sp_entity_id: String,
    pub acs_url: String,
}

/// Top-level infrastructure configuration, loaded once at process startup.
#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub totp_encryption_key: String,
    pub email_provider: EmailProviderConfig,
    pub captcha: Option<CaptchaConfig>,
    pub oauth_providers: HashMap<String, ProviderConfig>,
    pub oidc_issuers: HashMap<String, OidcIssuerConfig>,
    pub saml: Option<SamlConfig>,
}

impl InfrastructureConfig {
    /// Loads configuration from the environment, applying `.env` first if
    /// one is present. Named OAuth providers and OIDC issuers are
    /// configured through a single `OAUTH_PROVIDERS=google,github` list,
    /// each resolved to `{NAME}_CLIENT_ID` / `{NAME}_CLIENT_SECRET` / etc.
    /// environment variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());

        let jwt_secret = required_env("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT_SECRET must be at least 32 characters".to_owned(),
            ));
        }

        let totp_encryption_key = env::var("TOTP_ENCRYPTION_KEY").unwrap_or_else(|_| "0".repeat(64));
        if totp_encryption_key.len() != 64 || hex::decode(&totp_encryption_key).is_err() {
            return Err(AppError::Validation(
                "TOTP_ENCRYPTION_KEY must be 64 hex characters (32 bytes)".to_owned(),
            ));
        }

        let email_provider = load_email_provider()?;
        let captcha = load_captcha_config()?;
        let oauth_providers = load_oauth_providers()?;
        let oidc_issuers = load_oidc_issuers()?;
        let saml = load_saml_config()?;

        Ok(Self {
            database_url,
            redis_url,
            jwt_secret,
            totp_encryption_key,
            email_provider,
            captcha,
            oauth_providers,
            oidc_issuers,
            saml,
        })
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }
    Ok(value)
}

fn load_email_provider() -> Result<EmailProviderConfig, AppError> {
    match env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "console".to_owned()).as_str() {
        "console" => Ok(EmailProviderConfig::Console),
        "smtp" => {
            let port = required_non_empty_env("SMTP_PORT")?
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
            Ok(EmailProviderConfig::Smtp(SmtpRuntimeConfig {
                host: required_non_empty_env("SMTP_HOST")?,
                port,
                username: required_non_empty_env("SMTP_USERNAME")?,
                password: required_non_empty_env("SMTP_PASSWORD")?,
                from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
            }))
        }
        other => Err(AppError::Validation(format!(
            "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
        ))),
    }
}

fn load_captcha_config() -> Result<Option<CaptchaConfig>, AppError> {
    let Ok(verify_url) = env::var("CAPTCHA_VERIFY_URL") else {
        return Ok(None);
    };
    Ok(Some(CaptchaConfig {
        verify_url,
        secret_key: required_non_empty_env("CAPTCHA_SECRET_KEY")?,
    }))
}

fn configured_names(env_var: &str) -> Vec<String> {
    env::var(env_var)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.to_lowercase())
        .collect()
}

fn load_oauth_providers() -> Result<HashMap<String, ProviderConfig>, AppError> {
    let mut providers = HashMap::new();
    for name in configured_names("OAUTH_PROVIDERS") {
        let prefix = name.to_uppercase();
        let scopes = env::var(format!("{prefix}_SCOPES"))
            .unwrap_or_else(|_| "openid,email,profile".to_owned())
            .split(',')
            .map(|scope| scope.trim().to_owned())
            .filter(|scope| !scope.is_empty())
            .collect();

        providers.insert(
            name.clone(),
            ProviderConfig {
                client_id: required_non_empty_env(&format!("{prefix}_CLIENT_ID"))?,
                client_secret: required_non_empty_env(&format!("{prefix}_CLIENT_SECRET"))?,
                auth_url: required_non_empty_env(&format!("{prefix}_AUTH_URL"))?,
                token_url: required_non_empty_env(&format!("{prefix}_TOKEN_URL"))?,
                userinfo_url: required_non_empty_env(&format!("{prefix}_USERINFO_URL"))?,
                redirect_url: required_non_empty_env(&format!("{prefix}_REDIRECT_URL"))?,
                scopes,
            },
        );
    }
    Ok(providers)
}

fn load_oidc_issuers() -> Result<HashMap<String, OidcIssuerConfig>, AppError> {
    let mut issuers = HashMap::new();
    for name in configured_names("OIDC_ISSUERS") {
        let prefix = name.to_uppercase();
        issuers.insert(
            name.clone(),
            OidcIssuerConfig {
                issuer: required_non_empty_env(&format!("{prefix}_ISSUER"))?,
                jwks_url: required_non_empty_env(&format!("{prefix}_JWKS_URL"))?,
                audience: required_non_empty_env(&format!("{prefix}_AUDIENCE"))?,
            },
        );
    }
    Ok(issuers)
}

fn load_saml_config() -> Result<Option<SamlConfig>, AppError> {
    let Ok(idp_metadata_xml) = env::var("SAML_IDP_METADATA_XML") else {
        return Ok(None);
    };
    Ok(Some(SamlConfig {
        idp_metadata_xml,
        sp_entity_id: required_non_empty_env("SAML_SP_ENTITY_ID")?,
        acs_url: required_non_empty_env("SAML_ACS_URL")?,
    }))
}
