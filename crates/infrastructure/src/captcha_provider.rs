//! CAPTCHA verification against an hCaptcha/reCAPTCHA-compatible siteverify
//! endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use castellan_application::CaptchaProvider;
use castellan_core::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
}

/// CAPTCHA provider backed by an HTTP siteverify endpoint.
#[derive(Clone)]
pub struct HttpCaptchaProvider {
    client: reqwest::Client,
    verify_url: String,
    secret_key: String,
    site_key: String,
    provider_name: String,
}

impl HttpCaptchaProvider {
    /// Creates a provider targeting the given siteverify URL and secret.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        verify_url: impl Into<String>,
        secret_key: impl Into<String>,
        site_key: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            verify_url: verify_url.into(),
            secret_key: secret_key.into(),
            site_key: site_key.into(),
            provider_name: provider_name.into(),
        }
    }
}

#[async_trait]
impl CaptchaProvider for HttpCaptchaProvider {
    async fn verify(&self, response_token: &str, remote_ip: Option<&str>) -> AppResult<bool> {
        let mut params = vec![
            ("secret", self.secret_key.as_str()),
            ("response", response_token),
        ];
        if let Some(ip) = remote_ip {
            params.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.verify_url)
            .form(&params)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("CAPTCHA verification request failed: {error}")))?
            .json::<SiteverifyResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to parse CAPTCHA verification response: {error}"))
            })?;

        Ok(response.success)
    }

    fn site_key(&self) -> &str {
        &self.site_key
    }

    fn provider_name(&self) -> &str {
        &self.provider_name
    }
}
