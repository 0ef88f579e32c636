//! SAML 2.0 assertion validation and just-in-time account provisioning.

use std::sync::Arc;

use async_trait::async_trait;

use castellan_core::{AppResult, DomainError};
use castellan_domain::{EmailAddress, Provider};

use crate::credential_service::{UserRecord, UserRepository};
use crate::federation_service::IdentityRepository;

/// A validated SAML assertion's relevant claims.
#[derive(Debug, Clone)]
pub struct SamlAssertion {
    /// NameID from the assertion, used as the provider-issued subject.
    pub name_id: String,
    /// Email attribute, if the identity provider sent one.
    pub email: Option<String>,
}

/// Port for validating a raw SAML response against a configured identity
/// provider's metadata (signature, audience, recipient, timestamps).
#[async_trait]
pub trait SamlValidator: Send + Sync {
    /// Validates a base64-encoded SAML response and extracts its assertion.
    async fn validate_response(&self, saml_response: &str) -> AppResult<SamlAssertion>;
}

/// Application service for SAML-asserted login.
#[derive(Clone)]
pub struct SamlService {
    validator: Arc<dyn SamlValidator>,
    identity_repository: Arc<dyn IdentityRepository>,
    user_repository: Arc<dyn UserRepository>,
}

impl SamlService {
    /// Creates a new SAML service.
    #[must_use]
    pub fn new(
        validator: Arc<dyn SamlValidator>,
        identity_repository: Arc<dyn IdentityRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            validator,
            identity_repository,
            user_repository,
        }
    }

    /// Validates a SAML response and returns the matching (or newly
    /// provisioned) local account.
    pub async fn login(&self, saml_response: &str) -> AppResult<UserRecord> {
        let assertion = self.validator.validate_response(saml_response).await?;
        let provider = Provider::Oidc("saml".to_owned());

        if let Some(existing) = self
            .identity_repository
            .find(&provider, &assertion.name_id)
            .await?
        {
            return self
                .user_repository
                .find_by_id(existing.user_id)
                .await?
                .ok_or(DomainError::IdentityNotFound.into());
        }

        let Some(email) = assertion.email.as_deref() else {
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
                    .create(email_address.as_str(), None, true)
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
            .link(user.id, &provider, &assertion.name_id, assertion.email.as_deref())
            .await?;

        Ok(user)
    }
}
