//! SAML 2.0 response validation via the `samael` crate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use samael::metadata::EntityDescriptor;
use samael::service_provider::ServiceProvider;

use castellan_application::{SamlAssertion, SamlValidator};
use castellan_core::{AppError, AppResult};

/// How long an assertion ID is remembered for replay rejection once seen,
/// when the assertion itself carries no `NotOnOrAfter` condition to bound it.
const DEFAULT_REPLAY_WINDOW: chrono::Duration = chrono::Duration::minutes(10);

/// SAML response validator for a single configured identity provider.
///
/// Tracks observed assertion IDs in memory to reject replays within their
/// validity window (spec step "assertion id has not been observed before").
/// A single-instance deployment is sufficient here the same way
/// [`crate::InMemoryOAuthStateStore`] is for OAuth state: a multi-instance
/// deployment would back this with a shared store instead.
pub struct SamelSamlValidator {
    service_provider: ServiceProvider,
    seen_assertion_ids: Mutex<HashMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl SamelSamlValidator {
    /// Builds a validator from the identity provider's metadata XML and
    /// this service's entity ID / ACS URL.
    pub fn new(idp_metadata_xml: &str, sp_entity_id: &str, acs_url: &str) -> AppResult<Self> {
        let idp_metadata: EntityDescriptor = idp_metadata_xml
            .parse()
            .map_err(|error| AppError::Validation(format!("invalid IdP metadata: {error}")))?;

        let service_provider = ServiceProvider {
            entity_id: Some(sp_entity_id.to_owned()),
            acs_url: Some(acs_url.to_owned()),
            idp_metadata,
            ..Default::default()
        };

        Ok(Self {
            service_provider,
            seen_assertion_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Rejects an assertion ID already seen within its replay window, and
    /// records this one. Prunes expired entries opportunistically so the
    /// map doesn't grow unbounded across the process lifetime.
    fn check_and_record_assertion_id(
        &self,
        assertion_id: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<()> {
        let now = chrono::Utc::now();
        let mut seen = self.seen_assertion_ids.lock().unwrap_or_else(|error| error.into_inner());

        seen.retain(|_, recorded_expiry| *recorded_expiry > now);

        if seen.contains_key(assertion_id) {
            return Err(AppError::Validation("SAML assertion has already been used".to_owned()));
        }

        seen.insert(assertion_id.to_owned(), expires_at);
        Ok(())
    }
}

#[async_trait]
impl SamlValidator for SamelSamlValidator {
    async fn validate_response(&self, saml_response: &str) -> AppResult<SamlAssertion> {
        let decoded = STANDARD
            .decode(saml_response)
            .map_err(|error| AppError::Validation(format!("invalid SAML response encoding: {error}")))?;
        let xml = String::from_utf8(decoded)
            .map_err(|error| AppError::Validation(format!("SAML response is not valid UTF-8: {error}")))?;

        let assertion = self
            .service_provider
            .parse_response(&xml, &[])
            .map_err(|error| AppError::Validation(format!("SAML response validation failed: {error}")))?;

        let assertion_id = assertion.id.clone();

        let expires_at = assertion
            .conditions
            .as_ref()
            .and_then(|conditions| conditions.not_on_or_after)
            .unwrap_or_else(|| chrono::Utc::now() + DEFAULT_REPLAY_WINDOW);

        self.check_and_record_assertion_id(&assertion_id, expires_at)?;

        let name_id = assertion
            .subject
            .as_ref()
            .and_then(|subject| subject.name_id.as_ref())
            .map(|name_id| name_id.value.clone())
            .ok_or_else(|| AppError::Validation("SAML assertion has no NameID".to_owned()))?;

        let email = assertion
            .attribute_statements
            .iter()
            .flatten()
            .flat_map(|statement| statement.attributes.iter())
            .find(|attribute| {
                attribute
                    .name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case("email"))
            })
            .and_then(|attribute| attribute.values.first())
            .cloned();

        Ok(SamlAssertion { name_id, email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replayed_assertion_id_is_rejected_within_the_window() {
        let validator = SamelSamlValidator {
            service_provider: ServiceProvider::default(),
            seen_assertion_ids: Mutex::new(HashMap::new()),
        };
        let expires_at = chrono::Utc::now() + chrono::Duration::minutes(5);

        validator
            .check_and_record_assertion_id("assertion-1", expires_at)
            .unwrap_or_else(|e| panic!("{e}"));

        let replay = validator.check_and_record_assertion_id("assertion-1", expires_at);
        assert!(replay.is_err());
    }

    #[test]
    fn expired_assertion_id_is_forgotten_and_can_be_reused() {
        let validator = SamelSamlValidator {
            service_provider: ServiceProvider::default(),
            seen_assertion_ids: Mutex::new(HashMap::new()),
        };
        let already_expired = chrono::Utc::now() - chrono::Duration::seconds(1);

        validator
            .check_and_record_assertion_id("assertion-2", already_expired)
            .unwrap_or_else(|e| panic!("{e}"));

        validator
            .check_and_record_assertion_id("assertion-2", chrono::Utc::now() + chrono::Duration::minutes(5))
            .unwrap_or_else(|e| panic!("{e}"));
    }
}
