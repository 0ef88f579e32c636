//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_service;
mod auth_service;
mod credential_service;
mod federation_service;
mod impersonation_service;
mod mfa_service;
mod saml_service;
mod session_service;
mod settings_service;
mod trust_service;

pub use audit_service::{AuditEvent, AuditRepository, AuditService};
pub use auth_service::{AuthService, ChangePasswordRequest, LoginRequest, LoginResult, RegisterRequest};
pub use credential_service::{
    AuthOutcome, AuthTokenRecord, AuthTokenRepository, CredentialService, EmailService,
    PasswordHasher, RegisterParams, UserRecord, UserRepository,
};
pub use federation_service::{
    AuthorizationRequest, FederatedIdentity, FederationService, IdentityRecord,
    IdentityRepository, OAuthClient, OAuthStateStore, OidcVerifier,
};
pub use impersonation_service::{
    ImpersonationRecord, ImpersonationRepository, ImpersonationService, StartImpersonationParams,
};
pub use mfa_service::{MfaRateLimiter, MfaService, SecretEncryptor, TotpEnrollment, TotpProvider};
pub use saml_service::{SamlAssertion, SamlService, SamlValidator};
pub use session_service::{
    BlacklistRepository, Claims, SessionRecord, SessionRepository, SessionService, TokenCodec,
    TokenPair,
};
pub use settings_service::{SettingsCache, SettingsRecord, SettingsRepository, SettingsService};
pub use trust_service::{
    CaptchaProvider, CaptchaRequirement, ChallengeRecord, ChallengeRepository, TrustService,
    TrustSignalRepository, TrustTokenRecord, TrustTokenRepository,
};
