//! HS256 JWT encoding/decoding via the `jsonwebtoken` crate.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use castellan_application::{Claims, TokenCodec};
use castellan_core::{AppError, AppResult, DomainError};
use castellan_domain::{Role, SessionId, TokenKind};

/// Wire representation of [`Claims`], matched 1:1 against the domain shape.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    role: Role,
    sid: Option<uuid::Uuid>,
    kind: TokenKind,
    jti: String,
    iat: i64,
    exp: i64,
}

impl From<&Claims> for JwtClaims {
    fn from(claims: &Claims) -> Self {
        Self {
            sub: claims.subject.clone(),
            role: claims.role,
            sid: claims.session_id.map(|id| id.as_uuid()),
            kind: claims.token_kind,
            jti: claims.jti.clone(),
            iat: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
        }
    }
}

impl TryFrom<JwtClaims> for Claims {
    type Error = AppError;

    fn try_from(value: JwtClaims) -> Result<Self, Self::Error> {
        let issued_at = chrono::DateTime::from_timestamp(value.iat, 0)
            .ok_or_else(|| AppError::Internal("invalid token issued_at timestamp".to_owned()))?;
        let expires_at = chrono::DateTime::from_timestamp(value.exp, 0)
            .ok_or_else(|| AppError::Internal("invalid token expires_at timestamp".to_owned()))?;

        Ok(Self {
            subject: value.sub,
            role: value.role,
            session_id: value.sid.map(SessionId::from_uuid),
            token_kind: value.kind,
            jti: value.jti,
            issued_at,
            expires_at,
        })
    }
}

/// JWT codec signing and verifying tokens with a single HMAC-SHA256 secret.
#[derive(Clone)]
pub struct JwtTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenCodec {
    /// Creates a codec from a shared HMAC secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenCodec for JwtTokenCodec {
    fn encode(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), &JwtClaims::from(claims), &self.encoding_key)
            .map_err(|error| AppError::Internal(format!("failed to sign token: {error}")))
    }

    fn decode(&self, token: &str) -> AppResult<Claims> {
        let decoded = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |error| match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => DomainError::TokenExpired.into(),
                _ => DomainError::InvalidToken.into(),
            },
        )?;

        Claims::try_from(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_domain::UserId;

    fn sample_claims() -> Claims {
        let now = chrono::Utc::now();
        Claims {
            subject: UserId::default().to_string(),
            role: Role::Authenticated,
            session_id: Some(SessionId::from_uuid(uuid::Uuid::new_v4())),
            token_kind: TokenKind::Access,
            jti: uuid::Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now + chrono::Duration::minutes(15),
        }
    }

    #[test]
    fn encode_then_decode_roundtrips_claims() -> AppResult<()> {
        let codec = JwtTokenCodec::new(b"test-secret");
        let claims = sample_claims();

        let token = codec.encode(&claims)?;
        let decoded = codec.decode(&token)?;

        assert_eq!(decoded.subject, claims.subject);
        assert_eq!(decoded.role, claims.role);
        assert_eq!(decoded.jti, claims.jti);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> AppResult<()> {
        let codec = JwtTokenCodec::new(b"test-secret");
        let mut claims = sample_claims();
        claims.issued_at = chrono::Utc::now() - chrono::Duration::hours(2);
        claims.expires_at = chrono::Utc::now() - chrono::Duration::hours(1);

        let token = codec.encode(&claims)?;
        let error = codec.decode(&token).unwrap_err();
        assert_eq!(error.domain().copied(), Some(DomainError::TokenExpired));
        Ok(())
    }
}
