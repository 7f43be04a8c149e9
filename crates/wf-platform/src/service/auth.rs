//! Identity token verification
//!
//! Tokens are JWTs issued by the identity provider. The subject is the
//! caller's uid; an optional `admin` custom claim marks administrators.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{PlatformError, Result};

pub const INVALID_CREDENTIAL: &str = "Invalid or expired credential";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Identity-provider uid
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Custom claim
    #[serde(default)]
    pub admin: bool,

    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

pub struct AuthService {
    decoding_key: DecodingKey,
    encoding_key: Option<EncodingKey>,
    algorithm: Algorithm,
    validation: Validation,
    issuer: Option<String>,
    audience: Option<String>,
}

impl AuthService {
    /// RS256 when a public key is configured, HS256 with the shared secret otherwise.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let (algorithm, decoding_key, encoding_key) = match (&config.public_key_pem, &config.secret) {
            (Some(pem), _) => {
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| PlatformError::configuration(format!("Invalid RSA public key: {}", e)))?;
                (Algorithm::RS256, key, None)
            }
            (None, Some(secret)) => (
                Algorithm::HS256,
                DecodingKey::from_secret(secret.as_bytes()),
                Some(EncodingKey::from_secret(secret.as_bytes())),
            ),
            (None, None) => {
                return Err(PlatformError::configuration(
                    "No token verification key configured",
                ))
            }
        };

        let mut validation = Validation::new(algorithm);
        match &config.issuer {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            decoding_key,
            encoding_key,
            algorithm,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<IdentityClaims> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(error = %e, "Token rejected");
            PlatformError::unauthorized(INVALID_CREDENTIAL)
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(PlatformError::unauthorized(INVALID_CREDENTIAL));
        }
        Ok(data.claims)
    }

    /// Mint a token. Only available with a shared secret.
    pub fn issue_token(
        &self,
        uid: &str,
        email: Option<&str>,
        admin: bool,
        ttl: Duration,
    ) -> Result<String> {
        let key = self.encoding_key.as_ref().ok_or_else(|| {
            PlatformError::configuration("Token issuing requires WF_AUTH_SECRET")
        })?;

        let now = Utc::now();
        let claims = IdentityClaims {
            sub: uid.to_string(),
            email: email.map(str::to_string),
            admin,
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        encode(&Header::new(self.algorithm), &claims, key)
            .map_err(|e| PlatformError::internal(format!("Failed to sign token: {}", e)))
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(&AuthConfig::with_secret("test-secret")).unwrap()
    }

    #[test]
    fn test_issued_token_round_trips() {
        let auth = service();
        let token = auth
            .issue_token("uid-1", Some("a@x.com"), true, Duration::hours(1))
            .unwrap();

        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "uid-1");
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert!(claims.admin);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = service();
        let token = auth
            .issue_token("uid-1", None, false, Duration::hours(-2))
            .unwrap();

        let err = auth.validate_token(&token).unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));
        assert_eq!(err.to_string(), INVALID_CREDENTIAL);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = AuthService::new(&AuthConfig::with_secret("other-secret")).unwrap();
        let token = other
            .issue_token("uid-1", None, true, Duration::hours(1))
            .unwrap();

        assert!(service().validate_token(&token).is_err());
        assert!(service().validate_token("not-a-jwt").is_err());
    }

    #[test]
    fn test_audience_is_enforced_when_configured() {
        let mut config = AuthConfig::with_secret("test-secret");
        config.audience = Some("wyffle".to_string());
        let strict = AuthService::new(&config).unwrap();

        let foreign = service()
            .issue_token("uid-1", None, false, Duration::hours(1))
            .unwrap();
        assert!(strict.validate_token(&foreign).is_err());

        let own = strict
            .issue_token("uid-1", None, false, Duration::hours(1))
            .unwrap();
        assert!(strict.validate_token(&own).is_ok());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("abc"), None);
    }
}
