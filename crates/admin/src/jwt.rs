//! Admin session tokens.
//!
//! A successful staff login is recorded as an HS256 JWT in the `auth_token`
//! cookie. The token names the admin's email and expires after
//! [`TOKEN_TTL_HOURS`]; nothing is stored server-side.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token issuer, checked on every request.
pub const ISSUER: &str = "larder-admin";

/// Token lifetime.
pub const TOKEN_TTL_HOURS: i64 = 12;

/// Claims carried by an admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Admin email (normalized).
    pub sub: String,
    #[serde(default)]
    pub name: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token errors.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("could not sign token: {0}")]
    Signing(String),
}

/// Signing and verification keys derived from `ADMIN_JWT_SECRET`.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a token for `email`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Signing` if encoding fails.
    pub fn issue(&self, email: &str, name: &str) -> Result<String, JwtError> {
        self.issue_at(email, name, Utc::now())
    }

    /// Issue a token as if it were `now`.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Signing` if encoding fails.
    pub fn issue_at(&self, email: &str, name: &str, now: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = AdminClaims {
            sub: email.to_owned(),
            name: name.to_owned(),
            iss: ISSUER.to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature, issuer and expiry.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` for an expired token and
    /// `JwtError::Invalid` for anything else wrong with it.
    pub fn verify(&self, token: &str) -> Result<AdminClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["sub", "exp", "iss"]);

        decode::<AdminClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&SecretString::from(secret))
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys("Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*");
        let token = keys.issue("owner@larder.test", "Owner").unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, "owner@larder.test");
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn test_expired_token() {
        let keys = keys("Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*");
        let long_ago = Utc::now() - Duration::hours(TOKEN_TTL_HOURS + 1);
        let token = keys.issue_at("owner@larder.test", "", long_ago).unwrap();

        assert!(matches!(keys.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = keys("Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*")
            .issue("owner@larder.test", "")
            .unwrap();
        let other = keys("Zx7!cV4@bN1#mQ8$wE5%rT2^yU9&iO6*");

        assert!(matches!(other.verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let secret = "Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*";
        let now = Utc::now();
        let claims = AdminClaims {
            sub: "owner@larder.test".to_owned(),
            name: String::new(),
            iss: "someone-else".to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(keys(secret).verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = keys("Jq8#vN2!pR5@tW9$yB3%kM6^dF1&hL4*");
        assert!(matches!(keys.verify("not.a.jwt"), Err(JwtError::Invalid(_))));
    }
}
