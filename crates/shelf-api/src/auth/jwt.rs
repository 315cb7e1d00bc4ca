//! HS256 bearer token verification
//!
//! Tokens are issued elsewhere. This service only checks the signature and expiry and reads
//! the requester identity from the `sub` claim.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shelf_core::AppError;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid, // user_id
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return the requester id it carries.
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-at-least-32-characters-long!";

    fn token(secret: &str, sub: Uuid, exp: i64) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &JwtClaims { sub, exp, iat: None },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        jsonwebtoken::get_current_timestamp() as i64 + 3600
    }

    #[test]
    fn test_valid_token_yields_subject() {
        let user = Uuid::new_v4();
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.verify(&token(SECRET, user, in_one_hour())).unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let forged = token("another-secret-that-is-also-long-enough", Uuid::new_v4(), in_one_hour());
        assert!(matches!(
            verifier.verify(&forged),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let expired = token(SECRET, Uuid::new_v4(), 1_000);
        assert!(verifier.verify(&expired).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
