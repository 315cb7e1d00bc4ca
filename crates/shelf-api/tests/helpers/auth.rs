use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use shelf_api::auth::JwtClaims;
use uuid::Uuid;

/// Test signing secret (must match setup_test_app).
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// A bearer token for `user_id`, valid for one hour.
pub fn token_for(user_id: Uuid) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user_id,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: Some(now.timestamp()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", token_for(user_id))
}
