pub mod jwt;
pub mod middleware;

pub use jwt::{JwtClaims, JwtVerifier};
pub use middleware::{auth_middleware, RequesterId};
