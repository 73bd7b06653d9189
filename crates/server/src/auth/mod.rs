//! Bearer-token authentication against an external OpenID Connect provider.

mod middleware;
pub use middleware::require_bearer;

mod verifier;
pub use verifier::{Claims, TokenVerifier};
