//! Identity token verification.
//!
//! Turns a raw OIDC token into a [`ClaimSet`] the policy engine can evaluate.

pub mod discovery;
mod error;
pub mod jwt;

use async_trait::async_trait;
pub use error::AuthError;
pub use jwt::JwtValidator;

use crate::authz::ClaimSet;

/// Verifies identity tokens.
///
/// Implementations check signature, expiry, issuer and audience, and only
/// return claims from tokens that pass every check.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<ClaimSet, AuthError>;
}
