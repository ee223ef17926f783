//! Credential minting through a GitHub App.
//!
//! The App must be installed on every repository the dispenser hands out
//! tokens for. Each minted token is scoped to a single repository and to
//! exactly the permissions the policy approved.

mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use client::GitHubAppClient;
use thiserror::Error;

use crate::{authz::PermissionGrant, models::Repository};

/// A freshly minted, time-boxed access token.
#[derive(Clone)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Permissions the provider reports the token carries.
    pub permissions: PermissionGrant,
}

impl std::fmt::Debug for MintedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintedToken")
            .field("token", &"****")
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.permissions)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error("GitHub App is not installed on {repository}")]
    InstallationNotFound { repository: String },

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request to GitHub failed: {0}")]
    Http(String),

    #[error("failed to sign GitHub App JWT: {0}")]
    Signing(String),

    #[error("unexpected GitHub API response: {0}")]
    InvalidResponse(String),
}

/// Mints access tokens for approved requests.
#[async_trait]
pub trait CredentialMinter: Send + Sync {
    /// Mint a token for `repository` carrying exactly `permissions`.
    async fn mint(
        &self,
        repository: &Repository,
        permissions: &PermissionGrant,
    ) -> Result<MintedToken, MintError>;
}
