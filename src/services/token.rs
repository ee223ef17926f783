use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::{AuthError, IdentityVerifier},
    authz::{AuthzError, ClaimField, ClaimSet, PermissionGrant, authorize},
    github::{CredentialMinter, MintError},
    models::Repository,
    rules::{LookupError, RuleRepository},
};

/// A request to exchange an identity token for a repository token.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRequest {
    pub oidc_token: String,
    /// Target repository. Defaults to the token's `repository` claim.
    #[serde(default)]
    pub repository: Option<Repository>,
    pub permissions: PermissionGrant,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("oidc_token", &"****")
            .field("repository", &self.repository)
            .field("permissions", &self.permissions)
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub repository: Repository,
    /// Permissions the minted token carries, as reported by GitHub.
    pub permissions: PermissionGrant,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token", &"****")
            .field("expires_at", &self.expires_at)
            .field("repository", &self.repository)
            .field("permissions", &self.permissions)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum DispenseError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Denied(#[from] AuthzError),

    #[error("token owner '{owner}' does not own {repository}")]
    OwnerMismatch { owner: String, repository: Repository },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Mint(#[from] MintError),
}

impl DispenseError {
    /// Short machine-readable reason, used for logging.
    pub fn reason(&self) -> &'static str {
        match self {
            DispenseError::Auth(e) => e.code(),
            DispenseError::BadRequest(_) => "bad_request",
            DispenseError::Denied(e) => e.reason(),
            DispenseError::OwnerMismatch { .. } => "owner_mismatch",
            DispenseError::Lookup(_) => "rule_lookup_failed",
            DispenseError::Mint(_) => "mint_failed",
        }
    }
}

/// Runs the exchange: verify the identity token, check ownership, evaluate
/// the repository's rules and mint a token for exactly what was approved.
#[derive(Clone)]
pub struct TokenService {
    verifier: Arc<dyn IdentityVerifier>,
    rules: Arc<dyn RuleRepository>,
    minter: Arc<dyn CredentialMinter>,
}

impl TokenService {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        rules: Arc<dyn RuleRepository>,
        minter: Arc<dyn CredentialMinter>,
    ) -> Self {
        Self {
            verifier,
            rules,
            minter,
        }
    }

    pub fn rules(&self) -> &Arc<dyn RuleRepository> {
        &self.rules
    }

    pub async fn dispense(&self, request: TokenRequest) -> Result<TokenResponse, DispenseError> {
        let claims = self
            .verifier
            .verify(&request.oidc_token)
            .await
            .inspect_err(|e| match e {
                AuthError::Unavailable(_) => {
                    tracing::warn!(error = %e, "Could not verify identity token")
                }
                _ => tracing::info!(reason = e.code(), "Identity token rejected"),
            })?;

        let repository = match request.repository {
            Some(repository) => repository,
            None => Repository::parse(claims.get(ClaimField::Repository)).map_err(|_| {
                DispenseError::BadRequest(
                    "repository not given and the token has no usable repository claim".into(),
                )
            })?,
        };

        let owner = claims.get(ClaimField::RepositoryOwner);
        let subject = claims.get(ClaimField::Sub);

        let decision = self
            .decide(&repository, owner, &claims, &request.permissions)
            .await;
        let approved = match decision {
            Ok(approved) => approved,
            Err(e) => {
                tracing::info!(
                    repository = %repository,
                    subject,
                    requested = %request.permissions,
                    reason = e.reason(),
                    detail = %e,
                    "Token request denied"
                );
                return Err(e);
            }
        };

        let minted = self
            .minter
            .mint(&repository, &approved)
            .await
            .inspect_err(|e| {
                tracing::error!(repository = %repository, error = %e, "Failed to mint token");
            })?;

        tracing::info!(
            repository = %repository,
            subject,
            permissions = %minted.permissions,
            expires_at = %minted.expires_at,
            "Token issued"
        );
        if minted.permissions != approved {
            tracing::warn!(
                repository = %repository,
                approved = %approved,
                reported = %minted.permissions,
                "GitHub reported different permissions than were approved"
            );
        }

        Ok(TokenResponse {
            token: minted.token,
            expires_at: minted.expires_at,
            repository,
            permissions: minted.permissions,
        })
    }

    async fn decide(
        &self,
        repository: &Repository,
        owner: &str,
        claims: &ClaimSet,
        requested: &PermissionGrant,
    ) -> Result<PermissionGrant, DispenseError> {
        if requested.is_empty() {
            return Err(AuthzError::NoPermissionsRequested.into());
        }
        if !repository.is_owned_by(owner) {
            return Err(DispenseError::OwnerMismatch {
                owner: owner.to_string(),
                repository: repository.clone(),
            });
        }

        let rules = self.rules.rules_for(repository).await?;
        Ok(authorize(&rules, claims, requested)?)
    }
}
