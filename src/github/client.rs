use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};

use super::{CredentialMinter, MintError, MintedToken};
use crate::{
    authz::{AccessLevel, PermissionGrant},
    config::{ConfigError, GitHubConfig},
    models::Repository,
};

const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";

/// Backdated to tolerate clock drift between us and GitHub.
const APP_JWT_BACKDATE_SECS: i64 = 60;
/// GitHub rejects App JWTs that live longer than ten minutes.
const APP_JWT_LIFETIME_SECS: i64 = 540;

#[derive(Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Deserialize)]
struct Installation {
    id: u64,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    repositories: [&'a str; 1],
    permissions: &'a PermissionGrant,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    permissions: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Mints repository-scoped installation tokens as a GitHub App.
pub struct GitHubAppClient {
    app_id: u64,
    signing_key: EncodingKey,
    api_url: String,
    http_client: reqwest::Client,
}

impl GitHubAppClient {
    pub fn new(
        app_id: u64,
        private_key_pem: &str,
        api_url: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, MintError> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| MintError::Signing(format!("invalid App private key: {e}")))?;

        Ok(Self {
            app_id,
            signing_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Build a client from configuration, loading the private key and
    /// setting up an HTTP client with the configured timeout.
    pub fn from_config(config: &GitHubConfig) -> Result<Self, ConfigError> {
        let private_key = config.load_private_key()?;

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {e}")))?;

        Self::new(config.app_id, &private_key, &config.api_url, http_client)
            .map_err(|e| ConfigError::Validation(format!("github: {e}")))
    }

    fn app_jwt(&self) -> Result<String, MintError> {
        let now = Utc::now().timestamp();
        let claims = AppClaims {
            iat: now - APP_JWT_BACKDATE_SECS,
            exp: now + APP_JWT_LIFETIME_SECS,
            iss: self.app_id.to_string(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| MintError::Signing(e.to_string()))
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, MintError> {
        let jwt = self.app_jwt()?;
        Ok(self
            .http_client
            .request(method, format!("{}{path}", self.api_url))
            .header(header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(jwt))
    }

    /// Look up the App installation that covers `repository`.
    pub async fn find_installation(&self, repository: &Repository) -> Result<u64, MintError> {
        let path = format!(
            "/repos/{}/{}/installation",
            repository.owner(),
            repository.name()
        );
        let response = self
            .request(reqwest::Method::GET, &path)?
            .send()
            .await
            .map_err(|e| MintError::Http(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(MintError::InstallationNotFound {
                repository: repository.full_name(),
            });
        }
        let response = check_status(response).await?;

        let installation: Installation = response
            .json()
            .await
            .map_err(|e| MintError::InvalidResponse(e.to_string()))?;
        Ok(installation.id)
    }

    /// Create an installation token limited to one repository and the given
    /// permissions.
    pub async fn create_installation_token(
        &self,
        installation_id: u64,
        repository: &Repository,
        permissions: &PermissionGrant,
    ) -> Result<MintedToken, MintError> {
        let path = format!("/app/installations/{installation_id}/access_tokens");
        let body = AccessTokenRequest {
            repositories: [repository.name()],
            permissions,
        };
        let response = self
            .request(reqwest::Method::POST, &path)?
            .json(&body)
            .send()
            .await
            .map_err(|e| MintError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let created: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| MintError::InvalidResponse(e.to_string()))?;

        let granted = match created.permissions {
            // Levels GitHub reports that we don't model are left out
            Some(reported) => reported
                .into_iter()
                .filter_map(|(name, level)| {
                    level
                        .parse::<AccessLevel>()
                        .ok()
                        .map(|level| (name, level))
                })
                .collect(),
            None => permissions.clone(),
        };

        Ok(MintedToken {
            token: created.token,
            expires_at: created.expires_at,
            permissions: granted,
        })
    }
}

/// Turn a non-success response into [`MintError::Api`], keeping GitHub's
/// error message when it sends one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MintError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    Err(MintError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CredentialMinter for GitHubAppClient {
    async fn mint(
        &self,
        repository: &Repository,
        permissions: &PermissionGrant,
    ) -> Result<MintedToken, MintError> {
        let installation_id = self.find_installation(repository).await?;
        tracing::debug!(
            repository = %repository,
            installation_id,
            "Found GitHub App installation"
        );

        self.create_installation_token(installation_id, repository, permissions)
            .await
    }
}
