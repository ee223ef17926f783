//! OIDC token validation with JWKS support.
//!
//! This module verifies identity tokens against the issuer's JWKS (JSON Web
//! Key Set). Keys are cached and re-fetched when they age out or when a token
//! names a key the cache does not have (at most every 30 seconds), so
//! issuer key rotation needs no restart.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation, decode, decode_header,
    errors::ErrorKind,
    jwk::{AlgorithmParameters, Jwk, JwkSet},
};
use serde_json::{Map, Value};
use tokio::sync::{OnceCell, RwLock};

use super::{AuthError, IdentityVerifier, discovery};
use crate::{authz::ClaimSet, config::OidcConfig};

/// Unknown key IDs trigger a refetch at most this often.
const MIN_KID_MISS_REFRESH: Duration = Duration::from_secs(30);

/// Cached JWKS with expiration.
struct CachedJwks {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Verifies OIDC tokens and extracts their claims.
pub struct JwtValidator {
    config: OidcConfig,
    http_client: reqwest::Client,
    jwks_url: OnceCell<String>,
    jwks_cache: RwLock<Option<CachedJwks>>,
}

impl JwtValidator {
    /// Create a new validator with a custom HTTP client.
    pub fn with_client(config: OidcConfig, http_client: reqwest::Client) -> Self {
        let jwks_url = match &config.jwks_url {
            Some(url) => OnceCell::new_with(Some(url.clone())),
            None => OnceCell::new(),
        };

        Self {
            config,
            http_client,
            jwks_url,
            jwks_cache: RwLock::new(None),
        }
    }

    pub fn new(config: OidcConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Validate a token and return its full payload.
    pub async fn validate(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode JWT header");
            AuthError::InvalidToken
        })?;

        // Reject "none", HMAC-with-public-key and downgrades before touching keys
        if !self.is_algorithm_allowed(header.alg) {
            tracing::warn!(
                algorithm = ?header.alg,
                allowed = ?self.allowed_algorithms(),
                "JWT algorithm not in allowlist"
            );
            return Err(AuthError::InvalidToken);
        }

        let kid = header.kid.as_ref().ok_or_else(|| {
            tracing::debug!("JWT missing key ID (kid)");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.get_decoding_key(kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.leeway = self.config.leeway_secs;
        let audiences = self.config.audiences();
        if audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&audiences);
        }

        let token_data: TokenData<Map<String, Value>> =
            decode(token, &decoding_key, &validation).map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Check if an algorithm is in the allowlist.
    fn is_algorithm_allowed(&self, alg: Algorithm) -> bool {
        self.config
            .allowed_algorithms
            .iter()
            .any(|allowed| allowed.matches(alg))
    }

    /// Get the list of allowed algorithms (for logging).
    fn allowed_algorithms(&self) -> Vec<Algorithm> {
        self.config
            .allowed_algorithms
            .iter()
            .map(|a| a.to_jwt_algorithm())
            .collect()
    }

    /// The JWKS URL, discovering it from the issuer on first use.
    async fn jwks_url(&self) -> Result<&str, AuthError> {
        self.jwks_url
            .get_or_try_init(|| discovery::fetch_jwks_uri(&self.config.issuer, &self.http_client))
            .await
            .map(String::as_str)
    }

    /// Get a decoding key for the given key ID, fetching JWKS if necessary.
    async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let refresh_duration = Duration::from_secs(self.config.jwks_refresh_secs);
                let age = cached.fetched_at.elapsed();
                if age < refresh_duration {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if age < MIN_KID_MISS_REFRESH {
                        tracing::debug!(kid = kid, "Key ID not in recently fetched JWKS");
                        return Err(AuthError::InvalidToken);
                    }
                }
            }
        }

        // Cache miss, expired, or a key we have not seen yet (rotation)
        self.refresh_jwks().await?;

        let cache = self.jwks_cache.read().await;
        cache
            .as_ref()
            .and_then(|c| c.keys.get(kid).cloned())
            .ok_or_else(|| {
                tracing::warn!(kid = kid, "Key ID not found in JWKS");
                AuthError::InvalidToken
            })
    }

    /// Fetch and cache the JWKS.
    async fn refresh_jwks(&self) -> Result<(), AuthError> {
        let url = self.jwks_url().await?;
        tracing::debug!(url = %url, "Fetching JWKS");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "Failed to fetch JWKS");
            AuthError::Unavailable(format!("Failed to fetch JWKS: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, url = %url, "JWKS endpoint returned error");
            return Err(AuthError::Unavailable(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            AuthError::Unavailable(format!("Failed to parse JWKS: {}", e))
        })?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if let Some(kid) = &jwk.common.key_id {
                match jwk_to_decoding_key(&jwk) {
                    Ok(key) => {
                        keys.insert(kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!(kid = kid, error = %e, "Skipping unusable JWK");
                    }
                }
            }
        }

        tracing::info!(keys_count = keys.len(), "JWKS refreshed");

        let mut cache = self.jwks_cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for JwtValidator {
    async fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        let claims = self.validate(token).await?;
        Ok(ClaimSet::from_token_claims(&claims))
    }
}

/// Convert a JWK to a DecodingKey. Symmetric keys are never accepted.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, String> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| format!("Failed to create RSA decoding key: {}", e)),
        AlgorithmParameters::EllipticCurve(ec) => {
            use jsonwebtoken::jwk::KeyAlgorithm;

            match jwk.common.key_algorithm {
                // ES256 and ES384 are supported EC algorithms; None defaults to ES256
                Some(KeyAlgorithm::ES256) | Some(KeyAlgorithm::ES384) | None => {
                    DecodingKey::from_ec_components(&ec.x, &ec.y)
                        .map_err(|e| format!("Failed to create EC decoding key: {}", e))
                }
                Some(alg) => Err(format!("Unsupported EC algorithm: {alg:?}")),
            }
        }
        AlgorithmParameters::OctetKeyPair(okp) => DecodingKey::from_ed_components(&okp.x)
            .map_err(|e| format!("Failed to create EdDSA decoding key: {}", e)),
        _ => Err("Unsupported JWK key type".to_string()),
    }
}
