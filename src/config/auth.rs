use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Issuer of GitHub Actions OIDC tokens.
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Identity token verification settings.
///
/// ```toml
/// [oidc]
/// issuer = "https://token.actions.githubusercontent.com"
/// audience = "https://github.com/octo-org"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
    /// Expected issuer (iss claim).
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Expected audience (aud claim). Can be a single value or a list.
    /// When omitted the audience is not checked.
    #[serde(default)]
    pub audience: Option<OneOrMany<String>>,

    /// JWKS URL for fetching public keys. Discovered from the issuer's
    /// `/.well-known/openid-configuration` when omitted.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// How often to refresh the JWKS in seconds.
    #[serde(default = "default_jwks_refresh")]
    pub jwks_refresh_secs: u64,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// Allowed JWT signing algorithms.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<JwtAlgorithm>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: None,
            jwks_url: None,
            jwks_refresh_secs: default_jwks_refresh(),
            leeway_secs: default_leeway(),
            allowed_algorithms: default_allowed_algorithms(),
        }
    }
}

impl OidcConfig {
    /// Configured audiences; empty when the audience is not checked.
    pub fn audiences(&self) -> Vec<String> {
        self.audience
            .as_ref()
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Validation("OIDC issuer cannot be empty".into()));
        }
        Url::parse(&self.issuer).map_err(|e| {
            ConfigError::Validation(format!("OIDC issuer '{}' is not a URL: {e}", self.issuer))
        })?;
        if let Some(jwks_url) = &self.jwks_url {
            Url::parse(jwks_url).map_err(|e| {
                ConfigError::Validation(format!("JWKS URL '{jwks_url}' is not a URL: {e}"))
            })?;
        }
        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "At least one JWT algorithm must be allowed".into(),
            ));
        }
        for alg in &self.allowed_algorithms {
            if alg.is_symmetric() {
                return Err(ConfigError::Validation(format!(
                    "JWT algorithm {alg:?} cannot be verified against a JWKS"
                )));
            }
        }
        match &self.audience {
            None => tracing::warn!(
                issuer = %self.issuer,
                "No OIDC audience configured; tokens minted for any audience will be accepted"
            ),
            Some(audience) if audience.to_vec().iter().any(String::is_empty) => {
                return Err(ConfigError::Validation(
                    "OIDC audience values cannot be empty".into(),
                ));
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// JWT signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256 (symmetric, rejected)
    HS256,
    /// HMAC with SHA-384 (symmetric, rejected)
    HS384,
    /// HMAC with SHA-512 (symmetric, rejected)
    HS512,
    /// RSA with SHA-256 (GitHub Actions signs with this)
    RS256,
    /// RSA with SHA-384
    RS384,
    /// RSA with SHA-512
    RS512,
    /// ECDSA with P-256 and SHA-256
    ES256,
    /// ECDSA with P-384 and SHA-384
    ES384,
    /// RSA-PSS with SHA-256
    PS256,
    /// RSA-PSS with SHA-384
    PS384,
    /// RSA-PSS with SHA-512
    PS512,
    /// EdDSA (Ed25519)
    EdDSA,
}

impl JwtAlgorithm {
    /// Convert to jsonwebtoken Algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
            JwtAlgorithm::ES384 => jsonwebtoken::Algorithm::ES384,
            JwtAlgorithm::PS256 => jsonwebtoken::Algorithm::PS256,
            JwtAlgorithm::PS384 => jsonwebtoken::Algorithm::PS384,
            JwtAlgorithm::PS512 => jsonwebtoken::Algorithm::PS512,
            JwtAlgorithm::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }

    /// Check if this algorithm matches a jsonwebtoken Algorithm.
    pub fn matches(self, alg: jsonwebtoken::Algorithm) -> bool {
        self.to_jwt_algorithm() == alg
    }

    fn is_symmetric(self) -> bool {
        matches!(
            self,
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512
        )
    }
}

fn default_issuer() -> String {
    GITHUB_ACTIONS_ISSUER.to_string()
}

fn default_allowed_algorithms() -> Vec<JwtAlgorithm> {
    vec![
        JwtAlgorithm::RS256,
        JwtAlgorithm::RS384,
        JwtAlgorithm::RS512,
        JwtAlgorithm::ES256,
        JwtAlgorithm::ES384,
    ]
}

fn default_jwks_refresh() -> u64 {
    3600 // 1 hour
}

fn default_leeway() -> u64 {
    60
}

/// A value that can be either a single item or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}
