use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// GitHub App credentials used to mint installation tokens.
///
/// Exactly one of `private_key_file` and `private_key` must be set.
///
/// ```toml
/// [github]
/// app_id = 123456
/// private_key_file = "/etc/token-dispenser/app.pem"
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    /// Numeric GitHub App ID.
    pub app_id: u64,

    /// Path to the App's PEM-encoded private key.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// The App's PEM-encoded private key. Usually supplied as `${VAR}`.
    #[serde(default)]
    pub private_key: Option<String>,

    /// GitHub REST API base URL. Change for GitHub Enterprise Server.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// User-Agent sent with every API request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for each API request in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("private_key_file", &self.private_key_file)
            .field("private_key", &self.private_key.as_ref().map(|_| "****"))
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GitHubConfig {
    /// Read the App private key from wherever it is configured.
    pub fn load_private_key(&self) -> Result<String, ConfigError> {
        match (&self.private_key, &self.private_key_file) {
            (Some(key), None) => Ok(key.clone()),
            (None, Some(path)) => {
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e, path.clone()))
            }
            _ => Err(ConfigError::Validation(
                "exactly one of github.private_key and github.private_key_file must be set".into(),
            )),
        }
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id == 0 {
            return Err(ConfigError::Validation(
                "github.app_id must be a GitHub App ID".into(),
            ));
        }
        match (&self.private_key, &self.private_key_file) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(ConfigError::Validation(
                    "exactly one of github.private_key and github.private_key_file must be set"
                        .into(),
                ));
            }
            (Some(key), None) if key.trim().is_empty() => {
                return Err(ConfigError::Validation(
                    "github.private_key cannot be empty".into(),
                ));
            }
            _ => {}
        }
        Url::parse(&self.api_url).map_err(|e| {
            ConfigError::Validation(format!(
                "github.api_url '{}' is not a URL: {e}",
                self.api_url
            ))
        })?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "github.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    concat!("token-dispenser/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout() -> u64 {
    30
}
