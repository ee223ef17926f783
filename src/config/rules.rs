use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::authz::RuleDocument;

/// Where the authorization policy comes from.
///
/// ```toml
/// [rules]
/// type = "file"
/// path = "/etc/token-dispenser/rules.yaml"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RulesConfig {
    /// Rules read from a YAML file, re-read on SIGHUP.
    File(FileRulesConfig),

    /// Rules written directly in the configuration file.
    Inline(InlineRulesConfig),
}

impl RulesConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RulesConfig::File(c) => c.validate(),
            RulesConfig::Inline(c) => c.validate(),
        }
    }
}

/// File-backed rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct FileRulesConfig {
    /// Path to the YAML rules file.
    pub path: PathBuf,
}

impl FileRulesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("rules.path cannot be empty".into()));
        }
        Ok(())
    }
}

/// Rules embedded in the configuration file.
///
/// ```toml
/// [rules]
/// type = "inline"
///
/// [[rules.repositories."octo-org/deploy-target"]]
/// claims = { repository = "octo-org/app", ref = "refs/heads/main" }
/// permissions = { contents = "write" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct InlineRulesConfig {
    /// Repository (`owner/name`) to its rules.
    #[serde(default)]
    pub repositories: BTreeMap<String, Vec<RuleDocument>>,
}

impl InlineRulesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.repositories.is_empty() {
            tracing::warn!("Inline rules configure no repositories; every request will be denied");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_rules() {
        let config: RulesConfig = toml::from_str(
            r#"
            type = "file"
            path = "rules.yaml"
            "#,
        )
        .unwrap();
        assert!(matches!(config, RulesConfig::File(ref c) if c.path == PathBuf::from("rules.yaml")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inline_rules() {
        let config: RulesConfig = toml::from_str(
            r#"
            type = "inline"

            [[repositories."octo-org/deploy-target"]]
            name = "release"
            claims = { repository = "octo-org/app", ref = ["refs/heads/main", "refs/tags/v*"] }
            permissions = { contents = "write" }
            "#,
        )
        .unwrap();

        let RulesConfig::Inline(inline) = config else {
            panic!("expected inline rules");
        };
        let rules = &inline.repositories["octo-org/deploy-target"];
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name.as_deref(), Some("release"));
        assert_eq!(rules[0].claims["ref"].to_vec().len(), 2);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(toml::from_str::<RulesConfig>(r#"type = "database""#).is_err());
    }
}
