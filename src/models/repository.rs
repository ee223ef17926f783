use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A repository name that is not `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository '{0}': must use 'owner/name' format")]
pub struct InvalidRepository(pub String);

/// A GitHub repository, identified as `owner/name`.
///
/// GitHub treats owner and repository names case-insensitively; [`key`]
/// gives the normalized form used for rule lookups.
///
/// [`key`]: Repository::key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    owner: String,
    name: String,
}

impl Repository {
    pub fn parse(full_name: &str) -> Result<Self, InvalidRepository> {
        let invalid = || InvalidRepository(full_name.to_string());

        let (owner, name) = full_name.split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `owner/name` as given.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Lowercased `owner/name`.
    pub fn key(&self) -> String {
        self.full_name().to_ascii_lowercase()
    }

    /// Whether `owner` names this repository's owner, ignoring ASCII case.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner)
    }
}

impl FromStr for Repository {
    type Err = InvalidRepository;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl Serialize for Repository {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Repository {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_parse() {
        let repo = Repository::parse("octo-org/deploy.target_2").unwrap();
        assert_eq!(repo.owner(), "octo-org");
        assert_eq!(repo.name(), "deploy.target_2");
        assert_eq!(repo.full_name(), "octo-org/deploy.target_2");
        assert_eq!(repo.to_string(), "octo-org/deploy.target_2");
    }

    #[rstest]
    #[case("")]
    #[case("octo-org")]
    #[case("/repo")]
    #[case("owner/")]
    #[case("a/b/c")]
    #[case("owner/re po")]
    #[case("owner/repo\n")]
    fn test_parse_rejects(#[case] input: &str) {
        assert_eq!(
            Repository::parse(input),
            Err(InvalidRepository(input.to_string()))
        );
    }

    #[test]
    fn test_key_and_owner_are_case_insensitive() {
        let repo = Repository::parse("Octo-Org/App").unwrap();
        assert_eq!(repo.key(), "octo-org/app");
        assert!(repo.is_owned_by("octo-org"));
        assert!(repo.is_owned_by("OCTO-ORG"));
        assert!(!repo.is_owned_by("octo"));
    }

    #[test]
    fn test_serde() {
        let repo: Repository = serde_json::from_str("\"octo-org/app\"").unwrap();
        assert_eq!(repo, Repository::parse("octo-org/app").unwrap());
        assert_eq!(serde_json::to_string(&repo).unwrap(), "\"octo-org/app\"");
        assert!(serde_json::from_str::<Repository>("\"nope\"").is_err());
    }
}
