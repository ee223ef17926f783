use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use crate::{
    authz::{PolicyError, Rule, RuleDocument},
    models::Repository,
};

/// A validated policy: the rules for every configured repository.
///
/// Repository keys are matched case-insensitively. A repository with no
/// entry has no rules, so every request for it is denied.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    repositories: HashMap<String, Arc<[Rule]>>,
}

impl RuleBook {
    /// Parse a YAML document mapping `owner/name` to a list of rules.
    ///
    /// ```yaml
    /// octo-org/deploy-target:
    ///   - claims:
    ///       repository: octo-org/app
    ///       ref: [refs/heads/main, refs/tags/v*]
    ///     permissions:
    ///       contents: write
    /// ```
    pub fn from_yaml(contents: &str) -> Result<Self, PolicyError> {
        // A file of only comments has no YAML document at all
        if contents
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'))
        {
            return Ok(Self::default());
        }

        let documents: Option<BTreeMap<String, Vec<RuleDocument>>> =
            serde_yaml::from_str(contents).map_err(|e| PolicyError::Parse(e.to_string()))?;

        Self::from_documents(&documents.unwrap_or_default())
    }

    /// Validate rule documents into a rule book.
    ///
    /// Fails on the first invalid repository key or rule; nothing is kept
    /// from a document set that fails.
    pub fn from_documents(documents: &BTreeMap<String, Vec<RuleDocument>>) -> Result<Self, PolicyError> {
        let mut grouped: HashMap<String, Vec<Rule>> = HashMap::new();

        for (key, docs) in documents {
            let repository =
                Repository::parse(key).map_err(|e| PolicyError::InvalidRepository(e.0))?;

            let rules = grouped.entry(repository.key()).or_default();
            for (index, doc) in docs.iter().enumerate() {
                let rule = Rule::try_from(doc).map_err(|e| PolicyError::InRule {
                    repository: key.clone(),
                    index,
                    source: Box::new(e),
                })?;

                if rule.is_unconstrained() {
                    tracing::warn!(
                        repository = %key,
                        rule = %rule.label(index),
                        permissions = %rule.permissions(),
                        "Rule has no claim constraints and matches any verified token"
                    );
                }
                rules.push(rule);
            }
        }

        Ok(Self {
            repositories: grouped
                .into_iter()
                .map(|(key, rules)| (key, Arc::from(rules)))
                .collect(),
        })
    }

    /// The rules for `repository`; empty when it is not configured.
    pub fn rules_for(&self, repository: &Repository) -> Arc<[Rule]> {
        self.repositories
            .get(&repository.key())
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Number of configured repositories.
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    /// Total number of rules across all repositories.
    pub fn rule_count(&self) -> usize {
        self.repositories.values().map(|rules| rules.len()).sum()
    }

    /// Configured repository keys with their rule counts, sorted by key.
    pub fn summary(&self) -> Vec<(&str, usize)> {
        let mut summary: Vec<_> = self
            .repositories
            .iter()
            .map(|(key, rules)| (key.as_str(), rules.len()))
            .collect();
        summary.sort_unstable();
        summary
    }
}
