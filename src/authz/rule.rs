//! Authorization rules and rule matching.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ClaimField, ClaimSet, PermissionGrant, PolicyError, Wildcard};
use crate::config::OneOrMany;

/// A rule as written in configuration, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    /// Optional label used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Claim name to one or more wildcard patterns.
    #[serde(default, alias = "fields")]
    pub claims: BTreeMap<String, OneOrMany<String>>,

    /// Permission name to access level (`read`, `write` or `admin`).
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
}

/// A validated authorization rule.
///
/// A claim set satisfies the rule when, for every constrained field, the
/// claim value matches at least one of that field's wildcards. A rule with
/// no constraints matches every claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: Option<String>,
    constraints: BTreeMap<ClaimField, Vec<Wildcard>>,
    permissions: PermissionGrant,
}

impl Rule {
    pub fn new(permissions: PermissionGrant) -> Self {
        Self {
            name: None,
            constraints: BTreeMap::new(),
            permissions,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a constraint; patterns for a field already constrained are appended.
    pub fn with_constraint(mut self, field: ClaimField, wildcards: Vec<Wildcard>) -> Self {
        self.constraints.entry(field).or_default().extend(wildcards);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn permissions(&self) -> &PermissionGrant {
        &self.permissions
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ClaimField, &[Wildcard])> {
        self.constraints
            .iter()
            .map(|(field, wildcards)| (*field, wildcards.as_slice()))
    }

    /// True when the rule constrains nothing and so matches any identity.
    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, claims: &ClaimSet) -> bool {
        self.constraints.iter().all(|(field, wildcards)| {
            let value = claims.get(*field);
            wildcards.iter().any(|w| w.matches(value))
        })
    }

    /// A label for logs: the rule name, or its position in its rule list.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

impl TryFrom<&RuleDocument> for Rule {
    type Error = PolicyError;

    fn try_from(doc: &RuleDocument) -> Result<Self, Self::Error> {
        let mut constraints = BTreeMap::new();
        for (name, patterns) in &doc.claims {
            let field: ClaimField = name.parse()?;
            let patterns = patterns.to_vec();
            if patterns.is_empty() {
                return Err(PolicyError::EmptyPatternList {
                    field: name.clone(),
                });
            }
            constraints.insert(field, Wildcard::compile_all(&patterns)?);
        }

        let permissions = PermissionGrant::parse(
            doc.permissions
                .iter()
                .map(|(name, level)| (name.as_str(), level.as_str())),
        )?;

        Ok(Self {
            name: doc.name.clone(),
            constraints,
            permissions,
        })
    }
}

/// Rules satisfied by `claims`, in their original order.
pub fn matching_rules<'a>(rules: &'a [Rule], claims: &ClaimSet) -> Vec<&'a Rule> {
    rules.iter().filter(|rule| rule.matches(claims)).collect()
}

/// True if at least one rule is satisfied. An empty rule list never matches.
pub fn any_matches(rules: &[Rule], claims: &ClaimSet) -> bool {
    rules.iter().any(|rule| rule.matches(claims))
}
