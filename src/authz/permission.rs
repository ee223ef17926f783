//! Permission grants and access levels.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::PolicyError;

/// How much a permission may be exercised.
///
/// The order is fixed and total: `Read < Write < Admin`. All "at least" and
/// "at most" comparisons use this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 3] = [AccessLevel::Read, AccessLevel::Write, AccessLevel::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Admin => "admin",
        }
    }
}

impl FromStr for AccessLevel {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| PolicyError::InvalidAccessLevel(s.to_string()))
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Permission name to access level.
///
/// A name that is absent is not authorized at all; absence never means
/// "read-only".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionGrant(BTreeMap<String, AccessLevel>);

impl PermissionGrant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, permission: impl Into<String>, level: AccessLevel) -> Self {
        self.0.insert(permission.into(), level);
        self
    }

    /// Raise `permission` to at least `level`. Never lowers an existing level.
    pub fn raise(&mut self, permission: &str, level: AccessLevel) {
        match self.0.get_mut(permission) {
            Some(existing) => *existing = (*existing).max(level),
            None => {
                self.0.insert(permission.to_string(), level);
            }
        }
    }

    pub fn get(&self, permission: &str) -> Option<AccessLevel> {
        self.0.get(permission).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AccessLevel)> {
        self.0.iter().map(|(name, level)| (name.as_str(), *level))
    }

    /// Parse a grant from name/level strings, as found in rule documents.
    pub fn parse<'a, I>(entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut grant = Self::new();
        for (name, level) in entries {
            if name.trim().is_empty() {
                return Err(PolicyError::EmptyPermissionName);
            }
            grant.0.insert(name.to_string(), level.parse()?);
        }
        Ok(grant)
    }
}

impl FromIterator<(String, AccessLevel)> for PermissionGrant {
    fn from_iter<T: IntoIterator<Item = (String, AccessLevel)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PermissionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, level)| format!("{name}:{level}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Merge grants by taking, per permission name, the highest level any grant
/// gives it.
///
/// Names mentioned by no grant are absent from the result. The merge is
/// commutative, associative and idempotent.
pub fn merge_permissions<'a, I>(grants: I) -> PermissionGrant
where
    I: IntoIterator<Item = &'a PermissionGrant>,
{
    let mut merged = PermissionGrant::new();
    for grant in grants {
        for (name, level) in grant.iter() {
            merged.raise(name, level);
        }
    }
    merged
}
