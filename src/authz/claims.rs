//! Claim field registry and verified claim sets.
//!
//! The set of claim names a rule may constrain is closed. Each name maps to
//! exactly one [`ClaimField`], and the mapping from a verified token payload
//! to field values is built once, in [`ClaimSet::from_token_claims`].

use std::{collections::HashMap, fmt, str::FromStr};

use serde_json::{Map, Value};

use super::UnknownField;

macro_rules! claim_fields {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A claim field that rules may constrain.
        ///
        /// These are the string claims GitHub Actions puts in its OIDC tokens.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum ClaimField {
            $($variant,)+
        }

        impl ClaimField {
            /// Every registered field, in declaration order.
            pub const ALL: &'static [ClaimField] = &[$(ClaimField::$variant,)+];

            /// The claim name as it appears in the token and in rule files.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ClaimField::$variant => $name,)+
                }
            }
        }
    };
}

claim_fields! {
    Sub => "sub",
    Iss => "iss",
    Actor => "actor",
    ActorId => "actor_id",
    BaseRef => "base_ref",
    Enterprise => "enterprise",
    EnterpriseId => "enterprise_id",
    Environment => "environment",
    EventName => "event_name",
    HeadRef => "head_ref",
    JobWorkflowRef => "job_workflow_ref",
    JobWorkflowSha => "job_workflow_sha",
    Ref => "ref",
    RefProtected => "ref_protected",
    RefType => "ref_type",
    Repository => "repository",
    RepositoryId => "repository_id",
    RepositoryOwner => "repository_owner",
    RepositoryOwnerId => "repository_owner_id",
    RepositoryVisibility => "repository_visibility",
    RunAttempt => "run_attempt",
    RunId => "run_id",
    RunNumber => "run_number",
    RunnerEnvironment => "runner_environment",
    Sha => "sha",
    Workflow => "workflow",
    WorkflowRef => "workflow_ref",
    WorkflowSha => "workflow_sha",
}

impl FromStr for ClaimField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl fmt::Display for ClaimField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The claims of one verified identity token.
///
/// Every registered field has a value; fields the token did not assert read
/// as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    values: HashMap<ClaimField, String>,
}

impl ClaimSet {
    /// Extract registered fields from a verified token payload.
    ///
    /// Strings are taken as-is; numbers and booleans use their JSON text
    /// (`"run_attempt": 2` reads as `"2"`). Arrays, objects, nulls and
    /// unregistered claims are ignored.
    pub fn from_token_claims(claims: &Map<String, Value>) -> Self {
        let values = ClaimField::ALL
            .iter()
            .filter_map(|field| {
                let value = match claims.get(field.as_str())? {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((*field, value))
            })
            .collect();

        Self { values }
    }

    /// Build a claim set from name/value pairs, rejecting unregistered names.
    pub fn try_from_pairs<'a, I>(pairs: I) -> Result<Self, UnknownField>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values = pairs
            .into_iter()
            .map(|(name, value)| Ok((name.parse::<ClaimField>()?, value.to_string())))
            .collect::<Result<_, UnknownField>>()?;

        Ok(Self { values })
    }

    /// Value of a registered field.
    pub fn get(&self, field: ClaimField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Value of a field by name; fails for names outside the registry.
    pub fn get_value(&self, name: &str) -> Result<&str, UnknownField> {
        Ok(self.get(name.parse()?))
    }
}

impl FromIterator<(ClaimField, String)> for ClaimSet {
    fn from_iter<T: IntoIterator<Item = (ClaimField, String)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
