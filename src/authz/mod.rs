//! Claims-based authorization for credential requests.
//!
//! A policy is a list of [`Rule`]s per repository. Each rule constrains
//! fields of a verified identity token with [`Wildcard`] patterns and carries
//! a [`PermissionGrant`] ceiling.
//!
//! The authorization flow:
//! 1. Select the rules whose constraints the [`ClaimSet`] satisfies
//! 2. Merge their grants, keeping the highest level per permission
//! 3. Approve the request only if every requested permission fits under the
//!    merged ceiling

mod claims;
mod engine;
mod error;
mod permission;
mod rule;
mod wildcard;

pub use claims::{ClaimField, ClaimSet};
pub use engine::authorize;
pub use error::{AuthzError, PolicyError, UnknownField};
pub use permission::{AccessLevel, PermissionGrant, merge_permissions};
pub use rule::{Rule, RuleDocument, any_matches, matching_rules};
pub use wildcard::Wildcard;
