//! Authorization decisions.
//!
//! Given the rules configured for a repository, a verified claim set and a
//! permission request, [`authorize`] either approves the request exactly as
//! made or refuses it whole. The decision is pure: no I/O, no clocks.

use super::{
    AccessLevel, AuthzError, ClaimSet, PermissionGrant, Rule, any_matches, matching_rules,
    merge_permissions,
};

/// Decide whether `claims` may obtain `requested` under `rules`.
///
/// Checks run in a fixed order, and the first failure is returned:
///
/// 1. An empty request fails with [`AuthzError::NoPermissionsRequested`].
/// 2. If no rule matches the claims, [`AuthzError::NotAuthorized`].
/// 3. The grants of all matching rules are merged (highest level per name).
///    Every requested permission must appear in the merged grant
///    ([`AuthzError::PermissionNotAllowed`]) at a level no higher than the
///    one granted ([`AuthzError::PermissionCeilingExceeded`]).
///
/// On success the request is returned unchanged: callers never receive more
/// than they asked for, even when the matching rules allow more.
pub fn authorize(
    rules: &[Rule],
    claims: &ClaimSet,
    requested: &PermissionGrant,
) -> Result<PermissionGrant, AuthzError> {
    if requested.is_empty() {
        return Err(AuthzError::NoPermissionsRequested);
    }

    if !any_matches(rules, claims) {
        return Err(AuthzError::NotAuthorized);
    }

    let matched = matching_rules(rules, claims);

    tracing::debug!(
        rules = ?matched.iter().map(|rule| rule_label(rules, rule)).collect::<Vec<_>>(),
        "Rules matched claims"
    );

    let allowed = merge_permissions(matched.iter().map(|rule| rule.permissions()));
    check_ceiling(&allowed, requested)?;

    Ok(requested.clone())
}

/// Label of `rule` by its position in `rules`.
fn rule_label(rules: &[Rule], rule: &Rule) -> String {
    let index = rules
        .iter()
        .position(|r| std::ptr::eq(r, rule))
        .unwrap_or_default();
    rule.label(index)
}

/// Verify every requested permission fits under `allowed`.
fn check_ceiling(allowed: &PermissionGrant, requested: &PermissionGrant) -> Result<(), AuthzError> {
    for (permission, level) in requested.iter() {
        let max: AccessLevel = allowed
            .get(permission)
            .ok_or_else(|| AuthzError::PermissionNotAllowed(permission.to_string()))?;

        if level > max {
            return Err(AuthzError::PermissionCeilingExceeded {
                permission: permission.to_string(),
                requested: level,
                max,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{ClaimField, Wildcard};

    fn claims() -> ClaimSet {
        ClaimSet::try_from_pairs([
            ("sub", "repo:example/foo"),
            ("environment", "prod"),
            ("job_workflow_ref", "foobar.yaml"),
        ])
        .unwrap()
    }

    fn rule(sub: &str, environment: &str, permissions: PermissionGrant) -> Rule {
        Rule::new(permissions)
            .with_constraint(ClaimField::Sub, vec![Wildcard::compile(sub).unwrap()])
            .with_constraint(
                ClaimField::Environment,
                vec![Wildcard::compile(environment).unwrap()],
            )
    }

    fn contents(level: AccessLevel) -> PermissionGrant {
        PermissionGrant::new().with("contents", level)
    }

    #[test]
    fn test_authorizes_within_ceiling() {
        let rules = vec![rule("repo:example/foo", "prod", contents(AccessLevel::Write))];

        let granted = authorize(&rules, &claims(), &contents(AccessLevel::Read)).unwrap();
        assert_eq!(granted, contents(AccessLevel::Read));

        let granted = authorize(&rules, &claims(), &contents(AccessLevel::Write)).unwrap();
        assert_eq!(granted, contents(AccessLevel::Write));
    }

    #[test]
    fn test_rejects_level_above_ceiling() {
        let rules = vec![rule("repo:example/foo", "prod", contents(AccessLevel::Write))];

        let err = authorize(&rules, &claims(), &contents(AccessLevel::Admin)).unwrap_err();
        assert_eq!(
            err,
            AuthzError::PermissionCeilingExceeded {
                permission: "contents".to_string(),
                requested: AccessLevel::Admin,
                max: AccessLevel::Write,
            }
        );
    }

    #[test]
    fn test_ceiling_is_merged_across_matching_rules() {
        let rules = vec![
            rule("repo:example/*", "*", contents(AccessLevel::Read)),
            rule("repo:example/foo", "prod", contents(AccessLevel::Admin)),
            rule("repo:other/*", "*", PermissionGrant::new().with("issues", AccessLevel::Admin)),
        ];

        let granted = authorize(&rules, &claims(), &contents(AccessLevel::Admin)).unwrap();
        assert_eq!(granted, contents(AccessLevel::Admin));

        // Rules that do not match contribute nothing
        let err = authorize(
            &rules,
            &claims(),
            &PermissionGrant::new().with("issues", AccessLevel::Read),
        )
        .unwrap_err();
        assert_eq!(err, AuthzError::PermissionNotAllowed("issues".to_string()));
    }

    #[test]
    fn test_read_and_write_rules_allow_write_not_admin() {
        let rules = vec![
            rule("repo:example/*", "prod", contents(AccessLevel::Read)),
            rule("repo:example/foo", "*", contents(AccessLevel::Write)),
        ];

        assert_eq!(
            authorize(&rules, &claims(), &contents(AccessLevel::Write)),
            Ok(contents(AccessLevel::Write))
        );
        assert!(matches!(
            authorize(&rules, &claims(), &contents(AccessLevel::Admin)),
            Err(AuthzError::PermissionCeilingExceeded {
                max: AccessLevel::Write,
                ..
            })
        ));
    }

    #[test]
    fn test_rule_label_uses_position_in_rule_list() {
        let rules = vec![
            rule("repo:example/bar", "*", contents(AccessLevel::Read)),
            rule("repo:example/foo", "*", contents(AccessLevel::Read)).with_name("release"),
            rule("repo:example/*", "*", contents(AccessLevel::Read)),
        ];

        let labels: Vec<_> = matching_rules(&rules, &claims())
            .into_iter()
            .map(|r| rule_label(&rules, r))
            .collect();
        assert_eq!(labels, vec!["release", "#2"]);
    }

    #[test]
    fn test_not_authorized_when_no_rule_matches() {
        let rules = vec![
            rule("repo:example/bar", "prod", contents(AccessLevel::Admin)),
            rule("repo:example/foo", "dev", contents(AccessLevel::Admin)),
        ];
        assert_eq!(
            authorize(&rules, &claims(), &contents(AccessLevel::Read)),
            Err(AuthzError::NotAuthorized)
        );
        assert_eq!(
            authorize(&[], &claims(), &contents(AccessLevel::Read)),
            Err(AuthzError::NotAuthorized)
        );
    }

    #[test]
    fn test_empty_request_checked_first() {
        assert_eq!(
            authorize(&[], &claims(), &PermissionGrant::new()),
            Err(AuthzError::NoPermissionsRequested)
        );

        let rules = vec![rule("*", "*", contents(AccessLevel::Admin))];
        assert_eq!(
            authorize(&rules, &claims(), &PermissionGrant::new()),
            Err(AuthzError::NoPermissionsRequested)
        );
    }

    #[test]
    fn test_request_is_all_or_nothing() {
        let rules = vec![rule(
            "repo:example/*",
            "prod",
            contents(AccessLevel::Write).with("issues", AccessLevel::Read),
        )];

        let requested = PermissionGrant::new()
            .with("contents", AccessLevel::Read)
            .with("issues", AccessLevel::Write);
        assert!(matches!(
            authorize(&rules, &claims(), &requested),
            Err(AuthzError::PermissionCeilingExceeded { ref permission, .. }) if permission == "issues"
        ));

        let requested = PermissionGrant::new()
            .with("contents", AccessLevel::Read)
            .with("packages", AccessLevel::Read);
        assert_eq!(
            authorize(&rules, &claims(), &requested),
            Err(AuthzError::PermissionNotAllowed("packages".to_string()))
        );
    }

    #[test]
    fn test_grant_is_never_widened() {
        let rules = vec![rule(
            "*",
            "*",
            PermissionGrant::new()
                .with("contents", AccessLevel::Admin)
                .with("issues", AccessLevel::Admin),
        )];

        let granted = authorize(&rules, &claims(), &contents(AccessLevel::Read)).unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted.get("contents"), Some(AccessLevel::Read));
        assert_eq!(granted.get("issues"), None);
    }

    #[test]
    fn test_unconstrained_rule_authorizes_any_identity() {
        let rules = vec![Rule::new(contents(AccessLevel::Read))];
        assert!(authorize(&rules, &ClaimSet::default(), &contents(AccessLevel::Read)).is_ok());
    }
}
