//! Authorization errors.

use thiserror::Error;

use super::AccessLevel;

/// A claim field name that is not part of the claim registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown claim field '{0}'")]
pub struct UnknownField(pub String);

/// Errors raised while turning rule documents into an evaluable policy.
///
/// Every variant is a configuration error: the service refuses to start (or
/// keeps its previous policy on reload) rather than run with part of a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    UnknownField(#[from] UnknownField),

    #[error("claim field '{field}' has no patterns")]
    EmptyPatternList { field: String },

    #[error("invalid wildcard pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid access level '{0}' (expected read, write or admin)")]
    InvalidAccessLevel(String),

    #[error("permission name cannot be empty")]
    EmptyPermissionName,

    #[error("invalid repository '{0}': must use 'owner/name' format")]
    InvalidRepository(String),

    #[error("rule {index} for repository '{repository}': {source}")]
    InRule {
        repository: String,
        index: usize,
        #[source]
        source: Box<PolicyError>,
    },

    #[error("failed to parse rules: {0}")]
    Parse(String),

    #[error("failed to read rules file {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Authorization decision failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("no permissions requested")]
    NoPermissionsRequested,

    #[error("no rule matches the presented claims")]
    NotAuthorized,

    #[error("permission '{0}' is not granted by any matching rule")]
    PermissionNotAllowed(String),

    #[error("permission '{permission}' requested at '{requested}' exceeds ceiling '{max}'")]
    PermissionCeilingExceeded {
        permission: String,
        requested: AccessLevel,
        max: AccessLevel,
    },
}

impl AuthzError {
    /// Short machine-readable reason, used for logging.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthzError::NoPermissionsRequested => "no_permissions_requested",
            AuthzError::NotAuthorized => "no_matching_rule",
            AuthzError::PermissionNotAllowed(_) => "permission_not_allowed",
            AuthzError::PermissionCeilingExceeded { .. } => "permission_ceiling_exceeded",
        }
    }
}
