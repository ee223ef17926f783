use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{authz::AuthzError, services::DispenseError};

/// Returned for every denial so callers cannot probe the policy.
pub const DENIED_MESSAGE: &str = "not authorized to request these permissions for this repository";

/// Error response body.
///
/// Format: `{"error": {"type": "...", "message": "...", "param": ..., "code": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error type classification (e.g., "invalid_request_error", "permission_error")
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    /// Request field that caused the error, if any
    pub param: Option<String>,
    pub code: Option<String>,
    /// Filled in by the request ID middleware.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with an explicit error type.
    ///
    /// Error types in use:
    /// - "invalid_request_error" - malformed body or nothing requested
    /// - "authentication_error" - identity token rejected
    /// - "permission_error" - policy denied the request
    /// - "server_error" - rule source or GitHub failure
    pub fn with_type(
        error_type: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorInfo {
                error_type: error_type.into(),
                message: message.into(),
                param: None,
                code: Some(code.into()),
                request_id: None,
            },
        }
    }
}

/// Error returned from route handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_type: &'static str,
    code: &'static str,
    message: String,
    param: Option<&'static str>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error_type: &'static str,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error_type,
            code,
            message: message.into(),
            param: None,
        }
    }

    fn with_param(mut self, param: &'static str) -> Self {
        self.param = Some(param);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = ErrorResponse::with_type(self.error_type, self.code, self.message);
        body.error.param = self.param.map(str::to_string);
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "invalid_request_error",
                "body_too_large",
                "Request body is too large",
            );
        }
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "invalid_body",
            rejection.body_text(),
        )
    }
}

impl From<DispenseError> for ApiError {
    fn from(err: DispenseError) -> Self {
        match err {
            DispenseError::Auth(e) => {
                Self::new(e.status(), "authentication_error", e.code(), e.public_message())
            }
            DispenseError::BadRequest(message) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                message,
            )
            .with_param("repository"),
            DispenseError::Denied(AuthzError::NoPermissionsRequested) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "no_permissions_requested",
                "At least one permission must be requested",
            )
            .with_param("permissions"),
            DispenseError::Denied(_) | DispenseError::OwnerMismatch { .. } => Self::new(
                StatusCode::FORBIDDEN,
                "permission_error",
                "not_authorized",
                DENIED_MESSAGE,
            ),
            DispenseError::Lookup(e) => {
                tracing::error!(error = %e, "Rule lookup failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "rule_lookup_failed",
                    "Authorization rules are unavailable",
                )
            }
            DispenseError::Mint(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "server_error",
                "token_mint_failed",
                "Failed to obtain a token from GitHub",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use rstest::rstest;

    use super::*;
    use crate::{
        auth::AuthError,
        authz::AccessLevel,
        github::MintError,
        models::Repository,
        rules::LookupError,
    };

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case::no_rule(DispenseError::Denied(AuthzError::NotAuthorized))]
    #[case::not_allowed(DispenseError::Denied(AuthzError::PermissionNotAllowed("issues".into())))]
    #[case::ceiling(DispenseError::Denied(AuthzError::PermissionCeilingExceeded {
        permission: "contents".into(),
        requested: AccessLevel::Write,
        max: AccessLevel::Read,
    }))]
    #[case::owner(DispenseError::OwnerMismatch {
        owner: "octo-org".into(),
        repository: Repository::parse("evil-org/app").unwrap(),
    })]
    #[tokio::test]
    async fn test_denials_are_uniform(#[case] err: DispenseError) {
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "permission_error");
        assert_eq!(json["error"]["code"], "not_authorized");
        assert_eq!(json["error"]["message"], DENIED_MESSAGE);
    }

    #[rstest]
    #[case::empty(DispenseError::Denied(AuthzError::NoPermissionsRequested), StatusCode::BAD_REQUEST)]
    #[case::bad_request(DispenseError::BadRequest("no repository".into()), StatusCode::BAD_REQUEST)]
    #[case::auth(DispenseError::Auth(AuthError::ExpiredToken), StatusCode::UNAUTHORIZED)]
    #[case::idp_down(DispenseError::Auth(AuthError::Unavailable("x".into())), StatusCode::SERVICE_UNAVAILABLE)]
    #[case::lookup(DispenseError::Lookup(LookupError::Unavailable("x".into())), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case::mint(DispenseError::Mint(MintError::Http("x".into())), StatusCode::BAD_GATEWAY)]
    fn test_status_mapping(#[case] err: DispenseError, #[case] expected: StatusCode) {
        assert_eq!(ApiError::from(err).status(), expected);
    }

    #[tokio::test]
    async fn test_no_permissions_names_param() {
        let response =
            ApiError::from(DispenseError::Denied(AuthzError::NoPermissionsRequested)).into_response();
        let json = body_json(response).await;
        assert_eq!(json["error"]["param"], "permissions");
        assert_eq!(json["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_mint_error_hides_details() {
        let err = DispenseError::Mint(MintError::Api {
            status: 422,
            message: "installation 99 lacks administration".into(),
        });
        let json = body_json(ApiError::from(err).into_response()).await;
        assert!(!json.to_string().contains("installation 99"));
    }
}
