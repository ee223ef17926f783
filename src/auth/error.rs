use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::routes::ErrorResponse;

/// Identity token verification failures.
///
/// Messages are safe to return to callers: they never include token text
/// or which specific check failed.
#[derive(Debug)]
pub enum AuthError {
    /// No identity token in the request
    MissingToken,

    /// Malformed token, bad signature, wrong issuer or audience, unknown key
    InvalidToken,

    /// Token has expired
    ExpiredToken,

    /// Signing keys could not be obtained from the issuer
    Unavailable(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::Unavailable(_) => "identity_provider_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message returned to callers. Details of an unavailable identity
    /// provider stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "OIDC token required",
            AuthError::InvalidToken => "Invalid OIDC token",
            AuthError::ExpiredToken => "OIDC token has expired",
            AuthError::Unavailable(_) => "Unable to verify OIDC tokens right now",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body =
            ErrorResponse::with_type("authentication_error", self.code(), self.public_message());
        (self.status(), Json(body)).into_response()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "OIDC token required"),
            AuthError::InvalidToken => write!(f, "Invalid OIDC token"),
            AuthError::ExpiredToken => write!(f, "OIDC token has expired"),
            AuthError::Unavailable(msg) => write!(f, "Identity provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_token_errors_are_401() {
        for error in [
            AuthError::MissingToken,
            AuthError::InvalidToken,
            AuthError::ExpiredToken,
        ] {
            assert_eq!(error.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_unavailable_hides_details() {
        let response =
            AuthError::Unavailable("connect to 10.0.0.5:443 refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], "identity_provider_unavailable");
        assert!(!json.to_string().contains("10.0.0.5"));
    }
}
