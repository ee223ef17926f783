//! Request ID middleware for log correlation.
//!
//! Every request runs inside a span carrying its request ID, the ID is
//! echoed in the `X-Request-Id` response header, and JSON error bodies get
//! it in `error.request_id` so callers can quote it when reporting denials.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Caller-supplied IDs longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Extension containing the request ID for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied ID if it is short, printable ASCII.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let id = value.to_str().ok()?;
        let acceptable = !id.is_empty()
            && id.len() <= MAX_REQUEST_ID_LEN
            && id.bytes().all(|b| b.is_ascii_graphic());
        acceptable.then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware that assigns a request ID and wraps the request in a span.
///
/// An incoming `X-Request-Id` is kept when it is well formed; otherwise a
/// new UUID is generated.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(RequestId::from_header)
        .unwrap_or_default();

    req.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let response = next.run(req).await;
        let mut response = inject_request_id_into_error(response, &request_id).await;

        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        tracing::debug!(status = response.status().as_u16(), "Request finished");

        response
    }
    .instrument(span)
    .await
}

/// Add `request_id` to the `error` object of JSON error responses.
///
/// Success responses, non-JSON bodies and JSON without an `error` object
/// pass through unchanged.
async fn inject_request_id_into_error(response: Response, request_id: &RequestId) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read error response body");
            parts.headers.remove(http::header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let Ok(mut json) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    let Some(error) = json.get_mut("error").and_then(|e| e.as_object_mut()) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    error.insert(
        "request_id".to_string(),
        serde_json::Value::String(request_id.as_str().to_string()),
    );

    match serde_json::to_vec(&json) {
        Ok(modified) => {
            parts.headers.remove(http::header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(modified))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::ErrorResponse;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { Json(serde_json::json!({"data": "test"})) }))
            .route(
                "/denied",
                get(|| async {
                    (
                        StatusCode::FORBIDDEN,
                        Json(ErrorResponse::with_type("permission_error", "not_authorized", "no")),
                    )
                }),
            )
            .route(
                "/text",
                get(|| async { (StatusCode::BAD_REQUEST, "Bad Request") }),
            )
            .route(
                "/other-json",
                get(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(serde_json::json!({"status": "error"})),
                    )
                }),
            )
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    async fn call(uri: &str, request_id: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = request_id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_request_id_generation() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_request_id_from_header() {
        let ok = HeaderValue::from_static("build-1234");
        assert_eq!(RequestId::from_header(&ok).unwrap().as_str(), "build-1234");

        let spaced = HeaderValue::from_static("has space");
        assert!(RequestId::from_header(&spaced).is_none());

        let long = HeaderValue::from_str(&"x".repeat(MAX_REQUEST_ID_LEN + 1)).unwrap();
        assert!(RequestId::from_header(&long).is_none());
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = call("/ok", None).await;
        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_replaces_malformed_request_id() {
        let response = call("/ok", Some("a b")).await;
        assert_ne!(response.headers()[REQUEST_ID_HEADER], "a b");
    }

    #[tokio::test]
    async fn test_injects_into_error_body() {
        let response = call("/denied", Some("req-123")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");

        let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
        assert_eq!(json["error"]["request_id"], "req-123");
        assert_eq!(json["error"]["type"], "permission_error");
    }

    #[tokio::test]
    async fn test_success_body_untouched() {
        let response = call("/ok", Some("req-123")).await;
        let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["data"], "test");
    }

    #[tokio::test]
    async fn test_non_json_error_untouched() {
        let response = call("/text", Some("req-123")).await;
        assert_eq!(body(response).await, b"Bad Request");
    }

    #[tokio::test]
    async fn test_json_without_error_object_untouched() {
        let response = call("/other-json", Some("req-123")).await;
        let json: serde_json::Value = serde_json::from_slice(&body(response).await).unwrap();
        assert!(json.get("request_id").is_none());
        assert_eq!(json["status"], "error");
    }
}
