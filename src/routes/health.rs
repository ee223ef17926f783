//! Health check endpoints for Kubernetes probes and monitoring.

use axum::{Json, extract::State, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, rules::PolicyStats};

/// Detailed health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy"
    pub status: String,
    /// Service version
    pub version: String,
    /// Size of the authorization policy currently in effect
    pub policy: PolicyStats,
}

/// Full health check with the loaded policy size.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy: state.tokens.rules().stats(),
    };

    (StatusCode::OK, Json(health))
}

/// Kubernetes liveness probe.
///
/// Returns 200 if the service is running.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Kubernetes readiness probe.
///
/// The policy and GitHub App key are loaded before the listener binds, so a
/// running server is ready.
#[tracing::instrument(name = "health.readiness")]
pub async fn readiness() -> impl IntoResponse {
    StatusCode::OK
}
