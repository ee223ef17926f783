//! Exchanges CI OIDC identity tokens for short-lived, repository-scoped
//! GitHub App installation tokens.
//!
//! A request carries an identity token and the permissions it wants. The
//! token is verified against the issuer's JWKS, its claims are evaluated
//! against the target repository's rules, and only if every requested
//! permission fits under the merged grant of the matching rules is a token
//! minted for exactly what was asked.

pub mod auth;
pub mod authz;
pub mod config;
pub mod github;
pub mod middleware;
pub mod models;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;
pub mod rules;
pub mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::JwtValidator,
    authz::PolicyError,
    config::{ConfigError, DispenserConfig, ServerConfig},
    github::GitHubAppClient,
    services::TokenService,
};

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub tokens: TokenService,
}

/// Errors that stop the dispenser from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid authorization rules: {0}")]
    Policy(#[from] PolicyError),
}

/// Wire up the verifier, rule source and GitHub client from configuration.
pub async fn build_state(config: &DispenserConfig) -> Result<AppState, StartupError> {
    let minter = GitHubAppClient::from_config(&config.github)?;
    let (rules, book) = rules::from_config(&config.rules).await?;
    let verifier = JwtValidator::new(config.oidc.clone());

    tracing::info!(
        issuer = %config.oidc.issuer,
        app_id = config.github.app_id,
        repositories = book.repository_count(),
        rules = book.rule_count(),
        "Token dispenser configured"
    );

    Ok(AppState {
        tokens: TokenService::new(Arc::new(verifier), rules, Arc::new(minter)),
    })
}

/// Build the HTTP application.
pub fn build_app(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/token", post(routes::token::issue_token))
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .with_state(state)
}
