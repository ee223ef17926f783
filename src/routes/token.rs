//! Token exchange endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use super::ApiError;
use crate::{
    AppState,
    services::{TokenRequest, TokenResponse},
};

/// Exchange an OIDC token for a repository-scoped GitHub token.
///
/// `POST /token` with `{"oidc_token", "repository"?, "permissions"}`.
#[tracing::instrument(name = "token.issue", skip_all)]
pub async fn issue_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state.tokens.dispense(request).await?;
    Ok(Json(response))
}
