//! OIDC discovery: finds the JWKS URL an issuer publishes.

use url::Url;

use super::AuthError;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// The one field of the discovery document we use.
#[derive(serde::Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// Discovery document URL for `issuer`.
pub fn discovery_url(issuer: &str) -> String {
    if issuer.ends_with(DISCOVERY_PATH) {
        issuer.to_string()
    } else {
        format!("{}{DISCOVERY_PATH}", issuer.trim_end_matches('/'))
    }
}

/// Fetch the `jwks_uri` from the issuer's discovery document.
pub async fn fetch_jwks_uri(
    issuer: &str,
    http_client: &reqwest::Client,
) -> Result<String, AuthError> {
    let url = discovery_url(issuer);

    tracing::debug!(url = %url, "Fetching OIDC discovery for JWKS URI");

    let response = http_client
        .get(&url)
        .send()
        .await
        .map_err(|e| AuthError::Unavailable(format!("Failed to fetch OIDC discovery: {e}")))?;

    if !response.status().is_success() {
        return Err(AuthError::Unavailable(format!(
            "OIDC discovery returned {}",
            response.status()
        )));
    }

    let doc: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| AuthError::Unavailable(format!("Failed to parse OIDC discovery: {e}")))?;

    let jwks_uri = Url::parse(&doc.jwks_uri)
        .map_err(|e| AuthError::Unavailable(format!("Discovered JWKS URI is invalid: {e}")))?;
    if !matches!(jwks_uri.scheme(), "https" | "http") {
        return Err(AuthError::Unavailable(format!(
            "Discovered JWKS URI has unsupported scheme '{}'",
            jwks_uri.scheme()
        )));
    }

    Ok(doc.jwks_uri)
}
