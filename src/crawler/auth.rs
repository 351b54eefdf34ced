//! Application-only OAuth for the discussion API
//!
//! When a client id and secret are configured, one token is obtained at the
//! start of a run with the `client_credentials` grant and attached to every
//! request as a bearer token.

use crate::config::DiscussionConfig;
use crate::HarvestError;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Requests an application-only access token
///
/// Returns `Ok(None)` when no credentials are configured.
pub async fn fetch_app_token(
    client: &Client,
    config: &DiscussionConfig,
) -> Result<Option<String>, HarvestError> {
    let Some((client_id, client_secret)) = config.credentials() else {
        return Ok(None);
    };

    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("scent-harvest/{}", env!("CARGO_PKG_VERSION")));

    let response = client
        .post(&config.auth_url)
        .basic_auth(client_id, Some(client_secret))
        .header(USER_AGENT, user_agent)
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarvestError::Auth(format!(
            "token endpoint returned HTTP {}",
            status.as_u16()
        )));
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() {
        return Err(HarvestError::Auth(
            "token endpoint returned an empty token".to_string(),
        ));
    }

    tracing::info!(
        "Authenticated with discussion API (token valid for {}s)",
        token.expires_in.unwrap_or(0)
    );

    Ok(Some(token.access_token))
}
