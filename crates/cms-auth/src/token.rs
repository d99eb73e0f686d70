//! OAuth token endpoint grants
//!
//! Handles the three token endpoint interactions:
//! 1. Authorization code exchange (completion of the browser redirect flow)
//! 2. Refresh token grant (recovery after a 401)
//! 3. Client credentials grant (fallback when no user token can be obtained)
//!
//! All three POST a form-encoded body to `{API}/oauth/token` with the client
//! ID and secret. None of them touch the token store; persisting the result
//! is the caller's job.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::constants::TOKEN_PATH;
use crate::error::{Error, Result, check_status};

/// Token endpoint response.
///
/// The client credentials grant returns no refresh token, and some backends
/// omit `expires_in`, so both are optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Wire shape before validation; `access_token` may be missing or empty.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl RawTokenResponse {
    fn into_token(self, grant: &str) -> Result<TokenResponse> {
        match self.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Ok(TokenResponse {
                access_token,
                refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
                expires_in: self.expires_in,
                token_type: self.token_type,
            }),
            None => Err(Error::TokenExchange(format!(
                "{grant} response did not contain access token"
            ))),
        }
    }
}

/// POST a grant to the token endpoint and validate the response.
async fn request_token(
    client: &reqwest::Client,
    config: &AuthConfig,
    grant: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    debug!(grant, "requesting token");
    let response = client
        .post(config.url(TOKEN_PATH))
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("{grant} request failed: {e}")))?;

    check_status(response)
        .await?
        .json::<RawTokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid {grant} response: {e}")))?
        .into_token(grant)
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
) -> Result<TokenResponse> {
    let redirect_uri = config.redirect_uri();
    request_token(
        client,
        config,
        "authorization_code",
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ],
    )
    .await
}

/// Obtain a new access token with a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &AuthConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    request_token(
        client,
        config,
        "refresh_token",
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
        ],
    )
    .await
}

/// Obtain an application token with no user context.
pub async fn client_credentials(
    client: &reqwest::Client,
    config: &AuthConfig,
) -> Result<TokenResponse> {
    request_token(
        client,
        config,
        "client_credentials",
        &[
            ("grant_type", "client_credentials"),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
        ],
    )
    .await
}
