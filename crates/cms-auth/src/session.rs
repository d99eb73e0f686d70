//! Session endpoints (cookie-less login, logout, user profile)
//!
//! Login returns the backend's user data, which carries the CSRF token
//! required on state-mutating requests and the logout token required by the
//! logout endpoint.

use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::config::AuthConfig;
use crate::constants::{CSRF_HEADER, LOGIN_PATH, LOGOUT_PATH, USER_INFO_PATH};
use crate::error::{Error, Result, check_status};

#[derive(Serialize)]
struct LoginRequest<'a> {
    name: &'a str,
    pass: &'a str,
}

/// POST credentials to the session login endpoint and return the raw user data.
pub async fn login(
    client: &reqwest::Client,
    config: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<serde_json::Value> {
    let response = client
        .post(config.url(LOGIN_PATH))
        .json(&LoginRequest {
            name: username,
            pass: password,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    check_status(response)
        .await?
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::CredentialParse(format!("invalid login response: {e}")))
}

/// Build the logout URL with `_format=json` and the logout token.
pub fn logout_url(config: &AuthConfig, logout_token: &str) -> Result<Url> {
    let mut url = Url::parse(&config.url(LOGOUT_PATH))
        .map_err(|e| Error::InvalidUrl(format!("logout endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("_format", "json")
        .append_pair("token", logout_token);
    Ok(url)
}

/// End the server-side session.
pub async fn logout(
    client: &reqwest::Client,
    config: &AuthConfig,
    logout_token: &str,
    csrf_token: &str,
) -> Result<()> {
    let url = logout_url(config, logout_token)?;
    let response = client
        .get(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(CSRF_HEADER, csrf_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    check_status(response).await?;
    debug!("server-side logout completed");
    Ok(())
}

/// Fetch the profile of the user an access token belongs to.
pub async fn fetch_user(
    client: &reqwest::Client,
    config: &AuthConfig,
    access_token: &str,
) -> Result<serde_json::Value> {
    let response = client
        .get(config.url(USER_INFO_PATH))
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("user info request failed: {e}")))?;

    check_status(response)
        .await?
        .json::<serde_json::Value>()
        .await
        .map_err(|e| Error::CredentialParse(format!("invalid user info response: {e}")))
}
