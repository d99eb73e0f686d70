//! OAuth state token and authorization URL
//!
//! The state token is an opaque random value generated before the browser is
//! sent to the authorization endpoint. It is persisted in the token store and
//! compared against the `state` query parameter on the callback route, so a
//! callback that the client did not initiate is rejected.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;

use crate::config::AuthConfig;
use crate::constants::SCOPE;
use crate::error::{Error, Result};

/// Generate a fresh opaque state token.
///
/// 32 random bytes encoded as URL-safe base64 (no padding), 43 characters.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the authorization URL for the authorization-code grant.
///
/// Query parameters are percent-encoded by `Url`, so the redirect URI and
/// state survive the round trip unchanged.
pub fn build_authorization_url(config: &AuthConfig, state: &str) -> Result<String> {
    let mut url = Url::parse(&config.authorize_endpoint())
        .map_err(|e| Error::InvalidUrl(format!("authorization endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri())
        .append_pair("state", state)
        .append_pair("scope", SCOPE);
    Ok(url.into())
}
