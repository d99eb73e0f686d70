//! OAuth client settings shared by the token grants and the Auth Service

use common::Secret;

use crate::constants::{
    AUTHORIZE_PATH, CALLBACK_PATH, DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET, endpoint,
};

/// Backend location and OAuth client identity.
///
/// `callback_origin` is the scheme/host/port the authorization server
/// redirects the browser back to; the callback route is appended to it.
/// `authorize_url` overrides the browser-facing authorization endpoint when
/// it is not reachable under `api_url`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub callback_origin: String,
    pub authorize_url: Option<String>,
}

impl AuthConfig {
    /// Settings using the development client credentials.
    pub fn new(api_url: impl Into<String>, callback_origin: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: Secret::new(DEFAULT_CLIENT_SECRET.to_string()),
            callback_origin: callback_origin.into(),
            authorize_url: None,
        }
    }

    /// Redirect URI registered for the authorization-code grant.
    pub fn redirect_uri(&self) -> String {
        let origin = self.callback_origin.trim_end_matches('/');
        format!("{origin}{CALLBACK_PATH}")
    }

    /// Authorization endpoint the browser is sent to.
    pub fn authorize_endpoint(&self) -> String {
        match &self.authorize_url {
            Some(url) => url.clone(),
            None => self.url(AUTHORIZE_PATH),
        }
    }

    /// Absolute URL of a backend endpoint.
    pub fn url(&self, path: &str) -> String {
        endpoint(&self.api_url, path)
    }
}
