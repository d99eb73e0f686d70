//! Auth Service: session login, OAuth authorization, token grants, logout
//!
//! Constructed once per application instance with an HTTP client, the OAuth
//! client settings and a handle to the token store. Every operation that
//! obtains tokens persists them before returning.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::AuthConfig;
use crate::error::Result;
use crate::session;
use crate::state::{build_authorization_url, generate_state};
use crate::store::{AuthStatus, TokenStore};
use crate::token::{self, TokenResponse};

/// Result of `AuthService::login`.
///
/// `requires_redirect` means the caller must navigate to `redirect_url` to
/// finish the authorization-code flow. Otherwise the session is usable as is,
/// with or without `oauth_tokens`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: serde_json::Value,
    pub requires_redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_tokens: Option<TokenResponse>,
}

/// How the authorization step concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationStart {
    /// Navigate the browser here; the callback route finishes the flow.
    Redirect(String),
    /// URL construction failed and the client credentials grant was used instead.
    Tokens(TokenResponse),
}

/// Outcome of `AuthService::logout`. Both variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The backend confirmed the session was ended.
    ServerConfirmed,
    /// Only local state was cleared (tokens missing or the call failed).
    LocalOnly,
}

pub struct AuthService {
    http: reqwest::Client,
    config: AuthConfig,
    store: Arc<TokenStore>,
}

impl AuthService {
    pub fn new(http: reqwest::Client, config: AuthConfig, store: Arc<TokenStore>) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Log in with a username and password, then start the OAuth flow.
    ///
    /// Login endpoint failures propagate. Failures of the OAuth step are
    /// logged and swallowed: the session login alone counts as success.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let user = session::login(&self.http, &self.config, username, password)
            .await
            .inspect_err(|e| error!(error = %e, "login failed"))?;

        self.store.set_session(user.clone()).await?;
        if let Some(csrf) = user.get("csrf_token").and_then(|v| v.as_str()) {
            self.store.set_csrf_token(csrf).await?;
        }
        info!(username, "session login succeeded");

        let mut outcome = LoginOutcome {
            user,
            requires_redirect: false,
            redirect_url: None,
            oauth_tokens: None,
        };

        match self.start_authorization_flow().await {
            Ok(AuthorizationStart::Redirect(url)) => {
                outcome.requires_redirect = true;
                outcome.redirect_url = Some(url);
            }
            Ok(AuthorizationStart::Tokens(tokens)) => {
                info!(
                    has_refresh_token = tokens.refresh_token.is_some(),
                    "OAuth tokens acquired without redirect"
                );
                outcome.oauth_tokens = Some(tokens);
            }
            Err(e) => {
                warn!(error = %e, "OAuth token acquisition failed, but login succeeded");
            }
        }

        Ok(outcome)
    }

    /// Begin the authorization-code flow.
    ///
    /// Generates and persists a fresh state token and returns the URL the
    /// caller must navigate to. If the URL cannot be built, falls back to the
    /// client credentials grant.
    pub async fn start_authorization_flow(&self) -> Result<AuthorizationStart> {
        debug!("starting OAuth flow with authorization_code grant type");
        let state = generate_state();
        self.store.set_oauth_state(&state).await?;

        match build_authorization_url(&self.config, &state) {
            Ok(url) => Ok(AuthorizationStart::Redirect(url)),
            Err(e) => {
                warn!(error = %e, "failed to start OAuth flow, trying client credentials");
                let tokens = self
                    .fallback_token_acquisition()
                    .await
                    .inspect_err(|e| error!(error = %e, "fallback OAuth method also failed"))?;
                Ok(AuthorizationStart::Tokens(tokens))
            }
        }
    }

    /// Exchange the authorization code from the callback for tokens.
    pub async fn exchange_code_for_tokens(&self, code: &str) -> Result<TokenResponse> {
        let tokens = token::exchange_code(&self.http, &self.config, code)
            .await
            .inspect_err(|e| error!(error = %e, "failed to exchange code for tokens"))?;
        self.store
            .set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
            .await?;
        info!(
            has_refresh_token = tokens.refresh_token.is_some(),
            "authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Obtain an application token with the client credentials grant.
    ///
    /// Only the access token is stored; this grant carries no refresh token.
    pub async fn fallback_token_acquisition(&self) -> Result<TokenResponse> {
        debug!("trying OAuth fallback with client_credentials grant");
        let tokens = token::client_credentials(&self.http, &self.config).await?;
        self.store.set_tokens(&tokens.access_token, None).await?;
        info!("client credentials token acquired");
        Ok(tokens)
    }

    /// Run the refresh token grant and persist the new tokens.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<TokenResponse> {
        let tokens = token::refresh_token(&self.http, &self.config, refresh_token).await?;
        self.store
            .set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
            .await?;
        info!("access token refreshed");
        Ok(tokens)
    }

    /// End the session.
    ///
    /// Calls the logout endpoint when both a logout token and a CSRF token are
    /// stored, then clears the store whatever happened. Never fails.
    pub async fn logout(&self) -> LogoutOutcome {
        let bundle = self.store.bundle().await;

        let outcome = match (bundle.logout_token, bundle.csrf_token) {
            (Some(logout_token), Some(csrf_token)) => {
                match session::logout(&self.http, &self.config, &logout_token, &csrf_token).await {
                    Ok(()) => LogoutOutcome::ServerConfirmed,
                    Err(e) => {
                        warn!(error = %e, "server-side logout failed, clearing local session");
                        LogoutOutcome::LocalOnly
                    }
                }
            }
            _ => {
                warn!("missing logout or CSRF token, clearing local session only");
                LogoutOutcome::LocalOnly
            }
        };

        self.store.clear_best_effort().await;
        outcome
    }

    /// Profile of the user the access token belongs to.
    pub async fn fetch_user(&self, access_token: &str) -> Result<serde_json::Value> {
        session::fetch_user(&self.http, &self.config, access_token)
            .await
            .inspect_err(|e| error!(error = %e, "failed to fetch user data"))
    }

    pub async fn status(&self) -> AuthStatus {
        self.store.status().await
    }
}
