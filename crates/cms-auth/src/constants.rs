//! Backend endpoint paths and OAuth client defaults
//!
//! Paths are relative to the configured API base URL. The default client ID
//! and secret identify the public development client registered with the
//! backend's OAuth module; deployments override them through configuration.

/// Public development OAuth client ID
pub const DEFAULT_CLIENT_ID: &str = "05nYsynYKs4YLx2ALZs3tk3nPd_lv0T8N2I7ykypY3A";

/// Development OAuth client secret, used only when none is configured
pub const DEFAULT_CLIENT_SECRET: &str = "12345";

/// Session login endpoint (JSON body `{name, pass}`)
pub const LOGIN_PATH: &str = "/user/login?_format=json";

/// Session logout endpoint; `_format` and `token` are appended as query pairs
pub const LOGOUT_PATH: &str = "/user/logout";

/// Browser-navigated authorization endpoint
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";

/// Token endpoint for every grant type
pub const TOKEN_PATH: &str = "/oauth/token";

/// Authenticated user profile
pub const USER_INFO_PATH: &str = "/oauth/me?_format=json";

/// Route the authorization server redirects back to
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Scope requested in the authorization URL
pub const SCOPE: &str = "access_token";

/// Header carrying the session CSRF token
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Join the API base URL and an endpoint path.
pub fn endpoint(api_url: &str, path: &str) -> String {
    format!("{}{}", api_url.trim_end_matches('/'), path)
}
