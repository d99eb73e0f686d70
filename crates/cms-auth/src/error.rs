//! Error types for session and OAuth operations

/// Errors from session login/logout, token grants and the token store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connection refused, DNS, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Backend rejected the credentials (401/403)
    #[error("authentication rejected ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Any other non-success response
    #[error("backend returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Invalid state parameter. Authorization request may have been tampered with.")]
    StateMismatch,

    #[error("{0}")]
    MissingCredential(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => Error::Unauthorized {
                status: status.as_u16(),
                body,
            },
            code => Error::Rejected { status: code, body },
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Turn a non-success response into an error, reading its body for context.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    Err(Error::from_status(status, body))
}
