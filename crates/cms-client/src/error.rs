//! Error types for API requests and article operations

/// Errors surfaced by `ApiClient` and the article fetchers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connection refused, DNS, TLS, body read)
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("forbidden ({status}): {body}")]
    Forbidden { status: u16, body: String },

    /// 422 Unprocessable Entity
    #[error("validation failed: {body}")]
    Validation { body: String },

    /// Any other non-success response
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MissingCredential(String),

    #[error("{0}")]
    InvalidArticle(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error(transparent)]
    Auth(#[from] cms_auth::Error),
}

impl Error {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let status = status.as_u16();
        match status {
            401 => Error::Unauthorized { status, body },
            403 => Error::Forbidden { status, body },
            422 => Error::Validation { body },
            _ => Error::Status { status, body },
        }
    }

    /// HTTP status behind this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { status, .. }
            | Error::Forbidden { status, .. }
            | Error::Status { status, .. } => Some(*status),
            Error::Validation { .. } => Some(422),
            _ => None,
        }
    }

    /// Read the body of a failed response and classify it.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        Error::from_status(status, body)
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
