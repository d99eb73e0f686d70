//! CLI-specific error types

use thiserror::Error;

/// Loopback callback listener errors.
///
/// Command failures from the libraries propagate as `anyhow` errors; these
/// cover the listener the `login` command waits on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid callback origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0}s waiting for the OAuth callback")]
    Timeout(u64),

    #[error("callback listener stopped before a callback arrived")]
    ListenerClosed,

    #[error("OAuth callback failed: {0}")]
    Callback(String),
}

/// Result alias using CLI Error
pub type Result<T> = std::result::Result<T, Error>;
