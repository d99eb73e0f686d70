//! HTTP client and article access for the CMS backend
//!
//! `ApiClient` wraps `reqwest` with token interception and a single
//! recovery-and-resend on 401. Token recovery is delegated to a
//! `SessionRecovery` implementation, normally `cms_auth::AuthService`,
//! sharing the same `TokenStore`.
//!
//! Request lifecycle:
//! 1. Caller builds an `ApiRequest` (or uses the `articles` functions)
//! 2. Bearer and CSRF headers are attached from the `TokenStore`
//! 3. A 401 triggers refresh or client credentials, then one resend
//! 4. If recovery fails, the session is ended and the 401 is returned

pub mod articles;
pub mod client;
pub mod error;
pub mod metrics;
pub mod recovery;
pub mod view;

pub use articles::{
    Article, ArticleAttributes, ArticleBody, create_article, get_article, list_articles,
};
pub use client::{ApiClient, ApiRequest};
pub use error::{Error, Result};
pub use recovery::SessionRecovery;
pub use view::{ArticleCard, ArticleDetail};
