//! Token recovery seam used by `ApiClient` after a 401
//!
//! `ApiClient` never talks to the token endpoint itself. It asks a
//! `SessionRecovery` to refresh or replace the stored access token and, when
//! nothing works, to end the session. `AuthService` is the production
//! implementation.

use std::future::Future;
use std::pin::Pin;

use cms_auth::AuthService;

/// Boxed future returned by recovery operations.
pub type RecoveryFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Recovery operations available to the send loop.
///
/// Implementations persist any tokens they obtain in the shared `TokenStore`
/// before resolving, so the resend picks them up.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn SessionRecovery>`).
pub trait SessionRecovery: Send + Sync {
    /// Run the refresh token grant.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RecoveryFuture<'a, cms_auth::Result<()>>;

    /// Run the client credentials grant.
    fn acquire_fallback(&self) -> RecoveryFuture<'_, cms_auth::Result<()>>;

    /// Give up on the session: server-side logout when possible, local clear always.
    fn end_session(&self) -> RecoveryFuture<'_, ()>;
}

impl SessionRecovery for AuthService {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RecoveryFuture<'a, cms_auth::Result<()>> {
        Box::pin(async move { self.refresh_session(refresh_token).await.map(|_| ()) })
    }

    fn acquire_fallback(&self) -> RecoveryFuture<'_, cms_auth::Result<()>> {
        Box::pin(async move { self.fallback_token_acquisition().await.map(|_| ()) })
    }

    fn end_session(&self) -> RecoveryFuture<'_, ()> {
        Box::pin(async move {
            self.logout().await;
        })
    }
}
