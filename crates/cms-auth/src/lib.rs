//! Authentication library for a headless CMS backend
//!
//! Provides session login/logout, the OAuth authorization-code flow with
//! state validation, token grants (code exchange, refresh, client
//! credentials) and a persistent token store. Independent of any HTTP
//! client wrapper or UI; `cms-client` builds on top of it.
//!
//! Login flow:
//! 1. `AuthService::login()` posts credentials, stores user data and the CSRF token
//! 2. A state token is persisted and the authorization URL returned
//! 3. The user authorizes; the backend redirects to the callback route
//! 4. `CallbackFlow::complete()` validates the state and exchanges the code
//! 5. Access and refresh tokens are saved via `TokenStore::set_tokens()`
//! 6. `AuthService::logout()` ends the server session and clears the store

pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod service;
pub mod session;
pub mod state;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use flow::{CallbackFlow, CallbackState, LoginAction, LoginFlow, LoginState};
pub use service::{AuthService, AuthorizationStart, LoginOutcome, LogoutOutcome};
pub use state::{build_authorization_url, generate_state};
pub use store::{AuthStatus, CredentialBundle, StoredSession, TokenStore};
pub use token::TokenResponse;
