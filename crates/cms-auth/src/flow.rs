//! Login and OAuth callback state machines
//!
//! The authorization-code flow leaves the application (browser navigation to
//! the authorization endpoint) and re-enters on the callback route, possibly
//! in another process. It is therefore modelled as two independent machines
//! correlated only by the persisted `oauth_state`:
//!
//! ```text
//! LoginFlow:    Idle -> Authenticating -> RedirectPending | Authenticated | Failed
//! CallbackFlow: Received -> ExchangingCode -> Authenticated | Failed
//! ```
//!
//! Transitions are pure functions returning `(new_state, action)`; the
//! drivers (`LoginFlow`, `CallbackFlow`) execute the I/O implied by each
//! action against an `AuthService`.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::service::{AuthService, LoginOutcome};
use crate::token::TokenResponse;

const MISSING_CREDENTIALS: &str = "Username and password are required";
const MISSING_CODE: &str = "No authorization code received";

#[derive(Debug, Clone, PartialEq)]
pub enum LoginState {
    Idle,
    Authenticating,
    /// Terminal for this process: the caller navigates away.
    RedirectPending {
        redirect_url: String,
    },
    Authenticated,
    Failed {
        error: String,
    },
}

#[derive(Debug)]
pub enum LoginEvent {
    Submitted { username: String, password: String },
    Succeeded(LoginOutcome),
    Errored(String),
}

#[derive(Debug, PartialEq)]
pub enum LoginAction {
    /// Call `AuthService::login` with these credentials
    Login {
        username: String,
        password: String,
    },
    /// Send the user to the authorization endpoint
    Navigate {
        url: String,
    },
    /// Logged in without a redirect
    Finish,
    ShowError(String),
    None,
}

/// Handle a login transition. Pure function: no I/O.
pub fn handle_login_event(state: LoginState, event: LoginEvent) -> (LoginState, LoginAction) {
    match (state, event) {
        (
            LoginState::Idle | LoginState::Failed { .. },
            LoginEvent::Submitted { username, password },
        ) => {
            if username.is_empty() || password.is_empty() {
                let error = MISSING_CREDENTIALS.to_string();
                return (
                    LoginState::Failed {
                        error: error.clone(),
                    },
                    LoginAction::ShowError(error),
                );
            }
            (
                LoginState::Authenticating,
                LoginAction::Login { username, password },
            )
        }

        (LoginState::Authenticating, LoginEvent::Succeeded(outcome)) => {
            match (outcome.requires_redirect, outcome.redirect_url) {
                (true, Some(url)) => (
                    LoginState::RedirectPending {
                        redirect_url: url.clone(),
                    },
                    LoginAction::Navigate { url },
                ),
                _ => (LoginState::Authenticated, LoginAction::Finish),
            }
        }

        (LoginState::Authenticating, LoginEvent::Errored(error)) => (
            LoginState::Failed {
                error: error.clone(),
            },
            LoginAction::ShowError(error),
        ),

        // Everything else leaves the state unchanged.
        (state, _) => (state, LoginAction::None),
    }
}

/// Drives `handle_login_event` against an `AuthService`.
#[derive(Debug)]
pub struct LoginFlow {
    state: LoginState,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            state: LoginState::Idle,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    fn apply(&mut self, event: LoginEvent) -> LoginAction {
        let state = std::mem::replace(&mut self.state, LoginState::Idle);
        let (state, action) = handle_login_event(state, event);
        self.state = state;
        action
    }

    /// Submit credentials and run the login to completion.
    ///
    /// Returns the final action for the caller: `Navigate`, `Finish` or
    /// `ShowError`.
    pub async fn submit(
        &mut self,
        auth: &AuthService,
        username: &str,
        password: &str,
    ) -> LoginAction {
        let action = self.apply(LoginEvent::Submitted {
            username: username.to_string(),
            password: password.to_string(),
        });

        let LoginAction::Login { username, password } = action else {
            return action;
        };

        let event = match auth.login(&username, &password).await {
            Ok(outcome) => LoginEvent::Succeeded(outcome),
            Err(e) => LoginEvent::Errored(e.to_string()),
        };
        self.apply(event)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackState {
    Received,
    ExchangingCode,
    Authenticated,
    Failed { error: String },
}

/// Query parameters of the callback route plus the stored state token.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub stored_state: Option<String>,
}

#[derive(Debug)]
pub enum CallbackEvent {
    Arrived(CallbackParams),
    Exchanged,
    ExchangeFailed(String),
}

#[derive(Debug, PartialEq)]
pub enum CallbackAction {
    /// Exchange this code at the token endpoint
    Exchange {
        code: String,
    },
    /// Tokens stored; go back to the application
    Finish,
    /// Show the error and offer to restart login
    Reject(CallbackRejection),
    None,
}

/// Why a callback was not completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRejection {
    StateMismatch,
    MissingCode,
    ExchangeFailed(String),
}

impl CallbackRejection {
    fn message(&self) -> String {
        match self {
            CallbackRejection::StateMismatch => Error::StateMismatch.to_string(),
            CallbackRejection::MissingCode => MISSING_CODE.to_string(),
            CallbackRejection::ExchangeFailed(e) => e.clone(),
        }
    }
}

/// Handle a callback transition. Pure function: no I/O.
///
/// The state comparison happens before the code is looked at, so a forged
/// callback never reaches the token endpoint.
pub fn handle_callback_event(
    state: CallbackState,
    event: CallbackEvent,
) -> (CallbackState, CallbackAction) {
    match (state, event) {
        (CallbackState::Received, CallbackEvent::Arrived(params)) => {
            let state_matches = matches!(
                (&params.state, &params.stored_state),
                (Some(returned), Some(stored)) if returned == stored
            );
            let code = params.code.filter(|c| !c.is_empty());
            let rejection = match (state_matches, code) {
                (false, _) => CallbackRejection::StateMismatch,
                (true, None) => CallbackRejection::MissingCode,
                (true, Some(code)) => {
                    return (
                        CallbackState::ExchangingCode,
                        CallbackAction::Exchange { code },
                    );
                }
            };
            (
                CallbackState::Failed {
                    error: rejection.message(),
                },
                CallbackAction::Reject(rejection),
            )
        }

        (CallbackState::ExchangingCode, CallbackEvent::Exchanged) => {
            (CallbackState::Authenticated, CallbackAction::Finish)
        }

        (CallbackState::ExchangingCode, CallbackEvent::ExchangeFailed(error)) => (
            CallbackState::Failed {
                error: error.clone(),
            },
            CallbackAction::Reject(CallbackRejection::ExchangeFailed(error)),
        ),

        (state, _) => (state, CallbackAction::None),
    }
}

/// Drives `handle_callback_event` against an `AuthService`.
#[derive(Debug)]
pub struct CallbackFlow {
    state: CallbackState,
}

impl Default for CallbackFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackFlow {
    pub fn new() -> Self {
        Self {
            state: CallbackState::Received,
        }
    }

    pub fn state(&self) -> &CallbackState {
        &self.state
    }

    fn apply(&mut self, event: CallbackEvent) -> CallbackAction {
        let state = std::mem::replace(&mut self.state, CallbackState::Received);
        let (state, action) = handle_callback_event(state, event);
        self.state = state;
        action
    }

    /// Validate the callback and exchange its code for tokens.
    ///
    /// The stored state token is consumed whatever the outcome. Errors map to
    /// `StateMismatch`, `MissingCredential` or the exchange failure itself.
    pub async fn complete(
        &mut self,
        auth: &AuthService,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<TokenResponse> {
        let store = auth.store();
        let params = CallbackParams {
            code: code.map(str::to_owned),
            state: state.map(str::to_owned),
            stored_state: store.oauth_state().await,
        };

        let action = self.apply(CallbackEvent::Arrived(params));
        let result = match action {
            CallbackAction::Exchange { code } => self.exchange(auth, &code).await,
            CallbackAction::Reject(CallbackRejection::StateMismatch) => {
                warn!("callback state does not match stored state");
                Err(Error::StateMismatch)
            }
            CallbackAction::Reject(rejection) => Err(Error::MissingCredential(rejection.message())),
            CallbackAction::Finish | CallbackAction::None => {
                Err(Error::MissingCredential(String::from("callback already handled")))
            }
        };

        if let Err(e) = store.remove_oauth_state().await {
            warn!(error = %e, "failed to remove stored OAuth state");
        }
        result
    }

    async fn exchange(&mut self, auth: &AuthService, code: &str) -> Result<TokenResponse> {
        auth.store().set_oauth_code(code).await?;
        match auth.exchange_code_for_tokens(code).await {
            Ok(tokens) => {
                self.apply(CallbackEvent::Exchanged);
                info!("OAuth callback completed");
                Ok(tokens)
            }
            Err(e) => {
                self.apply(CallbackEvent::ExchangeFailed(e.to_string()));
                Err(e)
            }
        }
    }
}
