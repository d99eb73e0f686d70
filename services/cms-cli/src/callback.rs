//! Loopback listener for the OAuth callback route
//!
//! `login` starts this listener on the configured callback origin, prints the
//! authorization URL and waits. The backend redirects the browser to
//! `/auth/callback?code&state`; the handler runs `CallbackFlow`, answers with
//! a short text page and signals the waiter, which shuts the listener down.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use cms_auth::{AuthService, CALLBACK_PATH, CallbackFlow};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// Time allowed for the server to finish the in-flight response after the
/// callback has been handled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Outcome reported by the handler: `Err` carries the user-facing message.
type Completion = std::result::Result<(), String>;

#[derive(Clone)]
struct CallbackState {
    auth: Arc<AuthService>,
    done: Arc<Mutex<Option<oneshot::Sender<Completion>>>>,
}

/// Build the callback router.
///
/// Callbacks are handled one at a time; the stored state token is consumed
/// by the first one.
fn build_router(state: CallbackState) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(callback_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(1))
        .with_state(state)
}

async fn callback_handler(
    State(state): State<CallbackState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let mut flow = CallbackFlow::new();
    let result = flow
        .complete(&state.auth, query.code.as_deref(), query.state.as_deref())
        .await;

    let (status, body, completion) = match result {
        Ok(_) => {
            info!("OAuth callback accepted");
            (
                StatusCode::OK,
                String::from("Authentication successful. You can close this window."),
                Ok(()),
            )
        }
        Err(e) => {
            warn!(error = %e, "OAuth callback rejected");
            (
                StatusCode::BAD_REQUEST,
                format!("{e}\n\nRun `cms-client login` to try again."),
                Err(e.to_string()),
            )
        }
    };

    if let Some(tx) = state.done.lock().await.take() {
        let _ = tx.send(completion);
    }

    (status, body)
}

/// Socket address to bind for a callback origin such as `http://127.0.0.1:8765`.
pub fn listen_addr(callback_origin: &str) -> Result<String> {
    let invalid = |reason: String| Error::InvalidOrigin {
        origin: callback_origin.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(callback_origin).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid(String::from("missing host")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid(String::from("missing port")))?;
    Ok(format!("{host}:{port}"))
}

/// Bind the callback origin and wait for one callback.
pub async fn wait_for_callback(
    auth: Arc<AuthService>,
    callback_origin: &str,
    timeout: Duration,
) -> Result<()> {
    let addr = listen_addr(callback_origin)?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, "waiting for OAuth callback");
    serve_callback(listener, auth, timeout).await
}

/// Serve the callback route on `listener` until one callback is handled or
/// `timeout` elapses.
pub async fn serve_callback(
    listener: TcpListener,
    auth: Arc<AuthService>,
    timeout: Duration,
) -> Result<()> {
    let (done_tx, done_rx) = oneshot::channel::<Completion>();
    let app = build_router(CallbackState {
        auth,
        done: Arc::new(Mutex::new(Some(done_tx))),
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(timeout, done_rx).await;

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "callback listener error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "callback listener task panicked"),
        Err(_) => warn!("callback listener did not drain in time"),
    }

    match outcome {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(message))) => Err(Error::Callback(message)),
        Ok(Err(_)) => Err(Error::ListenerClosed),
        Err(_) => Err(Error::Timeout(timeout.as_secs())),
    }
}
