//! Authenticated HTTP client for the CMS backend
//!
//! Every request goes through `ApiClient::send`, which:
//! 1. attaches `Authorization: Bearer <token>` when an access token is stored
//! 2. attaches the stored CSRF token to POST/PUT/PATCH/DELETE requests that
//!    carry no explicit `X-CSRF-Token`
//! 3. on a 401 to the initial attempt, recovers a token (refresh grant, then
//!    client credentials) and resends exactly once
//!
//! A 401 on the resend, or a failed recovery, surfaces the original 401.
//! When recovery fails completely the session is ended before returning.

use std::sync::Arc;

use cms_auth::{CSRF_HEADER, TokenStore};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::recovery::SessionRecovery;

/// Which send of a request this is. A request is sent at most twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retry,
}

impl Attempt {
    fn as_str(self) -> &'static str {
        match self {
            Attempt::Initial => "initial",
            Attempt::Retry => "retry",
        }
    }
}

/// A request relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// JSON body. Sent as `application/json` unless a `Content-Type` header is set.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn is_state_mutating(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    store: Arc<TokenStore>,
    recovery: Arc<dyn SessionRecovery>,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        store: Arc<TokenStore>,
        recovery: Arc<dyn SessionRecovery>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            store,
            recovery,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn recovery(&self) -> &Arc<dyn SessionRecovery> {
        &self.recovery
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send a request and return the successful response.
    pub async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        self.send_with_id(&request, request_id).await
    }

    /// Send a request and deserialize the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method, path = %request.path))]
    async fn send_with_id(
        &self,
        request: &ApiRequest,
        request_id: String,
    ) -> Result<reqwest::Response> {
        let response = self.dispatch(request, Attempt::Initial).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check(response).await;
        }

        let original = Error::from_response(response).await;
        if !self.recover().await {
            return Err(original);
        }

        debug!("resending with recovered token");
        let response = self.dispatch(request, Attempt::Retry).await?;
        check(response).await
    }

    /// Apply request interception and send once.
    async fn dispatch(&self, request: &ApiRequest, attempt: Attempt) -> Result<reqwest::Response> {
        let mut headers = request.headers.clone();

        if let Some(token) = self.store.access_token().await {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "stored access token is not a valid header value"),
            }
        }

        if request.is_state_mutating() && !headers.contains_key(CSRF_HEADER) {
            if let Some(csrf) = self.store.csrf_token().await {
                match HeaderValue::from_str(&csrf) {
                    Ok(value) => {
                        headers.insert(CSRF_HEADER, value);
                    }
                    Err(e) => warn!(error = %e, "stored CSRF token is not a valid header value"),
                }
            }
        }

        let url = format!("{}{}", self.api_url.trim_end_matches('/'), request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, attempt = attempt.as_str(), "request failed");
            Error::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        metrics::record_request(request.method.as_str(), status);
        debug!(status, attempt = attempt.as_str(), "response received");
        Ok(response)
    }

    /// Obtain a new access token after a 401.
    ///
    /// Refresh grant when a refresh token is stored, client credentials
    /// otherwise or when the refresh fails. Ends the session and returns
    /// false when neither works.
    async fn recover(&self) -> bool {
        match self.store.refresh_token().await {
            Some(refresh_token) => match self.recovery.refresh(&refresh_token).await {
                Ok(()) => {
                    metrics::record_recovery("refresh_token", "success");
                    return true;
                }
                Err(e) => {
                    metrics::record_recovery("refresh_token", "failure");
                    warn!(error = %e, "token refresh failed, trying client credentials");
                }
            },
            None => debug!("no refresh token stored, trying client credentials"),
        }

        match self.recovery.acquire_fallback().await {
            Ok(()) => {
                metrics::record_recovery("client_credentials", "success");
                true
            }
            Err(e) => {
                metrics::record_recovery("client_credentials", "failure");
                warn!(error = %e, "token recovery failed, ending session");
                self.recovery.end_session().await;
                false
            }
        }
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(Error::from_response(response).await)
    }
}
