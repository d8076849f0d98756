//! Authenticated HTTP client.
//!
//! Every request carries the stored access token. A 401 starts (or joins) a
//! single-flight refresh, after which the request is replayed exactly once.

use crate::coordinator::{RefreshCoordinator, RefreshLease, Ticket};
use crate::error::{ClientError, ClientResult};
use crate::navigation::Navigator;
use crate::refresh_fsm::RefreshState;
use crate::transport::{
    ReqwestTransport, RequestBody, Transport, TransportRequest, TransportResponse,
};
use client_config_and_utils::{Config, RefreshMode, RetryPolicy, DEFAULT_REFRESH_PATH};
use credential_storage::CredentialStore;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Client settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL that relative request paths are appended to.
    pub base_url: Url,
    /// Default per-request timeout.
    pub timeout: Duration,
    /// Refresh endpoint, relative to `base_url`.
    pub refresh_path: String,
    /// Paths whose 401 responses are returned as-is instead of refreshing.
    pub auth_exempt_paths: Vec<String>,
    pub refresh_mode: RefreshMode,
    pub network_retry: RetryPolicy,
}

impl ClientConfig {
    /// Defaults for everything except the base URL.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        let config = Config::default();
        Ok(Self {
            base_url,
            timeout: config.timeout(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            auth_exempt_paths: config.auth_exempt_paths,
            refresh_mode: config.refresh_mode,
            network_retry: config.network_retry,
        })
    }

    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let base_url = config
            .api_url()
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            base_url,
            timeout: config.timeout(),
            refresh_path: config.refresh_path.clone(),
            auth_exempt_paths: config.auth_exempt_paths.clone(),
            refresh_mode: config.refresh_mode,
            network_retry: config.network_retry.clone(),
        })
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers. An `Authorization` header here replaces the stored token
    /// on the first attempt.
    pub headers: HeaderMap,
    /// Overrides [`ClientConfig::timeout`].
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            headers: HeaderMap::new(),
            timeout: Some(timeout),
        }
    }
}

/// Refresh endpoint request body.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Refresh endpoint response body.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A request as issued by the caller, kept for replay.
#[derive(Debug)]
struct PreparedRequest {
    method: Method,
    url: Url,
    body: RequestBody,
    options: RequestOptions,
    exempt: bool,
}

/// Which token a send attaches.
enum Credential {
    /// Read from the store, unless the caller set `Authorization`.
    Stored,
    /// Token delivered by a refresh; replaces any caller header.
    Refreshed(String),
}

/// Outcome of one send.
enum AttemptOutcome {
    Success(serde_json::Value),
    /// The access token was rejected. Carries the stored token that was
    /// sent, if the request used one.
    NeedsRefresh(Option<String>),
    Failed(ClientError),
}

/// HTTP client that authenticates requests and recovers from expired tokens.
///
/// Share it behind an `Arc`; the refresh protocol is per instance.
pub struct AuthenticatedHttpClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    refresh: RefreshCoordinator,
}

impl AuthenticatedHttpClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
            navigator,
            refresh: RefreshCoordinator::new(),
        }
    }

    /// Create a client that sends requests with `reqwest`.
    pub fn with_reqwest(
        config: ClientConfig,
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(config, transport, credentials, navigator))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Current refresh state.
    pub fn refresh_state(&self) -> RefreshState {
        self.refresh.state()
    }

    /// Number of requests waiting for the in-flight refresh.
    pub fn pending_waiters(&self) -> usize {
        self.refresh.pending_waiters()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(Method::GET, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.send(Method::POST, path, body, RequestOptions::default())
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.send(Method::PUT, path, body, RequestOptions::default())
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = RequestBody::json(body)?;
        self.send(Method::PATCH, path, body, RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(
            Method::DELETE,
            path,
            RequestBody::Empty,
            RequestOptions::default(),
        )
        .await
    }

    /// Like [`request`](Self::request), deserializing the response into `T`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> ClientResult<T> {
        let value = self.request(method, path, body, options).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a request, refreshing the access token on 401.
    ///
    /// `path` is either absolute or relative to the base URL. Returns the
    /// parsed JSON body, or `Value::Null` for an empty body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> ClientResult<serde_json::Value> {
        let url = self.resolve_url(path)?;
        let exempt = self.is_auth_exempt(&url);
        let request = PreparedRequest {
            method,
            url,
            body,
            options,
            exempt,
        };

        match self.attempt(&request, Credential::Stored).await {
            AttemptOutcome::Success(value) => Ok(value),
            AttemptOutcome::Failed(e) => Err(e),
            AttemptOutcome::NeedsRefresh(rejected) => self.recover(&request, rejected).await,
        }
    }

    /// Obtain a fresh token (leading or joining a refresh) and replay.
    ///
    /// `rejected` is the stored token the failed attempt sent. If the store
    /// already holds a different one, a refresh finished after that attempt
    /// went out, and the leader replays with it instead of refreshing again.
    async fn recover(
        &self,
        request: &PreparedRequest,
        rejected: Option<String>,
    ) -> ClientResult<serde_json::Value> {
        match self.refresh.join() {
            Ticket::Waiter(rx) => {
                let token = match rx.await {
                    Ok(Ok(token)) => token,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(ClientError::AuthorizationExpired),
                };
                self.replay(request, token).await
            }
            Ticket::Leader(lease) => {
                if let Some(current) = self.newer_access_token(rejected.as_deref()) {
                    debug!(url = %request.url, "Access token already replaced, skipping refresh");
                    lease.settle(Ok(current.clone()));
                    return self.replay(request, current).await;
                }
                self.lead_refresh(request, lease).await
            }
        }
    }

    /// Perform the refresh as leader, settle the cycle, then replay.
    async fn lead_refresh(
        &self,
        request: &PreparedRequest,
        lease: RefreshLease<'_>,
    ) -> ClientResult<serde_json::Value> {
        match self.refresh_access_token().await {
            Ok(token) => {
                let released = lease.settle(Ok(token.clone()));
                info!(released, "Token refreshed, replaying queued requests");
                self.replay(request, token).await
            }
            Err(reason) => {
                warn!(reason = %reason, "Token refresh failed, ending session");
                let error = ClientError::AuthorizationFailed { reason };
                self.end_session();
                self.navigator.redirect_to_login();
                lease.settle(Err(error.clone()));
                Err(error)
            }
        }
    }

    /// The stored access token, if it differs from the one that was rejected.
    fn newer_access_token(&self, rejected: Option<&str>) -> Option<String> {
        let rejected = rejected?;
        self.stored_access_token()
            .filter(|current| current.as_str() != rejected)
    }

    /// Send the request once more with a refreshed token.
    async fn replay(
        &self,
        request: &PreparedRequest,
        token: String,
    ) -> ClientResult<serde_json::Value> {
        debug!(method = %request.method, url = %request.url, retried = true, "Replaying request");
        match self.attempt(request, Credential::Refreshed(token)).await {
            AttemptOutcome::Success(value) => Ok(value),
            AttemptOutcome::Failed(e) => Err(e),
            AttemptOutcome::NeedsRefresh(_) => {
                warn!(url = %request.url, "Request rejected again after token refresh");
                // Only the replay that actually ends the session redirects.
                if self.end_session() {
                    self.navigator.redirect_to_login();
                }
                Err(ClientError::AuthorizationFailed {
                    reason: "request rejected after token refresh".to_string(),
                })
            }
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns the failure reason on error; the caller ends the session.
    async fn refresh_access_token(&self) -> Result<String, String> {
        if self.config.refresh_mode == RefreshMode::Logout {
            return Err("access token expired".to_string());
        }

        let refresh_token = match self.credentials.get_refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Err("no refresh token available".to_string()),
            Err(e) => return Err(format!("failed to read refresh token: {e}")),
        };

        let url = self
            .resolve_url(&self.config.refresh_path)
            .map_err(|e| e.to_string())?;
        let body = RequestBody::json(&RefreshRequest {
            refresh_token: &refresh_token,
        })
        .map_err(|e| e.to_string())?;
        let request = TransportRequest {
            method: Method::POST,
            url,
            headers: default_headers(),
            body,
            timeout: self.config.timeout,
        };

        debug!(url = %request.url, "Calling refresh endpoint");
        let response = self
            .send_with_retry(request)
            .await
            .map_err(|e| format!("refresh request failed: {e}"))?;

        if !response.status.is_success() {
            return Err(format!(
                "refresh rejected with HTTP {}",
                response.status.as_u16()
            ));
        }

        let data: RefreshResponse = serde_json::from_slice(&response.body)
            .map_err(|e| format!("invalid refresh response: {e}"))?;

        if let Err(e) = self.credentials.set_access_token(&data.access_token) {
            warn!(error = %e, "Failed to store refreshed access token");
        }
        if let Some(rotated) = &data.refresh_token {
            if let Err(e) = self.credentials.set_refresh_token(rotated) {
                warn!(error = %e, "Failed to store rotated refresh token");
            }
        }
        if let Some(expires_in) = data.expires_in {
            if let Err(e) = self.credentials.set_expires_in(expires_in) {
                warn!(error = %e, "Failed to store token expiry");
            }
        }

        Ok(data.access_token)
    }

    /// Send once and classify the response.
    async fn attempt(&self, request: &PreparedRequest, credential: Credential) -> AttemptOutcome {
        let mut headers = default_headers();
        headers.extend(request.options.headers.clone());

        let (token, from_store) = match credential {
            Credential::Refreshed(token) => (Some(token), false),
            Credential::Stored if headers.contains_key(AUTHORIZATION) => (None, false),
            Credential::Stored => (self.stored_access_token(), true),
        };
        if let Some(token) = &token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Access token is not a valid header value, sending without it"),
            }
        }

        let transport_request = TransportRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers,
            body: request.body.clone(),
            timeout: request.options.timeout.unwrap_or(self.config.timeout),
        };

        debug!(method = %transport_request.method, url = %transport_request.url, "Sending request");
        let response = match self.send_with_retry(transport_request).await {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Failed(e),
        };

        let status = response.status;
        if status.is_success() {
            return match decode_body(&response) {
                Ok(value) => AttemptOutcome::Success(value),
                Err(e) => AttemptOutcome::Failed(e),
            };
        }

        debug!(status = status.as_u16(), url = %request.url, "Request failed");
        if status == StatusCode::UNAUTHORIZED && !request.exempt {
            return AttemptOutcome::NeedsRefresh(token.filter(|_| from_store));
        }
        AttemptOutcome::Failed(ClientError::Server {
            status,
            body: response.text(),
        })
    }

    /// Send through the transport, retrying transport failures per policy.
    async fn send_with_retry(&self, request: TransportRequest) -> ClientResult<TransportResponse> {
        let policy = &self.config.network_retry;
        let mut attempt = 0;
        loop {
            match self.transport.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < policy.max_retries => {
                    let delay = policy.delay_for_attempt(attempt);
                    attempt += 1;
                    debug!(
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Network error");
                    return Err(e.into());
                }
            }
        }
    }

    fn stored_access_token(&self) -> Option<String> {
        match self.credentials.get_access_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read access token, sending unauthenticated");
                None
            }
        }
    }

    /// Clear the stored session, returning whether a session was present.
    fn end_session(&self) -> bool {
        match self.credentials.clear_session() {
            Ok(ended) => ended,
            Err(e) => {
                warn!(error = %e, "Failed to clear stored session");
                false
            }
        }
    }

    /// Resolve `path` against the base URL, passing absolute URLs through.
    fn resolve_url(&self, path: &str) -> ClientResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")));
        }
        let joined = format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ClientError::InvalidUrl(format!("{joined}: {e}")))
    }

    fn is_auth_exempt(&self, url: &Url) -> bool {
        let path = url.path().trim_end_matches('/');
        self.config.auth_exempt_paths.iter().any(|exempt| {
            let exempt = exempt.trim_end_matches('/');
            !exempt.is_empty() && path.ends_with(exempt)
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn decode_body(response: &TransportResponse) -> ClientResult<serde_json::Value> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}
