//! Test harness for client integration tests.
//!
//! Provides:
//! - MockBackend: an in-process API server implementing `Transport`
//! - CountingNavigator: records login redirects
//! - TestClient: a client wired to both, with a memory credential store

#![allow(dead_code)]

use api_client::{
    AuthenticatedHttpClient, ClientConfig, Method, Navigator, RequestBody, StatusCode, Transport,
    TransportError, TransportRequest, TransportResponse,
};
use async_trait::async_trait;
use client_config_and_utils::DEFAULT_REFRESH_PATH;
use credential_storage::{create_memory_credential_store, CredentialStore, UserRecord};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://localhost:8000/api";
pub const EXPIRED_TOKEN: &str = "expired-access";
pub const FRESH_TOKEN: &str = "fresh-access";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path relative to the API base (`/patients`, `/auth/refresh`, ...).
    pub path: String,
    pub authorization: Option<String>,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// How the refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshReply {
    /// 200 with a new access token and optionally a rotated refresh token.
    Grant {
        access_token: String,
        refresh_token: Option<String>,
    },
    /// Non-success status.
    Reject(StatusCode),
    /// No response at all.
    Fail(TransportError),
}

/// In-process API server.
///
/// Every non-refresh path answers 200 with `{"path", "method"}` when the
/// bearer token matches the currently valid token, 401 otherwise.
pub struct MockBackend {
    valid_token: Mutex<String>,
    refresh_reply: Mutex<RefreshReply>,
    refresh_expires_in: AtomicI64,
    /// The refresh endpoint holds its answer until this many 401s were sent.
    refresh_gate: AtomicUsize,
    /// Paths whose response is held until a refresh has completed.
    held_until_refreshed: Mutex<Vec<String>>,
    always_unauthorized: Mutex<Vec<String>>,
    network_failures: Mutex<VecDeque<TransportError>>,
    fixed_responses: Mutex<Vec<(String, StatusCode, serde_json::Value)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    refresh_calls: AtomicUsize,
    refreshes_completed: AtomicUsize,
    unauthorized: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(FRESH_TOKEN.to_string()),
            refresh_reply: Mutex::new(RefreshReply::Grant {
                access_token: FRESH_TOKEN.to_string(),
                refresh_token: None,
            }),
            refresh_expires_in: AtomicI64::new(3600),
            refresh_gate: AtomicUsize::new(0),
            held_until_refreshed: Mutex::new(Vec::new()),
            always_unauthorized: Mutex::new(Vec::new()),
            network_failures: Mutex::new(VecDeque::new()),
            fixed_responses: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            refreshes_completed: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
        })
    }

    /// Set the token the server currently accepts.
    pub fn accept_token(&self, token: &str) {
        *self.valid_token.lock().unwrap() = token.to_string();
    }

    pub fn set_refresh_reply(&self, reply: RefreshReply) {
        *self.refresh_reply.lock().unwrap() = reply;
    }

    /// `expires_in` sent with granted tokens.
    pub fn set_refresh_expires_in(&self, expires_in: i64) {
        self.refresh_expires_in.store(expires_in, Ordering::SeqCst);
    }

    /// Hold the response for `path` until a refresh call has been answered.
    ///
    /// The request's token is captured when it is sent, so a request sent
    /// with an expired token is answered 401 after the refresh.
    pub fn hold_until_refreshed(&self, path: &str) {
        self.held_until_refreshed
            .lock()
            .unwrap()
            .push(path.to_string());
    }

    /// Hold the refresh answer until `count` 401 responses have been sent.
    pub fn hold_refresh_until_unauthorized(&self, count: usize) {
        self.refresh_gate.store(count, Ordering::SeqCst);
    }

    /// Make `path` answer 401 whatever the token.
    pub fn always_reject(&self, path: &str) {
        self.always_unauthorized
            .lock()
            .unwrap()
            .push(path.to_string());
    }

    /// Fail the next non-refresh request without a response.
    pub fn fail_next(&self, error: TransportError) {
        self.network_failures.lock().unwrap().push_back(error);
    }

    /// Answer `path` with a fixed status and body, without checking the token.
    pub fn respond(&self, path: &str, status: StatusCode, body: serde_json::Value) {
        self.fixed_responses
            .lock()
            .unwrap()
            .push((path.to_string(), status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn unauthorized_responses(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    async fn handle_refresh(&self) -> Result<TransportResponse, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.refresh_gate.load(Ordering::SeqCst);
        while self.unauthorized.load(Ordering::SeqCst) < gate {
            tokio::task::yield_now().await;
        }

        let reply = self.refresh_reply.lock().unwrap().clone();
        let response = match reply {
            RefreshReply::Grant {
                access_token,
                refresh_token,
            } => {
                self.accept_token(&access_token);
                let mut body = serde_json::json!({
                    "access_token": access_token,
                    "token_type": "bearer",
                    "expires_in": self.refresh_expires_in.load(Ordering::SeqCst),
                });
                if let Some(rotated) = refresh_token {
                    body["refresh_token"] = serde_json::Value::String(rotated);
                }
                Ok(json_response(StatusCode::OK, &body))
            }
            RefreshReply::Reject(status) => Ok(json_response(
                status,
                &serde_json::json!({"detail": "Invalid refresh token"}),
            )),
            RefreshReply::Fail(error) => Err(error),
        };
        self.refreshes_completed.fetch_add(1, Ordering::SeqCst);
        response
    }
}

#[async_trait]
impl Transport for MockBackend {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let path = request
            .url
            .path()
            .strip_prefix("/api")
            .unwrap_or(request.url.path())
            .to_string();
        let authorization = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.clone(),
            path: path.clone(),
            authorization: authorization.clone(),
            body: request.body.clone(),
            timeout: request.timeout,
        });

        if path == DEFAULT_REFRESH_PATH {
            return self.handle_refresh().await;
        }

        let held = self.held_until_refreshed.lock().unwrap().contains(&path);
        if held {
            while self.refreshes_completed.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        }

        if let Some(error) = self.network_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let fixed = self
            .fixed_responses
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _, _)| *p == path)
            .map(|(_, status, body)| (*status, body.clone()));
        if let Some((status, body)) = fixed {
            if status == StatusCode::UNAUTHORIZED {
                self.unauthorized.fetch_add(1, Ordering::SeqCst);
            }
            return Ok(json_response(status, &body));
        }

        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        let rejected = self.always_unauthorized.lock().unwrap().contains(&path);
        if rejected || authorization.as_deref() != Some(expected.as_str()) {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            return Ok(json_response(
                StatusCode::UNAUTHORIZED,
                &serde_json::json!({"detail": "Could not validate credentials"}),
            ));
        }

        Ok(json_response(
            StatusCode::OK,
            &serde_json::json!({"path": path, "method": request.method.as_str()}),
        ))
    }
}

pub fn json_response(status: StatusCode, body: &serde_json::Value) -> TransportResponse {
    TransportResponse {
        status,
        headers: HeaderMap::new(),
        body: serde_json::to_vec(body).unwrap(),
    }
}

/// Navigator that counts redirects.
#[derive(Default)]
pub struct CountingNavigator {
    redirects: AtomicUsize,
}

impl CountingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn redirect_to_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sample_user() -> UserRecord {
    UserRecord {
        id: "7d1e4c52".to_string(),
        email: "secretariat@cabinet.example".to_string(),
        first_name: "Sophie".to_string(),
        last_name: "Bernard".to_string(),
        role: "receptionist".to_string(),
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}

/// A client wired to a mock backend.
pub struct TestClient {
    pub client: Arc<AuthenticatedHttpClient>,
    pub backend: Arc<MockBackend>,
    pub store: Arc<CredentialStore>,
    pub navigator: Arc<CountingNavigator>,
}

impl TestClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new(BASE_URL).unwrap())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_store(config, create_memory_credential_store())
    }

    pub fn with_store(config: ClientConfig, store: CredentialStore) -> Self {
        let backend = MockBackend::new();
        let store = Arc::new(store);
        let navigator = Arc::new(CountingNavigator::default());
        let client = Arc::new(AuthenticatedHttpClient::new(
            config,
            backend.clone(),
            store.clone(),
            navigator.clone(),
        ));
        Self {
            client,
            backend,
            store,
            navigator,
        }
    }

    /// Store a session whose access token the server no longer accepts.
    pub fn with_expired_session(self, refresh_token: Option<&str>) -> Self {
        self.store
            .set_session(EXPIRED_TOKEN, refresh_token, &sample_user())
            .unwrap();
        self
    }

    /// Store a session the server accepts.
    pub fn with_valid_session(self) -> Self {
        self.store
            .set_session(FRESH_TOKEN, Some(REFRESH_TOKEN), &sample_user())
            .unwrap();
        self
    }
}
