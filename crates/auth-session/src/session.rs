//! Session management for the MediSecure API.
//!
//! `AuthSession` owns the login and logout flows. Token refresh is handled by
//! [`AuthenticatedHttpClient`] itself; this type only creates and destroys
//! the stored session.

use crate::{AuthError, AuthResult};
use api_client::endpoints::auth;
use api_client::{
    AuthenticatedHttpClient, ClientError, Method, RefreshState, RequestBody, RequestOptions,
    StatusCode,
};
use credential_storage::{CredentialStore, UserRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Username and password for the login form.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: UserRecord,
}

/// Snapshot of the local session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub user: Option<UserRecord>,
    /// Recorded expiry has passed. The next request will refresh.
    pub token_expired: bool,
    pub expires_at: Option<String>,
    pub refresh_state: RefreshState,
}

/// Login, logout and session queries.
pub struct AuthSession {
    client: Arc<AuthenticatedHttpClient>,
}

impl AuthSession {
    pub fn new(client: Arc<AuthenticatedHttpClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<AuthenticatedHttpClient> {
        &self.client
    }

    fn credentials(&self) -> &CredentialStore {
        self.client.credentials()
    }

    /// Log in with username and password.
    ///
    /// The credentials are posted as a form. On success the access token,
    /// optional refresh token and user record are stored.
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthResult<LoginResponse> {
        debug!(username = %credentials.username, "Attempting login");

        let body = RequestBody::form([
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);
        let result = self
            .client
            .send::<LoginResponse>(Method::POST, auth::LOGIN, body, RequestOptions::default())
            .await;

        let response = match result {
            Ok(response) => response,
            Err(ClientError::Server { status, body })
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST =>
            {
                warn!(status = status.as_u16(), "Login rejected");
                return Err(AuthError::InvalidCredentials(error_detail(&body)));
            }
            Err(e) => return Err(e.into()),
        };

        let access_token = match response.access_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::MissingToken),
        };

        let store = self.credentials();
        store.set_session(access_token, response.refresh_token.as_deref(), &response.user)?;
        if let Some(expires_in) = response.expires_in {
            store.set_expires_in(expires_in)?;
        }

        info!(user_id = %response.user.id, role = %response.user.role, "Login successful");
        Ok(response)
    }

    /// Log out on the server, then clear the local session.
    ///
    /// The local session is cleared even if the server call fails; that
    /// failure is logged, not returned.
    pub async fn logout(&self) -> AuthResult<()> {
        if self.is_authenticated()? {
            let result = self
                .client
                .request(
                    Method::POST,
                    auth::LOGOUT,
                    RequestBody::Empty,
                    RequestOptions::default(),
                )
                .await;
            if let Err(e) = result {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        } else {
            debug!("No stored session, skipping server logout");
        }

        self.credentials().clear_session()?;
        info!("Logged out");
        Ok(())
    }

    /// Ask the server to send a password reset email.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        let _: serde_json::Value = self
            .client
            .post(auth::RESET_PASSWORD, &serde_json::json!({ "email": email }))
            .await?;
        info!("Password reset requested");
        Ok(())
    }

    /// Whether an access token is stored.
    pub fn is_authenticated(&self) -> AuthResult<bool> {
        Ok(self.credentials().has_session()?)
    }

    /// The user stored at login.
    pub fn current_user(&self) -> AuthResult<Option<UserRecord>> {
        Ok(self.credentials().get_user()?)
    }

    pub fn status(&self) -> AuthResult<SessionStatus> {
        let store = self.credentials();
        let authenticated = store.has_session()?;
        Ok(SessionStatus {
            authenticated,
            user: store.get_user()?,
            token_expired: authenticated && store.is_access_token_expired()?,
            expires_at: store.get_expires_at()?,
            refresh_state: self.client.refresh_state(),
        })
    }
}

/// Extract FastAPI's `detail` message from an error body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
