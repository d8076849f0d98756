//! High-level API for session credentials.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds of remaining lifetime under which a token counts as expired.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// User record returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

impl UserRecord {
    /// "First Last", falling back to the email when both names are empty.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Session material read back from storage in one call.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserRecord>,
    pub expires_at: Option<String>,
}

/// Typed facade over a [`SecureStorage`] backend.
///
/// This is the credential store the HTTP client reads tokens from and the
/// session service writes them to.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    /// Create a credential store over the given backend.
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Tokens
    // ==========================================

    /// Retrieve the access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Store the access token
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    /// Retrieve the refresh token
    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Store the refresh token
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::REFRESH_TOKEN, token)
    }

    /// Record when the current access token expires.
    pub fn set_expires_at(&self, expires_at: DateTime<Utc>) -> StorageResult<()> {
        self.storage
            .set(StorageKeys::EXPIRES_AT, &expires_at.to_rfc3339())
    }

    /// Record an expiry `expires_in` seconds from now.
    ///
    /// Lifetimes that do not map to an RFC 3339 timestamp are logged and
    /// skipped; returns whether an expiry was recorded.
    pub fn set_expires_in(&self, expires_in: i64) -> StorageResult<bool> {
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .filter(|at| (0..=9999).contains(&at.year()));
        match expires_at {
            Some(expires_at) => {
                self.set_expires_at(expires_at)?;
                Ok(true)
            }
            None => {
                tracing::warn!(expires_in, "Token lifetime out of range, expiry not recorded");
                Ok(false)
            }
        }
    }

    /// Retrieve the recorded access token expiry, if any.
    pub fn get_expires_at(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::EXPIRES_AT)
    }

    /// Whether the access token is known to be expired (or about to be).
    ///
    /// Returns `false` when no expiry was recorded; the server decides then.
    pub fn is_access_token_expired(&self) -> StorageResult<bool> {
        match self.get_expires_at()? {
            Some(raw) => {
                let expires_at = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(expires_at.signed_duration_since(Utc::now()).num_seconds() < EXPIRY_LEEWAY_SECS)
            }
            None => Ok(false),
        }
    }

    // ==========================================
    // User
    // ==========================================

    /// Retrieve the stored user record
    pub fn get_user(&self) -> StorageResult<Option<UserRecord>> {
        match self.storage.get(StorageKeys::USER)? {
            Some(json) => {
                let user: UserRecord = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Store the user record
    pub fn set_user(&self, user: &UserRecord) -> StorageResult<()> {
        let json = serde_json::to_string(user).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER, &json)
    }

    // ==========================================
    // Session
    // ==========================================

    /// Store a complete session.
    ///
    /// A missing refresh token removes any stale one left from an earlier
    /// session.
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        user: &UserRecord,
    ) -> StorageResult<()> {
        self.set_access_token(access_token)?;
        match refresh_token {
            Some(token) => self.set_refresh_token(token)?,
            None => {
                self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
            }
        }
        self.set_user(user)?;
        Ok(())
    }

    /// Read the whole session, or `None` if there is no access token.
    pub fn get_session(&self) -> StorageResult<Option<StoredSession>> {
        let Some(access_token) = self.get_access_token()? else {
            return Ok(None);
        };

        Ok(Some(StoredSession {
            access_token,
            refresh_token: self.get_refresh_token()?,
            user: self.get_user()?,
            expires_at: self.get_expires_at()?,
        }))
    }

    /// Whether an access token is stored.
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::ACCESS_TOKEN)
    }

    /// Remove every session key.
    ///
    /// Returns whether an access token was removed, so concurrent callers can
    /// tell which one actually ended the session. All deletions are attempted
    /// even if one fails; the first failure is returned.
    pub fn clear_session(&self) -> StorageResult<bool> {
        let mut first_error = None;
        let mut ended = false;
        for key in StorageKeys::SESSION_KEYS {
            match self.storage.delete(key) {
                Ok(existed) => ended |= existed && key == StorageKeys::ACCESS_TOKEN,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Failed to delete session key");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(ended),
        }
    }
}
