//! Authentication error types.

use api_client::ClientError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong username or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The login response carried no access token
    #[error("Login response did not include an access token")]
    MissingToken,

    /// Request failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_storage::StorageError),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Client(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
