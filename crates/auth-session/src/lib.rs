//! Login, logout and session status on top of the authenticated client.

mod error;
mod session;

pub use error::{AuthError, AuthResult};
pub use session::{AuthSession, LoginCredentials, LoginResponse, SessionStatus};
