//! Storage key constants.

/// Keys under which session material is stored.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token, when the backend issues one
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Logged-in user record (JSON)
    pub const USER: &'static str = "user";

    /// Access token expiry (RFC 3339), when known
    pub const EXPIRES_AT: &'static str = "expires_at";

    /// Every key owned by a session, in clearing order.
    pub const SESSION_KEYS: [&'static str; 4] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::USER,
        Self::EXPIRES_AT,
    ];
}
