//! Credential storage for the MediSecure client.
//!
//! This crate provides:
//! - the [`SecureStorage`] backend trait
//! - [`MemoryStorage`] (process-local) and [`FileStorage`] (JSON file) backends
//! - [`CredentialStore`], the typed session facade used by the HTTP client

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::{CredentialStore, StoredSession, UserRecord};
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use std::path::Path;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a credential store persisted to the JSON file at `path`.
pub fn create_file_credential_store(path: &Path) -> StorageResult<CredentialStore> {
    let storage = FileStorage::open(path)?;
    Ok(CredentialStore::new(Box::new(storage)))
}

/// Create a credential store that lives only in memory.
pub fn create_memory_credential_store() -> CredentialStore {
    CredentialStore::new(Box::new(MemoryStorage::new()))
}
