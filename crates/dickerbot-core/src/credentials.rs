//! Credential storage abstraction.
//!
//! The store is implemented differently on each platform:
//! - ESP32: NVS (Non-Volatile Storage)
//! - Linux: a JSON file
//! - Tests: [`MemoryCredentialStore`]
//!
//! Credentials are either fully present or absent. Partial sets are
//! rejected by [`provision`] before they reach the store, and a stored
//! set that fails validation is treated as absent by [`load_credentials`].

use dickerbot_protocol::ConnectionCredentials;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in a credential store backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to read stored credentials.
    #[error("Read error: {0}")]
    ReadError(String),
    /// Failed to write credentials.
    #[error("Write error: {0}")]
    WriteError(String),
    /// Stored data is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Storage is not available.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Why a provisioning request was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("SSID is missing")]
    MissingSsid,
    #[error("Server address is missing")]
    MissingHost,
    #[error("Server port is missing")]
    MissingPort,
    #[error("{field} contains a reserved character")]
    ReservedCharacter { field: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistent storage for one set of connection credentials.
///
/// All methods are synchronous to support embedded platforms.
pub trait CredentialStore {
    /// Load stored credentials, `None` if nothing is stored.
    fn load(&self) -> Result<Option<ConnectionCredentials>, StoreError>;

    /// Replace stored credentials.
    fn save(&mut self, credentials: &ConnectionCredentials) -> Result<(), StoreError>;

    /// Remove stored credentials.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Check that a credential set is complete and can be re-encoded.
pub fn validate(credentials: &ConnectionCredentials) -> Result<(), ProvisioningError> {
    if credentials.ssid.is_empty() {
        return Err(ProvisioningError::MissingSsid);
    }
    if credentials.host.is_empty() {
        return Err(ProvisioningError::MissingHost);
    }
    if credentials.port == 0 {
        return Err(ProvisioningError::MissingPort);
    }

    let fields = [
        ("ssid", &credentials.ssid),
        ("password", &credentials.password),
        ("host", &credentials.host),
    ];
    for (field, value) in fields {
        if value.contains(|c: char| c == ',' || c == ';') {
            return Err(ProvisioningError::ReservedCharacter { field });
        }
    }
    Ok(())
}

/// Validate and persist credentials, overwriting whatever was stored.
///
/// On error the previously stored credentials are left untouched.
pub fn provision<S: CredentialStore + ?Sized>(
    store: &mut S,
    credentials: &ConnectionCredentials,
) -> Result<(), ProvisioningError> {
    validate(credentials)?;
    store.save(credentials)?;
    Ok(())
}

/// Load credentials for a connection attempt.
///
/// Backend errors and incomplete records are logged and reported as absent.
pub fn load_credentials<S: CredentialStore + ?Sized>(store: &S) -> Option<ConnectionCredentials> {
    match store.load() {
        Ok(Some(credentials)) => match validate(&credentials) {
            Ok(()) => Some(credentials),
            Err(e) => {
                warn!("Ignoring stored credentials: {}", e);
                None
            }
        },
        Ok(None) => {
            debug!("No credentials stored");
            None
        }
        Err(e) => {
            warn!("Failed to load credentials: {}", e);
            None
        }
    }
}

/// In-memory store, used by tests and the host simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Option<ConnectionCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `credentials`.
    pub fn with(credentials: ConnectionCredentials) -> Self {
        Self {
            slot: Some(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<ConnectionCredentials>, StoreError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, credentials: &ConnectionCredentials) -> Result<(), StoreError> {
        self.slot = Some(credentials.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.slot = None;
        Ok(())
    }
}
