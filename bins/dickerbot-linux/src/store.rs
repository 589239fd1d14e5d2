//! JSON file credential store.

use std::io::ErrorKind;
use std::path::PathBuf;

use dickerbot_core::{CredentialStore, StoreError};
use dickerbot_protocol::ConnectionCredentials;

/// Keeps one credential set in a JSON file. No file means not provisioned.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<ConnectionCredentials>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadError(e.to_string())),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::InvalidData(e.to_string()))
    }

    fn save(&mut self, credentials: &ConnectionCredentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(credentials)
            .map_err(|e| StoreError::WriteError(e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| StoreError::WriteError(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::WriteError(e.to_string())),
        }
    }
}
