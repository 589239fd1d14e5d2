//! Credentials in NVS flash.
//!
//! Layout of the `wifi_data` namespace: `ssid`, `pass` and `ip` as strings,
//! `port` as an i32 where -1 means unset.

use dickerbot_core::{CredentialStore, StoreError};
use dickerbot_protocol::{ConnectionCredentials, MAX_HOST_LEN, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const NAMESPACE: &str = "wifi_data";
const KEY_SSID: &str = "ssid";
const KEY_PASSWORD: &str = "pass";
const KEY_HOST: &str = "ip";
const KEY_PORT: &str = "port";
const PORT_UNSET: i32 = -1;

pub struct NvsCredentialStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsCredentialStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, StoreError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        Ok(Self { nvs })
    }

    fn read_str(&self, key: &str, max_len: usize) -> Result<Option<String>, StoreError> {
        // One extra byte for the NUL terminator.
        let mut buf = vec![0u8; max_len + 1];
        self.nvs
            .get_str(key, &mut buf)
            .map(|value| value.map(str::to_string))
            .map_err(|e| StoreError::ReadError(format!("{}: {}", key, e)))
    }
}

impl CredentialStore for NvsCredentialStore {
    fn load(&self) -> Result<Option<ConnectionCredentials>, StoreError> {
        let ssid = self.read_str(KEY_SSID, MAX_SSID_LEN)?;
        let password = self.read_str(KEY_PASSWORD, MAX_PASSWORD_LEN)?;
        let host = self.read_str(KEY_HOST, MAX_HOST_LEN)?;
        let port = self
            .nvs
            .get_i32(KEY_PORT)
            .map_err(|e| StoreError::ReadError(format!("{}: {}", KEY_PORT, e)))?
            .unwrap_or(PORT_UNSET);

        let (Some(ssid), Some(host)) = (ssid, host) else {
            return Ok(None);
        };
        if port == PORT_UNSET {
            return Ok(None);
        }
        let port = u16::try_from(port)
            .map_err(|_| StoreError::InvalidData(format!("port {} out of range", port)))?;

        Ok(Some(ConnectionCredentials {
            ssid,
            password: password.unwrap_or_default(),
            host,
            port,
        }))
    }

    fn save(&mut self, credentials: &ConnectionCredentials) -> Result<(), StoreError> {
        let write = |e: esp_idf_svc::sys::EspError| StoreError::WriteError(e.to_string());
        self.nvs.set_str(KEY_SSID, &credentials.ssid).map_err(write)?;
        self.nvs
            .set_str(KEY_PASSWORD, &credentials.password)
            .map_err(write)?;
        self.nvs.set_str(KEY_HOST, &credentials.host).map_err(write)?;
        self.nvs
            .set_i32(KEY_PORT, i32::from(credentials.port))
            .map_err(write)?;
        log::info!("Stored WiFi data for '{}'", credentials.ssid);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        for key in [KEY_SSID, KEY_PASSWORD, KEY_HOST, KEY_PORT] {
            self.nvs
                .remove(key)
                .map_err(|e| StoreError::WriteError(format!("{}: {}", key, e)))?;
        }
        log::info!("WiFi data cleared");
        Ok(())
    }
}
