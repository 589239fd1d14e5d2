//! ESP32 collaborators for DickerBot nodes.
//!
//! Implementations of the [`dickerbot_core::hal`] traits on ESP-IDF:
//! - [`wifi::EspWifiRadio`] - non-blocking station-mode association
//! - [`nvs::NvsCredentialStore`] - credentials in the `wifi_data` NVS namespace
//! - [`uart::UartLink`] - the inter-node serial link
//! - [`ws::EspWsSession`] - WebSocket session with built-in reconnect
//! - [`gpio::GpioButton`], [`gpio::GpioLed`] - provisioning button and status LED
//! - [`drive::HBridgeDrive`] - Controller wheels on a GPIO H-bridge
//! - [`sensors::ControllerSensors`] - MPU6050 and HC-SR04 rangers
//! - `camera::EspCamera` - OV2640 capture (`camera` feature)
//!
//! # Example
//!
//! ```ignore
//! use dickerbot_esp32::{nvs::NvsCredentialStore, wifi::EspWifiRadio};
//!
//! let radio = EspWifiRadio::new(peripherals.modem, sysloop, nvs.clone())?;
//! let store = NvsCredentialStore::new(nvs)?;
//! ```

#[cfg(feature = "camera")]
pub mod camera;
pub mod drive;
pub mod gpio;
pub mod nvs;
pub mod sensors;
pub mod uart;
pub mod wifi;
pub mod ws;

/// MAC address of the station interface, `AA:BB:CC:DD:EE:FF`.
///
/// Used as the device identifier in the provisioning reply.
pub fn station_mac() -> anyhow::Result<String> {
    let mut mac = [0u8; 6];
    esp_idf_svc::sys::esp!(unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        )
    })?;
    Ok(mac
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":"))
}
