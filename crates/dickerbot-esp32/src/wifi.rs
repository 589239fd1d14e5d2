//! Station-mode WiFi for the Communicator.
//!
//! Unlike a blocking connect, [`EspWifiRadio`] only starts the association
//! in [`WifiRadio::begin`] and reports progress through
//! [`WifiRadio::is_associated`], so the node loop keeps running while the
//! connection manager paces its status checks.

use anyhow::Result;
use dickerbot_core::hal::WifiRadio;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::peripheral,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};
use log::{info, warn};

pub struct EspWifiRadio {
    wifi: Box<EspWifi<'static>>,
    reported_ip: bool,
}

impl EspWifiRadio {
    /// Create the driver and start the station interface.
    pub fn new(
        modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let mut wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        Ok(Self {
            wifi: Box::new(wifi),
            reported_ip: false,
        })
    }

    fn try_begin(&mut self, ssid: &str, password: &str) -> Result<()> {
        let auth_method = if password.is_empty() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        // Drop any previous association first.
        let _ = self.wifi.disconnect();

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("SSID too long (max 32 chars)"))?,
                password: password
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("Password too long (max 64 chars)"))?,
                auth_method,
                ..Default::default()
            }))?;

        info!("Connecting to '{}'...", ssid);
        self.wifi.connect()?;
        Ok(())
    }
}

impl WifiRadio for EspWifiRadio {
    fn begin(&mut self, ssid: &str, password: &str) {
        self.reported_ip = false;
        if let Err(e) = self.try_begin(ssid, password) {
            // The status checks will keep failing and the attempt times out.
            warn!("WiFi connect to '{}' failed: {}", ssid, e);
        }
    }

    fn is_associated(&mut self) -> bool {
        let connected = self.wifi.is_connected().unwrap_or(false);
        let netif_up = self.wifi.sta_netif().is_up().unwrap_or(false);
        if !(connected && netif_up) {
            return false;
        }

        if !self.reported_ip {
            if let Ok(ip_info) = self.wifi.sta_netif().get_ip_info() {
                info!("WiFi connected!");
                info!("  IP address: {}", ip_info.ip);
                info!("  Gateway:    {}", ip_info.subnet.gateway);
            }
            self.reported_ip = true;
        }
        true
    }
}
