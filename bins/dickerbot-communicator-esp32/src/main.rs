//! DickerBot Communicator firmware for ESP32
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! The node logic is the same `CommunicatorNode` the Linux simulation
//! runs; only the collaborators differ.

use std::time::{Duration, Instant};

use dickerbot_core::hal::Camera;
use dickerbot_core::{CommunicatorIo, CommunicatorNode, NodeConfig};
use dickerbot_esp32::camera::{CameraPins, EspCamera};
use dickerbot_esp32::gpio::{GpioButton, GpioLed};
use dickerbot_esp32::nvs::NvsCredentialStore;
use dickerbot_esp32::uart::UartLink;
use dickerbot_esp32::wifi::EspWifiRadio;
use dickerbot_esp32::ws::EspWsSession;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

const LINK_BAUD: u32 = 115_200;
const LOOP_PERIOD_MS: u32 = 10;

/// Stands in when the camera fails to initialise; the node skips every
/// image cycle but keeps relaying telemetry.
struct NoCamera;

impl Camera for NoCamera {
    fn capture_frame(&mut self) -> Option<Vec<u8>> {
        None
    }
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("DickerBot Communicator starting...");

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // TX 14, RX 13 to the Controller's UART2.
    let uart = UartDriver::new(
        peripherals.uart1,
        pins.gpio14,
        pins.gpio13,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(LINK_BAUD)),
    )?;

    let config = NodeConfig {
        device_id: dickerbot_esp32::station_mac()?,
        ..NodeConfig::default()
    };
    info!("Device id: {}", config.device_id);

    let camera: Box<dyn Camera> = match EspCamera::new(CameraPins::AI_THINKER) {
        Ok(camera) => Box::new(camera),
        Err(e) => {
            warn!("Camera unavailable, images disabled: {}", e);
            Box::new(NoCamera)
        }
    };

    let io = CommunicatorIo {
        link: Box::new(UartLink::new(uart)),
        store: Box::new(NvsCredentialStore::new(nvs.clone())?),
        radio: Box::new(EspWifiRadio::new(peripherals.modem, sysloop, nvs)?),
        session: Box::new(EspWsSession::new(Duration::from_millis(
            config.session_reconnect_ms,
        ))),
        camera,
        button: Box::new(GpioButton::new(pins.gpio2.into())?),
        led: Box::new(GpioLed::new(pins.gpio12.into())?),
    };

    let mut node = CommunicatorNode::new(config, io);
    let started = Instant::now();
    node.begin(0);

    loop {
        node.poll(started.elapsed().as_millis() as u64);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
