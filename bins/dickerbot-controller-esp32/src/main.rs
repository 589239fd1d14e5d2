//! DickerBot Controller firmware for ESP32
//!
//! This binary requires the ESP32 Rust toolchain.
//! It will not compile with the standard Rust toolchain.
//!
//! Runs the same `ControllerNode` as the Linux simulation: wheels, sensors,
//! the UART2 link to the Communicator and the USB serial port to the host.

use std::time::Instant;

use dickerbot_core::{ControllerIo, ControllerNode, NodeConfig};
use dickerbot_esp32::drive::{BridgeChannel, HBridgeDrive};
use dickerbot_esp32::gpio::GpioLed;
use dickerbot_esp32::sensors::{ControllerSensors, Mpu6050, Ultrasonic};
use dickerbot_esp32::uart::UartLink;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

const LINK_BAUD: u32 = 115_200;
const I2C_BAUD: u32 = 400_000;
const LOOP_PERIOD_MS: u32 = 10;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("DickerBot Controller starting...");
    // UART0 doubles as the host port; keep the console quiet on it.
    log::set_max_level(log::LevelFilter::Warn);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // TX 13, RX 4 to the Communicator's UART1.
    let link = UartDriver::new(
        peripherals.uart2,
        pins.gpio13,
        pins.gpio4,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(LINK_BAUD)),
    )?;
    let host = UartDriver::new(
        peripherals.uart0,
        pins.gpio1,
        pins.gpio3,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(LINK_BAUD)),
    )?;

    let drive = HBridgeDrive::new(
        BridgeChannel::new(
            pins.gpio23.downgrade_output(),
            pins.gpio25.downgrade_output(),
            pins.gpio26.downgrade_output(),
            false,
        )?,
        BridgeChannel::new(
            pins.gpio19.downgrade_output(),
            pins.gpio27.downgrade_output(),
            pins.gpio32.downgrade_output(),
            true,
        )?,
    );

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(I2C_BAUD)),
    )?;
    let imu = match Mpu6050::new(i2c) {
        Ok(imu) => Some(imu),
        Err(e) => {
            warn!("IMU unavailable: {}", e);
            None
        }
    };
    let rangers = [
        Ultrasonic::new(pins.gpio33.downgrade_output(), pins.gpio34.downgrade_input())?,
        Ultrasonic::new(pins.gpio16.downgrade_output(), pins.gpio35.downgrade_input())?,
        Ultrasonic::new(pins.gpio17.downgrade_output(), pins.gpio36.downgrade_input())?,
        Ultrasonic::new(pins.gpio18.downgrade_output(), pins.gpio39.downgrade_input())?,
    ];

    let io = ControllerIo {
        link: Box::new(UartLink::new(link)),
        host: Box::new(UartLink::new(host)),
        drive: Box::new(drive),
        sensors: Box::new(ControllerSensors::new(imu, rangers)),
        led: Box::new(GpioLed::new(pins.gpio5.into())?),
    };

    let config = NodeConfig {
        device_id: dickerbot_esp32::station_mac()?,
        ..NodeConfig::default()
    };
    let mut node = ControllerNode::new(config, io);
    let started = Instant::now();
    node.begin(0);

    loop {
        node.poll(started.elapsed().as_millis() as u64);
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
