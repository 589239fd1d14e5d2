//! Controller sensors: an MPU6050 on I2C and four HC-SR04 rangers.

use dickerbot_core::hal::{ImuSample, SensorSuite};
use esp_idf_hal::delay::{Ets, TickType};
use esp_idf_hal::gpio::{AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
use esp_idf_hal::i2c::I2cDriver;
use log::{info, warn};

const MPU6050_ADDRESS: u8 = 0x68;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B;

const ACCEL_8G: u8 = 0x10;
const GYRO_500_DPS: u8 = 0x08;
const DLPF_21_HZ: u8 = 0x04;

const ACCEL_LSB_PER_G: f32 = 4096.0;
const GYRO_LSB_PER_DPS: f32 = 65.5;
const STANDARD_GRAVITY: f32 = 9.80665;

const I2C_TIMEOUT_MS: u64 = 10;

/// MPU6050 at ±8 g, ±500 °/s, 21 Hz low-pass. Reports m/s², rad/s and °C.
pub struct Mpu6050<'d> {
    i2c: I2cDriver<'d>,
}

impl<'d> Mpu6050<'d> {
    pub fn new(i2c: I2cDriver<'d>) -> anyhow::Result<Self> {
        let mut imu = Self { i2c };
        imu.write_register(REG_PWR_MGMT_1, 0x00)?;
        imu.write_register(REG_ACCEL_CONFIG, ACCEL_8G)?;
        imu.write_register(REG_GYRO_CONFIG, GYRO_500_DPS)?;
        imu.write_register(REG_CONFIG, DLPF_21_HZ)?;
        info!("MPU6050 ready");
        Ok(imu)
    }

    fn write_register(&mut self, register: u8, value: u8) -> anyhow::Result<()> {
        self.i2c.write(
            MPU6050_ADDRESS,
            &[register, value],
            TickType::new_millis(I2C_TIMEOUT_MS).ticks(),
        )?;
        Ok(())
    }

    pub fn read(&mut self) -> anyhow::Result<ImuSample> {
        let mut raw = [0u8; 14];
        self.i2c.write_read(
            MPU6050_ADDRESS,
            &[REG_ACCEL_XOUT_H],
            &mut raw,
            TickType::new_millis(I2C_TIMEOUT_MS).ticks(),
        )?;
        let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32;

        let accel = |i| word(i) / ACCEL_LSB_PER_G * STANDARD_GRAVITY;
        let gyro = |i| (word(i) / GYRO_LSB_PER_DPS).to_radians();
        Ok(ImuSample {
            accel: [accel(0), accel(2), accel(4)],
            temperature: word(6) / 340.0 + 36.53,
            gyro: [gyro(8), gyro(10), gyro(12)],
        })
    }
}

/// Farthest echo worth waiting for.
const MAX_DISTANCE_CM: u32 = 200;
const US_PER_CM: u32 = 58;
const ECHO_START_TIMEOUT_US: i64 = 5_000;

fn micros() -> i64 {
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}

/// HC-SR04 ultrasonic ranger. Blocks for at most a few milliseconds.
pub struct Ultrasonic<'d> {
    trigger: PinDriver<'d, AnyOutputPin, Output>,
    echo: PinDriver<'d, AnyInputPin, Input>,
}

impl<'d> Ultrasonic<'d> {
    pub fn new(trigger: AnyOutputPin, echo: AnyInputPin) -> anyhow::Result<Self> {
        let mut trigger = PinDriver::output(trigger)?;
        trigger.set_low()?;
        Ok(Self {
            trigger,
            echo: PinDriver::input(echo)?,
        })
    }

    /// Distance in centimetres, `None` without an echo in range.
    pub fn ping_cm(&mut self) -> Option<u16> {
        self.trigger.set_low().ok()?;
        Ets::delay_us(2);
        self.trigger.set_high().ok()?;
        Ets::delay_us(10);
        self.trigger.set_low().ok()?;

        let deadline = micros() + ECHO_START_TIMEOUT_US;
        while self.echo.is_low() {
            if micros() > deadline {
                return None;
            }
        }

        let start = micros();
        let max_echo_us = i64::from(MAX_DISTANCE_CM * US_PER_CM);
        while self.echo.is_high() {
            if micros() - start > max_echo_us {
                return None;
            }
        }
        let echo_us = (micros() - start) as u32;
        Some((echo_us / US_PER_CM) as u16)
    }
}

/// IMU plus rangers in left, front, right, back order.
pub struct ControllerSensors<'d> {
    imu: Option<Mpu6050<'d>>,
    rangers: [Ultrasonic<'d>; 4],
    imu_failures: u32,
}

impl<'d> ControllerSensors<'d> {
    /// A missing IMU is tolerated; its readings go out as sentinels.
    pub fn new(imu: Option<Mpu6050<'d>>, rangers: [Ultrasonic<'d>; 4]) -> Self {
        Self {
            imu,
            rangers,
            imu_failures: 0,
        }
    }
}

impl SensorSuite for ControllerSensors<'_> {
    fn read_imu(&mut self) -> Option<ImuSample> {
        match self.imu.as_mut()?.read() {
            Ok(sample) => Some(sample),
            Err(e) => {
                self.imu_failures += 1;
                if self.imu_failures.is_power_of_two() {
                    warn!("IMU read failed ({} so far): {}", self.imu_failures, e);
                }
                None
            }
        }
    }

    fn read_distances(&mut self) -> [Option<u16>; 4] {
        let [left, front, right, back] = &mut self.rangers;
        [left.ping_cm(), front.ping_cm(), right.ping_cm(), back.ping_cm()]
    }
}
