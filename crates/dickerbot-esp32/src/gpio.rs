//! Provisioning button and status LED.

use dickerbot_core::hal::{Button, LedEvent, StatusLed};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};

/// Active-high push button with the internal pull-down enabled.
pub struct GpioButton<'d> {
    pin: PinDriver<'d, AnyIOPin, Input>,
}

impl<'d> GpioButton<'d> {
    pub fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Down)?;
        Ok(Self { pin })
    }
}

impl Button for GpioButton<'_> {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Single status LED. On while a session is up, off while connecting,
/// toggled to acknowledge startup and provisioning.
pub struct GpioLed<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> GpioLed<'d> {
    pub fn new(pin: AnyOutputPin) -> anyhow::Result<Self> {
        Ok(Self {
            pin: PinDriver::output(pin)?,
        })
    }
}

impl StatusLed for GpioLed<'_> {
    fn notify(&mut self, event: LedEvent) {
        let result = match event {
            LedEvent::SessionUp => self.pin.set_high(),
            LedEvent::Connecting => self.pin.set_low(),
            LedEvent::Startup | LedEvent::Provisioned => self.pin.toggle(),
        };
        if let Err(e) = result {
            log::debug!("LED update failed: {}", e);
        }
    }
}
