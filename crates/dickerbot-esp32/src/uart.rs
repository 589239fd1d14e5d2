//! Serial link over an ESP-IDF UART.

use dickerbot_core::hal::Link;
use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::uart::UartDriver;
use log::warn;

pub struct UartLink<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartLink<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl Link for UartLink<'_> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        // A timeout with nothing pending is the idle case.
        self.uart.read(buf, NON_BLOCK).unwrap_or(0)
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut written = 0;
        while written < bytes.len() {
            match self.uart.write(&bytes[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) => {
                    warn!("UART write failed: {}", e);
                    break;
                }
            }
        }
    }
}
