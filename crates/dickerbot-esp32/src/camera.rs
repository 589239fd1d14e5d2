//! OV2640 capture through the esp32-camera component.
//!
//! The component and its bindings are pulled in by the firmware crate
//! (`package.metadata.esp-idf-sys.extra_components`), which is why this
//! module sits behind the `camera` feature.

use dickerbot_core::hal::Camera;
use esp_idf_svc::sys::{self, camera, esp};
use log::{info, warn};

/// Pin map and image settings of the AI-Thinker ESP32-CAM board.
#[derive(Debug, Clone, Copy)]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sda: i32,
    pub scl: i32,
    /// D0..D7 (Y2..Y9).
    pub data: [i32; 8],
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

impl CameraPins {
    pub const AI_THINKER: Self = Self {
        pwdn: 32,
        reset: -1,
        xclk: 0,
        sda: 26,
        scl: 27,
        data: [5, 18, 19, 21, 36, 39, 34, 35],
        vsync: 25,
        href: 23,
        pclk: 22,
    };
}

const XCLK_FREQ_HZ: i32 = 10_000_000;
const JPEG_QUALITY: i32 = 10;

/// 96x96 grayscale frames, auto gain and exposure.
pub struct EspCamera {
    failures: u32,
}

impl EspCamera {
    pub fn new(pins: CameraPins) -> anyhow::Result<Self> {
        let config = camera::camera_config_t {
            pin_pwdn: pins.pwdn,
            pin_reset: pins.reset,
            pin_xclk: pins.xclk,
            __bindgen_anon_1: camera::camera_config_t__bindgen_ty_1 {
                pin_sccb_sda: pins.sda,
            },
            __bindgen_anon_2: camera::camera_config_t__bindgen_ty_2 {
                pin_sccb_scl: pins.scl,
            },
            pin_d0: pins.data[0],
            pin_d1: pins.data[1],
            pin_d2: pins.data[2],
            pin_d3: pins.data[3],
            pin_d4: pins.data[4],
            pin_d5: pins.data[5],
            pin_d6: pins.data[6],
            pin_d7: pins.data[7],
            pin_vsync: pins.vsync,
            pin_href: pins.href,
            pin_pclk: pins.pclk,
            xclk_freq_hz: XCLK_FREQ_HZ,
            ledc_timer: sys::ledc_timer_t_LEDC_TIMER_0,
            ledc_channel: sys::ledc_channel_t_LEDC_CHANNEL_0,
            pixel_format: camera::pixformat_t_PIXFORMAT_GRAYSCALE,
            frame_size: camera::framesize_t_FRAMESIZE_96X96,
            jpeg_quality: JPEG_QUALITY,
            fb_count: 1,
            fb_location: camera::camera_fb_location_t_CAMERA_FB_IN_DRAM,
            grab_mode: camera::camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY,
            ..Default::default()
        };
        esp!(unsafe { camera::esp_camera_init(&config) })?;

        let sensor = unsafe { camera::esp_camera_sensor_get() };
        if sensor.is_null() {
            anyhow::bail!("camera sensor not found");
        }
        unsafe {
            let s = &*sensor;
            if let Some(set) = s.set_gain_ctrl {
                set(sensor, 1);
            }
            if let Some(set) = s.set_exposure_ctrl {
                set(sensor, 1);
            }
            if let Some(set) = s.set_awb_gain {
                set(sensor, 1);
            }
        }

        info!("Camera ready");
        Ok(Self { failures: 0 })
    }
}

impl Camera for EspCamera {
    fn capture_frame(&mut self) -> Option<Vec<u8>> {
        let fb = unsafe { camera::esp_camera_fb_get() };
        if fb.is_null() {
            self.failures += 1;
            if self.failures.is_power_of_two() {
                warn!("Camera capture failed ({} so far)", self.failures);
            }
            return None;
        }

        // The buffer goes back to the driver before the bytes leave here.
        let frame = unsafe {
            let fb_ref = &*fb;
            let bytes = std::slice::from_raw_parts(fb_ref.buf, fb_ref.len).to_vec();
            camera::esp_camera_fb_return(fb);
            bytes
        };
        Some(frame)
    }
}

impl Drop for EspCamera {
    fn drop(&mut self) {
        if let Err(e) = esp!(unsafe { camera::esp_camera_deinit() }) {
            warn!("Camera deinit failed: {}", e);
        }
    }
}
