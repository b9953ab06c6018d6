//! Fixed device identifiers and timing values, plus platform-aware paths.
//!
//! None of these are read from disk or the command line.

use std::path::PathBuf;
use std::time::Duration;

// ── USB target ──

/// Razer USB vendor ID.
pub const VENDOR_ID: u16 = 0x1532;

/// Headset product ID.
pub const PRODUCT_ID: u16 = 0x0520;

/// HID interface that carries the mute button reports.
pub const INTERFACE_NUMBER: u8 = 5;

/// Interrupt IN endpoint of [`INTERFACE_NUMBER`].
pub const ENDPOINT_ADDRESS: u8 = 0x84;

/// Size of one input report on [`ENDPOINT_ADDRESS`].
pub const REPORT_LEN: usize = 37;

// ── Timing ──

/// Upper bound on a single blocking interrupt read.
pub const READ_TIMEOUT_MS: u64 = 5000;

/// A press arriving this soon after the previous one is treated as a double-press.
pub const DOUBLE_PRESS_WINDOW_MS: u64 = 250;

// ── Confirmation tone ──

pub const TONE_FREQUENCY_HZ: f32 = 1000.0;
pub const TONE_DURATION_MS: u64 = 10;

/// Identifies the device, interface and endpoint to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbTarget {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: u8,
    pub endpoint: u8,
    pub report_len: usize,
}

impl Default for UsbTarget {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            interface: INTERFACE_NUMBER,
            endpoint: ENDPOINT_ADDRESS,
            report_len: REPORT_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub read_timeout: Duration,
    pub double_press_window: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(READ_TIMEOUT_MS),
            double_press_window: Duration::from_millis(DOUBLE_PRESS_WINDOW_MS),
        }
    }
}

/// Beep played after a successful mute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration: Duration,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            frequency_hz: TONE_FREQUENCY_HZ,
            duration: Duration::from_millis(TONE_DURATION_MS),
        }
    }
}

/// Every fixed value the daemon runs with.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settings {
    pub usb: UsbTarget,
    pub timing: Timing,
    pub tone: ToneSpec,
}

/// Platform-specific data directory (holds the log file).
pub fn data_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        dirs::config_dir().map(|p| p.join("ButtonMute"))
    }
    #[cfg(not(windows))]
    {
        dirs::config_dir().map(|p| p.join("buttonmute"))
    }
}

/// Full path to the log file.
pub fn log_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("buttonmute.log"))
}
