//! ButtonMute: microphone mute control driven by a USB headset button.

pub mod audio;
pub mod config;
pub mod debounce;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod report;

pub use error::ButtonmuteError;
