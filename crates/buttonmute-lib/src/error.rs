//! Unified error type for the buttonmute-lib crate.
//!
//! [`ButtonmuteError`] wraps the module-specific errors (`DeviceError`,
//! `AudioError`). `From` impls allow `?` to propagate across
//! module boundaries.

use std::fmt;

use crate::audio::AudioError;
use crate::device::DeviceError;

#[derive(Debug)]
pub enum ButtonmuteError {
    /// USB setup or read error.
    Device(DeviceError),
    /// Audio backend error (COM init, mute call).
    Audio(AudioError),
}

impl fmt::Display for ButtonmuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonmuteError::Device(e) => write!(f, "{e}"),
            ButtonmuteError::Audio(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ButtonmuteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ButtonmuteError::Device(e) => Some(e),
            ButtonmuteError::Audio(e) => Some(e),
        }
    }
}

impl From<DeviceError> for ButtonmuteError {
    fn from(e: DeviceError) -> Self {
        ButtonmuteError::Device(e)
    }
}

impl From<AudioError> for ButtonmuteError {
    fn from(e: AudioError) -> Self {
        ButtonmuteError::Audio(e)
    }
}

/// Crate-level Result alias using [`ButtonmuteError`].
pub type Result<T> = std::result::Result<T, ButtonmuteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_device_error() {
        let e: ButtonmuteError = DeviceError::NotFound.into();
        assert!(matches!(e, ButtonmuteError::Device(DeviceError::NotFound)));
    }

    #[test]
    fn from_audio_error() {
        let e: ButtonmuteError = AudioError::InitFailed("test".into()).into();
        assert!(matches!(
            e,
            ButtonmuteError::Audio(AudioError::InitFailed(_))
        ));
    }

    #[test]
    fn display_device_error() {
        let e = ButtonmuteError::Device(DeviceError::NotFound);
        assert_eq!(e.to_string(), "Headset not found");
    }

    #[test]
    fn source_chains_device_error() {
        let e = ButtonmuteError::Device(DeviceError::ReadFailed("endpoint 0x84: Pipe error".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("Pipe error"));
    }

    #[test]
    fn question_mark_propagation_device() {
        fn inner() -> crate::device::Result<()> {
            Err(DeviceError::InterfaceClaimFailed("busy".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(
            err,
            ButtonmuteError::Device(DeviceError::InterfaceClaimFailed(_))
        ));
    }
}
