//! Input report decoding. Maps raw interrupt reports to button events.
//!
//! The headset emits a 37-byte report on every button transition. Only the
//! first three bytes matter:
//!
//! | bytes `[0..3]` | meaning            |
//! |----------------|--------------------|
//! | `02 00 00`     | button released → unmute |
//! | `02 08 00`     | button pressed → mute    |
//!
//! Any other prefix (volume wheel, status reports) is ignored. A transfer
//! shorter than a full report is not a report at all.

pub use crate::config::REPORT_LEN;

/// Report ID carried in byte 0 of every mute-button report.
const REPORT_ID_BUTTON: u8 = 0x02;

/// Byte 1 value when the mic is switched to muted.
const BUTTON_MUTE: u8 = 0x08;

/// Byte 1 value when the mic is switched back to live.
const BUTTON_UNMUTE: u8 = 0x00;

/// One fixed-size input report.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawReport([u8; REPORT_LEN]);

impl RawReport {
    /// Take a report from the bytes of one interrupt transfer.
    ///
    /// Returns `None` for a truncated transfer; trailing extra bytes are dropped.
    pub fn from_transfer(bytes: &[u8]) -> Option<Self> {
        let full: [u8; REPORT_LEN] = bytes.get(..REPORT_LEN)?.try_into().ok()?;
        Some(RawReport(full))
    }

    /// Build a fixture report from its leading bytes, zero-filling the rest.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; REPORT_LEN];
        let n = bytes.len().min(REPORT_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        RawReport(buf)
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for RawReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawReport({:02X?}..)", &self.0[..4])
    }
}

/// Button semantics carried by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    MuteOnPress,
    UnmuteOnPress,
    None,
}

impl ButtonEvent {
    /// Mute state this event asks for, or `None` for non-button reports.
    pub fn target_mute(self) -> Option<bool> {
        match self {
            ButtonEvent::MuteOnPress => Some(true),
            ButtonEvent::UnmuteOnPress => Some(false),
            ButtonEvent::None => None,
        }
    }

    pub fn is_press(self) -> bool {
        self != ButtonEvent::None
    }
}

impl std::fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ButtonEvent::MuteOnPress => write!(f, "mute"),
            ButtonEvent::UnmuteOnPress => write!(f, "unmute"),
            ButtonEvent::None => write!(f, "none"),
        }
    }
}

/// Decode a report. Never fails; unknown patterns yield [`ButtonEvent::None`].
pub fn decode(report: &RawReport) -> ButtonEvent {
    match &report.0[..3] {
        [REPORT_ID_BUTTON, BUTTON_UNMUTE, 0] => ButtonEvent::UnmuteOnPress,
        [REPORT_ID_BUTTON, BUTTON_MUTE, 0] => ButtonEvent::MuteOnPress,
        _ => ButtonEvent::None,
    }
}
