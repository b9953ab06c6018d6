//! Double-press filter for button events.
//!
//! A press arriving within `window_ms` of the previous press is suppressed;
//! the user double-tapping the button cancels the action instead of
//! repeating it. The timer is reset by every press, suppressed or not, so a
//! third rapid press is compared against the second.

use std::time::Duration;

/// Classification of a single press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressClass {
    /// Far enough from the previous press; dispatch it.
    Accepted,
    /// Within the double-press window; drop it.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct PressDebouncer {
    window_ms: u64,
    /// Timestamp of the most recent press. `None` until the first press.
    last_press_ms: Option<u64>,
}

impl PressDebouncer {
    pub fn new(window: Duration) -> Self {
        Self::with_window_ms(window.as_millis() as u64)
    }

    pub fn with_window_ms(window_ms: u64) -> Self {
        PressDebouncer {
            window_ms,
            last_press_ms: None,
        }
    }

    /// Classify a press observed at `now_ms` and restart the window from it.
    pub fn classify(&mut self, now_ms: u64) -> PressClass {
        let previous = self.last_press_ms.replace(now_ms);
        match previous {
            None => PressClass::Accepted,
            // Saturating: a clock step backwards lands inside the window
            Some(last) if now_ms.saturating_sub(last) <= self.window_ms => PressClass::Suppressed,
            Some(_) => PressClass::Accepted,
        }
    }

    /// Timestamp of the last press seen, accepted or suppressed.
    pub fn last_press_ms(&self) -> Option<u64> {
        self.last_press_ms
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}
