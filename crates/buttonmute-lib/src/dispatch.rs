//! Turns accepted button presses into mute calls.

use crate::audio::{self, MuteControl};
use crate::report::ButtonEvent;

/// Audible confirmation played after the microphone was muted.
pub trait ConfirmTone {
    /// Start the tone. Must not block for longer than the tone itself.
    fn play(&self);
}

pub struct MuteDispatcher<M, T> {
    mute: M,
    tone: T,
}

impl<M: MuteControl, T: ConfirmTone> MuteDispatcher<M, T> {
    pub fn new(mute: M, tone: T) -> Self {
        MuteDispatcher { mute, tone }
    }

    /// Apply an accepted press.
    ///
    /// `MuteOnPress` mutes and then plays the confirmation tone;
    /// `UnmuteOnPress` unmutes silently; `None` does nothing. The tone is
    /// skipped when the mute call fails.
    pub fn dispatch(&self, event: ButtonEvent) -> audio::Result<()> {
        let Some(muted) = event.target_mute() else {
            return Ok(());
        };
        self.mute.set_muted(muted)?;
        if muted {
            self.tone.play();
        }
        Ok(())
    }

    pub fn mute(&self) -> &M {
        &self.mute
    }

    pub fn tone(&self) -> &T {
        &self.tone
    }
}

// ── Test stub ──

pub mod stub {
    use super::*;
    use std::cell::Cell;

    /// Counts `play` calls.
    #[derive(Default)]
    pub struct CountingTone {
        pub plays: Cell<u32>,
    }

    impl CountingTone {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn plays(&self) -> u32 {
            self.plays.get()
        }
    }

    impl ConfirmTone for CountingTone {
        fn play(&self) {
            self.plays.set(self.plays.get() + 1);
        }
    }
}
