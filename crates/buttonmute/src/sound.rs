//! Confirmation tone played after the microphone is muted.
//!
//! The tone is synthesized (no asset files): a short sine burst appended to
//! a rodio sink, so playback never blocks the button loop.

use rodio::source::{SineWave, Source};
use rodio::{OutputStream, Sink};

use buttonmute_lib::config::ToneSpec;
use buttonmute_lib::dispatch::ConfirmTone;

/// Linear gain applied to the full-scale sine.
const TONE_VOLUME: f32 = 0.25;

pub(crate) struct RodioTone {
    /// Must stay alive for as long as the sink plays.
    _stream: Option<OutputStream>,
    sink: Option<Sink>,
    spec: ToneSpec,
}

impl RodioTone {
    pub(crate) fn new(spec: ToneSpec) -> Self {
        let (stream, sink) = init_audio_output();
        if sink.is_none() {
            log::warn!("[tone] no audio output, confirmation tone disabled");
        }
        RodioTone {
            _stream: stream,
            sink,
            spec,
        }
    }
}

impl ConfirmTone for RodioTone {
    fn play(&self) {
        if let Some(ref sink) = self.sink {
            sink.append(tone_source(&self.spec));
        }
    }
}

/// Build the sine burst described by `spec`.
pub(crate) fn tone_source(spec: &ToneSpec) -> impl Source<Item = f32> + Send + 'static {
    SineWave::new(spec.frequency_hz)
        .take_duration(spec.duration)
        .amplify(TONE_VOLUME)
}

/// Initialize audio output, returning the stream and sink.
///
/// Returns `(None, None)` if audio output is unavailable (e.g. headless systems).
fn init_audio_output() -> (Option<OutputStream>, Option<Sink>) {
    match OutputStream::try_default() {
        Ok((stream, handle)) => (Some(stream), Sink::try_new(&handle).ok()),
        Err(e) => {
            log::warn!("[tone] could not open audio output: {e}");
            (None, None)
        }
    }
}
