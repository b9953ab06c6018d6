//! Microphone mute control: trait + Windows WASAPI and Linux PulseAudio backends.

use std::cell::RefCell;
use std::fmt;

#[derive(Debug)]
pub enum AudioError {
    InitFailed(String),
    OperationFailed(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::InitFailed(e) => write!(f, "Audio init failed: {e}"),
            AudioError::OperationFailed(e) => write!(f, "Audio operation failed: {e}"),
        }
    }
}

impl std::error::Error for AudioError {}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Sets the mute state of the default capture device.
pub trait MuteControl {
    fn set_muted(&self, muted: bool) -> Result<()>;
}

// ── Windows WASAPI implementation ──

#[cfg(windows)]
mod wasapi {
    use super::*;

    use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
    use windows::Win32::Media::Audio::{IMMDeviceEnumerator, MMDeviceEnumerator, eCapture, eConsole};
    use windows::Win32::System::Com::*;

    pub struct WasapiMute {
        volume: IAudioEndpointVolume,
    }

    impl WasapiMute {
        /// Bind to the current default capture (microphone) endpoint.
        /// Caller must ensure COM is initialized on this thread.
        pub fn new() -> Result<Self> {
            unsafe {
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                        .map_err(|e| AudioError::InitFailed(format!("MMDeviceEnumerator: {e}")))?;

                let device = enumerator
                    .GetDefaultAudioEndpoint(eCapture, eConsole)
                    .map_err(|e| AudioError::InitFailed(format!("GetDefaultAudioEndpoint: {e}")))?;

                let volume: IAudioEndpointVolume = device
                    .Activate(CLSCTX_ALL, None)
                    .map_err(|e| AudioError::InitFailed(format!("IAudioEndpointVolume: {e}")))?;

                Ok(WasapiMute { volume })
            }
        }
    }

    impl MuteControl for WasapiMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            unsafe {
                self.volume
                    .SetMute(muted, std::ptr::null())
                    .map_err(|e| AudioError::OperationFailed(format!("SetMute: {e}")))
            }
        }
    }

    /// Initialize COM for the current thread (apartment-threaded).
    pub fn com_init() -> Result<()> {
        unsafe {
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(|e| AudioError::InitFailed(format!("CoInitializeEx: {e}")))
        }
    }
}

#[cfg(windows)]
pub use wasapi::{WasapiMute, com_init};

// ── Linux PulseAudio implementation ──

#[cfg(target_os = "linux")]
mod pulse {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use libpulse_binding::context::{Context, FlagSet as ContextFlagSet, State as ContextState};
    use libpulse_binding::mainloop::threaded::Mainloop;
    use libpulse_binding::operation::State as OperationState;

    const DEFAULT_SOURCE: &str = "@DEFAULT_SOURCE@";

    /// How long to wait for the server to accept the connection or
    /// acknowledge a mute request.
    const OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

    struct PulseInner {
        mainloop: Mainloop,
        context: Context,
    }

    pub struct PulseAudioMute {
        inner: Mutex<PulseInner>,
    }

    impl PulseAudioMute {
        /// Connect to the PulseAudio/PipeWire server.
        pub fn new() -> Result<Self> {
            let mut mainloop = Mainloop::new().ok_or_else(|| {
                AudioError::InitFailed("PulseAudio mainloop creation failed".into())
            })?;

            let mut context = Context::new(&mainloop, "buttonmute").ok_or_else(|| {
                AudioError::InitFailed("PulseAudio context creation failed".into())
            })?;

            context
                .connect(None, ContextFlagSet::NOFLAGS, None)
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio connect: {e}")))?;

            mainloop
                .start()
                .map_err(|e| AudioError::InitFailed(format!("PulseAudio mainloop start: {e}")))?;

            let deadline = Instant::now() + OPERATION_TIMEOUT;
            loop {
                mainloop.lock();
                let state = context.get_state();
                mainloop.unlock();
                let failure = match state {
                    ContextState::Ready => break,
                    ContextState::Failed | ContextState::Terminated => {
                        "PulseAudio context connection failed"
                    }
                    _ if Instant::now() >= deadline => "PulseAudio context connection timed out",
                    _ => {
                        std::thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                };
                mainloop.lock();
                context.disconnect();
                mainloop.unlock();
                mainloop.stop();
                return Err(AudioError::InitFailed(failure.into()));
            }

            Ok(PulseAudioMute {
                inner: Mutex::new(PulseInner { mainloop, context }),
            })
        }
    }

    impl MuteControl for PulseAudioMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            let mut inner = self.inner.lock().map_err(|e| {
                AudioError::OperationFailed(format!("PulseAudio mutex poisoned: {e}"))
            })?;

            let outcome: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
            let outcome_cb = Arc::clone(&outcome);

            inner.mainloop.lock();
            let mut introspect = inner.context.introspect();
            let mut op = introspect.set_source_mute_by_name(
                DEFAULT_SOURCE,
                muted,
                Some(Box::new(move |success| {
                    if let Ok(mut o) = outcome_cb.lock() {
                        *o = Some(success);
                    }
                })),
            );
            inner.mainloop.unlock();

            let deadline = Instant::now() + OPERATION_TIMEOUT;
            let state = loop {
                inner.mainloop.lock();
                let state = op.get_state();
                inner.mainloop.unlock();
                if !matches!(state, OperationState::Running) || Instant::now() >= deadline {
                    break state;
                }
                std::thread::sleep(Duration::from_millis(5));
            };

            inner.mainloop.lock();
            if matches!(state, OperationState::Running) {
                op.cancel();
            }
            drop(op);
            inner.mainloop.unlock();

            let acknowledged = outcome.lock().ok().and_then(|o| *o);
            match (state, acknowledged) {
                (_, Some(true)) => Ok(()),
                (_, Some(false)) => Err(AudioError::OperationFailed(format!(
                    "set_source_mute({DEFAULT_SOURCE}) rejected by server"
                ))),
                (OperationState::Running, None) => Err(AudioError::OperationFailed(
                    "set_source_mute timed out".into(),
                )),
                (_, None) => Err(AudioError::OperationFailed(
                    "set_source_mute cancelled".into(),
                )),
            }
        }
    }

    impl Drop for PulseAudioMute {
        fn drop(&mut self) {
            if let Ok(mut inner) = self.inner.lock() {
                inner.mainloop.lock();
                inner.context.disconnect();
                inner.mainloop.unlock();
                inner.mainloop.stop();
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use pulse::PulseAudioMute;

// ── Unsupported platforms ──

/// Placeholder backend that always fails to connect.
#[cfg(not(any(windows, target_os = "linux")))]
pub struct UnsupportedMute;

#[cfg(not(any(windows, target_os = "linux")))]
impl UnsupportedMute {
    pub fn new() -> Result<Self> {
        Err(AudioError::InitFailed(
            "Mute control is not yet supported on this platform.".into(),
        ))
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
impl MuteControl for UnsupportedMute {
    fn set_muted(&self, _muted: bool) -> Result<()> {
        Err(AudioError::InitFailed(
            "Mute control is not yet supported on this platform.".into(),
        ))
    }
}

/// Concrete backend type for the current platform.
#[cfg(windows)]
pub type PlatformMute = WasapiMute;
#[cfg(target_os = "linux")]
pub type PlatformMute = PulseAudioMute;
#[cfg(not(any(windows, target_os = "linux")))]
pub type PlatformMute = UnsupportedMute;

// ── Lazy reconnecting wrapper ──

/// When [`LazyMute`] drops its backend and connects a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    /// Keep the backend until a call fails. For backends that address the
    /// default device by alias and resolve it on every request.
    OnFailure,
    /// Connect for every call. For backends bound to one concrete endpoint,
    /// so a change of default capture device is picked up at the next press.
    EveryCall,
}

/// Connects its backend on first use and reconnects according to its
/// [`Reconnect`] policy (e.g. after the default capture device changed or
/// the sound server restarted).
pub struct LazyMute<B> {
    connect: Box<dyn Fn() -> Result<B>>,
    policy: Reconnect,
    backend: RefCell<Option<B>>,
}

impl<B: MuteControl> LazyMute<B> {
    pub fn new(policy: Reconnect, connect: impl Fn() -> Result<B> + 'static) -> Self {
        LazyMute {
            connect: Box::new(connect),
            policy,
            backend: RefCell::new(None),
        }
    }

    /// `true` while a backend connection is held.
    pub fn is_connected(&self) -> bool {
        self.backend.borrow().is_some()
    }
}

impl<B: MuteControl> MuteControl for LazyMute<B> {
    fn set_muted(&self, muted: bool) -> Result<()> {
        let mut slot = self.backend.borrow_mut();
        let backend = match slot.take() {
            Some(b) => b,
            None => {
                let b = (self.connect)()?;
                log::debug!("[audio] connected to capture device backend");
                b
            }
        };
        let result = backend.set_muted(muted);
        if result.is_ok() && self.policy == Reconnect::OnFailure {
            *slot = Some(backend);
        }
        result
    }
}

/// Platform mute control for the default capture device.
pub type SystemMute = LazyMute<PlatformMute>;

/// WASAPI binds a concrete endpoint, PulseAudio targets `@DEFAULT_SOURCE@`.
#[cfg(windows)]
const SYSTEM_RECONNECT: Reconnect = Reconnect::EveryCall;
#[cfg(not(windows))]
const SYSTEM_RECONNECT: Reconnect = Reconnect::OnFailure;

/// Build the platform [`SystemMute`]. No connection is made until the first call.
pub fn system_mute() -> SystemMute {
    LazyMute::new(SYSTEM_RECONNECT, PlatformMute::new)
}

// ── Test stub ──

/// Recording [`MuteControl`] for unit and integration tests.
pub mod stub {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    pub struct RecordingMute {
        /// Every `set_muted` argument, in call order (including failed calls).
        pub calls: RefCell<Vec<bool>>,
        /// When set, `set_muted` records the call and then fails.
        pub fail: Cell<bool>,
    }

    impl RecordingMute {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<bool> {
            self.calls.borrow().clone()
        }
    }

    impl MuteControl for RecordingMute {
        fn set_muted(&self, muted: bool) -> Result<()> {
            self.calls.borrow_mut().push(muted);
            if self.fail.get() {
                return Err(AudioError::OperationFailed("stub: failure injected".into()));
            }
            Ok(())
        }
    }
}
