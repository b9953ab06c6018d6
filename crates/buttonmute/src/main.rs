//! ButtonMute: mutes the microphone from a USB headset button.
//!
//! Runs as a windowless background process in release builds on Windows.
//! Exits 1 when the headset cannot be acquired, 0 once the read loop ends.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod sound;

use buttonmute_lib::audio;
use buttonmute_lib::config::{self, Settings};
use buttonmute_lib::device::UsbSession;
use buttonmute_lib::dispatch::MuteDispatcher;
use buttonmute_lib::error::Result;
use buttonmute_lib::monitor::{ButtonMonitor, MonotonicClock, run_session};

/// Initialize the logger.
///
/// Release builds have no console, so output goes to the log file; debug
/// builds and unwritable log paths fall back to stderr.
fn init_logger() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_target(false);

    if !cfg!(debug_assertions)
        && let Some(log_path) = config::log_path()
    {
        if let Some(dir) = log_path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(file) = std::fs::File::create(&log_path) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }

    builder.init();
}

fn run() -> Result<()> {
    let settings = Settings::default();

    let session = UsbSession::acquire(&settings.usb)?;

    #[cfg(windows)]
    audio::com_init()?;

    let dispatcher = MuteDispatcher::new(audio::system_mute(), sound::RodioTone::new(settings.tone));
    let mut monitor = ButtonMonitor::new(&settings.timing, MonotonicClock::new());

    log::info!(
        "[button] listening on {} (endpoint 0x{:02X})",
        session.describe(),
        settings.usb.endpoint
    );

    let err = run_session(session, &mut monitor, &dispatcher);
    log::error!("[device] {err}, stopping");
    Ok(())
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
