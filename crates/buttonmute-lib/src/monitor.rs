//! Button monitor loop: read → decode → debounce → dispatch.
//!
//! [`ButtonMonitor`] owns the double-press filter and a clock; it is
//! generic over the report source, mute backend and tone so the whole
//! pipeline runs in tests without hardware. [`run_session`] is the loop
//! the daemon sits in for its entire lifetime.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::audio::MuteControl;
use crate::config::Timing;
use crate::debounce::{PressClass, PressDebouncer};
use crate::device::{DeviceError, ReadOutcome, ReportSource, Result};
use crate::dispatch::{ConfirmTone, MuteDispatcher};
use crate::report::{self, ButtonEvent, RawReport};

// ── Clocks ──

/// Millisecond timestamps for the double-press filter.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Monotonic milliseconds since the clock was created.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        ManualClock {
            now: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

// ── State machine ──

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Read timed out; nothing changed.
    Idle,
    /// Report (or truncated transfer) did not carry a button press.
    Ignored,
    /// Press fell inside the double-press window; no mute call.
    Suppressed(ButtonEvent),
    /// Press was accepted and the mute call succeeded.
    Dispatched(ButtonEvent),
    /// Press was accepted but the mute call failed (logged, loop continues).
    BackendFailed(ButtonEvent),
}

/// Per-session counters, logged when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub reports: u64,
    pub short_reads: u64,
    pub timeouts: u64,
    pub accepted: u64,
    pub suppressed: u64,
    pub backend_failures: u64,
}

pub struct ButtonMonitor<C> {
    debouncer: PressDebouncer,
    clock: C,
    read_timeout: Duration,
    stats: MonitorStats,
}

impl<C: Clock> ButtonMonitor<C> {
    pub fn new(timing: &Timing, clock: C) -> Self {
        ButtonMonitor {
            debouncer: PressDebouncer::new(timing.double_press_window),
            clock,
            read_timeout: timing.read_timeout,
            stats: MonitorStats::default(),
        }
    }

    /// Decode one report and act on it.
    pub fn handle_report<M: MuteControl, T: ConfirmTone>(
        &mut self,
        report: &RawReport,
        dispatcher: &MuteDispatcher<M, T>,
    ) -> Step {
        self.stats.reports += 1;
        let event = report::decode(report);
        if !event.is_press() {
            log::trace!("[button] ignored {report:?}");
            return Step::Ignored;
        }

        let now = self.clock.now_ms();
        if self.debouncer.classify(now) == PressClass::Suppressed {
            self.stats.suppressed += 1;
            log::info!("[button] {event} suppressed (double-press)");
            return Step::Suppressed(event);
        }

        self.stats.accepted += 1;
        match dispatcher.dispatch(event) {
            Ok(()) => {
                log::info!("[button] {event}");
                Step::Dispatched(event)
            }
            Err(e) => {
                self.stats.backend_failures += 1;
                log::warn!("[audio] {event} failed: {e}");
                Step::BackendFailed(event)
            }
        }
    }

    /// Perform one blocking read and handle its result.
    ///
    /// Timeouts return [`Step::Idle`] and truncated transfers
    /// [`Step::Ignored`], neither touching the filter. Any read error is
    /// returned and should end the loop.
    pub fn step<S: ReportSource, M: MuteControl, T: ConfirmTone>(
        &mut self,
        source: &mut S,
        dispatcher: &MuteDispatcher<M, T>,
    ) -> Result<Step> {
        match source.read_report(self.read_timeout)? {
            ReadOutcome::Timeout => {
                self.stats.timeouts += 1;
                Ok(Step::Idle)
            }
            ReadOutcome::Short(len) => {
                self.stats.short_reads += 1;
                log::trace!("[button] dropped {len}-byte transfer");
                Ok(Step::Ignored)
            }
            ReadOutcome::Report(report) => Ok(self.handle_report(&report, dispatcher)),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Timestamp of the last press seen by the filter.
    pub fn last_press_ms(&self) -> Option<u64> {
        self.debouncer.last_press_ms()
    }
}

/// Run the monitor until the session fails, then release it.
///
/// Consumes the session: it is dropped (interface released, handle closed)
/// exactly once, before the fatal error is returned.
pub fn run_session<S, C, M, T>(
    mut session: S,
    monitor: &mut ButtonMonitor<C>,
    dispatcher: &MuteDispatcher<M, T>,
) -> DeviceError
where
    S: ReportSource,
    C: Clock,
    M: MuteControl,
    T: ConfirmTone,
{
    loop {
        if let Err(e) = monitor.step(&mut session, dispatcher) {
            let stats = monitor.stats();
            log::debug!(
                "[button] session ended after {} reports ({} accepted, {} suppressed, {} timeouts, {} short)",
                stats.reports,
                stats.accepted,
                stats.suppressed,
                stats.timeouts,
                stats.short_reads
            );
            drop(session);
            return e;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stub::RecordingMute;
    use crate::device::mock::MockSession;
    use crate::dispatch::stub::CountingTone;

    const UNMUTE: [u8; 3] = [2, 0, 0];
    const MUTE: [u8; 3] = [2, 8, 0];

    fn dispatcher() -> MuteDispatcher<RecordingMute, CountingTone> {
        MuteDispatcher::new(RecordingMute::new(), CountingTone::new())
    }

    fn monitor(clock: &ManualClock) -> ButtonMonitor<&ManualClock> {
        ButtonMonitor::new(&Timing::default(), clock)
    }

    #[test]
    fn unknown_report_is_ignored() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let step = m.handle_report(&RawReport::from_bytes(&[1, 2, 3]), &d);
        assert_eq!(step, Step::Ignored);
        assert!(d.mute().calls().is_empty());
        assert_eq!(m.last_press_ms(), None);
    }

    #[test]
    fn ignored_report_does_not_reset_timer() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        m.handle_report(&RawReport::from_bytes(&UNMUTE), &d);
        clock.set(200);
        m.handle_report(&RawReport::from_bytes(&[2, 4, 0]), &d);
        assert_eq!(m.last_press_ms(), Some(0));
    }

    #[test]
    fn first_press_is_dispatched() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let step = m.handle_report(&RawReport::from_bytes(&MUTE), &d);
        assert_eq!(step, Step::Dispatched(ButtonEvent::MuteOnPress));
        assert_eq!(d.mute().calls(), vec![true]);
        assert_eq!(d.tone().plays(), 1);
    }

    #[test]
    fn documented_scenario() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();

        // t=0 unmute → accepted
        let step = m.handle_report(&RawReport::from_bytes(&UNMUTE), &d);
        assert_eq!(step, Step::Dispatched(ButtonEvent::UnmuteOnPress));
        assert_eq!(d.mute().calls(), vec![false]);

        // t=100 mute → suppressed, no call, no tone
        clock.set(100);
        let step = m.handle_report(&RawReport::from_bytes(&MUTE), &d);
        assert_eq!(step, Step::Suppressed(ButtonEvent::MuteOnPress));
        assert_eq!(d.mute().calls(), vec![false]);
        assert_eq!(d.tone().plays(), 0);

        // t=400 mute → 300ms after the suppressed press → accepted
        clock.set(400);
        let step = m.handle_report(&RawReport::from_bytes(&MUTE), &d);
        assert_eq!(step, Step::Dispatched(ButtonEvent::MuteOnPress));
        assert_eq!(d.mute().calls(), vec![false, true]);
        assert_eq!(d.tone().plays(), 1);
    }

    #[test]
    fn boundaries_249_250_251() {
        for (delta, expect_accept) in [(249u64, false), (250, false), (251, true)] {
            let clock = ManualClock::new(10_000);
            let mut m = monitor(&clock);
            let d = dispatcher();
            m.handle_report(&RawReport::from_bytes(&UNMUTE), &d);
            clock.advance(delta);
            let step = m.handle_report(&RawReport::from_bytes(&UNMUTE), &d);
            if expect_accept {
                assert_eq!(step, Step::Dispatched(ButtonEvent::UnmuteOnPress), "Δ={delta}");
            } else {
                assert_eq!(step, Step::Suppressed(ButtonEvent::UnmuteOnPress), "Δ={delta}");
            }
        }
    }

    #[test]
    fn backend_failure_is_not_fatal() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        d.mute().fail.set(true);
        let step = m.handle_report(&RawReport::from_bytes(&MUTE), &d);
        assert_eq!(step, Step::BackendFailed(ButtonEvent::MuteOnPress));
        assert_eq!(d.tone().plays(), 0);

        d.mute().fail.set(false);
        clock.set(1000);
        let step = m.handle_report(&RawReport::from_bytes(&UNMUTE), &d);
        assert_eq!(step, Step::Dispatched(ButtonEvent::UnmuteOnPress));
        assert_eq!(m.stats().backend_failures, 1);
    }

    #[test]
    fn timeout_leaves_state_untouched() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_report(&UNMUTE).push_timeout();

        m.step(&mut s, &d).unwrap();
        clock.set(50);
        assert_eq!(m.step(&mut s, &d).unwrap(), Step::Idle);
        assert_eq!(m.last_press_ms(), Some(0));
        assert_eq!(d.mute().calls(), vec![false]);
        assert_eq!(m.stats().timeouts, 1);
    }

    #[test]
    fn truncated_transfer_never_dispatches() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_short(1).push_short(2).push_report(&MUTE);

        assert_eq!(m.step(&mut s, &d).unwrap(), Step::Ignored);
        assert_eq!(m.step(&mut s, &d).unwrap(), Step::Ignored);
        assert!(d.mute().calls().is_empty());
        assert_eq!(m.last_press_ms(), None);

        // A short read must not open a double-press window either
        clock.set(10);
        assert_eq!(
            m.step(&mut s, &d).unwrap(),
            Step::Dispatched(ButtonEvent::MuteOnPress)
        );
        assert_eq!(m.stats().short_reads, 2);
        assert_eq!(m.stats().reports, 1);
    }

    #[test]
    fn step_uses_configured_read_timeout() {
        let clock = ManualClock::new(0);
        let timing = Timing {
            read_timeout: Duration::from_millis(123),
            ..Timing::default()
        };
        let mut m = ButtonMonitor::new(&timing, &clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_timeout();
        m.step(&mut s, &d).unwrap();
        assert_eq!(s.last_timeout, Some(Duration::from_millis(123)));
    }

    #[test]
    fn step_propagates_read_error() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_error("pipe");
        let err = m.step(&mut s, &d).unwrap_err();
        assert!(matches!(err, DeviceError::ReadFailed(_)));
    }

    #[test]
    fn run_session_releases_once_on_immediate_error() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_error("no such device");
        let releases = s.release_counter();

        let err = run_session(s, &mut m, &d);
        assert!(matches!(err, DeviceError::ReadFailed(_)));
        assert_eq!(releases.get(), 1);
        assert!(d.mute().calls().is_empty());
    }

    #[test]
    fn run_session_processes_until_error() {
        let clock = ManualClock::new(0);
        let mut m = monitor(&clock);
        let d = dispatcher();
        let mut s = MockSession::new();
        s.push_timeout()
            .push_report(&MUTE)
            .push_report(&[0, 0, 0])
            .push_timeout()
            .push_error("disconnected");
        let releases = s.release_counter();

        let err = run_session(s, &mut m, &d);
        assert!(err.to_string().contains("disconnected"));
        assert_eq!(releases.get(), 1);
        assert_eq!(d.mute().calls(), vec![true]);
        let stats = m.stats();
        assert_eq!(stats.reports, 2);
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.accepted, 1);
    }

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(5);
        c.advance(10);
        assert_eq!(c.now_ms(), 15);
        c.set(1);
        assert_eq!(c.now_ms(), 1);
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let c = MonotonicClock::new();
        let a = c.now_ms();
        let b = c.now_ms();
        assert!(b >= a);
    }
}
