//! Device session: exclusive access to the headset's HID interface.
//!
//! [`UsbSession`] claims the button interface through libusb and reads raw
//! input reports from its interrupt endpoint. Releasing the interface is
//! tied to `Drop`, so every exit path (setup failure half-way, fatal read
//! error, normal return) gives the interface back exactly once.

use std::fmt;
use std::time::Duration;

use rusb::UsbContext;

use crate::config::UsbTarget;
use crate::report::RawReport;

// ── Error type ──

/// Device errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"libusb init"`, `"interface 5"`) and
/// *details* is the libusb error text.
#[derive(Debug)]
pub enum DeviceError {
    /// libusb could not be initialized.
    InitFailed(String),
    /// No connected device matches the vendor/product pair.
    NotFound,
    /// The OS driver owning the interface refused to detach.
    DriverDetachFailed(String),
    /// The interface is held by another process (or the claim was refused).
    InterfaceClaimFailed(String),
    /// Non-timeout failure of an interrupt read. Ends the read loop.
    ReadFailed(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::InitFailed(e) => write!(f, "USB init failed: {e}"),
            DeviceError::NotFound => write!(f, "Headset not found"),
            DeviceError::DriverDetachFailed(e) => {
                write!(f, "Could not detach kernel driver: {e}")
            }
            DeviceError::InterfaceClaimFailed(e) => write!(f, "Failed to claim interface: {e}"),
            DeviceError::ReadFailed(e) => write!(f, "Read failed: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Trait ──

/// Result of one successful read call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Report(RawReport),
    /// Transfer ended before a full report; carries the byte count.
    Short(usize),
    /// Nothing arrived within the timeout. Not an error.
    Timeout,
}

/// Source of raw input reports.
pub trait ReportSource {
    /// Block for at most `timeout` waiting for one report.
    fn read_report(&mut self, timeout: Duration) -> Result<ReadOutcome>;
}

// ── libusb implementation ──

pub struct UsbSession {
    handle: rusb::DeviceHandle<rusb::Context>,
    target: UsbTarget,
    /// Set when this session detached the kernel driver and must hand it back.
    reattach_driver: bool,
    label: String,
}

impl UsbSession {
    /// Open the target device and claim its interface exclusively.
    ///
    /// Detaches an active kernel driver first. On platforms where the
    /// driver query is unsupported (Windows/macOS) the interface is assumed
    /// to be free.
    pub fn acquire(target: &UsbTarget) -> Result<Self> {
        let context = rusb::Context::new()
            .map_err(|e| DeviceError::InitFailed(format!("libusb init: {e}")))?;

        let handle = context
            .open_device_with_vid_pid(target.vendor_id, target.product_id)
            .ok_or(DeviceError::NotFound)?;

        let device = handle.device();
        let label = format!(
            "usb:{:03}/{:03} [{:04x}:{:04x}]",
            device.bus_number(),
            device.address(),
            target.vendor_id,
            target.product_id,
        );
        if let Ok(desc) = device.device_descriptor()
            && let Ok(product) = handle.read_product_string_ascii(&desc)
        {
            log::debug!("[device] {label}: {product}");
        }

        let iface = target.interface;
        let reattach_driver = match handle.kernel_driver_active(iface) {
            Ok(true) => {
                handle.detach_kernel_driver(iface).map_err(|e| {
                    DeviceError::DriverDetachFailed(format!("interface {iface}: {e}"))
                })?;
                log::debug!("[device] detached kernel driver from interface {iface}");
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::debug!("[device] kernel driver query unavailable: {e}");
                false
            }
        };

        if let Err(e) = handle.claim_interface(iface) {
            if reattach_driver {
                let _ = handle.attach_kernel_driver(iface);
            }
            return Err(DeviceError::InterfaceClaimFailed(format!(
                "interface {iface}: {e}"
            )));
        }

        log::info!("[device] claimed interface {iface} on {label}");

        Ok(UsbSession {
            handle,
            target: *target,
            reattach_driver,
            label,
        })
    }

    /// Bus/address/ID label, e.g. `usb:001/007 [1532:0520]`.
    pub fn describe(&self) -> &str {
        &self.label
    }
}

impl ReportSource for UsbSession {
    fn read_report(&mut self, timeout: Duration) -> Result<ReadOutcome> {
        let mut buf = vec![0u8; self.target.report_len];
        match self
            .handle
            .read_interrupt(self.target.endpoint, &mut buf, timeout)
        {
            Ok(n) => Ok(match RawReport::from_transfer(&buf[..n]) {
                Some(report) => ReadOutcome::Report(report),
                None => ReadOutcome::Short(n),
            }),
            Err(rusb::Error::Timeout) => Ok(ReadOutcome::Timeout),
            Err(e) => Err(DeviceError::ReadFailed(format!(
                "endpoint 0x{:02X}: {e}",
                self.target.endpoint
            ))),
        }
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        let iface = self.target.interface;
        if let Err(e) = self.handle.release_interface(iface) {
            log::warn!("[device] could not release interface {iface}: {e}");
        }
        if self.reattach_driver
            && let Err(e) = self.handle.attach_kernel_driver(iface)
        {
            log::warn!("[device] could not re-attach kernel driver: {e}");
        }
        log::info!("[device] released {}", self.label);
        // Handle and context close when the fields drop.
    }
}

// ── Mock session for testing ──

/// Scripted report source for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays a queue of read results. Once the queue is empty every read
    /// fails, which ends the monitor loop. Drops are counted in a shared
    /// counter so tests can check the release happened exactly once.
    pub struct MockSession {
        script: VecDeque<Result<ReadOutcome>>,
        releases: Rc<Cell<u32>>,
        /// Timeout passed to the most recent read.
        pub last_timeout: Option<Duration>,
        /// Number of `read_report` calls.
        pub reads: u32,
    }

    impl Default for MockSession {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockSession {
        pub fn new() -> Self {
            MockSession {
                script: VecDeque::new(),
                releases: Rc::new(Cell::new(0)),
                last_timeout: None,
                reads: 0,
            }
        }

        /// Queue a report whose leading bytes are `prefix`.
        pub fn push_report(&mut self, prefix: &[u8]) -> &mut Self {
            self.script
                .push_back(Ok(ReadOutcome::Report(RawReport::from_bytes(prefix))));
            self
        }

        /// Queue a truncated transfer of `len` bytes.
        pub fn push_short(&mut self, len: usize) -> &mut Self {
            self.script.push_back(Ok(ReadOutcome::Short(len)));
            self
        }

        pub fn push_timeout(&mut self) -> &mut Self {
            self.script.push_back(Ok(ReadOutcome::Timeout));
            self
        }

        pub fn push_error(&mut self, msg: &str) -> &mut Self {
            self.script
                .push_back(Err(DeviceError::ReadFailed(format!("mock: {msg}"))));
            self
        }

        /// Shared release counter; stays readable after the session is dropped.
        pub fn release_counter(&self) -> Rc<Cell<u32>> {
            Rc::clone(&self.releases)
        }
    }

    impl ReportSource for MockSession {
        fn read_report(&mut self, timeout: Duration) -> Result<ReadOutcome> {
            self.reads += 1;
            self.last_timeout = Some(timeout);
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(DeviceError::ReadFailed("mock: script exhausted".into())))
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }
}
