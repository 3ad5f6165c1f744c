//! Output sink trait and error types.

use core::future::Future;
use sixdof_proto::DeviceState;

/// Error type for output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// USB/communication I/O error.
    Io,
    /// Device not ready (e.g., USB not enumerated).
    NotReady,
    /// Endpoint disabled by the host.
    Disabled,
}

impl core::fmt::Display for OutputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::NotReady => write!(f, "not ready"),
            Self::Disabled => write!(f, "endpoint disabled"),
        }
    }
}

/// Async trait for the device-side gamepad endpoint.
///
/// `send` is the "send report" operation: it writes
/// [`DeviceState::to_report`] verbatim to the interrupt-in endpoint and
/// completes the transfer, so nothing else is queued behind it.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait OutputSink {
    /// Send the current state as one HID input report.
    ///
    /// May wait until the host has collected the previous report.
    fn send(&mut self, state: &DeviceState) -> impl Future<Output = Result<(), OutputError>>;

    /// Check if the output is ready to accept data.
    fn is_ready(&self) -> bool;
}
