//! Host transport contract consumed by class drivers.

use core::future::Future;

use crate::address::AddressPool;

/// Error type for host-side transfers.
///
/// Status codes follow the usual host controller result numbering so they
/// can be reported verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Device answered NAK and the endpoint's NAK budget ran out.
    Nak,
    /// Device stalled the endpoint.
    Stall,
    /// No response within the bus turnaround time.
    Timeout,
    /// Data toggle mismatch.
    Toggle,
    /// Device sent more data than the buffer holds.
    BufferOverflow,
    /// Address or endpoint not present in the pool.
    UnknownDevice,
    /// Any other controller status code.
    Protocol(u8),
}

impl TransferError {
    /// Numeric status code of this error.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Nak => 0x04,
            Self::Stall => 0x05,
            Self::Toggle => 0x06,
            Self::Timeout => 0x0E,
            Self::BufferOverflow => 0x0F,
            Self::UnknownDevice => 0xDB,
            Self::Protocol(code) => code,
        }
    }
}

impl core::fmt::Display for TransferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Nak => write!(f, "NAK"),
            Self::Stall => write!(f, "STALL"),
            Self::Timeout => write!(f, "timeout"),
            Self::Toggle => write!(f, "data toggle mismatch"),
            Self::BufferOverflow => write!(f, "buffer overflow"),
            Self::UnknownDevice => write!(f, "unknown device"),
            Self::Protocol(code) => write!(f, "transfer status {:#04x}", code),
        }
    }
}

/// Outcome of one host housekeeping tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// Nothing changed on the port.
    None,
    /// A device was attached, reset, and is answering on address 0.
    Attached { low_speed: bool },
    /// The device on the port went away.
    Detached,
}

/// Root port connection bookkeeping for a host controller.
///
/// Tracks whether a device is on the port and whether the bus must be
/// sampled without a connect interrupt. The connect interrupt is cleared
/// before the attach sequence runs, so a failed attach re-arms the probe
/// here; otherwise the device would stay invisible until it is replugged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortMonitor {
    /// `Some(low_speed)` while a device is on the port.
    port: Option<bool>,
    probe_pending: bool,
}

impl PortMonitor {
    pub const fn new() -> Self {
        Self {
            port: None,
            probe_pending: false,
        }
    }

    /// Forget the port and sample the bus on the next tick.
    ///
    /// Used after controller bring-up, when a device plugged in at power-up
    /// raised no interrupt.
    pub fn reset(&mut self) {
        self.port = None;
        self.probe_pending = true;
    }

    /// Whether this tick should sample the bus. Consumes a pending probe.
    pub fn should_sample(&mut self, connect_irq: bool) -> bool {
        let sample = connect_irq || self.probe_pending;
        self.probe_pending = false;
        sample
    }

    /// Event implied by a bus sample, without committing it.
    ///
    /// `sampled` is `Some(low_speed)` for a connected device.
    #[must_use]
    pub fn change(&self, sampled: Option<bool>) -> BusEvent {
        match (self.port, sampled) {
            (None, Some(low_speed)) => BusEvent::Attached { low_speed },
            (Some(_), None) => BusEvent::Detached,
            _ => BusEvent::None,
        }
    }

    /// Commit an event once the controller finished handling it.
    pub fn commit(&mut self, event: BusEvent) {
        match event {
            BusEvent::Attached { low_speed } => self.port = Some(low_speed),
            BusEvent::Detached => self.port = None,
            BusEvent::None => {}
        }
    }

    /// The tick failed part way; sample again on the next one.
    pub fn failed(&mut self) {
        self.probe_pending = true;
    }

    /// `Some(low_speed)` while a device is on the port.
    #[inline]
    pub fn port(&self) -> Option<bool> {
        self.port
    }
}

/// Async trait for the USB host transaction engine.
///
/// Implementations own the host controller and the shared [`AddressPool`];
/// class drivers only issue requests through this interface. All methods
/// return after a bounded number of bus transactions.
///
/// # `no_std` Compatibility
///
/// All implementations must be `#![no_std]` compatible with no heap allocation.
pub trait HostBus {
    /// Shared address pool of this host port.
    fn address_pool(&mut self) -> &mut AddressPool;

    /// GET_DESCRIPTOR(DEVICE) on the control pipe `endpoint` of `address`,
    /// reading at most `buf.len()` bytes. Returns the number of bytes read.
    fn device_descriptor(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, TransferError>>;

    /// SET_ADDRESS: move the device answering on `address` to `new_address`.
    fn set_address(
        &mut self,
        address: u8,
        endpoint: u8,
        new_address: u8,
    ) -> impl Future<Output = Result<(), TransferError>>;

    /// SET_CONFIGURATION on the control pipe `endpoint` of `address`.
    fn set_configuration(
        &mut self,
        address: u8,
        endpoint: u8,
        value: u8,
    ) -> impl Future<Output = Result<(), TransferError>>;

    /// One inbound transfer from `endpoint` of `address` into `buf`.
    ///
    /// Honors the endpoint's NAK policy from the pool. Returns the number of
    /// bytes received.
    fn in_transfer(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, TransferError>>;

    /// Housekeeping tick: detect attach/detach and reset newly attached devices.
    fn task(&mut self) -> impl Future<Output = BusEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_codes_are_verbatim() {
        assert_eq!(TransferError::Protocol(0x0D).code(), 0x0D);
        assert_eq!(TransferError::Nak.code(), 0x04);
        assert_eq!(TransferError::Stall.code(), 0x05);
        assert_eq!(TransferError::Timeout.code(), 0x0E);
    }

    #[test]
    fn test_unknown_device_code() {
        // Endpoint not found in the device's table.
        assert_eq!(TransferError::UnknownDevice.code(), 0xDB);
    }

    #[test]
    fn test_port_monitor_power_up_probe() {
        let mut monitor = PortMonitor::new();
        assert!(!monitor.should_sample(false));

        monitor.reset();
        assert!(monitor.should_sample(false));
        // The probe is consumed.
        assert!(!monitor.should_sample(false));
    }

    #[test]
    fn test_port_monitor_attach_detach() {
        let mut monitor = PortMonitor::new();
        assert!(monitor.should_sample(true));

        let event = monitor.change(Some(true));
        assert_eq!(event, BusEvent::Attached { low_speed: true });
        monitor.commit(event);
        assert_eq!(monitor.port(), Some(true));

        // Same device sampled again: no event.
        assert_eq!(monitor.change(Some(true)), BusEvent::None);

        let event = monitor.change(None);
        assert_eq!(event, BusEvent::Detached);
        monitor.commit(event);
        assert_eq!(monitor.port(), None);
        assert_eq!(monitor.change(None), BusEvent::None);
    }

    #[test]
    fn test_port_monitor_failed_attach_is_retried() {
        let mut monitor = PortMonitor::new();

        // Connect interrupt seen and cleared, then the bus reset times out
        // before the attach is committed.
        assert!(monitor.should_sample(true));
        assert_eq!(
            monitor.change(Some(false)),
            BusEvent::Attached { low_speed: false }
        );
        monitor.failed();

        // No new interrupt, but the next tick still samples the bus and
        // reports the attach again.
        assert!(monitor.should_sample(false));
        assert_eq!(monitor.port(), None);
        assert_eq!(
            monitor.change(Some(false)),
            BusEvent::Attached { low_speed: false }
        );
    }
}
