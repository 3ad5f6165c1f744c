//! Injectable diagnostics observer.
//!
//! Drivers and the bridge report noteworthy events here instead of printing.
//! Every method defaults to a no-op, so [`NoDiagnostics`] compiles away and
//! firmware builds can forward to their logger of choice.

use sixdof_proto::{DecodeError, DeviceState};

use crate::driver::ConfigureError;
use crate::host::{BusEvent, TransferError};
use crate::output::OutputError;

/// Observer for bridge and driver events.
#[allow(unused_variables)]
pub trait Diagnostics {
    /// The port reported an attach or detach.
    fn bus_event(&mut self, event: BusEvent) {}

    /// A device descriptor was read and its identity is being checked.
    fn identity_checked(&mut self, vendor_id: u16, product_id: u16) {}

    /// Enumeration finished; the device now answers on `address`.
    fn configured(&mut self, address: u8) {}

    /// Enumeration failed; the driver has released everything it held.
    fn configure_failed(&mut self, error: ConfigureError) {}

    /// An inbound transfer on `endpoint` failed and was skipped.
    fn transfer_failed(&mut self, endpoint: u8, error: TransferError) {}

    /// A report was discarded without touching the state.
    fn report_discarded(&mut self, endpoint: u8, error: DecodeError, payload: &[u8]) {}

    /// A report was decoded and applied.
    fn state_updated(&mut self, state: &DeviceState) {}

    /// The output sink rejected a report.
    fn output_failed(&mut self, error: OutputError) {}
}

/// Diagnostics observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}

impl<G: Diagnostics + ?Sized> Diagnostics for &mut G {
    fn bus_event(&mut self, event: BusEvent) {
        (**self).bus_event(event)
    }

    fn identity_checked(&mut self, vendor_id: u16, product_id: u16) {
        (**self).identity_checked(vendor_id, product_id)
    }

    fn configured(&mut self, address: u8) {
        (**self).configured(address)
    }

    fn configure_failed(&mut self, error: ConfigureError) {
        (**self).configure_failed(error)
    }

    fn transfer_failed(&mut self, endpoint: u8, error: TransferError) {
        (**self).transfer_failed(endpoint, error)
    }

    fn report_discarded(&mut self, endpoint: u8, error: DecodeError, payload: &[u8]) {
        (**self).report_discarded(endpoint, error, payload)
    }

    fn state_updated(&mut self, state: &DeviceState) {
        (**self).state_updated(state)
    }

    fn output_failed(&mut self, error: OutputError) {
        (**self).output_failed(error)
    }
}
