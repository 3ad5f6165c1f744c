//! defmt-backed diagnostics observer.

use defmt::{error, info, trace, warn};
use sixdof_core::{BusEvent, ConfigureError, Diagnostics, OutputError, TransferError};
use sixdof_proto::{DecodeError, DeviceState};

/// Forwards bridge and driver events to the defmt logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefmtDiagnostics;

impl Diagnostics for DefmtDiagnostics {
    fn bus_event(&mut self, event: BusEvent) {
        info!("host port: {:?}", event);
    }

    fn identity_checked(&mut self, vendor_id: u16, product_id: u16) {
        info!("testing VID[{=u16:04x}] PID[{=u16:04x}]", vendor_id, product_id);
    }

    fn configured(&mut self, address: u8) {
        info!("controller configured at address {}", address);
    }

    fn configure_failed(&mut self, error: ConfigureError) {
        error!("init failed, error code {=u8:#x}: {:?}", error.code(), error);
    }

    fn transfer_failed(&mut self, endpoint: u8, error: TransferError) {
        match error {
            // No data this round on an interrupt pipe.
            TransferError::Nak => trace!("endpoint {}: NAK", endpoint),
            e => warn!("endpoint {}: {:?}", endpoint, e),
        }
    }

    fn report_discarded(&mut self, endpoint: u8, error: DecodeError, payload: &[u8]) {
        warn!("endpoint {}: {:?} {=[u8]}", endpoint, error, payload);
    }

    fn state_updated(&mut self, state: &DeviceState) {
        trace!(
            "T: [{}, {}, {}] R: [{}, {}, {}] Btn: {=u16:#06x}",
            state.x,
            state.y,
            state.z,
            state.rx,
            state.ry,
            state.rz,
            state.buttons.raw()
        );
    }

    fn output_failed(&mut self, error: OutputError) {
        error!("output error: {:?}", error);
    }
}
