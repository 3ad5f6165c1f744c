//! USB HID gamepad output implementation.

use core::cell::Cell;

use defmt::{debug, info};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_usb::class::hid::{
    HidBootProtocol, HidSubclass, HidWriter, ReportId, RequestHandler, State,
};
use embassy_usb::control::OutResponse;
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Handler};
use portable_atomic::{AtomicBool, Ordering};
use sixdof_core::{DeviceState, HidClassHandler, OutputError, OutputSink};
use sixdof_proto::descriptor::REPORT_PACKET_SIZE;
use sixdof_proto::{REPORT_DESCRIPTOR, REPORT_SIZE};

/// USB driver type of the device-side port.
pub type UsbDriver<'d> = Driver<'d, USB>;

/// HID writer carrying one gamepad input report per transfer.
pub type GamepadWriter<'d> = HidWriter<'d, UsbDriver<'d>, REPORT_SIZE>;

/// Interface number of the gamepad (the only interface of the device).
pub const GAMEPAD_INTERFACE: u8 = 0;

/// Last state handed to the output, answered on GET_REPORT.
static LAST_STATE: Mutex<CriticalSectionRawMutex, Cell<DeviceState>> =
    Mutex::new(Cell::new(DeviceState::neutral()));

/// Set while the host has the device configured.
static CONFIGURED: AtomicBool = AtomicBool::new(false);

/// USB HID gamepad output.
///
/// Wraps an embassy-usb HID writer to send gamepad reports.
pub struct UsbHidOutput<'d> {
    writer: GamepadWriter<'d>,
}

impl<'d> UsbHidOutput<'d> {
    /// Create a new USB HID output from the given HID writer.
    pub fn new(writer: GamepadWriter<'d>) -> Self {
        Self { writer }
    }
}

impl<'d> OutputSink for UsbHidOutput<'d> {
    async fn send(&mut self, state: &DeviceState) -> Result<(), OutputError> {
        LAST_STATE.lock(|last| last.set(*state));
        self.writer
            .write(&state.to_report())
            .await
            .map_err(|e| match e {
                EndpointError::Disabled => OutputError::Disabled,
                EndpointError::BufferOverflow => OutputError::Io,
            })
    }

    fn is_ready(&self) -> bool {
        CONFIGURED.load(Ordering::Relaxed)
    }
}

/// HID request handler backed by the gamepad's class request state.
pub struct GamepadRequestHandler {
    class: HidClassHandler,
}

impl GamepadRequestHandler {
    pub const fn new() -> Self {
        Self {
            class: HidClassHandler::new(GAMEPAD_INTERFACE),
        }
    }
}

impl Default for GamepadRequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for GamepadRequestHandler {
    fn get_report(&mut self, id: ReportId, buf: &mut [u8]) -> Option<usize> {
        match id {
            ReportId::In(_) => {
                let state = LAST_STATE.lock(Cell::get);
                self.class.get_report(&state, buf)
            }
            _ => None,
        }
    }

    fn set_report(&mut self, _id: ReportId, data: &[u8]) -> OutResponse {
        debug!("SET_REPORT ignored ({} bytes)", data.len());
        OutResponse::Accepted
    }

    fn set_idle_ms(&mut self, _id: Option<ReportId>, duration_ms: u32) {
        self.class.set_idle_ms(duration_ms);
    }

    fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
        Some(self.class.idle_ms())
    }
}

/// Tracks the device configuration state for [`UsbHidOutput::is_ready`].
pub struct UsbStateHandler;

impl Handler for UsbStateHandler {
    fn reset(&mut self) {
        CONFIGURED.store(false, Ordering::Relaxed);
    }

    fn configured(&mut self, configured: bool) {
        CONFIGURED.store(configured, Ordering::Relaxed);
        info!("USB configured: {}", configured);
    }

    fn suspended(&mut self, suspended: bool) {
        if suspended {
            CONFIGURED.store(false, Ordering::Relaxed);
        }
    }
}

/// Configure the USB HID class in the USB builder.
///
/// Returns the HID writer for use by the application.
pub fn configure_usb_hid<'d>(
    builder: &mut Builder<'d, UsbDriver<'d>>,
    state: &'d mut State<'d>,
    handler: &'d mut GamepadRequestHandler,
) -> GamepadWriter<'d> {
    let config = embassy_usb::class::hid::Config {
        report_descriptor: REPORT_DESCRIPTOR,
        request_handler: Some(handler),
        poll_ms: 1,
        max_packet_size: REPORT_PACKET_SIZE,
        hid_subclass: HidSubclass::No,
        hid_boot_protocol: HidBootProtocol::None,
    };

    HidWriter::new(builder, state, config)
}
