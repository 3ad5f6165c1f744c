//! HID class request handling for the gamepad interface.
//!
//! Answers the class requests a host issues against a HID interface and the
//! standard GET_DESCRIPTOR requests for its class and report descriptors.
//! Requests addressed to any other interface are left for other handlers.
//!
//! Device stacks that dispatch class requests themselves (embassy-usb) bypass
//! [`HidClassHandler::handle_setup`], [`HidClassHandler::descriptor`] and the
//! protocol accessors; they only call [`HidClassHandler::get_report`] and the
//! idle-rate methods.

use sixdof_proto::usb::{
    HID_GET_IDLE, HID_GET_PROTOCOL, HID_GET_REPORT, HID_SET_IDLE, HID_SET_PROTOCOL,
    HID_SET_REPORT, REQUEST_GET_DESCRIPTOR, REQUEST_TYPE_DEVICE_TO_HOST_CLASS_INTERFACE,
    REQUEST_TYPE_DEVICE_TO_HOST_STANDARD_INTERFACE, REQUEST_TYPE_HOST_TO_DEVICE_CLASS_INTERFACE,
};
use sixdof_proto::descriptor::{HID_DESCRIPTOR_TYPE, HID_REPORT_DESCRIPTOR_TYPE};
use sixdof_proto::{DeviceState, SetupPacket, HID_DESCRIPTOR, REPORT_DESCRIPTOR};

/// HID protocol selected by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HidProtocol {
    Boot = 0,
    Report = 1,
}

impl From<u8> for HidProtocol {
    fn from(value: u8) -> Self {
        if value == 0 {
            Self::Boot
        } else {
            Self::Report
        }
    }
}

/// Result of offering a SETUP packet to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClassResponse {
    /// Not for this interface or not a HID request.
    NotHandled,
    /// Accepted with no data stage.
    Accepted,
    /// Reply with the first `n` bytes of the reply buffer.
    Reply(usize),
}

impl ClassResponse {
    #[inline]
    #[must_use]
    pub const fn is_handled(self) -> bool {
        !matches!(self, Self::NotHandled)
    }
}

/// Class request state for one HID interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidClassHandler {
    interface: u8,
    protocol: HidProtocol,
    /// Idle rate in 4 ms units (0 = report only on change / on request).
    idle_rate: u8,
}

impl HidClassHandler {
    #[must_use]
    pub const fn new(interface: u8) -> Self {
        Self {
            interface,
            protocol: HidProtocol::Report,
            idle_rate: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn interface(&self) -> u8 {
        self.interface
    }

    #[inline]
    #[must_use]
    pub const fn protocol(&self) -> HidProtocol {
        self.protocol
    }

    #[inline]
    #[must_use]
    pub const fn idle_rate(&self) -> u8 {
        self.idle_rate
    }

    /// Idle period in milliseconds.
    #[inline]
    #[must_use]
    pub const fn idle_ms(&self) -> u32 {
        self.idle_rate as u32 * 4
    }

    #[inline]
    fn addressed_to_us(&self, setup: &SetupPacket) -> bool {
        setup.index == u16::from(self.interface)
    }

    /// Descriptor bytes for a standard GET_DESCRIPTOR on this interface.
    #[must_use]
    pub fn descriptor(&self, setup: &SetupPacket) -> Option<&'static [u8]> {
        if setup.request_type != REQUEST_TYPE_DEVICE_TO_HOST_STANDARD_INTERFACE
            || setup.request != REQUEST_GET_DESCRIPTOR
            || !self.addressed_to_us(setup)
        {
            return None;
        }

        match setup.value_high() {
            HID_REPORT_DESCRIPTOR_TYPE => Some(REPORT_DESCRIPTOR),
            HID_DESCRIPTOR_TYPE => Some(&HID_DESCRIPTOR),
            _ => None,
        }
    }

    /// Handle a HID class request.
    ///
    /// For stacks that hand raw SETUP packets to the class. embassy-usb
    /// firmware answers these requests itself and never calls this.
    ///
    /// Replies are written to `reply` and truncated to `wLength`.
    pub fn handle_setup(
        &mut self,
        setup: &SetupPacket,
        state: &DeviceState,
        reply: &mut [u8],
    ) -> ClassResponse {
        if !self.addressed_to_us(setup) {
            return ClassResponse::NotHandled;
        }

        match (setup.request_type, setup.request) {
            (REQUEST_TYPE_DEVICE_TO_HOST_CLASS_INTERFACE, HID_GET_REPORT) => {
                reply_with(&state.to_report(), setup, reply)
            }
            (REQUEST_TYPE_DEVICE_TO_HOST_CLASS_INTERFACE, HID_GET_PROTOCOL) => {
                reply_with(&[self.protocol as u8], setup, reply)
            }
            (REQUEST_TYPE_DEVICE_TO_HOST_CLASS_INTERFACE, HID_GET_IDLE) => {
                reply_with(&[self.idle_rate], setup, reply)
            }
            (REQUEST_TYPE_HOST_TO_DEVICE_CLASS_INTERFACE, HID_SET_PROTOCOL) => {
                self.set_protocol(HidProtocol::from(setup.value_low()));
                ClassResponse::Accepted
            }
            (REQUEST_TYPE_HOST_TO_DEVICE_CLASS_INTERFACE, HID_SET_IDLE) => {
                self.set_idle_rate(setup.value_high());
                ClassResponse::Accepted
            }
            // Output and feature reports carry nothing for a gamepad.
            (REQUEST_TYPE_HOST_TO_DEVICE_CLASS_INTERFACE, HID_SET_REPORT) => {
                ClassResponse::Accepted
            }
            _ => ClassResponse::NotHandled,
        }
    }

    /// GET_REPORT body: the current input report.
    pub fn get_report(&self, state: &DeviceState, buf: &mut [u8]) -> Option<usize> {
        state.write_report(buf).ok()
    }

    pub fn set_protocol(&mut self, protocol: HidProtocol) {
        self.protocol = protocol;
    }

    pub fn set_idle_rate(&mut self, rate: u8) {
        self.idle_rate = rate;
    }

    /// SET_IDLE expressed in milliseconds, saturating at the 1020 ms maximum.
    pub fn set_idle_ms(&mut self, duration_ms: u32) {
        self.idle_rate = (duration_ms / 4).min(u32::from(u8::MAX)) as u8;
    }
}

#[inline]
fn reply_with(data: &[u8], setup: &SetupPacket, reply: &mut [u8]) -> ClassResponse {
    let len = data.len().min(reply.len()).min(usize::from(setup.length));
    reply[..len].copy_from_slice(&data[..len]);
    ClassResponse::Reply(len)
}
