//! Host-side class driver for the 6DoF controller.
//!
//! [`SpaceMouseDriver`] enumerates exactly one supported controller on the
//! host port and then turns its interrupt reports into [`DeviceState`]
//! updates. Enumeration is all-or-nothing: any failure after the
//! already-in-use check tears everything down through [`ClassDriver::release`]
//! and leaves the driver inert until the next attach.

use core::future::Future;

use embedded_hal_async::delay::DelayNs;
use sixdof_proto::usb::{InvalidDescriptor, DEVICE_DESCRIPTOR_LEN};
use sixdof_proto::{decode_report, DeviceDescriptor, DeviceState};

use crate::address::{EndpointInfo, EndpointTable, PoolError, DEFAULT_CONTROL_PACKET_SIZE};
use crate::diagnostics::{Diagnostics, NoDiagnostics};
use crate::host::{HostBus, TransferError};

/// Vendor ID of the only supported controller.
pub const SUPPORTED_VENDOR_ID: u16 = 0x046D;

/// Product ID of the only supported controller.
pub const SUPPORTED_PRODUCT_ID: u16 = 0xC627;

/// Endpoint number the controller sends its reports on.
pub const REPORT_ENDPOINT: u8 = 0x01;

/// Size of the inbound scratch buffer and of the report pipe's packets.
pub const REPORT_BUFFER_SIZE: usize = 128;

/// Time the device gets to settle on its new address.
pub const SETTLE_DELAY_MS: u32 = 200;

/// Configuration selected after addressing.
pub const CONFIGURATION_VALUE: u8 = 1;

/// Index of the control pipe in the endpoint table.
pub const CONTROL_PIPE: usize = 0;

/// Index of the interrupt-in report pipe in the endpoint table.
pub const INPUT_PIPE: usize = 1;

/// Number of pipes the driver uses.
pub const PIPE_COUNT: usize = 2;

/// Reasons enumeration stops.
///
/// Each variant maps to a distinct status code via [`ConfigureError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigureError {
    /// This driver instance already owns a device.
    AlreadyInUse,
    /// A pool record the driver needs is missing.
    AddressNotFound,
    /// The provisional record has no endpoint table to borrow.
    EndpointInfoNull,
    /// GET_DESCRIPTOR(DEVICE) failed.
    DescriptorRead(TransferError),
    /// The bytes returned are not a device descriptor.
    MalformedDescriptor(InvalidDescriptor),
    /// Identity check failed. No address was consumed.
    DeviceNotSupported { vendor_id: u16, product_id: u16 },
    /// The address pool is exhausted.
    OutOfAddressSpace,
    /// SET_ADDRESS failed. The address has been returned to the pool.
    SetAddress(TransferError),
    /// The endpoint table could not be bound to the device record.
    EndpointBind,
    /// SET_CONFIGURATION failed.
    SetConfiguration(TransferError),
}

impl ConfigureError {
    /// Numeric status code. SET_ADDRESS failures report the transport code verbatim.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DeviceNotSupported { .. } => 0xD1,
            Self::OutOfAddressSpace => 0xD4,
            Self::AddressNotFound => 0xD6,
            Self::EndpointInfoNull => 0xD7,
            Self::AlreadyInUse => 0xD9,
            Self::DescriptorRead(_) => 0xE1,
            Self::EndpointBind => 0xE2,
            Self::SetConfiguration(_) => 0xE4,
            Self::MalformedDescriptor(_) => 0xE5,
            Self::SetAddress(e) => e.code(),
        }
    }
}

impl From<PoolError> for ConfigureError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::AddressNotFound(_) => Self::AddressNotFound,
            PoolError::EndpointInfoNull(_) => Self::EndpointInfoNull,
            PoolError::InvalidTable => Self::EndpointBind,
        }
    }
}

impl core::fmt::Display for ConfigureError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyInUse => write!(f, "driver instance already in use"),
            Self::AddressNotFound => write!(f, "address not found in pool"),
            Self::EndpointInfoNull => write!(f, "provisional record has no endpoint table"),
            Self::DescriptorRead(e) => write!(f, "device descriptor read failed: {}", e),
            Self::MalformedDescriptor(e) => write!(f, "malformed device descriptor: {}", e),
            Self::DeviceNotSupported {
                vendor_id,
                product_id,
            } => write!(
                f,
                "device {:04x}:{:04x} not supported",
                vendor_id, product_id
            ),
            Self::OutOfAddressSpace => write!(f, "out of address space"),
            Self::SetAddress(e) => write!(f, "SET_ADDRESS failed: {}", e),
            Self::EndpointBind => write!(f, "endpoint table bind failed"),
            Self::SetConfiguration(e) => write!(f, "SET_CONFIGURATION failed: {}", e),
        }
    }
}

/// Capability interface a host-side class driver offers to the dispatcher.
///
/// The dispatcher runs [`configure`](Self::configure) when a device appears,
/// [`poll`](Self::poll) once per tick, and [`release`](Self::release) when
/// the device goes away.
pub trait ClassDriver<B: HostBus> {
    /// Whether this driver handles the given identity.
    fn identify(&self, vendor_id: u16, product_id: u16) -> bool;

    /// Enumerate the device currently answering on address 0.
    fn configure<D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        parent: u8,
        port: u8,
        low_speed: bool,
    ) -> impl Future<Output = Result<(), ConfigureError>>;

    /// Poll every pipe once and apply decoded reports to `state`.
    ///
    /// Returns the number of reports applied. Does nothing unless configured.
    fn poll(&mut self, bus: &mut B, state: &mut DeviceState) -> impl Future<Output = usize>;

    /// Free the bus address and return to the unassigned state.
    fn release(&mut self, bus: &mut B);

    /// Assigned bus address, 0 while unassigned.
    fn address(&self) -> u8;

    /// Whether the driver is configured and polling.
    fn is_polling(&self) -> bool;
}

/// Class driver for the 3Dconnexion SpaceNavigator-class controller.
pub struct SpaceMouseDriver<G = NoDiagnostics> {
    endpoints: [EndpointInfo; PIPE_COUNT],
    buffer: [u8; REPORT_BUFFER_SIZE],
    address: u8,
    polling: bool,
    diag: G,
}

const UNASSIGNED_ENDPOINTS: [EndpointInfo; PIPE_COUNT] = [
    EndpointInfo::control(DEFAULT_CONTROL_PACKET_SIZE),
    EndpointInfo::unassigned(),
];

impl SpaceMouseDriver<NoDiagnostics> {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_diagnostics(NoDiagnostics)
    }
}

impl Default for SpaceMouseDriver<NoDiagnostics> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Diagnostics> SpaceMouseDriver<G> {
    pub const fn with_diagnostics(diag: G) -> Self {
        Self {
            endpoints: UNASSIGNED_ENDPOINTS,
            buffer: [0; REPORT_BUFFER_SIZE],
            address: 0,
            polling: false,
            diag,
        }
    }

    /// The identity gate: one hard-coded vendor/product pair.
    #[inline]
    #[must_use]
    pub const fn is_supported(vendor_id: u16, product_id: u16) -> bool {
        vendor_id == SUPPORTED_VENDOR_ID && product_id == SUPPORTED_PRODUCT_ID
    }

    /// Assigned bus address, 0 while unassigned.
    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[inline]
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Local copy of the endpoint table.
    pub fn endpoints(&self) -> &[EndpointInfo; PIPE_COUNT] {
        &self.endpoints
    }

    pub fn diagnostics(&self) -> &G {
        &self.diag
    }

    pub fn diagnostics_mut(&mut self) -> &mut G {
        &mut self.diag
    }

    fn teardown<B: HostBus>(&mut self, bus: &mut B) {
        if self.address != 0 {
            bus.address_pool().free(self.address);
        }
        self.address = 0;
        self.polling = false;
        self.endpoints = UNASSIGNED_ENDPOINTS;
    }

    /// Fetch the device descriptor through the provisional record.
    ///
    /// Address 0 runs on this driver's control pipe for the duration of the
    /// request, so the toggles of the shared record stay untouched. The
    /// saved table is put back whether or not the transfer succeeded.
    async fn read_descriptor<B: HostBus>(
        &mut self,
        bus: &mut B,
        low_speed: bool,
    ) -> Result<DeviceDescriptor, ConfigureError> {
        let mut borrowed = EndpointTable::new();
        // Capacity is at least one, so the push cannot fail.
        let _ = borrowed.push(self.endpoints[CONTROL_PIPE]);

        let pool = bus.address_pool();
        let saved = pool.replace_endpoints(0, borrowed)?;
        pool.set_low_speed(0, low_speed)?;

        let mut buf = [0u8; DEVICE_DESCRIPTOR_LEN];
        let fetched = bus
            .device_descriptor(0, self.endpoints[CONTROL_PIPE].address, &mut buf)
            .await;

        let returned = bus.address_pool().replace_endpoints(0, saved)?;
        if let Some(ep) = returned.first() {
            let control = &mut self.endpoints[CONTROL_PIPE];
            control.send_toggle = ep.send_toggle;
            control.recv_toggle = ep.recv_toggle;
        }

        let len = fetched.map_err(ConfigureError::DescriptorRead)?;
        DeviceDescriptor::parse(&buf[..len.min(buf.len())])
            .map_err(ConfigureError::MalformedDescriptor)
    }

    async fn enumerate<B: HostBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        parent: u8,
        port: u8,
        low_speed: bool,
    ) -> Result<(), ConfigureError> {
        let descriptor = self.read_descriptor(bus, low_speed).await?;

        let (vendor_id, product_id) = (descriptor.vendor_id, descriptor.product_id);
        self.diag.identity_checked(vendor_id, product_id);
        if !Self::is_supported(vendor_id, product_id) {
            return Err(ConfigureError::DeviceNotSupported {
                vendor_id,
                product_id,
            });
        }

        self.address = bus
            .address_pool()
            .allocate(parent, false, port)
            .ok_or(ConfigureError::OutOfAddressSpace)?
            .get();
        self.endpoints[CONTROL_PIPE].max_packet_size = u16::from(descriptor.max_packet_size_0);

        let control = self.endpoints[CONTROL_PIPE].address;
        if let Err(e) = bus.set_address(0, control, self.address).await {
            bus.address_pool().set_low_speed(0, false)?;
            return Err(ConfigureError::SetAddress(e));
        }

        let pool = bus.address_pool();
        pool.set_low_speed(0, false)?;
        pool.set_low_speed(self.address, low_speed)?;

        // Only endpoint 0 is known until the report pipe is filled in.
        pool.bind_endpoints(self.address, &self.endpoints[..=CONTROL_PIPE])
            .map_err(|_| ConfigureError::EndpointBind)?;

        self.endpoints[INPUT_PIPE] =
            EndpointInfo::interrupt_in(REPORT_ENDPOINT, REPORT_BUFFER_SIZE as u16, 0);
        pool.bind_endpoints(self.address, &self.endpoints)
            .map_err(|_| ConfigureError::EndpointBind)?;

        delay.delay_ms(SETTLE_DELAY_MS).await;

        bus.set_configuration(self.address, control, CONFIGURATION_VALUE)
            .await
            .map_err(ConfigureError::SetConfiguration)
    }
}

impl<B: HostBus, G: Diagnostics> ClassDriver<B> for SpaceMouseDriver<G> {
    fn identify(&self, vendor_id: u16, product_id: u16) -> bool {
        Self::is_supported(vendor_id, product_id)
    }

    async fn configure<D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        parent: u8,
        port: u8,
        low_speed: bool,
    ) -> Result<(), ConfigureError> {
        if self.address != 0 {
            self.diag.configure_failed(ConfigureError::AlreadyInUse);
            return Err(ConfigureError::AlreadyInUse);
        }

        match self.enumerate(bus, delay, parent, port, low_speed).await {
            Ok(()) => {
                self.polling = true;
                self.diag.configured(self.address);
                Ok(())
            }
            Err(e) => {
                self.teardown(bus);
                self.diag.configure_failed(e);
                Err(e)
            }
        }
    }

    async fn poll(&mut self, bus: &mut B, state: &mut DeviceState) -> usize {
        if !self.polling {
            return 0;
        }

        let mut applied = 0;
        for pipe in 0..PIPE_COUNT {
            let endpoint = self.endpoints[pipe].address;
            // Transport errors are skipped here; only enumeration errors end the session.
            let len = match bus.in_transfer(self.address, endpoint, &mut self.buffer).await {
                Ok(len) => len.min(REPORT_BUFFER_SIZE),
                Err(e) => {
                    self.diag.transfer_failed(endpoint, e);
                    continue;
                }
            };

            let payload = &self.buffer[..len];
            match decode_report(payload) {
                Ok(Some(update)) => {
                    state.apply(update);
                    applied += 1;
                    self.diag.state_updated(state);
                }
                Ok(None) => {}
                Err(e) => self.diag.report_discarded(endpoint, e, payload),
            }
        }
        applied
    }

    fn release(&mut self, bus: &mut B) {
        self.teardown(bus);
    }

    fn address(&self) -> u8 {
        SpaceMouseDriver::address(self)
    }

    fn is_polling(&self) -> bool {
        SpaceMouseDriver::is_polling(self)
    }
}
