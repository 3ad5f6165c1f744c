//! Mocks shared by the driver and bridge tests.

extern crate std;

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use sixdof_proto::{DecodeError, DeviceState};

use crate::address::{AddressPool, EndpointTable};
use crate::diagnostics::Diagnostics;
use crate::driver::ConfigureError;
use crate::host::{BusEvent, HostBus, TransferError};
use crate::output::{OutputError, OutputSink};

/// Device descriptor of the supported controller (bMaxPacketSize0 = 8).
pub const SPACEMOUSE_DESCRIPTOR: [u8; 18] = [
    18, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 8, 0x6D, 0x04, 0x27, 0xC6, 0x06, 0x04, 0x01, 0x02,
    0x00, 0x01,
];

/// Same layout with a foreign vendor/product pair.
pub fn foreign_descriptor() -> [u8; 18] {
    let mut desc = SPACEMOUSE_DESCRIPTOR;
    desc[8..10].copy_from_slice(&0x1234u16.to_le_bytes());
    desc[10..12].copy_from_slice(&0x5678u16.to_le_bytes());
    desc
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeviceDescriptor { address: u8, endpoint: u8 },
    SetAddress { address: u8, new_address: u8 },
    SetConfiguration { address: u8, value: u8 },
    InTransfer { address: u8, endpoint: u8 },
}

pub struct MockBus {
    pub pool: AddressPool,
    pub descriptor: Result<Vec<u8>, TransferError>,
    pub set_address_result: Result<(), TransferError>,
    pub set_configuration_result: Result<(), TransferError>,
    /// Consumed one per `in_transfer`; an empty queue answers NAK.
    pub reports: VecDeque<Result<Vec<u8>, TransferError>>,
    pub events: VecDeque<BusEvent>,
    pub calls: Vec<Call>,
    /// Table bound to address 0 while the descriptor was fetched.
    pub provisional_table: Option<EndpointTable>,
    /// Low-speed flag of address 0 while the descriptor was fetched.
    pub provisional_low_speed: Option<bool>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            pool: AddressPool::new(),
            descriptor: Ok(SPACEMOUSE_DESCRIPTOR.to_vec()),
            set_address_result: Ok(()),
            set_configuration_result: Ok(()),
            reports: VecDeque::new(),
            events: VecDeque::new(),
            calls: Vec::new(),
            provisional_table: None,
            provisional_low_speed: None,
        }
    }

    pub fn with_descriptor(descriptor: &[u8]) -> Self {
        Self {
            descriptor: Ok(descriptor.to_vec()),
            ..Self::new()
        }
    }

    pub fn push_report(&mut self, report: &[u8]) {
        self.reports.push_back(Ok(report.to_vec()));
    }

    pub fn in_transfers(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::InTransfer { .. }))
            .count()
    }
}

impl HostBus for MockBus {
    fn address_pool(&mut self) -> &mut AddressPool {
        &mut self.pool
    }

    fn device_descriptor(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, TransferError>> {
        self.calls.push(Call::DeviceDescriptor { address, endpoint });
        if let Some(record) = self.pool.record(address) {
            self.provisional_table = record.endpoints.clone();
            self.provisional_low_speed = Some(record.low_speed);
        }
        let result = self.descriptor.clone().map(|desc| {
            let len = desc.len().min(buf.len());
            buf[..len].copy_from_slice(&desc[..len]);
            len
        });
        core::future::ready(result)
    }

    fn set_address(
        &mut self,
        address: u8,
        _endpoint: u8,
        new_address: u8,
    ) -> impl Future<Output = Result<(), TransferError>> {
        self.calls.push(Call::SetAddress {
            address,
            new_address,
        });
        core::future::ready(self.set_address_result)
    }

    fn set_configuration(
        &mut self,
        address: u8,
        _endpoint: u8,
        value: u8,
    ) -> impl Future<Output = Result<(), TransferError>> {
        self.calls.push(Call::SetConfiguration { address, value });
        core::future::ready(self.set_configuration_result)
    }

    fn in_transfer(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, TransferError>> {
        self.calls.push(Call::InTransfer { address, endpoint });
        let result = match self.reports.pop_front() {
            Some(Ok(report)) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            Some(Err(e)) => Err(e),
            None => Err(TransferError::Nak),
        };
        core::future::ready(result)
    }

    fn task(&mut self) -> impl Future<Output = BusEvent> {
        core::future::ready(self.events.pop_front().unwrap_or(BusEvent::None))
    }
}

#[derive(Default)]
pub struct MockDelay {
    pub total_ns: u64,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

pub struct MockOutput {
    pub sent: Vec<DeviceState>,
    pub ready: bool,
    pub fail: Option<OutputError>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            ready: true,
            fail: None,
        }
    }
}

impl OutputSink for MockOutput {
    fn send(&mut self, state: &DeviceState) -> impl Future<Output = Result<(), OutputError>> {
        let result = match self.fail {
            Some(e) => Err(e),
            None => {
                self.sent.push(*state);
                Ok(())
            }
        };
        core::future::ready(result)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Bus(BusEvent),
    Identity(u16, u16),
    Configured(u8),
    ConfigureFailed(ConfigureError),
    TransferFailed(u8, TransferError),
    Discarded(u8, DecodeError, Vec<u8>),
    Updated(DeviceState),
    OutputFailed(OutputError),
}

#[derive(Default)]
pub struct RecordingDiagnostics {
    pub events: Vec<Event>,
}

impl Diagnostics for RecordingDiagnostics {
    fn bus_event(&mut self, event: BusEvent) {
        self.events.push(Event::Bus(event));
    }

    fn identity_checked(&mut self, vendor_id: u16, product_id: u16) {
        self.events.push(Event::Identity(vendor_id, product_id));
    }

    fn configured(&mut self, address: u8) {
        self.events.push(Event::Configured(address));
    }

    fn configure_failed(&mut self, error: ConfigureError) {
        self.events.push(Event::ConfigureFailed(error));
    }

    fn transfer_failed(&mut self, endpoint: u8, error: TransferError) {
        self.events.push(Event::TransferFailed(endpoint, error));
    }

    fn report_discarded(&mut self, endpoint: u8, error: DecodeError, payload: &[u8]) {
        self.events
            .push(Event::Discarded(endpoint, error, payload.to_vec()));
    }

    fn state_updated(&mut self, state: &DeviceState) {
        self.events.push(Event::Updated(*state));
    }

    fn output_failed(&mut self, error: OutputError) {
        self.events.push(Event::OutputFailed(error));
    }
}

/// Run a future to completion. Mock futures never pend.
pub fn block_on<F: Future>(mut f: F) -> F::Output {
    fn noop_raw_waker() -> RawWaker {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            noop_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
    let mut cx = Context::from_waker(&waker);

    // SAFETY: We don't move f after pinning
    let mut f = unsafe { Pin::new_unchecked(&mut f) };

    match f.as_mut().poll(&mut cx) {
        Poll::Ready(result) => result,
        Poll::Pending => panic!("Mock future returned Pending unexpectedly"),
    }
}
