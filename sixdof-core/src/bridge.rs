//! Bridge: ticks the host port, the class driver and the gamepad output.

use embedded_hal_async::delay::DelayNs;
use sixdof_proto::DeviceState;

use crate::diagnostics::{Diagnostics, NoDiagnostics};
use crate::driver::{ClassDriver, ConfigureError};
use crate::host::{BusEvent, HostBus};
use crate::output::{OutputError, OutputSink};

/// Hub address of the root port.
pub const ROOT_PARENT: u8 = 0;

/// Port number reported for a device on the root port.
pub const ROOT_PORT: u8 = 1;

/// Forwards controller state from a host-side class driver to a gamepad sink.
///
/// The bridge owns the [`DeviceState`]. Within one [`tick`](Self::tick) the
/// driver writes it before the output reads it, so no locking is needed.
pub struct Bridge<B, D, C, O, G = NoDiagnostics> {
    bus: B,
    delay: D,
    driver: C,
    output: O,
    state: DeviceState,
    diag: G,
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Port event seen by the housekeeping step.
    pub event: BusEvent,
    /// Outcome of enumeration, if a device attached this tick.
    pub configured: Option<Result<(), ConfigureError>>,
    /// Reports decoded and applied to the state.
    pub applied: usize,
    /// Outcome of the send step, `None` when the output was not ready.
    pub sent: Option<Result<(), OutputError>>,
}

impl<B, D, C, O> Bridge<B, D, C, O, NoDiagnostics>
where
    B: HostBus,
    D: DelayNs,
    C: ClassDriver<B>,
    O: OutputSink,
{
    /// Create a new bridge starting from the neutral state.
    pub fn new(bus: B, delay: D, driver: C, output: O) -> Self {
        Self::with_diagnostics(bus, delay, driver, output, NoDiagnostics)
    }
}

impl<B, D, C, O, G> Bridge<B, D, C, O, G>
where
    B: HostBus,
    D: DelayNs,
    C: ClassDriver<B>,
    O: OutputSink,
    G: Diagnostics,
{
    pub fn with_diagnostics(bus: B, delay: D, driver: C, output: O, diag: G) -> Self {
        Self {
            bus,
            delay,
            driver,
            output,
            state: DeviceState::neutral(),
            diag,
        }
    }

    /// Run the bridge forever.
    pub async fn run(&mut self) -> ! {
        loop {
            let _ = self.tick().await;
        }
    }

    /// Host housekeeping, then poll/decode, then send.
    ///
    /// A failed enumeration leaves the driver inert; the next attach retries.
    pub async fn tick(&mut self) -> TickReport {
        let event = self.bus.task().await;
        let configured = match event {
            BusEvent::None => None,
            BusEvent::Attached { low_speed } => {
                self.diag.bus_event(event);
                // A device that vanished without a detach event leaves its
                // address behind; start over from the unassigned state.
                if self.driver.address() != 0 {
                    self.driver.release(&mut self.bus);
                }
                Some(
                    self.driver
                        .configure(
                            &mut self.bus,
                            &mut self.delay,
                            ROOT_PARENT,
                            ROOT_PORT,
                            low_speed,
                        )
                        .await,
                )
            }
            BusEvent::Detached => {
                self.diag.bus_event(event);
                self.driver.release(&mut self.bus);
                None
            }
        };

        let applied = self.driver.poll(&mut self.bus, &mut self.state).await;

        let sent = if self.output.is_ready() {
            let result = self.output.send(&self.state).await;
            if let Err(e) = result {
                self.diag.output_failed(e);
            }
            Some(result)
        } else {
            None
        };

        TickReport {
            event,
            configured,
            applied,
            sent,
        }
    }

    /// Current controller state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn driver(&self) -> &C {
        &self.driver
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn diagnostics(&self) -> &G {
        &self.diag
    }

    /// Decompose the bridge into its bus, driver and output.
    pub fn into_parts(self) -> (B, C, O) {
        (self.bus, self.driver, self.output)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::SpaceMouseDriver;
    use crate::host::TransferError;
    use crate::testutil::{
        block_on, foreign_descriptor, Event, MockBus, MockDelay, MockOutput,
        RecordingDiagnostics,
    };
    use sixdof_proto::REPORT_SIZE;

    type TestBridge = Bridge<MockBus, MockDelay, SpaceMouseDriver, MockOutput, RecordingDiagnostics>;

    fn bridge(bus: MockBus) -> TestBridge {
        Bridge::with_diagnostics(
            bus,
            MockDelay::default(),
            SpaceMouseDriver::new(),
            MockOutput::new(),
            RecordingDiagnostics::default(),
        )
    }

    fn attach(bus: &mut MockBus) {
        bus.events.push_back(BusEvent::Attached { low_speed: false });
    }

    #[test]
    fn test_idle_tick_sends_neutral() {
        let mut bridge = bridge(MockBus::new());

        let report = block_on(bridge.tick());
        assert_eq!(
            report,
            TickReport {
                event: BusEvent::None,
                configured: None,
                applied: 0,
                sent: Some(Ok(())),
            }
        );
        assert_eq!(bridge.output().sent, std::vec![DeviceState::neutral()]);
        assert_eq!(bridge.bus().in_transfers(), 0);
    }

    #[test]
    fn test_end_to_end_translation() {
        let mut bus = MockBus::new();
        attach(&mut bus);
        // Control pipe has nothing, report pipe carries the translation.
        bus.reports.push_back(Err(TransferError::Nak));
        bus.push_report(&[1, 10, 0, 20, 0, 30, 0]);
        let mut bridge = bridge(bus);

        let report = block_on(bridge.tick());
        assert_eq!(report.configured, Some(Ok(())));
        assert_eq!(report.applied, 1);

        let state = *bridge.state();
        assert_eq!((state.x, state.y, state.z), (1270, 2540, 3810));
        assert_eq!((state.rx, state.ry, state.rz), (0, 0, 0));

        let sent = &bridge.output().sent;
        assert_eq!(sent.len(), 1);
        let bytes = sent[0].to_report();
        assert_eq!(bytes.len(), REPORT_SIZE);
        assert_eq!(
            bytes,
            [0, 0, 0xF6, 0x04, 0xEC, 0x09, 0xE2, 0x0E, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_state_persists_across_quiet_ticks() {
        let mut bus = MockBus::new();
        attach(&mut bus);
        bus.reports.push_back(Err(TransferError::Nak));
        bus.push_report(&[3, 0x01, 0x00]);
        let mut bridge = bridge(bus);

        block_on(bridge.tick());
        let report = block_on(bridge.tick());
        assert_eq!(report.applied, 0);
        assert_eq!(bridge.state().buttons.raw(), 0x0001);
        assert_eq!(bridge.output().sent.len(), 2);
        assert_eq!(bridge.output().sent[1].buttons.raw(), 0x0001);
    }

    #[test]
    fn test_failed_enumeration_leaves_driver_inert() {
        let mut bus = MockBus::with_descriptor(&foreign_descriptor());
        attach(&mut bus);
        bus.push_report(&[1, 10, 0, 20, 0, 30, 0]);
        let mut bridge = bridge(bus);

        let report = block_on(bridge.tick());
        assert_eq!(
            report.configured,
            Some(Err(ConfigureError::DeviceNotSupported {
                vendor_id: 0x1234,
                product_id: 0x5678
            }))
        );
        assert_eq!(report.applied, 0);
        assert!(!bridge.driver().is_polling());
        assert_eq!(bridge.bus().in_transfers(), 0);
        assert_eq!(*bridge.state(), DeviceState::neutral());
        // Output still runs so the host sees a live, centered gamepad.
        assert_eq!(report.sent, Some(Ok(())));
    }

    #[test]
    fn test_detach_releases_address() {
        let mut bus = MockBus::new();
        attach(&mut bus);
        bus.events.push_back(BusEvent::Detached);
        let mut bridge = bridge(bus);

        block_on(bridge.tick());
        assert!(bridge.bus().pool.is_allocated(1));

        let report = block_on(bridge.tick());
        assert_eq!(report.event, BusEvent::Detached);
        assert!(!bridge.bus().pool.is_allocated(1));
        assert!(!bridge.driver().is_polling());
        assert!(bridge
            .diagnostics()
            .events
            .contains(&Event::Bus(BusEvent::Detached)));
    }

    #[test]
    fn test_reattach_without_detach_reenumerates() {
        let mut bus = MockBus::new();
        attach(&mut bus);
        attach(&mut bus);
        let mut bridge = bridge(bus);

        block_on(bridge.tick());
        let report = block_on(bridge.tick());
        assert_eq!(report.configured, Some(Ok(())));
        assert_eq!(bridge.driver().address(), 1);
        assert_eq!(bridge.bus().pool.free_count(), crate::address::POOL_SIZE - 2);
    }

    #[test]
    fn test_output_not_ready_skips_send() {
        let mut bridge = bridge(MockBus::new());
        bridge.output_mut().ready = false;

        let report = block_on(bridge.tick());
        assert_eq!(report.sent, None);
        assert!(bridge.output().sent.is_empty());
    }

    #[test]
    fn test_output_error_reported() {
        let mut bridge = bridge(MockBus::new());
        bridge.output_mut().fail = Some(OutputError::Disabled);

        let report = block_on(bridge.tick());
        assert_eq!(report.sent, Some(Err(OutputError::Disabled)));
        assert_eq!(
            bridge.diagnostics().events,
            std::vec![Event::OutputFailed(OutputError::Disabled)]
        );
    }
}
