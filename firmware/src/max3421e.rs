//! MAX3421E USB host controller over SPI.
//!
//! Implements [`HostBus`] for a single root port. The chip's interrupt line
//! is not used; completion and connection flags are polled in `HIRQ`, so the
//! only hardware needed is an SPI device with its own chip select.
//!
//! # Pins (Raspberry Pi Pico)
//!
//! | Function | GPIO |
//! |----------|------|
//! | SPI0 SCK  | 18 |
//! | SPI0 MOSI | 19 |
//! | SPI0 MISO | 16 |
//! | CS        | 17 |

use defmt::{debug, info, trace};
use embassy_futures::yield_now;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::spi::{Operation, SpiDevice};
use sixdof_core::address::DEFAULT_CONTROL_PACKET_SIZE;
use sixdof_core::{AddressPool, BusEvent, EndpointInfo, HostBus, PortMonitor, TransferError};
use sixdof_proto::SetupPacket;

/// Register numbers and bit masks.
mod reg {
    pub const RCVFIFO: u8 = 1;
    pub const SUDFIFO: u8 = 4;
    pub const RCVBC: u8 = 6;
    pub const USBIRQ: u8 = 13;
    pub const USBCTL: u8 = 15;
    pub const CPUCTL: u8 = 16;
    pub const PINCTL: u8 = 17;
    pub const REVISION: u8 = 18;
    pub const HIRQ: u8 = 25;
    pub const MODE: u8 = 27;
    pub const PERADDR: u8 = 28;
    pub const HCTL: u8 = 29;
    pub const HXFR: u8 = 30;
    pub const HRSL: u8 = 31;

    /// Command byte flag selecting a register write.
    pub const WRITE: u8 = 0x02;

    pub const USBIRQ_OSCOK: u8 = 0x01;
    pub const USBCTL_CHIPRES: u8 = 0x20;
    pub const CPUCTL_IE: u8 = 0x01;
    pub const PINCTL_FDUPSPI: u8 = 0x10;
    pub const PINCTL_INTLEVEL: u8 = 0x08;

    pub const HIRQ_BUSEVENT: u8 = 0x01;
    pub const HIRQ_RCVDAV: u8 = 0x04;
    pub const HIRQ_CONDET: u8 = 0x20;
    pub const HIRQ_FRAME: u8 = 0x40;
    pub const HIRQ_HXFRDN: u8 = 0x80;

    pub const MODE_HOST: u8 = 0x01;
    pub const MODE_LOWSPEED: u8 = 0x02;
    pub const MODE_SOFKAENAB: u8 = 0x08;
    pub const MODE_DMPULLDN: u8 = 0x40;
    pub const MODE_DPPULLDN: u8 = 0x80;

    pub const HCTL_BUSRST: u8 = 0x01;
    pub const HCTL_SAMPLEBUS: u8 = 0x04;
    pub const HCTL_RCVTOG0: u8 = 0x10;
    pub const HCTL_RCVTOG1: u8 = 0x20;

    pub const TOKEN_SETUP: u8 = 0x10;
    pub const TOKEN_IN: u8 = 0x00;
    pub const TOKEN_INHS: u8 = 0x80;
    pub const TOKEN_OUTHS: u8 = 0xA0;

    pub const HRSL_RESULT: u8 = 0x0F;
    pub const HRSL_RCVTOGRD: u8 = 0x10;
    pub const HRSL_KSTATUS: u8 = 0x40;
    pub const HRSL_JSTATUS: u8 = 0x80;

    pub const RESULT_SUCCESS: u8 = 0x00;
    pub const RESULT_NAK: u8 = 0x04;
    pub const RESULT_STALL: u8 = 0x05;
    pub const RESULT_TOGERR: u8 = 0x06;
    pub const RESULT_TIMEOUT: u8 = 0x0E;
    pub const RESULT_BABBLE: u8 = 0x0F;
}

use reg::*;

const MODE_DISCONNECTED: u8 = MODE_DPPULLDN | MODE_DMPULLDN | MODE_HOST;
const MODE_FULL_SPEED: u8 = MODE_DISCONNECTED | MODE_SOFKAENAB;
const MODE_LOW_SPEED: u8 = MODE_FULL_SPEED | MODE_LOWSPEED;

/// Status reported when the SPI bus itself fails.
pub const STATUS_SPI_ERROR: u8 = 0xF0;

/// Upper bound for a single bus transaction to complete.
const TRANSFER_TIMEOUT: Duration = Duration::from_millis(500);

/// Bus timeouts tolerated before a transfer fails.
const TIMEOUT_RETRIES: u8 = 3;

/// Debounce time between connect detection and bus reset.
const ATTACH_SETTLE_MS: u64 = 200;

/// Recovery time after bus reset before the first request.
const RESET_RECOVERY_MS: u64 = 20;

/// Error type for controller bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum InitError {
    /// SPI transaction failed.
    Spi,
    /// Oscillator never reported stable.
    Oscillator,
    /// REVISION register holds something other than a MAX3421E.
    UnknownRevision(u8),
}

#[inline]
fn spi_error<E>(_: E) -> TransferError {
    TransferError::Protocol(STATUS_SPI_ERROR)
}

/// Map an HRSL result code to a transfer error.
#[inline]
fn result_error(code: u8) -> TransferError {
    match code {
        RESULT_NAK => TransferError::Nak,
        RESULT_STALL => TransferError::Stall,
        RESULT_TOGERR => TransferError::Toggle,
        RESULT_TIMEOUT => TransferError::Timeout,
        RESULT_BABBLE => TransferError::BufferOverflow,
        other => TransferError::Protocol(other),
    }
}

/// MAX3421E host controller with its address pool.
pub struct Max3421e<S> {
    spi: S,
    pool: AddressPool,
    /// MODE register value for the current port speed.
    mode: u8,
    /// Attached device and pending bus probes.
    monitor: PortMonitor,
}

impl<S: SpiDevice> Max3421e<S> {
    pub fn new(spi: S) -> Self {
        Self {
            spi,
            pool: AddressPool::new(),
            mode: MODE_DISCONNECTED,
            monitor: PortMonitor::new(),
        }
    }

    /// Reset the chip and switch it to host mode.
    ///
    /// Returns the silicon revision.
    pub async fn init(&mut self) -> Result<u8, InitError> {
        self.write_reg(PINCTL, PINCTL_FDUPSPI | PINCTL_INTLEVEL)
            .await
            .map_err(|_| InitError::Spi)?;

        self.write_reg(USBCTL, USBCTL_CHIPRES)
            .await
            .map_err(|_| InitError::Spi)?;
        self.write_reg(USBCTL, 0).await.map_err(|_| InitError::Spi)?;
        self.wait_flag(USBIRQ, USBIRQ_OSCOK)
            .await
            .map_err(|_| InitError::Oscillator)?;

        let revision = self.read_reg(REVISION).await.map_err(|_| InitError::Spi)?;
        if !matches!(revision, 0x12 | 0x13) {
            return Err(InitError::UnknownRevision(revision));
        }

        self.write_reg(MODE, MODE_DISCONNECTED)
            .await
            .map_err(|_| InitError::Spi)?;
        self.write_reg(HCTL, HCTL_SAMPLEBUS)
            .await
            .map_err(|_| InitError::Spi)?;
        self.write_reg(HIRQ, 0xFF).await.map_err(|_| InitError::Spi)?;
        // A device plugged in at power-up raised no interrupt; probe for it.
        self.monitor.reset();
        self.write_reg(CPUCTL, CPUCTL_IE)
            .await
            .map_err(|_| InitError::Spi)?;

        info!("MAX3421E revision {=u8:#x} in host mode", revision);
        Ok(revision)
    }

    async fn write_reg(&mut self, register: u8, value: u8) -> Result<(), TransferError> {
        self.spi
            .write(&[(register << 3) | WRITE, value])
            .await
            .map_err(spi_error)
    }

    async fn read_reg(&mut self, register: u8) -> Result<u8, TransferError> {
        let mut rx = [0u8; 2];
        self.spi
            .transfer(&mut rx, &[register << 3, 0])
            .await
            .map_err(spi_error)?;
        Ok(rx[1])
    }

    async fn write_fifo(&mut self, register: u8, data: &[u8]) -> Result<(), TransferError> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[(register << 3) | WRITE]),
                Operation::Write(data),
            ])
            .await
            .map_err(spi_error)
    }

    async fn read_fifo(&mut self, register: u8, buf: &mut [u8]) -> Result<(), TransferError> {
        self.spi
            .transaction(&mut [Operation::Write(&[register << 3]), Operation::Read(buf)])
            .await
            .map_err(spi_error)
    }

    /// Spin until `mask` is set in `register`.
    async fn wait_flag(&mut self, register: u8, mask: u8) -> Result<(), TransferError> {
        let deadline = Instant::now() + TRANSFER_TIMEOUT;
        loop {
            if self.read_reg(register).await? & mask != 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(TransferError::Timeout);
            }
            yield_now().await;
        }
    }

    /// Sample the bus and set MODE for whatever is attached.
    ///
    /// Returns `Some(low_speed)` for a connected device, `None` for SE0/SE1.
    async fn probe_bus(&mut self) -> Result<Option<bool>, TransferError> {
        self.write_reg(HCTL, HCTL_SAMPLEBUS).await?;
        let hrsl = self.read_reg(HRSL).await?;
        let low_speed_mode = self.read_reg(MODE).await? & MODE_LOWSPEED != 0;

        // J and K swap meaning with the speed the port is currently set to.
        let port = match hrsl & (HRSL_JSTATUS | HRSL_KSTATUS) {
            HRSL_JSTATUS => Some(low_speed_mode),
            HRSL_KSTATUS => Some(!low_speed_mode),
            _ => None,
        };

        self.mode = match port {
            Some(true) => MODE_LOW_SPEED,
            Some(false) => MODE_FULL_SPEED,
            None => MODE_DISCONNECTED,
        };
        self.write_reg(MODE, self.mode).await?;
        Ok(port)
    }

    async fn reset_bus(&mut self) -> Result<(), TransferError> {
        self.write_reg(HCTL, HCTL_BUSRST).await?;
        let deadline = Instant::now() + TRANSFER_TIMEOUT;
        while self.read_reg(HCTL).await? & HCTL_BUSRST != 0 {
            if Instant::now() >= deadline {
                return Err(TransferError::Timeout);
            }
            yield_now().await;
        }

        // Wait for the first SOF so the device has seen a frame.
        self.write_reg(HIRQ, HIRQ_FRAME).await?;
        self.wait_flag(HIRQ, HIRQ_FRAME).await?;
        Timer::after_millis(RESET_RECOVERY_MS).await;
        Ok(())
    }

    async fn service(&mut self) -> Result<BusEvent, TransferError> {
        let hirq = self.read_reg(HIRQ).await?;
        if !self.monitor.should_sample(hirq & HIRQ_CONDET != 0) {
            return Ok(BusEvent::None);
        }
        self.write_reg(HIRQ, HIRQ_CONDET | HIRQ_BUSEVENT).await?;

        let sampled = self.probe_bus().await?;
        let event = self.monitor.change(sampled);
        match event {
            BusEvent::Attached { low_speed } => {
                debug!("device connected, low speed: {}", low_speed);
                Timer::after_millis(ATTACH_SETTLE_MS).await;
                self.reset_bus().await?;

                self.pool
                    .bind_endpoints(0, &[EndpointInfo::control(DEFAULT_CONTROL_PACKET_SIZE)])
                    .map_err(|_| TransferError::UnknownDevice)?;
                self.pool
                    .set_low_speed(0, low_speed)
                    .map_err(|_| TransferError::UnknownDevice)?;
            }
            BusEvent::Detached => debug!("device disconnected"),
            BusEvent::None => {}
        }
        self.monitor.commit(event);
        Ok(event)
    }

    /// Look up the pipe and the speed of the device it belongs to.
    fn pipe(&self, address: u8, endpoint: u8) -> Result<(EndpointInfo, bool), TransferError> {
        let record = self
            .pool
            .record(address)
            .ok_or(TransferError::UnknownDevice)?;
        let info = record
            .endpoint(endpoint)
            .copied()
            .ok_or(TransferError::UnknownDevice)?;
        Ok((info, record.low_speed))
    }

    /// Point the SIE at `address` with the device's bus speed.
    async fn select(&mut self, address: u8, low_speed: bool) -> Result<(), TransferError> {
        self.write_reg(PERADDR, address).await?;
        let mode = if low_speed {
            self.mode | MODE_LOWSPEED
        } else {
            self.mode & !MODE_LOWSPEED
        };
        self.write_reg(MODE, mode).await
    }

    /// Launch one transaction and wait for its handshake.
    async fn dispatch(
        &mut self,
        token: u8,
        endpoint: u8,
        nak_limit: u16,
    ) -> Result<(), TransferError> {
        let mut naks: u16 = 0;
        let mut timeouts: u8 = 0;

        loop {
            self.write_reg(HXFR, token | endpoint).await?;
            self.wait_flag(HIRQ, HIRQ_HXFRDN).await?;
            self.write_reg(HIRQ, HIRQ_HXFRDN).await?;

            match self.read_reg(HRSL).await? & HRSL_RESULT {
                RESULT_SUCCESS => return Ok(()),
                RESULT_NAK => {
                    naks += 1;
                    if naks > nak_limit {
                        return Err(TransferError::Nak);
                    }
                }
                RESULT_TIMEOUT => {
                    timeouts += 1;
                    if timeouts > TIMEOUT_RETRIES {
                        return Err(TransferError::Timeout);
                    }
                }
                code => return Err(result_error(code)),
            }
        }
    }

    /// Read IN packets until a short packet or a full buffer.
    async fn read_packets(
        &mut self,
        endpoint: u8,
        max_packet_size: u16,
        nak_limit: u16,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        let max_packet_size = usize::from(max_packet_size.max(1));
        let mut total = 0;

        loop {
            self.dispatch(TOKEN_IN, endpoint, nak_limit).await?;

            let count = usize::from(self.read_reg(RCVBC).await?);
            // Anything past the caller's buffer is dropped with the FIFO.
            let take = count.min(buf.len() - total);
            self.read_fifo(RCVFIFO, &mut buf[total..total + take]).await?;
            self.write_reg(HIRQ, HIRQ_RCVDAV).await?;
            total += take;

            if count < max_packet_size || total >= buf.len() {
                return Ok(total);
            }
        }
    }

    /// Run a control transfer. Only IN data stages are supported.
    async fn control(
        &mut self,
        address: u8,
        endpoint: u8,
        setup: SetupPacket,
        data: &mut [u8],
    ) -> Result<usize, TransferError> {
        let (info, low_speed) = self.pipe(address, endpoint)?;
        let nak_limit = info.nak_policy.retry_limit();
        self.select(address, low_speed).await?;

        self.write_fifo(SUDFIFO, &setup.to_bytes()).await?;
        self.dispatch(TOKEN_SETUP, endpoint, nak_limit).await?;

        if setup.is_device_to_host() && setup.length > 0 {
            // Data stage always starts with DATA1.
            self.write_reg(HCTL, HCTL_RCVTOG1).await?;
            let len = usize::from(setup.length).min(data.len());
            let received = self
                .read_packets(endpoint, info.max_packet_size, nak_limit, &mut data[..len])
                .await?;
            self.dispatch(TOKEN_OUTHS, endpoint, nak_limit).await?;
            Ok(received)
        } else {
            self.dispatch(TOKEN_INHS, endpoint, nak_limit).await?;
            Ok(0)
        }
    }
}

impl<S: SpiDevice> HostBus for Max3421e<S> {
    fn address_pool(&mut self) -> &mut AddressPool {
        &mut self.pool
    }

    async fn device_descriptor(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        let length = u16::try_from(buf.len()).unwrap_or(u16::MAX);
        self.control(
            address,
            endpoint,
            SetupPacket::get_device_descriptor(length),
            buf,
        )
        .await
    }

    async fn set_address(
        &mut self,
        address: u8,
        endpoint: u8,
        new_address: u8,
    ) -> Result<(), TransferError> {
        self.control(address, endpoint, SetupPacket::set_address(new_address), &mut [])
            .await
            .map(|_| ())
    }

    async fn set_configuration(
        &mut self,
        address: u8,
        endpoint: u8,
        value: u8,
    ) -> Result<(), TransferError> {
        self.control(
            address,
            endpoint,
            SetupPacket::set_configuration(value),
            &mut [],
        )
        .await
        .map(|_| ())
    }

    async fn in_transfer(
        &mut self,
        address: u8,
        endpoint: u8,
        buf: &mut [u8],
    ) -> Result<usize, TransferError> {
        let (info, low_speed) = self.pipe(address, endpoint)?;
        self.select(address, low_speed).await?;

        let toggle = if info.recv_toggle {
            HCTL_RCVTOG1
        } else {
            HCTL_RCVTOG0
        };
        self.write_reg(HCTL, toggle).await?;

        let result = self
            .read_packets(
                endpoint,
                info.max_packet_size,
                info.nak_policy.retry_limit(),
                buf,
            )
            .await;

        let recv_toggle = self.read_reg(HRSL).await? & HRSL_RCVTOGRD != 0;
        if let Some(ep) = self
            .pool
            .record_mut(address)
            .and_then(|record| record.endpoint_mut(endpoint))
        {
            ep.recv_toggle = recv_toggle;
        }

        if let Ok(len) = result {
            trace!("IN {}.{}: {} bytes", address, endpoint, len);
        }
        result
    }

    async fn task(&mut self) -> BusEvent {
        match self.service().await {
            Ok(event) => event,
            Err(e) => {
                debug!("port service failed: {:?}, sampling again", e);
                self.monitor.failed();
                BusEvent::None
            }
        }
    }
}
