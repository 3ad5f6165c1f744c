//! Bus address pool and per-device endpoint tables.
//!
//! The pool is shared by every class driver on the host port. Address 0 is
//! the provisional record used while a freshly attached device still answers
//! on the default address; it always exists and is never allocated.

use core::num::NonZeroU8;
use heapless::Vec;

/// Number of records in the pool, including the provisional address 0.
pub const POOL_SIZE: usize = 16;

/// Maximum endpoints stored per device record.
pub const MAX_TABLE_ENDPOINTS: usize = 4;

/// Max packet size assumed for endpoint 0 before the device descriptor is read.
pub const DEFAULT_CONTROL_PACKET_SIZE: u16 = 8;

/// Endpoint table bound to a device record.
pub type EndpointTable = Vec<EndpointInfo, MAX_TABLE_ENDPOINTS>;

/// USB transfer type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// How the transport reacts when the device answers NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NakPolicy {
    /// Give up after the first NAK and report it to the caller.
    NoWait,
    /// Retry up to `limit` times before giving up.
    Retry { limit: u16 },
}

impl NakPolicy {
    /// Longest retry budget, used for control pipes.
    pub const MAX: Self = Self::Retry { limit: 0x7FFF };

    /// Number of NAKs tolerated before the transfer fails.
    #[inline]
    #[must_use]
    pub const fn retry_limit(self) -> u16 {
        match self {
            Self::NoWait => 0,
            Self::Retry { limit } => limit,
        }
    }
}

/// Transport-side view of one endpoint, including its data toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointInfo {
    /// Endpoint number (direction is implied by the transfer issued on it).
    pub address: u8,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
    pub send_toggle: bool,
    pub recv_toggle: bool,
    pub nak_policy: NakPolicy,
    /// Polling interval hint in milliseconds (0 = as fast as the host loop runs).
    pub interval_ms: u8,
}

impl EndpointInfo {
    /// Default control pipe on endpoint 0.
    #[must_use]
    pub const fn control(max_packet_size: u16) -> Self {
        Self {
            address: 0,
            transfer_type: TransferType::Control,
            max_packet_size,
            send_toggle: false,
            recv_toggle: false,
            nak_policy: NakPolicy::MAX,
            interval_ms: 0,
        }
    }

    /// Interrupt-in pipe that is polled once per attempt.
    #[must_use]
    pub const fn interrupt_in(address: u8, max_packet_size: u16, interval_ms: u8) -> Self {
        Self {
            address,
            transfer_type: TransferType::Interrupt,
            max_packet_size,
            send_toggle: false,
            recv_toggle: false,
            nak_policy: NakPolicy::NoWait,
            interval_ms,
        }
    }

    /// Unconfigured slot: endpoint 0 address with an empty packet size and no-wait NAKs.
    #[must_use]
    pub const fn unassigned() -> Self {
        Self {
            address: 0,
            transfer_type: TransferType::Control,
            max_packet_size: 0,
            send_toggle: false,
            recv_toggle: false,
            nak_policy: NakPolicy::NoWait,
            interval_ms: 0,
        }
    }
}

/// Error type for pool lookups and table updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolError {
    /// No record holds this address.
    AddressNotFound(u8),
    /// The record exists but has no endpoint table bound.
    EndpointInfoNull(u8),
    /// Empty table or more endpoints than a record can hold.
    InvalidTable,
}

impl core::fmt::Display for PoolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressNotFound(addr) => write!(f, "address {} not found in pool", addr),
            Self::EndpointInfoNull(addr) => write!(f, "address {} has no endpoint table", addr),
            Self::InvalidTable => write!(f, "invalid endpoint table"),
        }
    }
}

/// One device known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub address: u8,
    pub parent: u8,
    pub port: u8,
    pub is_hub: bool,
    pub low_speed: bool,
    pub endpoints: Option<EndpointTable>,
}

impl DeviceRecord {
    fn new(address: u8, parent: u8, port: u8, is_hub: bool) -> Self {
        let mut endpoints = EndpointTable::new();
        // Capacity is at least one, so the push cannot fail.
        let _ = endpoints.push(EndpointInfo::control(DEFAULT_CONTROL_PACKET_SIZE));
        Self {
            address,
            parent,
            port,
            is_hub,
            low_speed: false,
            endpoints: Some(endpoints),
        }
    }

    /// Look up an endpoint by number.
    #[must_use]
    pub fn endpoint(&self, address: u8) -> Option<&EndpointInfo> {
        self.endpoints
            .as_ref()?
            .iter()
            .find(|ep| ep.address == address)
    }

    /// Mutable endpoint lookup, used by transports to update toggles.
    pub fn endpoint_mut(&mut self, address: u8) -> Option<&mut EndpointInfo> {
        self.endpoints
            .as_mut()?
            .iter_mut()
            .find(|ep| ep.address == address)
    }
}

/// Fixed-capacity registry of bus addresses in use.
///
/// # Example
///
/// ```
/// use sixdof_core::AddressPool;
///
/// let mut pool = AddressPool::new();
/// let before = pool.free_count();
/// let addr = pool.allocate(0, false, 1).unwrap();
/// assert_eq!(pool.free_count(), before - 1);
/// pool.free(addr.get());
/// assert_eq!(pool.free_count(), before);
/// ```
#[derive(Debug, Clone)]
pub struct AddressPool {
    records: [Option<DeviceRecord>; POOL_SIZE],
}

impl AddressPool {
    /// Create a pool holding only the provisional address-0 record.
    #[must_use]
    pub fn new() -> Self {
        let mut records: [Option<DeviceRecord>; POOL_SIZE] = Default::default();
        records[0] = Some(DeviceRecord::new(0, 0, 0, false));
        Self { records }
    }

    /// Lease the lowest free address. Returns `None` when the pool is exhausted.
    pub fn allocate(&mut self, parent: u8, is_hub: bool, port: u8) -> Option<NonZeroU8> {
        let index = self
            .records
            .iter()
            .skip(1)
            .position(Option::is_none)?
            + 1;
        let address = index as u8;
        self.records[index] = Some(DeviceRecord::new(address, parent, port, is_hub));
        NonZeroU8::new(address)
    }

    /// Return an address to the pool. Freeing 0 or an unknown address does nothing.
    pub fn free(&mut self, address: u8) {
        if address == 0 {
            return;
        }
        if let Some(slot) = self.records.get_mut(address as usize) {
            *slot = None;
        }
    }

    /// Number of addresses still available for allocation.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.records.iter().skip(1).filter(|r| r.is_none()).count()
    }

    /// Whether `address` is currently leased (address 0 always is).
    #[must_use]
    pub fn is_allocated(&self, address: u8) -> bool {
        self.record(address).is_some()
    }

    #[must_use]
    pub fn record(&self, address: u8) -> Option<&DeviceRecord> {
        self.records.get(address as usize)?.as_ref()
    }

    pub fn record_mut(&mut self, address: u8) -> Option<&mut DeviceRecord> {
        self.records.get_mut(address as usize)?.as_mut()
    }

    fn require(&mut self, address: u8) -> Result<&mut DeviceRecord, PoolError> {
        self.record_mut(address)
            .ok_or(PoolError::AddressNotFound(address))
    }

    /// Swap the endpoint table of `address`, returning the one it replaced.
    ///
    /// Fails without touching the record if it has no table bound.
    pub fn replace_endpoints(
        &mut self,
        address: u8,
        table: EndpointTable,
    ) -> Result<EndpointTable, PoolError> {
        let record = self.require(address)?;
        let previous = record
            .endpoints
            .take()
            .ok_or(PoolError::EndpointInfoNull(address))?;
        record.endpoints = Some(table);
        Ok(previous)
    }

    /// Bind a copy of `endpoints` to the record of `address`.
    pub fn bind_endpoints(
        &mut self,
        address: u8,
        endpoints: &[EndpointInfo],
    ) -> Result<(), PoolError> {
        if endpoints.is_empty() {
            return Err(PoolError::InvalidTable);
        }
        let table = EndpointTable::from_slice(endpoints).map_err(|_| PoolError::InvalidTable)?;
        self.require(address)?.endpoints = Some(table);
        Ok(())
    }

    /// Record the bus speed of the device at `address`.
    pub fn set_low_speed(&mut self, address: u8, low_speed: bool) -> Result<(), PoolError> {
        self.require(address)?.low_speed = low_speed;
        Ok(())
    }
}

impl Default for AddressPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_has_provisional_record() {
        let pool = AddressPool::new();
        let record = pool.record(0).unwrap();
        assert_eq!(record.address, 0);
        assert_eq!(
            record.endpoint(0),
            Some(&EndpointInfo::control(DEFAULT_CONTROL_PACKET_SIZE))
        );
        assert_eq!(pool.free_count(), POOL_SIZE - 1);
    }

    #[test]
    fn test_allocate_lowest_free_and_reuse() {
        let mut pool = AddressPool::new();
        let a = pool.allocate(0, false, 1).unwrap().get();
        let b = pool.allocate(0, false, 2).unwrap().get();
        assert_eq!((a, b), (1, 2));

        pool.free(a);
        assert!(!pool.is_allocated(a));
        assert_eq!(pool.allocate(0, false, 3).unwrap().get(), 1);
        assert_eq!(pool.record(1).unwrap().port, 3);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = AddressPool::new();
        for _ in 1..POOL_SIZE {
            assert!(pool.allocate(0, false, 0).is_some());
        }
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.allocate(0, false, 0), None);
    }

    #[test]
    fn test_free_zero_is_noop() {
        let mut pool = AddressPool::new();
        pool.free(0);
        assert!(pool.is_allocated(0));
        pool.free(200);
        assert_eq!(pool.free_count(), POOL_SIZE - 1);
    }

    #[test]
    fn test_replace_endpoints_round_trip() {
        let mut pool = AddressPool::new();
        let mut borrowed = EndpointTable::new();
        borrowed.push(EndpointInfo::control(64)).unwrap();

        let saved = pool.replace_endpoints(0, borrowed.clone()).unwrap();
        assert_eq!(pool.record(0).unwrap().endpoints.as_ref(), Some(&borrowed));

        let returned = pool.replace_endpoints(0, saved.clone()).unwrap();
        assert_eq!(returned, borrowed);
        assert_eq!(pool.record(0).unwrap().endpoints.as_ref(), Some(&saved));
    }

    #[test]
    fn test_replace_endpoints_errors() {
        let mut pool = AddressPool::new();
        assert_eq!(
            pool.replace_endpoints(5, EndpointTable::new()),
            Err(PoolError::AddressNotFound(5))
        );

        pool.record_mut(0).unwrap().endpoints = None;
        assert_eq!(
            pool.replace_endpoints(0, EndpointTable::new()),
            Err(PoolError::EndpointInfoNull(0))
        );
        assert!(pool.record(0).unwrap().endpoints.is_none());
    }

    #[test]
    fn test_bind_endpoints() {
        let mut pool = AddressPool::new();
        let addr = pool.allocate(0, false, 1).unwrap().get();
        let table = [EndpointInfo::control(8), EndpointInfo::interrupt_in(1, 128, 0)];

        pool.bind_endpoints(addr, &table).unwrap();
        let record = pool.record_mut(addr).unwrap();
        assert_eq!(record.endpoint(1).unwrap().nak_policy, NakPolicy::NoWait);

        record.endpoint_mut(1).unwrap().recv_toggle = true;
        assert!(pool.record(addr).unwrap().endpoint(1).unwrap().recv_toggle);

        assert_eq!(pool.bind_endpoints(addr, &[]), Err(PoolError::InvalidTable));
        assert_eq!(
            pool.bind_endpoints(9, &table),
            Err(PoolError::AddressNotFound(9))
        );
    }

    #[test]
    fn test_nak_policy_retry_limit() {
        assert_eq!(NakPolicy::NoWait.retry_limit(), 0);
        assert_eq!(NakPolicy::MAX.retry_limit(), 0x7FFF);
    }
}
