//! Platform-agnostic USB host class driver and gamepad bridge for 6DoF controllers.
//!
//! This crate holds everything between the USB host controller and the USB
//! device stack that does not depend on a particular chip. It can be used
//! both in embedded `no_std` environments and on host for testing.
//!
//! # Overview
//!
//! - [`host`]: Host transport contract ([`HostBus`], [`TransferError`])
//! - [`address`]: Bus address pool and endpoint tables ([`AddressPool`])
//! - [`driver`]: Class driver for the controller ([`SpaceMouseDriver`], [`ClassDriver`])
//! - [`output`]: Output sink trait ([`OutputSink`])
//! - [`hid`]: HID class request handling ([`HidClassHandler`])
//! - [`diagnostics`]: Injectable observer ([`Diagnostics`])
//! - [`bridge`]: Ticks host, driver and output in order ([`Bridge`])
//!
//! # Example
//!
//! ```rust
//! use sixdof_core::{AddressPool, SpaceMouseDriver};
//!
//! assert!(SpaceMouseDriver::<sixdof_core::NoDiagnostics>::is_supported(0x046D, 0xC627));
//!
//! let pool = AddressPool::new();
//! assert!(pool.is_allocated(0));
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod address;
pub mod bridge;
pub mod diagnostics;
pub mod driver;
pub mod hid;
pub mod host;
pub mod output;

#[cfg(test)]
mod testutil;

// Re-export main types at crate root
pub use address::{
    AddressPool, DeviceRecord, EndpointInfo, EndpointTable, NakPolicy, PoolError, TransferType,
};
pub use bridge::{Bridge, TickReport};
pub use diagnostics::{Diagnostics, NoDiagnostics};
pub use driver::{ClassDriver, ConfigureError, SpaceMouseDriver};
pub use hid::{ClassResponse, HidClassHandler, HidProtocol};
pub use host::{BusEvent, HostBus, PortMonitor, TransferError};
pub use output::{OutputError, OutputSink};
pub use sixdof_proto::{DeviceState, StateUpdate};
