//! Wire formats for the SpaceMouse-to-gamepad bridge.
//!
//! This crate holds the data model and every byte-level format the bridge
//! touches, with no platform dependencies:
//!
//! - **Types**: the shared controller state
//!   - [`DeviceState`] - six scaled axes plus a button bitmap
//!   - [`Buttons`] - 16-bit button bitmap
//!   - [`StateUpdate`] - one decoded controller report
//!
//! - **Decoding**: vendor interrupt reports from the 6DoF controller
//!   - [`decode_report()`] - report bytes to [`StateUpdate`]
//!   - [`scale_axis()`] - raw reading to full i16 range
//!
//! - **Encoding**: the HID gamepad presented to the host computer
//!   - [`DeviceState::to_report`] - 14-byte input report
//!   - [`REPORT_DESCRIPTOR`] - matching fixed HID report descriptor
//!
//! - **USB**: standard descriptors and SETUP packets ([`usb`])
//!
//! # Controller Report Format
//!
//! ```text
//! [tag] [v0 lo] [v0 hi] [v1 lo] [v1 hi] [v2 lo] [v2 hi]
//! ```
//!
//! Tag `1` is translation, `2` rotation, `3` buttons.
//!
//! # Example
//!
//! ```
//! use sixdof_proto::{decode_report, DeviceState};
//!
//! let mut state = DeviceState::neutral();
//! if let Ok(Some(update)) = decode_report(&[1, 10, 0, 20, 0, 30, 0]) {
//!     state.apply(update);
//! }
//! assert_eq!((state.x, state.y, state.z), (1270, 2540, 3810));
//!
//! let report = state.to_report();
//! assert_eq!(&report[2..4], &1270i16.to_le_bytes());
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod descriptor;
pub mod report;
pub mod serialize;
pub mod types;
pub mod usb;

pub use descriptor::{hid_class_descriptor, HID_DESCRIPTOR, REPORT_DESCRIPTOR};
pub use report::{decode_report, scale_axis, DecodeError, ReportTag, MIN_REPORT_LEN};
pub use serialize::{SerializeError, REPORT_SIZE};
pub use types::{Buttons, DeviceState, StateUpdate};
pub use usb::{DeviceDescriptor, SetupPacket};
