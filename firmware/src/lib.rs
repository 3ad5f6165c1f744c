//! SpaceMouse to USB gamepad bridge for RP2040.
//!
//! # Overview
//!
//! The firmware runs on a Raspberry Pi Pico (RP2040) with a MAX3421E USB host
//! controller on SPI0 and:
//! 1. Enumerates a 3Dconnexion SpaceMouse on the MAX3421E host port
//! 2. Polls its interrupt reports and decodes translation, rotation and buttons
//! 3. Presents the state as a 16-button, 6-axis USB HID gamepad on the RP2040's own USB port
//!
//! # Hardware Configuration
//!
//! | Function  | GPIO | Description |
//! |-----------|------|-------------|
//! | SPI0 MISO | 16   | MAX3421E MISO |
//! | SPI0 CS   | 17   | MAX3421E SS |
//! | SPI0 SCK  | 18   | MAX3421E SCLK |
//! | SPI0 MOSI | 19   | MAX3421E MOSI |
//!
//! # Architecture
//!
//! Two Embassy tasks:
//!
//! - **USB Task**: Manages the USB device stack
//! - **Bridge (main)**: Runs [`sixdof_core::Bridge`]: host housekeeping,
//!   poll/decode, then send, in that order on every tick
//!
//! # Modules
//!
//! - [`max3421e`]: SPI host controller ([`Max3421e`])
//! - [`usb_output`]: USB HID output ([`UsbHidOutput`], [`GamepadRequestHandler`])
//! - [`diagnostics`]: defmt logging observer ([`DefmtDiagnostics`])
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)

#![no_std]

pub use sixdof_core::{
    Bridge, ClassDriver, DeviceState, HostBus, OutputError, OutputSink, SpaceMouseDriver,
};

pub mod diagnostics;
pub mod max3421e;
pub mod usb_output;

pub use diagnostics::DefmtDiagnostics;
pub use max3421e::{InitError, Max3421e};
pub use usb_output::{
    configure_usb_hid, GamepadRequestHandler, GamepadWriter, UsbHidOutput, UsbStateHandler,
};
