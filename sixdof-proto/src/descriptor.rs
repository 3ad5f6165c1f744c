//! Fixed HID descriptors for the synthesized gamepad.

use crate::serialize::REPORT_SIZE;

/// HID report descriptor: 16 buttons followed by six 16-bit signed axes.
///
/// Must stay in lockstep with [`DeviceState::to_report`](crate::DeviceState::to_report):
/// 16 x 1 bit + 6 x 16 bit = 14 bytes.
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,         // Usage Page (Generic Desktop)
    0x09, 0x05,         // Usage (Game Pad)
    0xA1, 0x01,         // Collection (Application)
    //
    // --- Buttons (16) ---
    0x05, 0x09,         //   Usage Page (Button)
    0x19, 0x01,         //   Usage Minimum (Button 1)
    0x29, 0x10,         //   Usage Maximum (Button 16)
    0x15, 0x00,         //   Logical Minimum (0)
    0x25, 0x01,         //   Logical Maximum (1)
    0x75, 0x01,         //   Report Size (1)
    0x95, 0x10,         //   Report Count (16)
    0x81, 0x02,         //   Input (Data, Variable, Absolute)
    //
    // --- Axes (6 x 16 bit) ---
    0x05, 0x01,         //   Usage Page (Generic Desktop)
    0xA1, 0x00,         //   Collection (Physical)
    0x09, 0x30,         //     Usage (X)
    0x09, 0x31,         //     Usage (Y)
    0x09, 0x32,         //     Usage (Z)
    0x09, 0x33,         //     Usage (Rx)
    0x09, 0x34,         //     Usage (Ry)
    0x09, 0x35,         //     Usage (Rz)
    0x16, 0x00, 0x80,   //     Logical Minimum (-32768)
    0x26, 0xFF, 0x7F,   //     Logical Maximum (32767)
    0x75, 0x10,         //     Report Size (16)
    0x95, 0x06,         //     Report Count (6)
    0x81, 0x02,         //     Input (Data, Variable, Absolute)
    0xC0,               //   End Collection
    0xC0,               // End Collection
];

/// HID class descriptor type.
pub const HID_DESCRIPTOR_TYPE: u8 = 0x21;

/// HID report descriptor type.
pub const HID_REPORT_DESCRIPTOR_TYPE: u8 = 0x22;

/// bcdHID: HID class release 1.11.
pub const HID_VERSION: u16 = 0x0111;

/// Build the 9-byte HID class descriptor announcing a report descriptor of `report_len` bytes.
#[must_use]
pub const fn hid_class_descriptor(report_len: u16) -> [u8; 9] {
    let version = HID_VERSION.to_le_bytes();
    let len = report_len.to_le_bytes();
    [
        9,
        HID_DESCRIPTOR_TYPE,
        version[0],
        version[1],
        0x00, // country code: not localized
        1,    // one class descriptor follows
        HID_REPORT_DESCRIPTOR_TYPE,
        len[0],
        len[1],
    ]
}

/// HID class descriptor for [`REPORT_DESCRIPTOR`].
pub const HID_DESCRIPTOR: [u8; 9] = hid_class_descriptor(REPORT_DESCRIPTOR.len() as u16);

/// Interrupt-in packet size used for the gamepad endpoint.
pub const REPORT_PACKET_SIZE: u16 = REPORT_SIZE as u16;
