//! USB standard wire types used on both sides of the bridge.

/// Length of a standard device descriptor.
pub const DEVICE_DESCRIPTOR_LEN: usize = 18;

/// Standard descriptor type codes.
pub const DESCRIPTOR_TYPE_DEVICE: u8 = 0x01;
pub const DESCRIPTOR_TYPE_CONFIGURATION: u8 = 0x02;

/// Standard request codes.
pub const REQUEST_GET_DESCRIPTOR: u8 = 0x06;
pub const REQUEST_SET_ADDRESS: u8 = 0x05;
pub const REQUEST_SET_CONFIGURATION: u8 = 0x09;

/// `bmRequestType` values.
pub const REQUEST_TYPE_DEVICE_TO_HOST_STANDARD_DEVICE: u8 = 0x80;
pub const REQUEST_TYPE_HOST_TO_DEVICE_STANDARD_DEVICE: u8 = 0x00;
pub const REQUEST_TYPE_DEVICE_TO_HOST_STANDARD_INTERFACE: u8 = 0x81;
pub const REQUEST_TYPE_DEVICE_TO_HOST_CLASS_INTERFACE: u8 = 0xA1;
pub const REQUEST_TYPE_HOST_TO_DEVICE_CLASS_INTERFACE: u8 = 0x21;

/// HID class request codes.
pub const HID_GET_REPORT: u8 = 0x01;
pub const HID_GET_IDLE: u8 = 0x02;
pub const HID_GET_PROTOCOL: u8 = 0x03;
pub const HID_SET_REPORT: u8 = 0x09;
pub const HID_SET_IDLE: u8 = 0x0A;
pub const HID_SET_PROTOCOL: u8 = 0x0B;

/// Parsed standard device descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    pub usb_version: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size_0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_version: u16,
    pub num_configurations: u8,
}

/// Error returned when a descriptor buffer does not hold a device descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidDescriptor {
    /// Fewer bytes than a device descriptor.
    UnexpectedLength(usize),
    /// `bDescriptorType` is not DEVICE.
    WrongType(u8),
}

impl core::fmt::Display for InvalidDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedLength(len) => write!(f, "device descriptor too short ({} bytes)", len),
            Self::WrongType(ty) => write!(f, "descriptor type {:#04x} is not DEVICE", ty),
        }
    }
}

impl DeviceDescriptor {
    /// Parse a device descriptor from the raw bytes returned by GET_DESCRIPTOR.
    pub fn parse(buf: &[u8]) -> Result<Self, InvalidDescriptor> {
        if buf.len() < DEVICE_DESCRIPTOR_LEN {
            return Err(InvalidDescriptor::UnexpectedLength(buf.len()));
        }
        if buf[1] != DESCRIPTOR_TYPE_DEVICE {
            return Err(InvalidDescriptor::WrongType(buf[1]));
        }

        let u16_at = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        Ok(Self {
            usb_version: u16_at(2),
            class: buf[4],
            subclass: buf[5],
            protocol: buf[6],
            max_packet_size_0: buf[7],
            vendor_id: u16_at(8),
            product_id: u16_at(10),
            device_version: u16_at(12),
            num_configurations: buf[17],
        })
    }
}

/// An 8-byte control SETUP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    /// Decode a SETUP packet from its wire form.
    #[must_use]
    pub fn from_bytes(raw: [u8; 8]) -> Self {
        Self {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Encode to wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 8] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// GET_DESCRIPTOR(DEVICE) reading `length` bytes.
    #[must_use]
    pub const fn get_device_descriptor(length: u16) -> Self {
        Self {
            request_type: REQUEST_TYPE_DEVICE_TO_HOST_STANDARD_DEVICE,
            request: REQUEST_GET_DESCRIPTOR,
            value: (DESCRIPTOR_TYPE_DEVICE as u16) << 8,
            index: 0,
            length,
        }
    }

    /// SET_ADDRESS(address).
    #[must_use]
    pub const fn set_address(address: u8) -> Self {
        Self {
            request_type: REQUEST_TYPE_HOST_TO_DEVICE_STANDARD_DEVICE,
            request: REQUEST_SET_ADDRESS,
            value: address as u16,
            index: 0,
            length: 0,
        }
    }

    /// SET_CONFIGURATION(value).
    #[must_use]
    pub const fn set_configuration(value: u8) -> Self {
        Self {
            request_type: REQUEST_TYPE_HOST_TO_DEVICE_STANDARD_DEVICE,
            request: REQUEST_SET_CONFIGURATION,
            value: value as u16,
            index: 0,
            length: 0,
        }
    }

    /// High byte of `wValue` (descriptor type for GET_DESCRIPTOR, report type for GET_REPORT).
    #[inline]
    #[must_use]
    pub const fn value_high(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Low byte of `wValue`.
    #[inline]
    #[must_use]
    pub const fn value_low(&self) -> u8 {
        self.value as u8
    }

    /// True when the data stage flows device-to-host.
    #[inline]
    #[must_use]
    pub const fn is_device_to_host(&self) -> bool {
        self.request_type & 0x80 != 0
    }
}
