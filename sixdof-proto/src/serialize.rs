//! HID gamepad report serialization.
//!
//! The report mirrors [`DeviceState`] field for field, all little-endian:
//!
//! ```text
//! offset  0  1  2  3  4  5  6  7  8  9 10 11 12 13
//!        [btns][ x ][ y ][ z ][ rx][ ry][ rz]
//! ```
//!
//! No scaling happens here; the decoder already produced HID-range values.

use crate::types::DeviceState;

/// Size of a serialized gamepad report in bytes.
pub const REPORT_SIZE: usize = 14;

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the report.
    BufferTooSmall,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

impl DeviceState {
    /// Serialize the state into the wire report promised by
    /// [`REPORT_DESCRIPTOR`](crate::REPORT_DESCRIPTOR).
    #[must_use]
    pub fn to_report(&self) -> [u8; REPORT_SIZE] {
        let mut report = [0u8; REPORT_SIZE];
        let fields = [
            self.buttons.raw(),
            self.x as u16,
            self.y as u16,
            self.z as u16,
            self.rx as u16,
            self.ry as u16,
            self.rz as u16,
        ];
        for (chunk, value) in report.chunks_exact_mut(2).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        report
    }

    /// Serialize the report into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if `buf` is shorter than [`REPORT_SIZE`].
    pub fn write_report(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let out = buf
            .get_mut(..REPORT_SIZE)
            .ok_or(SerializeError::BufferTooSmall)?;
        out.copy_from_slice(&self.to_report());
        Ok(REPORT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Buttons;

    #[test]
    fn test_neutral_report_is_zero() {
        assert_eq!(DeviceState::neutral().to_report(), [0u8; REPORT_SIZE]);
    }

    #[test]
    fn test_report_layout() {
        let state = DeviceState {
            buttons: Buttons(0x1234),
            x: 1270,
            y: 2540,
            z: 3810,
            rx: -1,
            ry: i16::MIN,
            rz: i16::MAX,
        };

        assert_eq!(
            state.to_report(),
            [
                0x34, 0x12, // buttons
                0xF6, 0x04, // x = 1270
                0xEC, 0x09, // y = 2540
                0xE2, 0x0E, // z = 3810
                0xFF, 0xFF, // rx = -1
                0x00, 0x80, // ry = -32768
                0xFF, 0x7F, // rz = 32767
            ]
        );
    }

    #[test]
    fn test_write_report() {
        let state = DeviceState {
            buttons: Buttons(0x0001),
            ..DeviceState::neutral()
        };
        let mut buf = [0xAAu8; 16];
        assert_eq!(state.write_report(&mut buf), Ok(REPORT_SIZE));
        assert_eq!(&buf[..2], &[0x01, 0x00]);
        assert_eq!(&buf[2..REPORT_SIZE], &[0u8; 12]);
        assert_eq!(&buf[REPORT_SIZE..], &[0xAA, 0xAA]);
    }

    #[test]
    fn test_write_report_buffer_too_small() {
        let mut buf = [0u8; REPORT_SIZE - 1];
        assert_eq!(
            DeviceState::neutral().write_report(&mut buf),
            Err(SerializeError::BufferTooSmall)
        );
    }
}
