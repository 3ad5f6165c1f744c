//! Decoder for the controller's vendor-specific interrupt reports.
//!
//! Every report starts with a one-byte tag followed by little-endian
//! signed 16-bit values:
//!
//! ```text
//! [tag] [v0 lo] [v0 hi] [v1 lo] [v1 hi] [v2 lo] [v2 hi]
//! ```
//!
//! - Tag `1` - translation (X, Y, Z)
//! - Tag `2` - rotation (Rx, Ry, Rz)
//! - Tag `3` - buttons (16-bit bitmap in `v0`)
//!
//! The first value starts at byte offset 1, so values sit at odd offsets.

use crate::types::{Buttons, StateUpdate};

/// Reports shorter than this carry no event.
pub const MIN_REPORT_LEN: usize = 3;

/// Length of a report carrying three axis values (tag + 3 x i16).
pub const AXIS_REPORT_LEN: usize = 7;

/// Gain applied to raw axis readings before clamping.
pub const AXIS_GAIN: i32 = 127;

/// Report type tag (byte 0 of every report).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportTag {
    Translation = 1,
    Rotation = 2,
    Buttons = 3,
}

impl TryFrom<u8> for ReportTag {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Translation),
            2 => Ok(Self::Rotation),
            3 => Ok(Self::Buttons),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }
}

/// Reasons a report is discarded without touching the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Tag byte is not one of the known report types.
    UnknownTag(u8),
    /// An axis report ended before its third value.
    Truncated { tag: u8, len: usize },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownTag(tag) => write!(f, "unknown report tag {}", tag),
            Self::Truncated { tag, len } => {
                write!(f, "report tag {} truncated at {} bytes", tag, len)
            }
        }
    }
}

/// Scale a raw axis reading to the full signed 16-bit range.
///
/// Computes `clamp(raw * 127, -32768, 32767)` in 32-bit arithmetic.
///
/// ```
/// use sixdof_proto::scale_axis;
///
/// assert_eq!(scale_axis(10), 1270);
/// assert_eq!(scale_axis(259), i16::MAX);
/// assert_eq!(scale_axis(-259), i16::MIN);
/// ```
#[inline]
#[must_use]
pub fn scale_axis(raw: i16) -> i16 {
    (i32::from(raw) * AXIS_GAIN).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Decode one interrupt report.
///
/// Returns `Ok(None)` for reports shorter than [`MIN_REPORT_LEN`], which the
/// controller sends when it has nothing to say.
///
/// # Example
///
/// ```
/// use sixdof_proto::{decode_report, StateUpdate};
///
/// let update = decode_report(&[1, 10, 0, 20, 0, 30, 0]).unwrap();
/// assert_eq!(update, Some(StateUpdate::Translation([1270, 2540, 3810])));
/// ```
pub fn decode_report(payload: &[u8]) -> Result<Option<StateUpdate>, DecodeError> {
    if payload.len() < MIN_REPORT_LEN {
        return Ok(None);
    }

    let update = match ReportTag::try_from(payload[0])? {
        ReportTag::Translation => StateUpdate::Translation(read_axes(payload)?),
        ReportTag::Rotation => StateUpdate::Rotation(read_axes(payload)?),
        ReportTag::Buttons => StateUpdate::Buttons(Buttons(read_u16(payload, 0))),
    };

    Ok(Some(update))
}

/// Read and scale the three axis values of a tag 1/2 report.
#[inline]
fn read_axes(payload: &[u8]) -> Result<[i16; 3], DecodeError> {
    if payload.len() < AXIS_REPORT_LEN {
        return Err(DecodeError::Truncated {
            tag: payload[0],
            len: payload.len(),
        });
    }

    Ok([
        scale_axis(read_u16(payload, 0) as i16),
        scale_axis(read_u16(payload, 1) as i16),
        scale_axis(read_u16(payload, 2) as i16),
    ])
}

/// Read the `index`-th little-endian 16-bit value (starting at byte 1).
///
/// Callers guarantee `payload.len() >= 3 + 2 * index`.
#[inline]
fn read_u16(payload: &[u8], index: usize) -> u16 {
    let offset = 1 + 2 * index;
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_matches_formula() {
        for raw in [i16::MIN, -1000, -259, -258, -1, 0, 1, 257, 258, 259, 1000, i16::MAX] {
            let expected = (raw as i32 * 127).clamp(-32768, 32767) as i16;
            assert_eq!(scale_axis(raw), expected, "raw = {}", raw);
        }
    }

    #[test]
    fn test_scale_clamp_boundaries() {
        // 258 * 127 = 32766 still fits; 259 is the first value past the clamp.
        assert_eq!(scale_axis(258), 32766);
        assert_eq!(scale_axis(259), 32767);
        assert_eq!(scale_axis(-258), -32766);
        assert_eq!(scale_axis(-259), -32768);
    }

    #[test]
    fn test_decode_translation() {
        let update = decode_report(&[1, 10, 0, 20, 0, 30, 0]).unwrap();
        assert_eq!(update, Some(StateUpdate::Translation([1270, 2540, 3810])));
    }

    #[test]
    fn test_decode_rotation_negative() {
        // -1 = 0xFFFF, -350 = 0xFEA2
        let update = decode_report(&[2, 0xFF, 0xFF, 0xA2, 0xFE, 0, 0]).unwrap();
        assert_eq!(update, Some(StateUpdate::Rotation([-127, -32768, 0])));
    }

    #[test]
    fn test_decode_buttons_verbatim() {
        let update = decode_report(&[3, 0x01, 0x80]).unwrap();
        assert_eq!(update, Some(StateUpdate::Buttons(Buttons(0x8001))));
    }

    #[test]
    fn test_decode_buttons_ignores_trailing_bytes() {
        let update = decode_report(&[3, 0x02, 0x00, 0xAA, 0xBB]).unwrap();
        assert_eq!(update, Some(StateUpdate::Buttons(Buttons(0x0002))));
    }

    #[test]
    fn test_short_reports_are_no_event() {
        assert_eq!(decode_report(&[]), Ok(None));
        assert_eq!(decode_report(&[1]), Ok(None));
        assert_eq!(decode_report(&[3, 0xFF]), Ok(None));
        assert_eq!(decode_report(&[9, 0xFF]), Ok(None));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            decode_report(&[4, 1, 0, 2, 0, 3, 0]),
            Err(DecodeError::UnknownTag(4))
        );
        assert_eq!(decode_report(&[0, 0, 0]), Err(DecodeError::UnknownTag(0)));
    }

    #[test]
    fn test_truncated_axis_report() {
        assert_eq!(
            decode_report(&[1, 10, 0, 20, 0]),
            Err(DecodeError::Truncated { tag: 1, len: 5 })
        );
        assert_eq!(
            decode_report(&[2, 10, 0, 20, 0, 30]),
            Err(DecodeError::Truncated { tag: 2, len: 6 })
        );
    }

    #[test]
    fn test_report_tag_try_from() {
        assert_eq!(ReportTag::try_from(1), Ok(ReportTag::Translation));
        assert_eq!(ReportTag::try_from(2), Ok(ReportTag::Rotation));
        assert_eq!(ReportTag::try_from(3), Ok(ReportTag::Buttons));
        assert_eq!(ReportTag::try_from(0xFF), Err(DecodeError::UnknownTag(0xFF)));
    }
}
