//! Core state types: Buttons, DeviceState, StateUpdate.

/// Button bitmap reported by the controller.
///
/// Bit `n` is logical button `n`, in the order the device reports them.
/// Up to 16 buttons are carried.
///
/// # Example
///
/// ```
/// use sixdof_proto::Buttons;
///
/// let mut buttons = Buttons::NONE;
/// buttons.set(3, true);
/// assert!(buttons.is_pressed(3));
/// assert_eq!(buttons.raw(), 0x0008);
/// ```
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(pub u16);

impl Buttons {
    /// No buttons pressed.
    pub const NONE: Self = Self(0);

    /// Number of buttons the bitmap can represent.
    pub const COUNT: u8 = 16;

    /// Check whether button `index` is pressed. Out-of-range indices are never pressed.
    #[inline]
    #[must_use]
    pub const fn is_pressed(self, index: u8) -> bool {
        index < Self::COUNT && (self.0 >> index) & 1 == 1
    }

    /// Set or clear button `index`. Out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: u8, pressed: bool) {
        if index >= Self::COUNT {
            return;
        }
        if pressed {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Get the raw u16 value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Check if no buttons are pressed.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Normalized controller state shared between the input decoder and the
/// output encoder.
///
/// Translation axes (`x`, `y`, `z`) and rotation axes (`rx`, `ry`, `rz`)
/// are already scaled to the full signed 16-bit range. Every field keeps
/// its last decoded value until a report of its category arrives; nothing
/// is reset when the controller goes quiet.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub buttons: Buttons,
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub rx: i16,
    pub ry: i16,
    pub rz: i16,
}

impl DeviceState {
    /// Create a zeroed state (no buttons pressed, all axes centered).
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            buttons: Buttons::NONE,
            x: 0,
            y: 0,
            z: 0,
            rx: 0,
            ry: 0,
            rz: 0,
        }
    }

    /// Apply one decoded report. Only the fields of the report's category change.
    #[inline]
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::Translation([x, y, z]) => {
                self.x = x;
                self.y = y;
                self.z = z;
            }
            StateUpdate::Rotation([rx, ry, rz]) => {
                self.rx = rx;
                self.ry = ry;
                self.rz = rz;
            }
            StateUpdate::Buttons(buttons) => self.buttons = buttons,
        }
    }
}

/// One decoded controller report, already scaled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum StateUpdate {
    /// X, Y, Z translation.
    Translation([i16; 3]),
    /// Rx, Ry, Rz rotation.
    Rotation([i16; 3]),
    /// Button bitmap.
    Buttons(Buttons),
}
