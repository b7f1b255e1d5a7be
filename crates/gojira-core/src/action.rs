//! The logical effect bound to a keymap cell.
//!
//! In memory an [`Action`] is a regular enum. It is only turned into
//! its 4 byte record (`[tag, p0, p1, p2]`) when it crosses the
//! persistence or command channel boundaries.

use core::fmt::Display;

use bitflags::bitflags;

bitflags! {
    /// Modifier bits, in the order used by the first byte of the
    /// keyboard reports.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const LEFT_CTRL = 1 << 0;
        const LEFT_SHIFT = 1 << 1;
        const LEFT_ALT = 1 << 2;
        const LEFT_GUI = 1 << 3;
        const RIGHT_CTRL = 1 << 4;
        const RIGHT_SHIFT = 1 << 5;
        const RIGHT_ALT = 1 << 6;
        const RIGHT_GUI = 1 << 7;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

/// Wire tag of each [`Action`] variant.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTag {
    None = 0,
    Automouse = 1,
    Consumer = 2,
    Key = 3,
    Layer = 4,
    Macro = 5,
    Mouse = 6,
    System = 7,
    Wheel = 8,
}

impl TryFrom<u8> for ActionTag {
    type Error = ActionDecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ActionTag::None,
            1 => ActionTag::Automouse,
            2 => ActionTag::Consumer,
            3 => ActionTag::Key,
            4 => ActionTag::Layer,
            5 => ActionTag::Macro,
            6 => ActionTag::Mouse,
            7 => ActionTag::System,
            8 => ActionTag::Wheel,
            other => return Err(ActionDecodeError::UnknownTag(other)),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionDecodeError {
    UnknownTag(u8),
}

impl Display for ActionDecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ActionDecodeError::UnknownTag(tag) => write!(f, "unknown action tag {:02x}", tag),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    None,
    /// A keyboard usage plus the modifiers held along with it. A zero
    /// code only touches the modifiers.
    Key { modifiers: Modifiers, code: u8 },
    /// Consumer page usage (media keys and friends).
    Consumer(u16),
    /// Generic desktop system control usage (power, sleep...).
    System(u16),
    Mouse { buttons: MouseButtons, dx: i8, dy: i8 },
    Wheel { buttons: MouseButtons, dh: i8, dv: i8 },
    /// Toggles the auto clicker. It fires `period_divisor` times per
    /// second, moving the pointer by `wiggle` on every press.
    Automouse { buttons: MouseButtons, period_divisor: i8, wiggle: i8 },
    Macro(u8),
    Layer(u8),
}

impl Action {
    pub const SIZE: usize = 4;

    pub const fn key(code: u8) -> Self {
        Action::Key { modifiers: Modifiers::empty(), code }
    }

    pub const fn shifted(code: u8) -> Self {
        Action::Key { modifiers: Modifiers::LEFT_SHIFT, code }
    }

    pub const fn tag(&self) -> ActionTag {
        match self {
            Action::None => ActionTag::None,
            Action::Key { .. } => ActionTag::Key,
            Action::Consumer(_) => ActionTag::Consumer,
            Action::System(_) => ActionTag::System,
            Action::Mouse { .. } => ActionTag::Mouse,
            Action::Wheel { .. } => ActionTag::Wheel,
            Action::Automouse { .. } => ActionTag::Automouse,
            Action::Macro(_) => ActionTag::Macro,
            Action::Layer(_) => ActionTag::Layer,
        }
    }

    pub const fn to_bytes(&self) -> [u8; Self::SIZE] {
        let tag = self.tag() as u8;
        match *self {
            Action::None => [tag, 0, 0, 0],
            Action::Key { modifiers, code } => [tag, 0, modifiers.bits(), code],
            Action::Consumer(code) | Action::System(code) => {
                let [lo, hi] = code.to_le_bytes();
                [tag, 0, lo, hi]
            }
            Action::Mouse { buttons, dx, dy } => [tag, buttons.bits(), dx as u8, dy as u8],
            Action::Wheel { buttons, dh, dv } => [tag, buttons.bits(), dh as u8, dv as u8],
            Action::Automouse { buttons, period_divisor, wiggle } => {
                [tag, buttons.bits(), period_divisor as u8, wiggle as u8]
            }
            Action::Macro(index) | Action::Layer(index) => [tag, 0, 0, index],
        }
    }

    /// Decodes a 4 byte record. Bytes not used by the tag are ignored.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, ActionDecodeError> {
        let [tag, p0, p1, p2] = bytes;
        Ok(match ActionTag::try_from(tag)? {
            ActionTag::None => Action::None,
            ActionTag::Key => Action::Key { modifiers: Modifiers::from_bits_retain(p1), code: p2 },
            ActionTag::Consumer => Action::Consumer(u16::from_le_bytes([p1, p2])),
            ActionTag::System => Action::System(u16::from_le_bytes([p1, p2])),
            ActionTag::Mouse => Action::Mouse {
                buttons: MouseButtons::from_bits_retain(p0),
                dx: p1 as i8,
                dy: p2 as i8,
            },
            ActionTag::Wheel => Action::Wheel {
                buttons: MouseButtons::from_bits_retain(p0),
                dh: p1 as i8,
                dv: p2 as i8,
            },
            ActionTag::Automouse => Action::Automouse {
                buttons: MouseButtons::from_bits_retain(p0),
                period_divisor: p1 as i8,
                wiggle: p2 as i8,
            },
            ActionTag::Macro => Action::Macro(p2),
            ActionTag::Layer => Action::Layer(p2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::KEY_A;

    #[test]
    fn test_key_record_layout() {
        let action = Action::Key { modifiers: Modifiers::LEFT_SHIFT, code: KEY_A };
        assert_eq!(action.to_bytes(), [3, 0, 0x02, 0x04]);
    }

    #[test]
    fn test_extra_key_code_is_little_endian() {
        assert_eq!(Action::Consumer(0x00e9).to_bytes(), [2, 0, 0xe9, 0x00]);
        assert_eq!(Action::from_bytes([7, 0, 0x82, 0x00]), Ok(Action::System(0x82)));
    }

    #[test]
    fn test_signed_payloads_survive_decode() {
        let action = Action::Automouse { buttons: MouseButtons::LEFT, period_divisor: 4, wiggle: -5 };
        let bytes = action.to_bytes();
        assert_eq!(bytes, [1, 1, 4, 0xfb]);
        assert_eq!(Action::from_bytes(bytes), Ok(action));
    }

    #[test]
    fn test_reserved_bytes_ignored_on_decode() {
        assert_eq!(Action::from_bytes([4, 0xaa, 0xbb, 2]), Ok(Action::Layer(2)));
        assert_eq!(Action::from_bytes([0, 1, 2, 3]), Ok(Action::None));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(Action::from_bytes([9, 0, 0, 0]), Err(ActionDecodeError::UnknownTag(9)));
    }
}
