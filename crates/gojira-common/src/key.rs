/// Logical state of a single switch, as seen after debouncing.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyState {
    #[default]
    Released = 0,
    Pressed = 1,
}

impl KeyState {
    pub const fn from_bool(value: bool) -> KeyState {
        match value {
            true => KeyState::Pressed,
            false => KeyState::Released,
        }
    }

    pub const fn to_bool(self) -> bool {
        match self {
            KeyState::Released => false,
            KeyState::Pressed => true,
        }
    }

    pub const fn is_pressed(self) -> bool {
        self.to_bool()
    }
}

impl From<bool> for KeyState {
    fn from(value: bool) -> Self {
        KeyState::from_bool(value)
    }
}
