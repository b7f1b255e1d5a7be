//! HID usage codes used by the keymaps, and the table that turns
//! text into key actions for macros.

use crate::action::{Action, Modifiers};

// Keyboard/Keypad page (0x07).
pub const KEY_NONE: u8 = 0x00;
pub const KEY_A: u8 = 0x04;
pub const KEY_Z: u8 = 0x1d;
pub const KEY_1: u8 = 0x1e;
pub const KEY_0: u8 = 0x27;
pub const KEY_ENTER: u8 = 0x28;
pub const KEY_ESCAPE: u8 = 0x29;
pub const KEY_BACKSPACE: u8 = 0x2a;
pub const KEY_TAB: u8 = 0x2b;
pub const KEY_SPACE: u8 = 0x2c;
pub const KEY_MINUS: u8 = 0x2d;
pub const KEY_EQUAL: u8 = 0x2e;
pub const KEY_LEFT_BRACE: u8 = 0x2f;
pub const KEY_RIGHT_BRACE: u8 = 0x30;
pub const KEY_BACKSLASH: u8 = 0x31;
pub const KEY_SEMICOLON: u8 = 0x33;
pub const KEY_QUOTE: u8 = 0x34;
pub const KEY_GRAVE: u8 = 0x35;
pub const KEY_COMMA: u8 = 0x36;
pub const KEY_DOT: u8 = 0x37;
pub const KEY_SLASH: u8 = 0x38;
pub const KEY_F1: u8 = 0x3a;
pub const KEY_F13: u8 = 0x68;
pub const KEY_PAD_1: u8 = 0x59;
pub const KEY_PAD_0: u8 = 0x62;
pub const KEY_LEFT_CTRL: u8 = 0xe0;
pub const KEY_RIGHT_GUI: u8 = 0xe7;

/// `KEY_F1` + n, for n in 0..12.
pub const fn key_f(n: u8) -> u8 {
    if n < 12 { KEY_F1 + n } else { KEY_F13 + (n - 12) }
}

// Consumer page (0x0c).
pub const CONSUMER_PLAY_PAUSE: u16 = 0x00cd;
pub const CONSUMER_SCAN_NEXT: u16 = 0x00b5;
pub const CONSUMER_SCAN_PREVIOUS: u16 = 0x00b6;
pub const CONSUMER_MUTE: u16 = 0x00e2;
pub const CONSUMER_VOLUME_UP: u16 = 0x00e9;
pub const CONSUMER_VOLUME_DOWN: u16 = 0x00ea;

// Generic desktop page (0x01), system controls.
pub const SYSTEM_POWER_DOWN: u16 = 0x0081;
pub const SYSTEM_SLEEP: u16 = 0x0082;
pub const SYSTEM_WAKE_UP: u16 = 0x0083;

/// Maps a character to the key press that types it on a US layout.
/// Covers the printable ASCII range plus newline and tab.
pub const fn ascii_to_action(c: u8) -> Option<Action> {
    let (modifiers, code) = match c {
        b'a'..=b'z' => (Modifiers::empty(), KEY_A + (c - b'a')),
        b'A'..=b'Z' => (Modifiers::LEFT_SHIFT, KEY_A + (c - b'A')),
        b'1'..=b'9' => (Modifiers::empty(), KEY_1 + (c - b'1')),
        b'0' => (Modifiers::empty(), KEY_0),
        b'\n' => (Modifiers::empty(), KEY_ENTER),
        b'\t' => (Modifiers::empty(), KEY_TAB),
        b' ' => (Modifiers::empty(), KEY_SPACE),
        b'!' => (Modifiers::LEFT_SHIFT, KEY_1),
        b'@' => (Modifiers::LEFT_SHIFT, KEY_1 + 1),
        b'#' => (Modifiers::LEFT_SHIFT, KEY_1 + 2),
        b'$' => (Modifiers::LEFT_SHIFT, KEY_1 + 3),
        b'%' => (Modifiers::LEFT_SHIFT, KEY_1 + 4),
        b'^' => (Modifiers::LEFT_SHIFT, KEY_1 + 5),
        b'&' => (Modifiers::LEFT_SHIFT, KEY_1 + 6),
        b'*' => (Modifiers::LEFT_SHIFT, KEY_1 + 7),
        b'(' => (Modifiers::LEFT_SHIFT, KEY_1 + 8),
        b')' => (Modifiers::LEFT_SHIFT, KEY_0),
        b'-' => (Modifiers::empty(), KEY_MINUS),
        b'_' => (Modifiers::LEFT_SHIFT, KEY_MINUS),
        b'=' => (Modifiers::empty(), KEY_EQUAL),
        b'+' => (Modifiers::LEFT_SHIFT, KEY_EQUAL),
        b'[' => (Modifiers::empty(), KEY_LEFT_BRACE),
        b'{' => (Modifiers::LEFT_SHIFT, KEY_LEFT_BRACE),
        b']' => (Modifiers::empty(), KEY_RIGHT_BRACE),
        b'}' => (Modifiers::LEFT_SHIFT, KEY_RIGHT_BRACE),
        b'\\' => (Modifiers::empty(), KEY_BACKSLASH),
        b'|' => (Modifiers::LEFT_SHIFT, KEY_BACKSLASH),
        b';' => (Modifiers::empty(), KEY_SEMICOLON),
        b':' => (Modifiers::LEFT_SHIFT, KEY_SEMICOLON),
        b'\'' => (Modifiers::empty(), KEY_QUOTE),
        b'"' => (Modifiers::LEFT_SHIFT, KEY_QUOTE),
        b'`' => (Modifiers::empty(), KEY_GRAVE),
        b'~' => (Modifiers::LEFT_SHIFT, KEY_GRAVE),
        b',' => (Modifiers::empty(), KEY_COMMA),
        b'<' => (Modifiers::LEFT_SHIFT, KEY_COMMA),
        b'.' => (Modifiers::empty(), KEY_DOT),
        b'>' => (Modifiers::LEFT_SHIFT, KEY_DOT),
        b'/' => (Modifiers::empty(), KEY_SLASH),
        b'?' => (Modifiers::LEFT_SHIFT, KEY_SLASH),
        _ => return None,
    };

    Some(Action::Key { modifiers, code })
}
