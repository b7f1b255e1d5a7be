use gojira_core::{
    action::{Action, MouseButtons},
    keycode::*,
    keymap::KeymapTable,
};

use crate::config::{COLS, LAYERS, ROWS};

const fn f(n: u8) -> Action {
    Action::key(key_f(n - 1))
}

const fn pad(n: u8) -> Action {
    if n == 0 { Action::key(KEY_PAD_0) } else { Action::key(KEY_PAD_1 + n - 1) }
}

const fn consumer(code: u16) -> Action {
    Action::Consumer(code)
}

const fn mouse(dx: i8, dy: i8) -> Action {
    Action::Mouse { buttons: MouseButtons::empty(), dx, dy }
}

const ___: Action = Action::None;

#[rustfmt::skip]
pub const LAYOUT: KeymapTable<LAYERS, ROWS, COLS> = KeymapTable::new([
    [   // base
        [      f(13),      f(14),      f(15),      f(16),      f(17)],
        [      f(18),      f(19),      f(20),      f(21),      f(22)],
        [consumer(CONSUMER_VOLUME_UP), consumer(CONSUMER_VOLUME_DOWN), consumer(CONSUMER_PLAY_PAUSE), consumer(CONSUMER_SCAN_NEXT), consumer(CONSUMER_MUTE)],
        [     pad(1),     pad(2),     pad(3),     pad(4),     pad(5)],
        [     pad(6),     pad(7),     pad(8),     pad(9), Action::Layer(1)],
    ],
    [   // pointer
        [Action::Macro(0), Action::Macro(1), Action::Macro(2), Action::Macro(3), ___],
        [        ___,   mouse(0, -8),        ___,        ___,        ___],
        [mouse(-8, 0),        ___,   mouse(8, 0),        ___,        ___],
        [        ___,    mouse(0, 8),        ___,        ___,        ___],
        [
            Action::Mouse { buttons: MouseButtons::LEFT, dx: 0, dy: 0 },
            Action::Mouse { buttons: MouseButtons::RIGHT, dx: 0, dy: 0 },
            Action::Wheel { buttons: MouseButtons::empty(), dh: 0, dv: 1 },
            Action::Automouse { buttons: MouseButtons::LEFT, period_divisor: 4, wiggle: 1 },
            Action::Layer(0),
        ],
    ],
]);
