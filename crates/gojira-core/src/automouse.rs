//! Auto clicker. While active it alternates between pressing the
//! configured buttons while moving the pointer by the wiggle offset,
//! and releasing them while moving it back.

use gojira_common::{
    KeyState, dev_debug, dev_info,
    time::{Clock, Deadline},
};

use crate::action::MouseButtons;
use crate::hid::{Endpoint, Link};
use crate::report::MouseState;

const BASE_PERIOD_MILLIS: u32 = 1000;

#[derive(Clone, Debug)]
pub struct Automouse {
    active: bool,
    pressed: bool,
    buttons: MouseButtons,
    wiggle: i8,
    period_millis: u32,
    deadline: Deadline,
}

impl Default for Automouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Automouse {
    pub const fn new() -> Self {
        Self {
            active: false,
            pressed: false,
            buttons: MouseButtons::empty(),
            wiggle: 0,
            period_millis: BASE_PERIOD_MILLIS,
            deadline: Deadline::at(0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the last emitted phase held the buttons down.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn period_millis(&self) -> u32 {
        self.period_millis
    }

    /// Handles the key bound to the auto clicker. Both edges refresh
    /// the binding and re-arm the timer, only the press toggles it.
    pub fn event<C: Clock>(
        &mut self,
        clock: &C,
        mouse: &mut MouseState,
        buttons: MouseButtons,
        period_divisor: i8,
        wiggle: i8,
        state: KeyState,
    ) {
        // A non positive divisor would mean a period of infinite (or
        // negative) length. Use the base period instead.
        let divisor = period_divisor.max(1) as u32;
        self.buttons = buttons;
        self.wiggle = wiggle;
        self.period_millis = BASE_PERIOD_MILLIS / divisor;
        self.deadline = clock.deadline(self.period_millis);

        if state == KeyState::Released {
            return;
        }

        self.active = !self.active;
        dev_info!("Automouse {} ({} ms period)", if self.active { "on" } else { "off" }, self.period_millis);

        if !self.active && self.pressed {
            // Leave nothing held: the loop flushes this zero report.
            self.pressed = false;
            mouse.set_motion(MouseButtons::empty(), 0, 0);
        }
    }

    /// Advances the oscillator if it is due and the mouse endpoint is
    /// free. Otherwise the pending phase waits for the next call.
    pub fn tick<C: Clock, L: Link + ?Sized>(&mut self, clock: &C, mouse: &mut MouseState, link: &mut L) {
        if !self.active || !clock.passed(self.deadline) || !link.is_idle(Endpoint::Mouse) {
            return;
        }

        let pressed = !self.pressed;
        if pressed {
            mouse.set_motion(self.buttons, self.wiggle, self.wiggle);
        } else {
            let back = self.wiggle.wrapping_neg();
            mouse.set_motion(MouseButtons::empty(), back, back);
        }
        mouse.flush(link);

        if mouse.is_dirty() {
            dev_debug!("Automouse phase not sent, retrying");
            return;
        }

        self.pressed = pressed;
        // Drift is fine, the next phase is timed from now.
        self.deadline = clock.deadline(self.period_millis);
    }
}
