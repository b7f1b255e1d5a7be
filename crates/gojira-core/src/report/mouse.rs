use gojira_common::KeyState;
use zerocopy::IntoBytes;

use crate::action::MouseButtons;
use crate::hid::{Endpoint, Link, MouseReport};

use super::push_report;

/// Pointer state. Motion is relative, so every write overwrites the
/// previous deltas and they are cleared once a report carrying them
/// has been sent.
#[derive(Clone, Debug, Default)]
pub struct MouseState {
    report: MouseReport,
    dirty: bool,
}

impl MouseState {
    pub const fn new() -> Self {
        Self {
            report: MouseReport { buttons: 0, x: 0, y: 0, wheel: 0, pan: 0 },
            dirty: false,
        }
    }

    pub fn report(&self) -> &MouseReport {
        &self.report
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mouse_event(&mut self, buttons: MouseButtons, dx: i8, dy: i8, state: KeyState) {
        match state {
            KeyState::Pressed => {
                self.report.buttons |= buttons.bits();
                self.report.x = dx;
                self.report.y = dy;
            }
            KeyState::Released => {
                self.report.buttons &= !buttons.bits();
                self.report.x = 0;
                self.report.y = 0;
            }
        }
        self.dirty = true;
    }

    pub fn wheel_event(&mut self, buttons: MouseButtons, dh: i8, dv: i8, state: KeyState) {
        match state {
            KeyState::Pressed => {
                self.report.buttons |= buttons.bits();
                self.report.pan = dh;
                self.report.wheel = dv;
            }
            KeyState::Released => {
                self.report.buttons &= !buttons.bits();
                self.report.pan = 0;
                self.report.wheel = 0;
            }
        }
        self.dirty = true;
    }

    /// Replaces the whole report with the given buttons and motion.
    pub fn set_motion(&mut self, buttons: MouseButtons, dx: i8, dy: i8) {
        self.report = MouseReport { buttons: buttons.bits(), x: dx, y: dy, wheel: 0, pan: 0 };
        self.dirty = true;
    }

    pub fn flush<L: Link + ?Sized>(&mut self, link: &mut L) {
        if self.dirty && push_report(link, Endpoint::Mouse, self.report.as_bytes()) {
            self.dirty = false;
            self.report.x = 0;
            self.report.y = 0;
            self.report.wheel = 0;
            self.report.pan = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut mouse = MouseState::new();
        mouse.mouse_event(MouseButtons::empty(), 3, 0, KeyState::Pressed);
        mouse.mouse_event(MouseButtons::LEFT, 0, -7, KeyState::Pressed);
        assert_eq!(*mouse.report(), MouseReport { buttons: 1, x: 0, y: -7, wheel: 0, pan: 0 });
    }

    #[test]
    fn test_release_clears_own_buttons_only() {
        let mut mouse = MouseState::new();
        mouse.mouse_event(MouseButtons::LEFT, 0, 0, KeyState::Pressed);
        mouse.wheel_event(MouseButtons::RIGHT, 0, 1, KeyState::Pressed);
        mouse.mouse_event(MouseButtons::LEFT, 0, 0, KeyState::Released);
        assert_eq!(mouse.report().buttons, MouseButtons::RIGHT.bits());
        assert_eq!(mouse.report().wheel, 1);
    }
}
