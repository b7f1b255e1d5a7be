use gojira_common::{KeyState, time::Clock};

use crate::action::Action;
use crate::automouse::Automouse;
use crate::hid::{Endpoint, Link};
use crate::keyboard_macro::Delivery;
use crate::report::{ExtraKeyState, KeyboardState, MouseState};

/// Report producing state of every device class.
#[derive(Clone, Debug, Default)]
pub struct Devices {
    pub keyboard: KeyboardState,
    pub mouse: MouseState,
    pub extrakey: ExtraKeyState,
    pub automouse: Automouse,
}

impl Devices {
    pub const fn new() -> Self {
        Self {
            keyboard: KeyboardState::new(),
            mouse: MouseState::new(),
            extrakey: ExtraKeyState::new(),
            automouse: Automouse::new(),
        }
    }

    /// Endpoints that must be idle before `action` can be applied.
    pub fn endpoints_of(action: &Action) -> &'static [Endpoint] {
        match action {
            Action::Key { .. } => &[Endpoint::Keyboard, Endpoint::Nkro],
            Action::Mouse { .. } | Action::Wheel { .. } | Action::Automouse { .. } => &[Endpoint::Mouse],
            Action::Consumer(_) | Action::System(_) => &[Endpoint::ExtraKey],
            Action::None | Action::Macro(_) | Action::Layer(_) => &[],
        }
    }

    /// Updates the report state for a device class action. Macro and
    /// layer actions are not handled here and are ignored.
    pub fn apply<C: Clock>(&mut self, clock: &C, action: &Action, state: KeyState) {
        match *action {
            Action::Key { modifiers, code } => self.keyboard.event(modifiers, code, state),
            Action::Consumer(code) => self.extrakey.consumer_event(code, state),
            Action::System(code) => self.extrakey.system_event(code, state),
            Action::Mouse { buttons, dx, dy } => self.mouse.mouse_event(buttons, dx, dy, state),
            Action::Wheel { buttons, dh, dv } => self.mouse.wheel_event(buttons, dh, dv, state),
            Action::Automouse { buttons, period_divisor, wiggle } => {
                self.automouse.event(clock, &mut self.mouse, buttons, period_divisor, wiggle, state)
            }
            Action::None | Action::Macro(_) | Action::Layer(_) => {}
        }
    }

    /// Sends every dirty report whose endpoint is idle.
    pub fn flush<L: Link + ?Sized>(&mut self, link: &mut L) {
        self.keyboard.flush(link);
        self.mouse.flush(link);
        self.extrakey.flush(link);
    }

    /// Applies `action` only if all the endpoints it reports through
    /// are idle. When busy nothing is touched, so the caller can retry
    /// later with the same arguments.
    pub fn deliver_if_idle<C: Clock, L: Link + ?Sized>(
        &mut self,
        clock: &C,
        link: &mut L,
        action: &Action,
        state: KeyState,
    ) -> Delivery {
        if !Self::endpoints_of(action).iter().all(|ep| link.is_idle(*ep)) {
            return Delivery::Busy;
        }

        self.apply(clock, action, state);
        self.flush(link);
        Delivery::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::Cell;

    use crate::action::MouseButtons;
    use crate::hid::TransportError;

    struct TestClock(Cell<u32>);

    impl Clock for TestClock {
        fn now_millis(&self) -> u32 {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct MouseBusyLink {
        mouse_busy: bool,
        writes: usize,
    }

    impl Link for MouseBusyLink {
        fn poll(&mut self, _on_serial_rx: &mut dyn FnMut(&[u8])) {}

        fn is_active(&self, _endpoint: Endpoint) -> bool {
            true
        }

        fn is_idle(&self, endpoint: Endpoint) -> bool {
            !(self.mouse_busy && endpoint == Endpoint::Mouse)
        }

        fn write(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<usize, TransportError> {
            if !self.is_idle(endpoint) {
                return Err(TransportError::WouldBlock);
            }
            self.writes += 1;
            Ok(bytes.len())
        }
    }

    const AUTOMOUSE: Action = Action::Automouse { buttons: MouseButtons::LEFT, period_divisor: 4, wiggle: 5 };

    #[test]
    fn test_automouse_waits_for_mouse_endpoint() {
        let clock = TestClock(Cell::new(0));
        let mut link = MouseBusyLink { mouse_busy: true, ..Default::default() };
        let mut devices = Devices::new();

        assert_eq!(devices.deliver_if_idle(&clock, &mut link, &AUTOMOUSE, KeyState::Pressed), Delivery::Busy);
        assert!(!devices.automouse.is_active());

        link.mouse_busy = false;
        assert_eq!(devices.deliver_if_idle(&clock, &mut link, &AUTOMOUSE, KeyState::Pressed), Delivery::Delivered);
        assert!(devices.automouse.is_active());
    }

    #[test]
    fn test_busy_mouse_does_not_gate_keys() {
        let clock = TestClock(Cell::new(0));
        let mut link = MouseBusyLink { mouse_busy: true, ..Default::default() };
        let mut devices = Devices::new();

        let key = Action::key(crate::keycode::KEY_A);
        assert_eq!(devices.deliver_if_idle(&clock, &mut link, &key, KeyState::Pressed), Delivery::Delivered);
        assert_eq!(link.writes, 1);
        assert_eq!(Devices::endpoints_of(&AUTOMOUSE), &[Endpoint::Mouse]);
    }
}
