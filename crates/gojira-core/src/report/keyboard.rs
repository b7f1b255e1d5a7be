use gojira_common::{KeyState, dev_debug};
use zerocopy::IntoBytes;

use crate::action::Modifiers;
use crate::hid::{Endpoint, KeyboardReport, Link, NkroReport};

use super::push_report;

/// Set of held keys and modifiers, kept in both the boot and the NKRO
/// encodings. Only one of them is reported at a time, depending on
/// whether NKRO is enabled.
#[derive(Clone, Debug, Default)]
pub struct KeyboardState {
    boot: KeyboardReport,
    nkro: NkroReport,
    nkro_active: bool,
    boot_dirty: bool,
    nkro_dirty: bool,
}

impl KeyboardState {
    pub const fn new() -> Self {
        Self {
            boot: KeyboardReport { modifiers: 0, reserved: 0, keys: [0; KeyboardReport::SLOTS] },
            nkro: NkroReport { modifiers: 0, keys: gojira_common::util::BitArray::new() },
            nkro_active: false,
            boot_dirty: false,
            nkro_dirty: false,
        }
    }

    pub fn nkro_active(&self) -> bool {
        self.nkro_active
    }

    pub fn set_nkro(&mut self, active: bool) {
        if self.nkro_active != active {
            dev_debug!("NKRO {}", if active { "enabled" } else { "disabled" });
            self.nkro_active = active;
            self.mark_modifiers_dirty();
        }
    }

    pub fn boot_report(&self) -> &KeyboardReport {
        &self.boot
    }

    pub fn nkro_report(&self) -> &NkroReport {
        &self.nkro
    }

    pub fn is_dirty(&self) -> bool {
        self.boot_dirty || self.nkro_dirty
    }

    pub fn add_key(&mut self, code: u8) {
        if self.nkro_active {
            if let Some(bit) = NkroReport::bit_of(code) {
                self.nkro.keys.set(bit);
                self.nkro_dirty = true;
                return;
            }
        }

        if self.boot.keys.contains(&code) {
            return;
        }

        match self.boot.keys.iter_mut().find(|k| **k == 0) {
            Some(slot) => {
                *slot = code;
                self.boot_dirty = true;
            }
            None => {
                dev_debug!("All keyboard slots in use, dropping key {:02x}", code);
            }
        }
    }

    /// Releases `code` from both encodings, so a key pressed before a
    /// mode switch is still released afterwards.
    pub fn del_key(&mut self, code: u8) {
        if let Some(bit) = NkroReport::bit_of(code) {
            if self.nkro.keys.clear(bit) {
                self.nkro_dirty = true;
            }
        }

        if let Some(slot) = self.boot.keys.iter_mut().find(|k| **k == code) {
            *slot = 0;
            self.boot_dirty = true;
        }
    }

    pub fn add_modifiers(&mut self, modifiers: Modifiers) {
        self.boot.modifiers |= modifiers.bits();
        self.nkro.modifiers |= modifiers.bits();
        self.mark_modifiers_dirty();
    }

    pub fn del_modifiers(&mut self, modifiers: Modifiers) {
        self.boot.modifiers &= !modifiers.bits();
        self.nkro.modifiers &= !modifiers.bits();
        self.mark_modifiers_dirty();
    }

    fn mark_modifiers_dirty(&mut self) {
        if self.nkro_active {
            self.nkro_dirty = true;
            // Keys outside the bitmap are still reported in the boot
            // slots and must carry the new modifiers.
            if self.boot.keys.iter().any(|k| *k != 0) {
                self.boot_dirty = true;
            }
        } else {
            self.boot_dirty = true;
        }
    }

    /// Applies a key action. A zero code only changes the modifiers.
    pub fn event(&mut self, modifiers: Modifiers, code: u8, state: KeyState) {
        match state {
            KeyState::Pressed => {
                if !modifiers.is_empty() {
                    self.add_modifiers(modifiers);
                }
                if code != 0 {
                    self.add_key(code);
                }
            }
            KeyState::Released => {
                if code != 0 {
                    self.del_key(code);
                }
                if !modifiers.is_empty() {
                    self.del_modifiers(modifiers);
                }
            }
        }
    }

    pub fn flush<L: Link + ?Sized>(&mut self, link: &mut L) {
        if self.boot_dirty && push_report(link, Endpoint::Keyboard, self.boot.as_bytes()) {
            self.boot_dirty = false;
        }

        if self.nkro_dirty && push_report(link, Endpoint::Nkro, self.nkro.as_bytes()) {
            self.nkro_dirty = false;
        }
    }
}
