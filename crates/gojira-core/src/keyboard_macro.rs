//! Stored macros and their playback.
//!
//! A macro is a list of actions that is replayed as press/release
//! pairs, one transition per tick, and only when the endpoint the
//! action goes to is idle. Playing a macro never holds more than one
//! of its actions down at a time.

use core::fmt::Display;

use gojira_common::{KeyState, dev_debug, dev_trace, dev_warn};

use crate::action::Action;
use crate::keycode::ascii_to_action;

pub const MACRO_MAX_KEYS: usize = 10;
pub const MACRO_MAX_LEN: usize = 32;

/// Longest storable macro. Two positions are kept spare.
pub const MACRO_MAX_ACTIONS: usize = MACRO_MAX_LEN - 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacroError {
    SlotOutOfBounds(usize),
    TooLong(usize),
    Unmapped(u8),
}

impl Display for MacroError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MacroError::SlotOutOfBounds(slot) => write!(f, "macro slot {} out of bounds", slot),
            MacroError::TooLong(len) => write!(f, "macro of length {} does not fit", len),
            MacroError::Unmapped(c) => write!(f, "no key for character {:02x}", c),
        }
    }
}

/// Result of handing an action to an idle gated handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroStore {
    actions: [[Action; MACRO_MAX_LEN]; MACRO_MAX_KEYS],
    lengths: [u8; MACRO_MAX_KEYS],
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroStore {
    pub const fn new() -> Self {
        Self { actions: [[Action::None; MACRO_MAX_LEN]; MACRO_MAX_KEYS], lengths: [0; MACRO_MAX_KEYS] }
    }

    pub fn clear_all(&mut self) {
        *self = Self::new();
    }

    /// Stores `actions` in `slot`. An empty list undefines the slot.
    pub fn set_actions(&mut self, slot: usize, actions: &[Action]) -> Result<(), MacroError> {
        if slot >= MACRO_MAX_KEYS {
            return Err(MacroError::SlotOutOfBounds(slot));
        }
        if actions.len() > MACRO_MAX_ACTIONS {
            return Err(MacroError::TooLong(actions.len()));
        }

        let stored = &mut self.actions[slot];
        *stored = [Action::None; MACRO_MAX_LEN];
        stored[..actions.len()].copy_from_slice(actions);
        self.lengths[slot] = actions.len() as u8;
        Ok(())
    }

    /// Translates `phrase` into key actions and stores them in
    /// `slot`. The slot is left untouched if any character cannot be
    /// typed.
    pub fn set_phrase(&mut self, slot: usize, phrase: &[u8]) -> Result<(), MacroError> {
        if phrase.len() > MACRO_MAX_ACTIONS {
            return Err(MacroError::TooLong(phrase.len()));
        }

        let mut actions = [Action::None; MACRO_MAX_ACTIONS];
        for (dst, c) in actions.iter_mut().zip(phrase.iter()) {
            *dst = ascii_to_action(*c).ok_or(MacroError::Unmapped(*c))?;
        }

        self.set_actions(slot, &actions[..phrase.len()])
    }

    /// The defined actions of `slot`, empty when undefined.
    pub fn get(&self, slot: usize) -> &[Action] {
        match (self.actions.get(slot), self.lengths.get(slot)) {
            (Some(actions), Some(len)) => &actions[..*len as usize],
            _ => &[],
        }
    }

    pub fn len(&self, slot: usize) -> usize {
        self.get(slot).len()
    }

    pub fn slots(&self) -> &[[Action; MACRO_MAX_LEN]; MACRO_MAX_KEYS] {
        &self.actions
    }

    pub fn lengths(&self) -> &[u8; MACRO_MAX_KEYS] {
        &self.lengths
    }

    /// Rebuilds a store from raw contents, as read back from storage.
    pub fn from_parts(
        actions: [[Action; MACRO_MAX_LEN]; MACRO_MAX_KEYS],
        lengths: [u8; MACRO_MAX_KEYS],
    ) -> Result<Self, MacroError> {
        if let Some(len) = lengths.iter().find(|l| **l as usize > MACRO_MAX_ACTIONS) {
            return Err(MacroError::TooLong(*len as usize));
        }
        Ok(Self { actions, lengths })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacroPhase {
    Init,
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Playback {
    slot: usize,
    position: usize,
    phase: MacroPhase,
}

#[derive(Clone, Debug, Default)]
pub struct MacroEngine {
    store: MacroStore,
    playback: Option<Playback>,
    // Action left held by a preempted macro.
    pending_release: Option<Action>,
}

impl MacroEngine {
    pub const fn new() -> Self {
        Self { store: MacroStore::new(), playback: None, pending_release: None }
    }

    pub fn store(&self) -> &MacroStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MacroStore {
        &mut self.store
    }

    pub fn is_active(&self) -> bool {
        self.playback.is_some() || self.pending_release.is_some()
    }

    /// Swaps in a new set of macros. Playback stops, but an action it
    /// left held is still released by the next tick.
    pub fn replace_store(&mut self, store: MacroStore) {
        if let Some(Playback { slot, position, phase: MacroPhase::Pressed }) = self.playback.take() {
            self.pending_release = Some(self.store.actions[slot][position]);
        }
        self.store = store;
    }

    pub fn phase(&self) -> Option<MacroPhase> {
        self.playback.map(|p| p.phase)
    }

    /// Starts playing `slot` on press. A macro already playing is
    /// replaced.
    pub fn trigger(&mut self, slot: u8, state: KeyState) {
        if state != KeyState::Pressed {
            return;
        }

        let slot = slot as usize;
        if self.store.len(slot) == 0 {
            dev_warn!("Macro {} is not defined", slot);
            return;
        }

        if let Some(Playback { slot: prev, position, phase: MacroPhase::Pressed }) = self.playback {
            self.pending_release = Some(self.store.actions[prev][position]);
        }

        dev_debug!("Playing macro {}", slot);
        self.playback = Some(Playback { slot, position: 0, phase: MacroPhase::Init });
    }

    /// Moves the active macro one step forward. `deliver` applies an
    /// action if its endpoint is idle.
    pub fn tick<F>(&mut self, mut deliver: F)
    where
        F: FnMut(&Action, KeyState) -> Delivery,
    {
        if let Some(action) = self.pending_release {
            if deliver(&action, KeyState::Released) == Delivery::Busy {
                return;
            }
            self.pending_release = None;
        }

        let Some(mut playback) = self.playback else {
            return;
        };

        if playback.phase == MacroPhase::Released {
            playback.position += 1;
            if playback.position >= self.store.len(playback.slot) {
                dev_debug!("Macro {} done", playback.slot);
                self.playback = None;
                return;
            }
            playback.phase = MacroPhase::Init;
        }

        let action = self.store.actions[playback.slot][playback.position];
        match playback.phase {
            MacroPhase::Init => {
                if deliver(&action, KeyState::Pressed) == Delivery::Delivered {
                    playback.phase = MacroPhase::Pressed;
                }
            }
            MacroPhase::Pressed => {
                if deliver(&action, KeyState::Released) == Delivery::Delivered {
                    playback.phase = MacroPhase::Released;
                }
            }
            MacroPhase::Released => {}
        }

        dev_trace!("Macro {} at {} {:?}", playback.slot, playback.position, playback.phase);
        self.playback = Some(playback);
    }
}
