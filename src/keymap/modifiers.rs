//! Sticky modifier state machine
//!
//! ```text
//!                 FnPress                    ShiftDown
//!   Idle ◄──────────────────► FnHeld ◄──────────────────► FnAndShift
//!    ▲ │                                   ShiftUp            │
//!    │ │ ShiftDown                                            │ FnPress: caps ^= 1
//!    │ ▼                                                      ▼
//!   ShiftHeld ── FnPress: caps ^= 1 (fn layer untouched)
//! ```
//!
//! Fn is a toggle (each press flips it), Shift is momentary. Pressing Fn while
//! Shift is held flips caps lock instead of the fn layer.

use crate::input::event::Modifiers;
use crate::keymap::layout::Variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifierPhase {
    #[default]
    Idle,
    ShiftHeld,
    FnHeld,
    FnAndShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierInput {
    FnPress,
    ShiftDown,
    ShiftUp,
}

impl ModifierPhase {
    /// Next phase, and whether caps lock flips on this transition
    pub fn next(self, input: ModifierInput) -> (ModifierPhase, bool) {
        use ModifierInput::*;
        use ModifierPhase::*;

        match (self, input) {
            (Idle, FnPress) => (FnHeld, false),
            (FnHeld, FnPress) => (Idle, false),
            (ShiftHeld, FnPress) => (ShiftHeld, true),
            (FnAndShift, FnPress) => (FnAndShift, true),

            (Idle | ShiftHeld, ShiftDown) => (ShiftHeld, false),
            (FnHeld | FnAndShift, ShiftDown) => (FnAndShift, false),

            (Idle | ShiftHeld, ShiftUp) => (Idle, false),
            (FnHeld | FnAndShift, ShiftUp) => (FnHeld, false),
        }
    }

    pub fn fn_held(self) -> bool {
        matches!(self, ModifierPhase::FnHeld | ModifierPhase::FnAndShift)
    }

    pub fn shift_held(self) -> bool {
        matches!(self, ModifierPhase::ShiftHeld | ModifierPhase::FnAndShift)
    }
}

/// Modifier state owned by the matrix decoder, sticky across polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModifierState {
    phase: ModifierPhase,
    caps_lock: bool,
    ctrl_held: bool,
    alt_held: bool,
}

impl ModifierState {
    pub fn apply(&mut self, input: ModifierInput) {
        let (phase, flip_caps) = self.phase.next(input);
        self.phase = phase;
        if flip_caps {
            self.caps_lock = !self.caps_lock;
        }
    }

    pub fn set_ctrl(&mut self, held: bool) {
        self.ctrl_held = held;
    }

    pub fn set_alt(&mut self, held: bool) {
        self.alt_held = held;
    }

    pub fn fn_held(&self) -> bool {
        self.phase.fn_held()
    }

    pub fn shift_held(&self) -> bool {
        self.phase.shift_held()
    }

    pub fn caps_lock(&self) -> bool {
        self.caps_lock
    }

    /// Fn wins over everything; otherwise shift and caps lock cancel out
    pub fn variant(&self) -> Variant {
        if self.fn_held() {
            Variant::Function
        } else if self.shift_held() ^ self.caps_lock {
            Variant::Shifted
        } else {
            Variant::Plain
        }
    }

    pub fn active(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        mods.set(Modifiers::SHIFT, self.shift_held());
        mods.set(Modifiers::FN, self.fn_held());
        mods.set(Modifiers::CTRL, self.ctrl_held);
        mods.set(Modifiers::ALT, self.alt_held);
        mods
    }
}
