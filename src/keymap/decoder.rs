//! Matrix decoder: key position + modifier state → logical key event

use tracing::{debug, trace};

use crate::input::event::{KeyChar, KeyKind, LogicalKeyEvent, Modifiers, NavSet, StrokeFlags};
use crate::keymap::layout::{KeyCell, KeyLayout, Sentinel};
use crate::keymap::modifiers::{ModifierInput, ModifierState};

/// Navigation and flags attached to a resolved character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    byte: u8,
    nav: NavSet,
    flags: StrokeFlags,
}

const NO_FLAGS: StrokeFlags = StrokeFlags {
    delete: false,
    enter: false,
    function: false,
    exit_requested: false,
};

/// Semantic bindings shared by every layout
const BINDINGS: [Binding; 8] = [
    Binding {
        byte: b'`',
        nav: NavSet::ESCAPE,
        flags: StrokeFlags {
            exit_requested: true,
            ..NO_FLAGS
        },
    },
    Binding {
        byte: b'\r',
        nav: NavSet::SELECT,
        flags: StrokeFlags {
            enter: true,
            ..NO_FLAGS
        },
    },
    Binding {
        byte: b',',
        nav: NavSet::PREVIOUS,
        flags: NO_FLAGS,
    },
    Binding {
        byte: b';',
        nav: NavSet::PREVIOUS,
        flags: NO_FLAGS,
    },
    Binding {
        byte: b'.',
        nav: NavSet::NEXT,
        flags: NO_FLAGS,
    },
    Binding {
        byte: b'/',
        nav: NavSet::NEXT,
        flags: NO_FLAGS,
    },
    Binding {
        byte: 0x08,
        nav: NavSet::ESCAPE,
        flags: StrokeFlags {
            delete: true,
            ..NO_FLAGS
        },
    },
    Binding {
        byte: b'\t',
        nav: NavSet::empty(),
        flags: NO_FLAGS,
    },
];

fn binding_for(byte: u8) -> Option<&'static Binding> {
    BINDINGS.iter().find(|binding| binding.byte == byte)
}

/// A printable key resolved against the current modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedKey {
    pub event: LogicalKeyEvent,
    pub nav: NavSet,
    pub flags: StrokeFlags,
}

/// Outcome of a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Fn or Shift changed the sticky modifier state
    Modifier,
    /// Ctrl or Alt went down; published as a modifier-only keystroke
    ModifierKey(Modifiers),
    Key(ResolvedKey),
    /// Valid position without a binding
    Unbound,
}

/// Outcome of a key release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Fn, Shift or Opt
    Modifier,
    /// Ctrl or Alt, which end their modifier-only keystroke like any key
    ModifierKey(Modifiers),
    Key(LogicalKeyEvent),
}

#[derive(Debug, Clone)]
pub struct KeyMatrixDecoder {
    layout: KeyLayout,
    modifiers: ModifierState,
}

impl KeyMatrixDecoder {
    pub fn new(layout: KeyLayout) -> Self {
        Self {
            layout,
            modifiers: ModifierState::default(),
        }
    }

    pub fn layout(&self) -> KeyLayout {
        self.layout
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    /// Fn, Shift, Ctrl, Alt or Opt at `(row, col)`
    pub fn is_modifier(&self, row: u8, col: u8) -> bool {
        matches!(self.layout.cell(row, col), Some(KeyCell::Sentinel(_)))
    }

    /// Fn, Shift or Opt: keys that only change decoder state and never
    /// publish a keystroke of their own
    pub fn is_state_modifier(&self, row: u8, col: u8) -> bool {
        matches!(
            self.layout.cell(row, col),
            Some(KeyCell::Sentinel(
                Sentinel::FnToggle | Sentinel::Shift | Sentinel::Opt
            ))
        )
    }

    /// Character at `(row, col)` for the current modifier state
    pub fn decode_char(&self, row: u8, col: u8) -> Option<u8> {
        self.layout
            .cell(row, col)?
            .byte(self.modifiers.variant())
    }

    pub fn press(&mut self, row: u8, col: u8, repeat: bool) -> Decoded {
        let Some(cell) = self.layout.cell(row, col) else {
            debug!("Key press outside layout at row={}, col={}", row, col);
            return Decoded::Unbound;
        };

        match cell {
            KeyCell::Sentinel(Sentinel::FnToggle) => {
                // held keys report again every scan; only the edge toggles
                if !repeat {
                    self.modifiers.apply(ModifierInput::FnPress);
                    debug!("Fn toggled, modifiers now {:?}", self.modifiers);
                }
                Decoded::Modifier
            }
            KeyCell::Sentinel(Sentinel::Shift) => {
                self.modifiers.apply(ModifierInput::ShiftDown);
                Decoded::Modifier
            }
            KeyCell::Sentinel(Sentinel::Ctrl) => {
                self.modifiers.set_ctrl(true);
                Decoded::ModifierKey(self.modifiers.active())
            }
            KeyCell::Sentinel(Sentinel::Alt) => {
                self.modifiers.set_alt(true);
                Decoded::ModifierKey(self.modifiers.active())
            }
            KeyCell::Sentinel(Sentinel::Opt) | KeyCell::Unused => {
                trace!("No binding at row={}, col={}", row, col);
                Decoded::Unbound
            }
            KeyCell::Printable { .. } => {
                let Some(byte) = cell.byte(self.modifiers.variant()) else {
                    return Decoded::Unbound;
                };
                let modifiers = self.modifiers.active();
                let (nav, mut flags) = binding_for(byte)
                    .map(|binding| (binding.nav, binding.flags))
                    .unwrap_or((NavSet::empty(), NO_FLAGS));
                flags.function = self.modifiers.fn_held();

                let kind = if repeat { KeyKind::Repeat } else { KeyKind::Press };
                Decoded::Key(ResolvedKey {
                    event: LogicalKeyEvent {
                        character: KeyChar::from_byte(byte),
                        modifiers,
                        kind,
                    },
                    nav,
                    flags,
                })
            }
        }
    }

    pub fn release(&mut self, row: u8, col: u8) -> Option<Released> {
        match self.layout.cell(row, col)? {
            KeyCell::Sentinel(Sentinel::Shift) => {
                self.modifiers.apply(ModifierInput::ShiftUp);
                Some(Released::Modifier)
            }
            KeyCell::Sentinel(Sentinel::Ctrl) => {
                self.modifiers.set_ctrl(false);
                Some(Released::ModifierKey(Modifiers::CTRL))
            }
            KeyCell::Sentinel(Sentinel::Alt) => {
                self.modifiers.set_alt(false);
                Some(Released::ModifierKey(Modifiers::ALT))
            }
            KeyCell::Sentinel(Sentinel::FnToggle) | KeyCell::Sentinel(Sentinel::Opt) => {
                Some(Released::Modifier)
            }
            cell @ (KeyCell::Printable { .. } | KeyCell::Unused) => {
                let byte = cell.byte(self.modifiers.variant())?;
                Some(Released::Key(LogicalKeyEvent {
                    character: KeyChar::from_byte(byte),
                    modifiers: self.modifiers.active(),
                    kind: KeyKind::Release,
                }))
            }
        }
    }
}
