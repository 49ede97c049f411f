use bitflags::bitflags;
use std::fmt;

use crate::error::InputError;

/// Hardware family a raw event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Button,
    Matrix,
    Touch,
}

bitflags! {
    /// The five edge-triggered navigation signals
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NavSet: u8 {
        const PREVIOUS = 1 << 0;
        const NEXT = 1 << 1;
        const SELECT = 1 << 2;
        const ESCAPE = 1 << 3;
        const ANY_ACTIVITY = 1 << 4;
    }
}

bitflags! {
    /// Modifiers active while a key was resolved
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const FN = 1 << 3;
    }
}

/// Source-specific payload of a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// Latched button classifications, already bound to navigation
    Click(NavSet),
    /// A key position in the active layout
    Key { row: u8, col: u8, repeat: bool },
    /// A touch in the active rotation's coordinate space
    Touch { x: i16, y: i16 },
    /// The panel's center/home region
    Home,
}

/// Unprocessed hardware notification, produced and consumed within one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub source: SourceKind,
    pub code: u16,
    pub pressed: bool,
    pub timestamp: u32,
    pub input: RawInput,
}

impl RawEvent {
    pub fn click(nav: NavSet, timestamp: u32) -> Self {
        Self {
            source: SourceKind::Button,
            code: u16::from(nav.bits()),
            pressed: true,
            timestamp,
            input: RawInput::Click(nav),
        }
    }

    pub fn key(code: u8, row: u8, col: u8, pressed: bool, repeat: bool, timestamp: u32) -> Self {
        Self {
            source: SourceKind::Matrix,
            code: u16::from(code),
            pressed,
            timestamp,
            input: RawInput::Key { row, col, repeat },
        }
    }

    pub fn touch(x: i16, y: i16, timestamp: u32) -> Self {
        Self {
            source: SourceKind::Touch,
            code: 0,
            pressed: true,
            timestamp,
            input: RawInput::Touch { x, y },
        }
    }

    pub fn home(timestamp: u32) -> Self {
        Self {
            source: SourceKind::Touch,
            code: 0,
            pressed: true,
            timestamp,
            input: RawInput::Home,
        }
    }
}

/// One entry of a keystroke's character sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyChar {
    Char(char),
    Enter,
    Backspace,
    Tab,
}

impl KeyChar {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'\r' => KeyChar::Enter,
            0x08 => KeyChar::Backspace,
            b'\t' => KeyChar::Tab,
            other => KeyChar::Char(char::from(other)),
        }
    }
}

impl fmt::Display for KeyChar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyChar::Char(c) => write!(f, "{c}"),
            KeyChar::Enter => f.write_str("<enter>"),
            KeyChar::Backspace => f.write_str("<backspace>"),
            KeyChar::Tab => f.write_str("<tab>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Press,
    Release,
    Repeat,
}

/// Normalized, modifier-resolved key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalKeyEvent {
    pub character: KeyChar,
    pub modifiers: Modifiers,
    pub kind: KeyKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrokeFlags {
    pub delete: bool,
    pub enter: bool,
    pub function: bool,
    pub exit_requested: bool,
}

impl StrokeFlags {
    pub fn merge(&mut self, other: StrokeFlags) {
        self.delete |= other.delete;
        self.enter |= other.enter;
        self.function |= other.function;
        self.exit_requested |= other.exit_requested;
    }
}

/// Aggregate snapshot of the keys held in the last processed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStroke {
    pub raw_codes: Vec<u16>,
    pub characters: Vec<KeyChar>,
    pub modifiers: Modifiers,
    pub flags: StrokeFlags,
    pub pressed: bool,
}

impl KeyStroke {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, c) in self.characters.iter().enumerate() {
            if idx > 0 {
                f.write_str("+")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: i16,
    pub y: i16,
    pub pressed: bool,
}

/// Display rotation selecting one of four touch transforms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    R0,
    R1,
    R2,
    R3,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R1, Rotation::R2, Rotation::R3];

    pub fn index(self) -> usize {
        match self {
            Rotation::R0 => 0,
            Rotation::R1 => 1,
            Rotation::R2 => 2,
            Rotation::R3 => 3,
        }
    }
}

impl TryFrom<u8> for Rotation {
    type Error = InputError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::R0),
            1 => Ok(Rotation::R1),
            2 => Ok(Rotation::R2),
            3 => Ok(Rotation::R3),
            other => Err(InputError::InvalidRotation(other)),
        }
    }
}
