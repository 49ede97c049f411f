//! Key tables and scan-code encodings
//!
//! Every physical key resolves to a [`KeyCell`]: a printable key with its
//! plain/shifted/fn variants, or one of the modifier sentinels that live
//! outside the printable range.

use serde::{Deserialize, Serialize};

/// Reserved non-printable key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// Non-momentary: every press flips the fn layer
    FnToggle,
    /// Momentary shift
    Shift,
    Ctrl,
    Alt,
    Opt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCell {
    Printable { plain: u8, shifted: u8, function: u8 },
    Sentinel(Sentinel),
    Unused,
}

/// Which of the three character variants a lookup resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Plain,
    Shifted,
    Function,
}

impl KeyCell {
    pub fn byte(self, variant: Variant) -> Option<u8> {
        match self {
            KeyCell::Printable {
                plain,
                shifted,
                function,
            } => Some(match variant {
                Variant::Plain => plain,
                Variant::Shifted => shifted,
                Variant::Function => function,
            }),
            KeyCell::Sentinel(_) | KeyCell::Unused => None,
        }
    }
}

const fn key(plain: u8, shifted: u8) -> KeyCell {
    KeyCell::Printable {
        plain,
        shifted,
        function: plain,
    }
}

/// Same character on every layer
const fn fixed(byte: u8) -> KeyCell {
    key(byte, byte)
}

const fn special(sentinel: Sentinel) -> KeyCell {
    KeyCell::Sentinel(sentinel)
}

const BACKSPACE: u8 = 0x08;

/// Cardputer 4x14 logical keyboard
pub const CARDPUTER_ROWS: usize = 4;
pub const CARDPUTER_COLS: usize = 14;

const CARDPUTER_TABLE: [[KeyCell; CARDPUTER_COLS]; CARDPUTER_ROWS] = [
    [
        key(b'`', b'~'),
        key(b'1', b'!'),
        key(b'2', b'@'),
        key(b'3', b'#'),
        key(b'4', b'$'),
        key(b'5', b'%'),
        key(b'6', b'^'),
        key(b'7', b'&'),
        key(b'8', b'*'),
        key(b'9', b'('),
        key(b'0', b')'),
        key(b'-', b'_'),
        key(b'=', b'+'),
        fixed(BACKSPACE),
    ],
    [
        fixed(b'\t'),
        key(b'q', b'Q'),
        key(b'w', b'W'),
        key(b'e', b'E'),
        key(b'r', b'R'),
        key(b't', b'T'),
        key(b'y', b'Y'),
        key(b'u', b'U'),
        key(b'i', b'I'),
        key(b'o', b'O'),
        key(b'p', b'P'),
        key(b'[', b'{'),
        key(b']', b'}'),
        key(b'\\', b'|'),
    ],
    [
        special(Sentinel::FnToggle),
        special(Sentinel::Shift),
        key(b'a', b'A'),
        key(b's', b'S'),
        key(b'd', b'D'),
        key(b'f', b'F'),
        key(b'g', b'G'),
        key(b'h', b'H'),
        key(b'j', b'J'),
        key(b'k', b'K'),
        key(b'l', b'L'),
        key(b';', b':'),
        key(b'\'', b'"'),
        fixed(b'\r'),
    ],
    [
        special(Sentinel::Ctrl),
        special(Sentinel::Opt),
        special(Sentinel::Alt),
        key(b'z', b'Z'),
        key(b'x', b'X'),
        key(b'c', b'C'),
        key(b'v', b'V'),
        key(b'b', b'B'),
        key(b'n', b'N'),
        key(b'm', b'M'),
        key(b',', b'<'),
        key(b'.', b'>'),
        key(b'/', b'?'),
        fixed(b' '),
    ],
];

/// Bit-field matrix: row nibble bits [6:4], column nibble bits [3:0]
pub const COMPACT_ROWS: usize = 7;
pub const COMPACT_COLS: usize = 16;

/// Keys of the bit-field matrix that carry a binding; everything else is unused.
const COMPACT_KEYS: [(usize, usize, KeyCell); 6] = [
    (0, 1, fixed(b'`')),
    (3, 6, fixed(b',')),
    (3, 9, fixed(b';')),
    (3, 10, fixed(b'.')),
    (4, 0, fixed(b'/')),
    (4, 3, fixed(b'\r')),
];

const fn compact_table() -> [[KeyCell; COMPACT_COLS]; COMPACT_ROWS] {
    let mut table = [[KeyCell::Unused; COMPACT_COLS]; COMPACT_ROWS];
    let mut idx = 0;
    while idx < COMPACT_KEYS.len() {
        let (row, col, cell) = COMPACT_KEYS[idx];
        table[row][col] = cell;
        idx += 1;
    }
    table
}

const COMPACT_TABLE: [[KeyCell; COMPACT_COLS]; COMPACT_ROWS] = compact_table();

/// Character table of a board's keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// 4x14 logical keyboard (Cardputer, Cardputer ADV)
    Cardputer,
    /// 7x8 physical keypad with bit-field scan codes
    Compact,
}

impl KeyLayout {
    /// Cell at `(row, col)`, `None` when outside the table
    pub fn cell(self, row: u8, col: u8) -> Option<KeyCell> {
        let (row, col) = (usize::from(row), usize::from(col));
        match self {
            KeyLayout::Cardputer => CARDPUTER_TABLE.get(row)?.get(col).copied(),
            KeyLayout::Compact => COMPACT_TABLE.get(row)?.get(col).copied(),
        }
    }
}

/// How a controller's 7-bit key code encodes a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanEncoding {
    /// Decimal codes `v = t * 10 + u` of the 4x14 logical keyboard
    #[default]
    Logical4x14,
    /// Row in bits [6:4], column in bits [3:0]
    Physical7x8,
}

impl ScanEncoding {
    /// Position encoded by `code`, `None` for codes outside the valid ranges
    pub fn decode(self, code: u8) -> Option<(u8, u8)> {
        match self {
            ScanEncoding::Logical4x14 => {
                let u = code % 10;
                let t = code / 10;
                if !(1..=8).contains(&u) || t > 6 {
                    return None;
                }
                let u0 = u - 1;
                Some((u0 & 0x03, (t << 1) | (u0 >> 2)))
            }
            ScanEncoding::Physical7x8 => Some(((code & 0x70) >> 4, code & 0x0F)),
        }
    }

    pub fn layout(self) -> KeyLayout {
        match self {
            ScanEncoding::Logical4x14 => KeyLayout::Cardputer,
            ScanEncoding::Physical7x8 => KeyLayout::Compact,
        }
    }
}

/// Logical 4x14 code of a position, the inverse of [`ScanEncoding::decode`]
pub fn logical_code(row: u8, col: u8) -> u8 {
    let t = col >> 1;
    let u0 = ((col & 0x01) << 2) | (row & 0x03);
    t * 10 + u0 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_code_23_is_the_d_key() {
        let (row, col) = ScanEncoding::Logical4x14.decode(23).unwrap();
        assert_eq!((row, col), (2, 4));
        let cell = KeyLayout::Cardputer.cell(row, col).unwrap();
        assert_eq!(cell.byte(Variant::Plain), Some(b'd'));
        assert_eq!(cell.byte(Variant::Shifted), Some(b'D'));
    }

    #[test]
    fn logical_codes_outside_ranges_are_invalid() {
        // u = 0
        assert_eq!(ScanEncoding::Logical4x14.decode(20), None);
        // u = 9
        assert_eq!(ScanEncoding::Logical4x14.decode(19), None);
        // t = 7
        assert_eq!(ScanEncoding::Logical4x14.decode(71), None);
        assert_eq!(ScanEncoding::Logical4x14.decode(0), None);
    }

    #[test]
    fn every_valid_logical_code_lands_inside_the_table() {
        for code in 0..=0x7Fu8 {
            if let Some((row, col)) = ScanEncoding::Logical4x14.decode(code) {
                assert!(KeyLayout::Cardputer.cell(row, col).is_some(), "code {code}");
                assert_eq!(logical_code(row, col), code);
            }
        }
    }

    #[test]
    fn logical_code_covers_the_whole_table() {
        for row in 0..CARDPUTER_ROWS as u8 {
            for col in 0..CARDPUTER_COLS as u8 {
                let code = logical_code(row, col);
                assert_eq!(ScanEncoding::Logical4x14.decode(code), Some((row, col)));
            }
        }
    }

    #[test]
    fn physical_encoding_splits_nibbles() {
        assert_eq!(ScanEncoding::Physical7x8.decode(0x43), Some((4, 3)));
        let cell = KeyLayout::Compact.cell(4, 3).unwrap();
        assert_eq!(cell.byte(Variant::Plain), Some(b'\r'));
        // row 7 is outside the 7-row keypad
        let (row, col) = ScanEncoding::Physical7x8.decode(0x71).unwrap();
        assert_eq!(KeyLayout::Compact.cell(row, col), None);
    }

    #[test]
    fn modifier_keys_are_sentinels() {
        assert_eq!(
            KeyLayout::Cardputer.cell(2, 0),
            Some(KeyCell::Sentinel(Sentinel::FnToggle))
        );
        assert_eq!(
            KeyLayout::Cardputer.cell(2, 1),
            Some(KeyCell::Sentinel(Sentinel::Shift))
        );
    }
}
