//! GPIO-scanned keyboard, used when no keypad controller answers
//!
//! Three address lines drive a 3-to-8 demultiplexer selecting one scan row;
//! seven active-low inputs are read for each row. Scan positions are folded
//! onto the 4x14 logical layout.

use embedded_hal::digital::{InputPin, OutputPin};
use tracing::{trace, warn};

use crate::error::InputError;
use crate::input::event::{RawEvent, SourceKind};
use crate::keymap::layout::logical_code;
use crate::sources::{PollContext, RawInputSource};

pub const SCAN_ROWS: u8 = 8;
pub const SCAN_INPUTS: usize = 7;

/// Reports the layout positions of every key held right now
pub trait KeyScanner {
    fn scan(&mut self, held: &mut Vec<(u8, u8)>) -> Result<(), InputError>;
}

/// Layout `(row, col)` of scan row `row`, input line `input`
pub fn scan_to_layout(row: u8, input: u8) -> (u8, u8) {
    let col = input * 2 + u8::from(row <= 3);
    (3 - (row & 0x03), col)
}

pub struct GpioMatrixScanner<O, I> {
    address: [O; 3],
    inputs: [I; SCAN_INPUTS],
}

impl<O: OutputPin, I: InputPin> GpioMatrixScanner<O, I> {
    pub fn new(address: [O; 3], inputs: [I; SCAN_INPUTS]) -> Self {
        Self { address, inputs }
    }

    fn select_row(&mut self, row: u8) -> Result<(), InputError> {
        for (bit, line) in self.address.iter_mut().enumerate() {
            let level = if row & (1 << bit) != 0 {
                line.set_high()
            } else {
                line.set_low()
            };
            level.map_err(InputError::pin)?;
        }
        Ok(())
    }
}

impl<O: OutputPin, I: InputPin> KeyScanner for GpioMatrixScanner<O, I> {
    fn scan(&mut self, held: &mut Vec<(u8, u8)>) -> Result<(), InputError> {
        for row in 0..SCAN_ROWS {
            self.select_row(row)?;
            for (input, line) in self.inputs.iter_mut().enumerate() {
                if line.is_low().map_err(InputError::pin)? {
                    held.push(scan_to_layout(row, input as u8));
                }
            }
        }
        Ok(())
    }
}

/// Level-triggered source: held keys repeat every poll, releases are diffed
pub struct ScannedKeyboardSource<S> {
    scanner: S,
    held: Vec<(u8, u8)>,
    current: Vec<(u8, u8)>,
}

impl<S: KeyScanner> ScannedKeyboardSource<S> {
    pub fn new(scanner: S) -> Self {
        Self {
            scanner,
            held: Vec::new(),
            current: Vec::new(),
        }
    }

    pub fn scanner_mut(&mut self) -> &mut S {
        &mut self.scanner
    }
}

impl<S: KeyScanner> RawInputSource for ScannedKeyboardSource<S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Matrix
    }

    fn name(&self) -> &str {
        "gpio-scan"
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        self.current.clear();
        if let Err(e) = self.scanner.scan(&mut self.current) {
            warn!("Keyboard scan failed, skipping cycle: {}", e);
            return;
        }

        for &(row, col) in self.held.iter().filter(|key| !self.current.contains(key)) {
            trace!("Key released at row={}, col={}", row, col);
            events.push(RawEvent::key(
                logical_code(row, col),
                row,
                col,
                false,
                false,
                ctx.now_ms,
            ));
        }
        for &(row, col) in &self.current {
            let repeat = self.held.contains(&(row, col));
            events.push(RawEvent::key(
                logical_code(row, col),
                row,
                col,
                true,
                repeat,
                ctx.now_ms,
            ));
        }

        std::mem::swap(&mut self.held, &mut self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::layout::{KeyLayout, Variant, CARDPUTER_COLS};
    use std::collections::VecDeque;

    struct ScriptedScanner {
        frames: VecDeque<Result<Vec<(u8, u8)>, InputError>>,
    }

    impl KeyScanner for ScriptedScanner {
        fn scan(&mut self, held: &mut Vec<(u8, u8)>) -> Result<(), InputError> {
            match self.frames.pop_front() {
                Some(Ok(keys)) => {
                    held.extend(keys);
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn scan_positions_cover_the_layout() {
        for row in 0..SCAN_ROWS {
            for input in 0..SCAN_INPUTS as u8 {
                let (r, c) = scan_to_layout(row, input);
                assert!(usize::from(c) < CARDPUTER_COLS);
                assert!(KeyLayout::Cardputer.cell(r, c).is_some());
            }
        }
        let (r, c) = scan_to_layout(5, 2);
        assert_eq!((r, c), (2, 4));
        assert_eq!(
            KeyLayout::Cardputer.cell(r, c).and_then(|cell| cell.byte(Variant::Plain)),
            Some(b'd')
        );
    }

    #[test]
    fn held_keys_repeat_and_releases_are_reported() {
        let scanner = ScriptedScanner {
            frames: VecDeque::from([Ok(vec![(2, 4)]), Ok(vec![(2, 4)]), Ok(vec![])]),
        };
        let mut source = ScannedKeyboardSource::new(scanner);
        let code = logical_code(2, 4);
        let mut events = Vec::new();

        source.poll(&PollContext::at(0), &mut events);
        assert_eq!(events, vec![RawEvent::key(code, 2, 4, true, false, 0)]);

        events.clear();
        source.poll(&PollContext::at(10), &mut events);
        assert_eq!(events, vec![RawEvent::key(code, 2, 4, true, true, 10)]);

        events.clear();
        source.poll(&PollContext::at(20), &mut events);
        assert_eq!(events, vec![RawEvent::key(code, 2, 4, false, false, 20)]);
    }

    #[test]
    fn scan_failure_keeps_held_state() {
        let scanner = ScriptedScanner {
            frames: VecDeque::from([
                Ok(vec![(0, 0)]),
                Err(InputError::Pin("scan".into())),
                Ok(vec![(0, 0)]),
            ]),
        };
        let mut source = ScannedKeyboardSource::new(scanner);
        let mut events = Vec::new();
        source.poll(&PollContext::at(0), &mut events);
        events.clear();

        source.poll(&PollContext::at(10), &mut events);
        assert!(events.is_empty());

        source.poll(&PollContext::at(20), &mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].input, crate::input::event::RawInput::Key { repeat: true, .. }));
    }
}
