//! I2C keypad matrix (TCA8418)

use embedded_hal::i2c::I2c;
use tracing::{debug, info, trace, warn};

use crate::error::InputError;
use crate::input::debounce::IntervalFloor;
use crate::input::event::{RawEvent, SourceKind};
use crate::keymap::layout::{KeyLayout, ScanEncoding};
use crate::sources::{PollContext, RawInputSource};

pub const DEFAULT_ADDRESS: u8 = 0x34;

const REG_CFG: u8 = 0x01;
const REG_INT_STAT: u8 = 0x02;
const REG_KEY_LCK_EC: u8 = 0x03;
const REG_KEY_EVENT_A: u8 = 0x04;
const REG_KP_GPIO1: u8 = 0x1D;
const REG_GPIO_DIR1: u8 = 0x23;
const REG_GPIO_PULL1: u8 = 0x2C;

const CFG_KE_IEN: u8 = 0x01;
const CFG_AI: u8 = 0x80;
const INT_STAT_K_INT: u8 = 0x01;
const INT_STAT_ALL: u8 = 0x1F;

const EVENT_COUNT_MASK: u8 = 0x0F;
const EVENT_PRESSED: u8 = 0x80;
const EVENT_CODE_MASK: u8 = 0x7F;

/// Depth of the controller's event FIFO
const FIFO_DEPTH: usize = 10;

/// Anything that can hand over the queued key event bytes
pub trait KeyEventQueue {
    /// Pops every queued event byte into `out`
    fn drain_events(&mut self, out: &mut Vec<u8>) -> Result<(), InputError>;
}

pub struct Tca8418<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Tca8418<I2C> {
    /// Checks the controller answers and configures it for `encoding`
    pub fn probe(i2c: I2C, address: u8, encoding: ScanEncoding) -> Result<Self, InputError> {
        let mut dev = Self { i2c, address };
        dev.read_register(REG_CFG).map_err(|e| {
            InputError::ControllerAbsent(format!("TCA8418 at {:#04x}: {}", address, e))
        })?;
        dev.configure(encoding)?;
        info!("TCA8418 configured at {:#04x} for {:?}", address, encoding);
        Ok(dev)
    }

    fn configure(&mut self, encoding: ScanEncoding) -> Result<(), InputError> {
        match encoding {
            ScanEncoding::Logical4x14 => {
                self.write_bank(REG_GPIO_DIR1, [0x0F, 0xFF, 0x03])?;
                self.write_bank(REG_KP_GPIO1, [0xFF, 0xFF, 0x03])?;
                self.write_bank(REG_GPIO_PULL1, [0xF0, 0xFF, 0x03])?;
            }
            ScanEncoding::Physical7x8 => {
                // rows 0-6, columns 0-7
                self.write_bank(REG_KP_GPIO1, [0x7F, 0xFF, 0x00])?;
            }
        }
        self.write_register(REG_CFG, CFG_KE_IEN | CFG_AI)?;
        self.write_register(REG_INT_STAT, INT_STAT_ALL)
    }

    fn write_bank(&mut self, first: u8, values: [u8; 3]) -> Result<(), InputError> {
        for (offset, value) in values.into_iter().enumerate() {
            self.write_register(first + offset as u8, value)?;
        }
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, InputError> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(InputError::bus)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), InputError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(InputError::bus)
    }
}

impl<I2C: I2c> KeyEventQueue for Tca8418<I2C> {
    fn drain_events(&mut self, out: &mut Vec<u8>) -> Result<(), InputError> {
        for _ in 0..FIFO_DEPTH {
            let count = self.read_register(REG_KEY_LCK_EC)? & EVENT_COUNT_MASK;
            if count == 0 {
                break;
            }
            for _ in 0..count {
                out.push(self.read_register(REG_KEY_EVENT_A)?);
            }
        }
        self.write_register(REG_INT_STAT, INT_STAT_K_INT)
    }
}

/// Matrix source: fixed cadence, full drain, decode, bounds check
pub struct MatrixSource<Q> {
    queue: Q,
    encoding: ScanEncoding,
    layout: KeyLayout,
    floor: IntervalFloor,
    scratch: Vec<u8>,
}

impl<Q: KeyEventQueue> MatrixSource<Q> {
    pub fn new(queue: Q, encoding: ScanEncoding, poll_interval_ms: u32) -> Self {
        Self {
            queue,
            encoding,
            layout: encoding.layout(),
            floor: IntervalFloor::new(poll_interval_ms),
            scratch: Vec::with_capacity(FIFO_DEPTH),
        }
    }

    pub fn queue_mut(&mut self) -> &mut Q {
        &mut self.queue
    }
}

impl<Q: KeyEventQueue> RawInputSource for MatrixSource<Q> {
    fn kind(&self) -> SourceKind {
        SourceKind::Matrix
    }

    fn name(&self) -> &str {
        "matrix"
    }

    fn layout(&self) -> KeyLayout {
        self.layout
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        // checked before touching the bus
        if !self.floor.try_claim(ctx.now_ms) {
            return;
        }

        self.scratch.clear();
        if let Err(e) = self.queue.drain_events(&mut self.scratch) {
            warn!("Key event drain failed, skipping cycle: {}", e);
            return;
        }

        for &byte in &self.scratch {
            let pressed = byte & EVENT_PRESSED != 0;
            let code = byte & EVENT_CODE_MASK;
            let position = self
                .encoding
                .decode(code)
                .filter(|&(row, col)| self.layout.cell(row, col).is_some());

            match position {
                Some((row, col)) => {
                    trace!(
                        "Scan code {} -> row={}, col={}, pressed={}",
                        code,
                        row,
                        col,
                        pressed
                    );
                    events.push(RawEvent::key(code, row, col, pressed, false, ctx.now_ms));
                }
                None => debug!("Discarding malformed scan code {:#04x}", byte),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
    use std::collections::{HashMap, VecDeque};

    #[derive(Default)]
    struct FakeBus {
        regs: HashMap<u8, u8>,
        fifo: VecDeque<u8>,
        writes: Vec<(u8, u8)>,
        transactions: usize,
        fail: bool,
    }

    impl FakeBus {
        fn load(&mut self, reg: u8) -> u8 {
            match reg {
                REG_KEY_LCK_EC => self.fifo.len().min(FIFO_DEPTH) as u8,
                REG_KEY_EVENT_A => self.fifo.pop_front().unwrap_or(0),
                other => self.regs.get(&other).copied().unwrap_or(0),
            }
        }

        fn store(&mut self, reg: u8, value: u8) {
            self.writes.push((reg, value));
            self.regs.insert(reg, value);
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.transactions += 1;
            if self.fail {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            let mut pointer = 0u8;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        pointer = bytes[0];
                        if let Some(&value) = bytes.get(1) {
                            self.store(pointer, value);
                        }
                    }
                    Operation::Read(buf) => {
                        for byte in buf.iter_mut() {
                            *byte = self.load(pointer);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    fn ready(encoding: ScanEncoding) -> Tca8418<FakeBus> {
        Tca8418::probe(FakeBus::default(), DEFAULT_ADDRESS, encoding).unwrap()
    }

    #[test]
    fn probe_reports_absent_controller() {
        let bus = FakeBus {
            fail: true,
            ..Default::default()
        };
        let result = Tca8418::probe(bus, DEFAULT_ADDRESS, ScanEncoding::Logical4x14);
        assert!(matches!(result, Err(InputError::ControllerAbsent(_))));
    }

    #[test]
    fn probe_configures_the_logical_keyboard() {
        let dev = ready(ScanEncoding::Logical4x14);
        let writes = &dev.i2c.writes;
        assert!(writes.contains(&(REG_GPIO_DIR1, 0x0F)));
        assert!(writes.contains(&(REG_KP_GPIO1 + 2, 0x03)));
        assert!(writes.contains(&(REG_GPIO_PULL1, 0xF0)));
        assert!(writes.contains(&(REG_CFG, CFG_KE_IEN | CFG_AI)));
    }

    #[test]
    fn drain_empties_the_fifo() {
        let mut dev = ready(ScanEncoding::Logical4x14);
        dev.i2c.fifo.extend([0x80 | 23, 23, 0x80 | 1]);
        let mut out = Vec::new();
        dev.drain_events(&mut out).unwrap();
        assert_eq!(out, vec![0x80 | 23, 23, 0x80 | 1]);
        assert!(dev.i2c.fifo.is_empty());
        assert_eq!(dev.i2c.writes.last(), Some(&(REG_INT_STAT, INT_STAT_K_INT)));
    }

    #[test]
    fn source_decodes_and_drops_malformed_codes() {
        let mut dev = ready(ScanEncoding::Logical4x14);
        // 0x80|20 has u = 0, which is outside 1..=8
        dev.i2c.fifo.extend([0x80 | 23, 0x80 | 20, 23]);
        let mut source = MatrixSource::new(dev, ScanEncoding::Logical4x14, 100);
        let mut events = Vec::new();
        source.poll(&PollContext::at(1_000), &mut events);
        assert_eq!(
            events,
            vec![
                RawEvent::key(23, 2, 4, true, false, 1_000),
                RawEvent::key(23, 2, 4, false, false, 1_000),
            ]
        );
    }

    #[test]
    fn floor_is_checked_before_any_bus_traffic() {
        let dev = ready(ScanEncoding::Logical4x14);
        let mut source = MatrixSource::new(dev, ScanEncoding::Logical4x14, 100);
        let mut events = Vec::new();
        source.poll(&PollContext::at(1_000), &mut events);
        let before = source.queue_mut().i2c.transactions;
        source.poll(&PollContext::at(1_050), &mut events);
        assert_eq!(source.queue_mut().i2c.transactions, before);
        source.poll(&PollContext::at(1_100), &mut events);
        assert!(source.queue_mut().i2c.transactions > before);
    }

    #[test]
    fn bus_failure_yields_no_events() {
        let mut dev = ready(ScanEncoding::Logical4x14);
        dev.i2c.fifo.push_back(0x80 | 23);
        dev.i2c.fail = true;
        let mut source = MatrixSource::new(dev, ScanEncoding::Logical4x14, 100);
        let mut events = Vec::new();
        source.poll(&PollContext::at(0), &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn physical_encoding_bounds_rows() {
        let mut dev = ready(ScanEncoding::Physical7x8);
        dev.i2c.fifo.extend([0x80 | 0x43, 0x80 | 0x71]);
        let mut source = MatrixSource::new(dev, ScanEncoding::Physical7x8, 100);
        let mut events = Vec::new();
        source.poll(&PollContext::at(0), &mut events);
        assert_eq!(events, vec![RawEvent::key(0x43, 4, 3, true, false, 0)]);
    }
}
