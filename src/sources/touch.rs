//! Capacitive touch panel (CST816)

use embedded_hal::i2c::I2c;
use tracing::{debug, info, trace, warn};

use crate::error::InputError;
use crate::input::debounce::IntervalFloor;
use crate::input::event::{RawEvent, Rotation, SourceKind};
use crate::sources::{PollContext, RawInputSource};

pub const DEFAULT_ADDRESS: u8 = 0x15;

const REG_DATA: u8 = 0x01;
const REG_CHIP_ID: u8 = 0xA7;
const REG_DIS_AUTO_SLEEP: u8 = 0xFE;

/// Axis swap and mirroring for one display rotation. Swap happens first,
/// mirroring is against the post-swap maxima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchTransform {
    pub max_x: i16,
    pub max_y: i16,
    pub swap_xy: bool,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

pub const TOUCH_TRANSFORMS: [TouchTransform; 4] = [
    TouchTransform {
        max_x: 170,
        max_y: 320,
        swap_xy: false,
        mirror_x: false,
        mirror_y: true,
    },
    TouchTransform {
        max_x: 320,
        max_y: 170,
        swap_xy: true,
        mirror_x: false,
        mirror_y: true,
    },
    TouchTransform {
        max_x: 170,
        max_y: 320,
        swap_xy: false,
        mirror_x: true,
        mirror_y: false,
    },
    TouchTransform {
        max_x: 320,
        max_y: 170,
        swap_xy: true,
        mirror_x: true,
        mirror_y: false,
    },
];

impl TouchTransform {
    pub fn for_rotation(rotation: Rotation) -> &'static TouchTransform {
        &TOUCH_TRANSFORMS[rotation.index()]
    }

    pub fn apply(&self, x: i16, y: i16) -> (i16, i16) {
        let (x, y) = if self.swap_xy { (y, x) } else { (x, y) };
        let x = if self.mirror_x { self.max_x - x } else { x };
        let y = if self.mirror_y { self.max_y - y } else { y };
        (x.clamp(0, self.max_x), y.clamp(0, self.max_y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchReading {
    /// Transformed point in the active rotation's coordinate space
    Point { x: i16, y: i16 },
    /// The dedicated home/center region
    Home,
}

pub trait TouchPanel {
    /// Selects the transform for subsequent reads
    fn configure(&mut self, transform: &TouchTransform);

    /// Current contact, `None` when nothing touches the panel
    fn read(&mut self) -> Result<Option<TouchReading>, InputError>;
}

pub struct Cst816<I2C> {
    i2c: I2C,
    address: u8,
    home: (i16, i16),
    transform: TouchTransform,
}

impl<I2C: I2c> Cst816<I2C> {
    pub fn probe(i2c: I2C, address: u8, home: (i16, i16)) -> Result<Self, InputError> {
        let mut dev = Self {
            i2c,
            address,
            home,
            transform: TOUCH_TRANSFORMS[0],
        };

        let mut chip_id = [0u8];
        dev.i2c
            .write_read(address, &[REG_CHIP_ID], &mut chip_id)
            .map_err(|e| {
                InputError::ControllerAbsent(format!(
                    "CST816 at {:#04x}: {}",
                    address,
                    InputError::bus(e)
                ))
            })?;

        // polled operation needs the panel awake
        dev.i2c
            .write(address, &[REG_DIS_AUTO_SLEEP, 0x01])
            .map_err(InputError::bus)?;

        info!("CST816 found at {:#04x}, chip id {:#04x}", address, chip_id[0]);
        Ok(dev)
    }
}

impl<I2C: I2c> TouchPanel for Cst816<I2C> {
    fn configure(&mut self, transform: &TouchTransform) {
        self.transform = *transform;
    }

    fn read(&mut self) -> Result<Option<TouchReading>, InputError> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_DATA], &mut data)
            .map_err(InputError::bus)?;

        let [_gesture, fingers, xh, xl, yh, yl] = data;
        if fingers == 0 {
            return Ok(None);
        }

        let raw_x = (i16::from(xh & 0x0F) << 8) | i16::from(xl);
        let raw_y = (i16::from(yh & 0x0F) << 8) | i16::from(yl);
        if (raw_x, raw_y) == self.home {
            return Ok(Some(TouchReading::Home));
        }

        let (x, y) = self.transform.apply(raw_x, raw_y);
        Ok(Some(TouchReading::Point { x, y }))
    }
}

pub struct TouchSource<P> {
    panel: P,
    active: Option<Rotation>,
    home_limiter: IntervalFloor,
}

impl<P: TouchPanel> TouchSource<P> {
    pub fn new(panel: P, home_rate_limit_ms: u32) -> Self {
        Self {
            panel,
            active: None,
            home_limiter: IntervalFloor::new(home_rate_limit_ms),
        }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }
}

impl<P: TouchPanel> RawInputSource for TouchSource<P> {
    fn kind(&self) -> SourceKind {
        SourceKind::Touch
    }

    fn name(&self) -> &str {
        "touch"
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        if self.active != Some(ctx.rotation) {
            debug!("Touch transform switched to {:?}", ctx.rotation);
            self.panel.configure(TouchTransform::for_rotation(ctx.rotation));
            self.active = Some(ctx.rotation);
        }

        match self.panel.read() {
            Ok(None) => {}
            Ok(Some(TouchReading::Point { x, y })) => {
                trace!("Touch at ({}, {})", x, y);
                events.push(RawEvent::touch(x, y, ctx.now_ms));
            }
            Ok(Some(TouchReading::Home)) => {
                if self.home_limiter.touch(ctx.now_ms) {
                    events.push(RawEvent::home(ctx.now_ms));
                } else {
                    trace!("Home gesture rate limited");
                }
            }
            Err(e) => warn!("Touch read failed, skipping cycle: {}", e),
        }
    }
}
