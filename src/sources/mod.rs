//! Raw input sources, one implementation per hardware variant
//!
//! Every source is polled once per cycle from the poll loop and appends the
//! raw events it drained to a caller-owned buffer. Sources never report
//! failures to the caller: a failed transaction is logged and the cycle
//! simply yields nothing from that source.

pub mod buttons;
pub mod matrix;
pub mod scanned;
pub mod touch;

use crate::input::event::{RawEvent, Rotation, SourceKind};
use crate::keymap::layout::KeyLayout;

pub use buttons::{
    spawn_sampler, ActiveLow, ButtonBinding, ButtonLine, ButtonSource, Click, ClickButton,
    ClickClassifier, ClickTiming, NavLatch, SelectLineSource,
};
pub use matrix::{KeyEventQueue, MatrixSource, Tca8418};
pub use scanned::{GpioMatrixScanner, KeyScanner, ScannedKeyboardSource};
pub use touch::{Cst816, TouchPanel, TouchReading, TouchSource, TouchTransform, TOUCH_TRANSFORMS};

/// External signals read by the sources during one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollContext {
    pub now_ms: u32,
    pub rotation: Rotation,
    /// Latched long press; bypasses the debounce interval
    pub long_press: bool,
    /// Whether the debounce gate lets presses through this cycle; set by the
    /// core before polling
    pub gate_open: bool,
}

impl PollContext {
    pub fn at(now_ms: u32) -> Self {
        Self {
            now_ms,
            rotation: Rotation::R0,
            long_press: false,
            gate_open: true,
        }
    }
}

pub trait RawInputSource {
    fn kind(&self) -> SourceKind;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// Character table for the key positions this source reports
    fn layout(&self) -> KeyLayout {
        KeyLayout::Cardputer
    }

    /// Drains everything the hardware has queued into `events`
    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>);
}

impl<T: RawInputSource + ?Sized> RawInputSource for Box<T> {
    fn kind(&self) -> SourceKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn layout(&self) -> KeyLayout {
        (**self).layout()
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        (**self).poll(ctx, events)
    }
}
