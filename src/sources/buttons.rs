//! Hardware buttons classified into clicks
//!
//! The sampler task reads the button lines at a fixed period, classifies each
//! press and sets bits in a [`NavLatch`]. It never touches the I2C bus. The
//! poll cycle drains the latch through [`ButtonSource`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embedded_hal::digital::InputPin;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::input::clock::MonotonicClock;
use crate::input::debounce::elapsed_ms;
use crate::input::event::{NavSet, RawEvent, SourceKind};
use crate::sources::{PollContext, RawInputSource};

/// A single digital button
pub trait ButtonLine {
    fn is_pressed(&mut self) -> bool;
}

/// Button wired to ground with a pull-up: low means pressed
#[derive(Debug)]
pub struct ActiveLow<P>(pub P);

impl<P: InputPin> ButtonLine for ActiveLow<P> {
    fn is_pressed(&mut self) -> bool {
        // a failed read counts as released
        self.0.is_low().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    SingleClick,
    DoubleClick,
    LongPressStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTiming {
    /// Window after a release in which a second press makes a double click
    pub short_press_ms: u32,
    /// Hold time after which a long press starts
    pub long_press_ms: u32,
}

impl Default for ClickTiming {
    fn default() -> Self {
        Self {
            short_press_ms: 120,
            long_press_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClickPhase {
    Idle,
    Down { since: u32, second: bool },
    Up { since: u32 },
    Held,
}

/// Per-button click classification state
#[derive(Debug, Clone)]
pub struct ClickClassifier {
    timing: ClickTiming,
    phase: ClickPhase,
}

impl ClickClassifier {
    pub fn new(timing: ClickTiming) -> Self {
        Self {
            timing,
            phase: ClickPhase::Idle,
        }
    }

    /// Feeds one sample, returning a click once it is fully classified
    pub fn update(&mut self, pressed: bool, now: u32) -> Option<Click> {
        let (next, click) = match (self.phase, pressed) {
            (ClickPhase::Idle, true) => (
                ClickPhase::Down {
                    since: now,
                    second: false,
                },
                None,
            ),
            (ClickPhase::Idle, false) => (ClickPhase::Idle, None),

            (ClickPhase::Down { second: true, .. }, false) => {
                (ClickPhase::Idle, Some(Click::DoubleClick))
            }
            (ClickPhase::Down { second: false, .. }, false) => {
                (ClickPhase::Up { since: now }, None)
            }
            (ClickPhase::Down { since, second }, true) => {
                if !second && elapsed_ms(now, since) >= self.timing.long_press_ms {
                    (ClickPhase::Held, Some(Click::LongPressStart))
                } else {
                    (ClickPhase::Down { since, second }, None)
                }
            }

            (ClickPhase::Up { .. }, true) => (
                ClickPhase::Down {
                    since: now,
                    second: true,
                },
                None,
            ),
            (ClickPhase::Up { since }, false) => {
                if elapsed_ms(now, since) >= self.timing.short_press_ms {
                    (ClickPhase::Idle, Some(Click::SingleClick))
                } else {
                    (ClickPhase::Up { since }, None)
                }
            }

            (ClickPhase::Held, true) => (ClickPhase::Held, None),
            (ClickPhase::Held, false) => (ClickPhase::Idle, None),
        };
        self.phase = next;
        click
    }
}

/// Navigation asserted by each click kind of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonBinding {
    pub single: NavSet,
    pub double: NavSet,
    pub long: NavSet,
}

impl ButtonBinding {
    /// T-Display S3 button 1
    pub const NEXT_SELECT: ButtonBinding = ButtonBinding {
        single: NavSet::NEXT,
        double: NavSet::SELECT,
        long: NavSet::SELECT,
    };

    /// T-Display S3 button 2
    pub const PREVIOUS_ESCAPE: ButtonBinding = ButtonBinding {
        single: NavSet::PREVIOUS,
        double: NavSet::ESCAPE,
        long: NavSet::ESCAPE,
    };

    pub fn nav_for(&self, click: Click) -> NavSet {
        match click {
            Click::SingleClick => self.single,
            Click::DoubleClick => self.double,
            Click::LongPressStart => self.long,
        }
    }
}

/// Lock-free single-word mailbox between the sampler task and the poll cycle
#[derive(Debug, Clone, Default)]
pub struct NavLatch {
    bits: Arc<AtomicU8>,
}

impl NavLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, nav: NavSet) {
        self.bits.fetch_or(nav.bits(), Ordering::Release);
    }

    /// Reads and clears in one step
    pub fn take(&self) -> NavSet {
        NavSet::from_bits_truncate(self.bits.swap(0, Ordering::AcqRel))
    }

    pub fn is_pending(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }
}

/// One physical button with its classifier and binding
#[derive(Debug)]
pub struct ClickButton<L> {
    line: L,
    classifier: ClickClassifier,
    binding: ButtonBinding,
}

impl<L: ButtonLine> ClickButton<L> {
    pub fn new(line: L, timing: ClickTiming, binding: ButtonBinding) -> Self {
        Self {
            line,
            classifier: ClickClassifier::new(timing),
            binding,
        }
    }

    /// Samples the line once and latches any completed click
    pub fn sample(&mut self, now: u32, latch: &NavLatch) {
        let pressed = self.line.is_pressed();
        if let Some(click) = self.classifier.update(pressed, now) {
            let nav = self.binding.nav_for(click);
            trace!("Button {:?} latched as {:?}", click, nav);
            latch.set(nav);
        }
    }
}

/// Runs the button sampler until `cancel` fires
pub fn spawn_sampler<L>(
    mut buttons: Vec<ClickButton<L>>,
    latch: NavLatch,
    period_ms: u64,
    cancel: CancellationToken,
    clock: MonotonicClock,
) -> JoinHandle<()>
where
    L: ButtonLine + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting button sampler for {} buttons every {}ms",
            buttons.len(),
            period_ms
        );
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_millis(period_ms.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Button sampler stopped");
                    break;
                }
                _ = interval.tick() => {
                    let now = clock.now_ms();
                    for button in buttons.iter_mut() {
                        button.sample(now, &latch);
                    }
                }
            }
        }
    })
}

/// Drains the button latch on polls the debounce gate lets through.
///
/// While the gate is closed the latched clicks stay pending for a later cycle.
#[derive(Debug, Clone)]
pub struct ButtonSource {
    latch: NavLatch,
}

impl ButtonSource {
    pub fn new(latch: NavLatch) -> Self {
        Self { latch }
    }
}

impl RawInputSource for ButtonSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Button
    }

    fn name(&self) -> &str {
        "buttons"
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        if !ctx.gate_open {
            return;
        }
        let nav = self.latch.take();
        if !nav.is_empty() {
            debug!("Drained button latch: {:?}", nav);
            events.push(RawEvent::click(nav, ctx.now_ms));
        }
    }
}

/// Dedicated select/wake button read directly on every poll.
///
/// Level triggered: a held button reports Select each cycle the debounce gate
/// lets through.
#[derive(Debug)]
pub struct SelectLineSource<L> {
    line: L,
}

impl<L: ButtonLine> SelectLineSource<L> {
    pub fn new(line: L) -> Self {
        Self { line }
    }
}

impl<L: ButtonLine> RawInputSource for SelectLineSource<L> {
    fn kind(&self) -> SourceKind {
        SourceKind::Button
    }

    fn name(&self) -> &str {
        "select-button"
    }

    fn poll(&mut self, ctx: &PollContext, events: &mut Vec<RawEvent>) {
        if self.line.is_pressed() {
            events.push(RawEvent::click(NavSet::SELECT, ctx.now_ms));
        }
    }
}
